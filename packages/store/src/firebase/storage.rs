//! Object uploads to the storage bucket.

use serde::Deserialize;

use crate::{FirebaseConfig, StoreError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    download_tokens: Option<String>,
}

/// Builds the public download URL for an object.
///
/// Object names are a single URL-encoded path segment, so `pollution/1.jpg`
/// becomes `.../o/pollution%2F1.jpg`.
pub fn download_url(
    config: &FirebaseConfig,
    name: &str,
    token: Option<&str>,
) -> Result<String, StoreError> {
    let base = format!(
        "{}/v0/b/{}/o",
        config.storage_url.trim_end_matches('/'),
        config.storage_bucket
    );
    let mut url = reqwest::Url::parse(&base).map_err(|e| StoreError::InvalidUrl {
        url: base.clone(),
        message: e.to_string(),
    })?;

    url.path_segments_mut()
        .map_err(|()| StoreError::InvalidUrl {
            url: base.clone(),
            message: "URL cannot have path segments".to_string(),
        })?
        .push(name);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("alt", "media");
        if let Some(token) = token {
            query.append_pair("token", token);
        }
    }

    Ok(url.into())
}

/// Uploads `bytes` as object `path` and returns its download URL.
pub async fn upload(
    client: &reqwest::Client,
    config: &FirebaseConfig,
    id_token: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, StoreError> {
    let url = format!(
        "{}/v0/b/{}/o",
        config.storage_url.trim_end_matches('/'),
        config.storage_bucket
    );
    log::debug!("Uploading {} bytes to {path}", bytes.len());

    let response = client
        .post(&url)
        .query(&[("uploadType", "media"), ("name", path)])
        .header(reqwest::header::AUTHORIZATION, format!("Firebase {id_token}"))
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(bytes)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(StoreError::Status {
            status: status.as_u16(),
            path: path.to_string(),
            message,
        });
    }

    let body: UploadResponse = response.json().await?;
    let token = body
        .download_tokens
        .as_deref()
        .and_then(|tokens| tokens.split(',').next())
        .filter(|t| !t.is_empty());
    download_url(config, &body.name, token)
}
