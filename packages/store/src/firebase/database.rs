//! REST and streaming access to the hosted real-time database.
//!
//! Every location is addressed as `<database_url>/<path>.json`, with the
//! signed-in user's ID token passed as the `auth` query parameter.
//! Subscriptions hold a long-lived `text/event-stream` GET open and fold
//! its `put` / `patch` events into a local [`mirror`](super::mirror).

use futures::StreamExt as _;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{FirebaseClient, mirror, sse::SseParser};
use crate::{Snapshot, SnapshotEvent, StoreError, normalize_path};

/// Reconnect attempts after a stream failure before the subscription
/// gives up. The counter resets whenever a reconnected stream delivers.
///
/// With the default backoff (2s, 4s, 8s, 16s, 32s) a dead server is
/// abandoned after a little over a minute.
const MAX_RECONNECTS: u32 = 5;

/// Maximum length of a response body included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Builds `<root>/<path>[/<id>].json`.
pub fn location_url(root: &str, path: &str, id: Option<&str>) -> String {
    let path = normalize_path(path);
    match id {
        Some(id) => format!("{root}/{path}/{id}.json"),
        None => format!("{root}/{path}.json"),
    }
}

fn with_auth(request: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.query(&[("auth", token)]),
        None => request,
    }
}

/// Maps a non-success response to [`StoreError`].
///
/// 401 and 403 become [`StoreError::PermissionDenied`].
async fn check_status(
    response: reqwest::Response,
    path: &str,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(StoreError::PermissionDenied {
            path: path.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(BODY_PREVIEW_LEN).collect();
    Err(StoreError::Status {
        status: status.as_u16(),
        path: path.to_string(),
        message,
    })
}

/// One-shot read of a collection.
pub async fn get(
    client: &reqwest::Client,
    root: &str,
    token: Option<&str>,
    path: &str,
) -> Result<Snapshot, StoreError> {
    let url = location_url(root, path, None);
    log::debug!("GET {url}");
    let response = with_auth(client.get(&url), token).send().await?;
    let value: Value = check_status(response, path).await?.json().await?;
    Ok(mirror::snapshot_from_value(value))
}

/// Merges `fields` into one record.
pub async fn update(
    client: &reqwest::Client,
    root: &str,
    token: Option<&str>,
    path: &str,
    id: &str,
    fields: serde_json::Map<String, Value>,
) -> Result<(), StoreError> {
    let url = location_url(root, path, Some(id));
    log::debug!("PATCH {url}");
    let response = with_auth(client.patch(&url), token)
        .json(&fields)
        .send()
        .await?;
    check_status(response, path).await?;
    Ok(())
}

/// Deletes one record.
pub async fn remove(
    client: &reqwest::Client,
    root: &str,
    token: Option<&str>,
    path: &str,
    id: &str,
) -> Result<(), StoreError> {
    let url = location_url(root, path, Some(id));
    log::debug!("DELETE {url}");
    let response = with_auth(client.delete(&url), token).send().await?;
    check_status(response, path).await?;
    Ok(())
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// Appends a record and returns the server-generated ID.
pub async fn push(
    client: &reqwest::Client,
    root: &str,
    token: Option<&str>,
    path: &str,
    value: &Value,
) -> Result<String, StoreError> {
    let url = location_url(root, path, None);
    log::debug!("POST {url}");
    let response = with_auth(client.post(&url), token)
        .json(value)
        .send()
        .await?;
    let body: PushResponse = check_status(response, path).await?.json().await?;
    Ok(body.name)
}

#[derive(Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

enum StreamEnd {
    /// Server closed the connection.
    Closed,
    /// Server sent `cancel` or `auth_revoked`.
    Revoked,
    /// Subscriber went away.
    ReceiverGone,
}

/// Everything a stream task needs, owned so it can move into the task.
pub struct StreamRequest {
    /// Client whose current ID token authorizes each connection.
    pub owner: FirebaseClient,
    pub url: String,
    pub path: String,
}

/// Keeps a subscription's event stream open until the receiver drops, the
/// server revokes access, or reconnects are exhausted.
///
/// A refused or revoked stream is reopened once with a refreshed ID token
/// before the denial is reported.
pub async fn run_stream(request: StreamRequest, tx: mpsc::UnboundedSender<SnapshotEvent>) {
    let mut attempt = 0;
    let mut refreshed = false;

    loop {
        let mut delivered = false;
        let outcome = stream_once(&request, &tx, &mut delivered).await;
        if delivered {
            attempt = 0;
            refreshed = false;
        }

        let failure = match outcome {
            Ok(StreamEnd::ReceiverGone) => return,
            Ok(StreamEnd::Revoked) => {
                log::warn!("Stream for {} revoked by server", request.path);
                StoreError::PermissionDenied {
                    path: request.path.clone(),
                }
            }
            Ok(StreamEnd::Closed) => StoreError::Stream {
                path: request.path.clone(),
                message: "connection closed by server".to_string(),
            },
            Err(e) => e,
        };

        if matches!(failure, StoreError::PermissionDenied { .. }) {
            if !refreshed && refresh_token(&request).await {
                refreshed = true;
                log::info!("Reopening stream for {} with a refreshed token", request.path);
                continue;
            }
            let _ = tx.send(SnapshotEvent::Error(failure));
            return;
        }

        log::warn!("Stream for {} failed: {failure}", request.path);
        if tx.send(SnapshotEvent::Error(failure)).is_err() {
            return;
        }

        if attempt >= MAX_RECONNECTS {
            log::error!(
                "Giving up on stream for {} after {MAX_RECONNECTS} reconnects",
                request.path
            );
            return;
        }
        let delay = request.owner.reconnect_base * 2u32.pow(attempt + 1);
        attempt += 1;
        log::info!(
            "Reconnecting stream for {} in {delay:?} (attempt {attempt}/{MAX_RECONNECTS})",
            request.path
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = tx.closed() => return,
        }
    }
}

/// Whether a new ID token was obtained.
async fn refresh_token(request: &StreamRequest) -> bool {
    match request.owner.refresh_session().await {
        Ok(user) => user.is_some(),
        Err(e) => {
            log::warn!("Could not refresh token for {}: {e}", request.path);
            false
        }
    }
}

async fn stream_once(
    request: &StreamRequest,
    tx: &mpsc::UnboundedSender<SnapshotEvent>,
    delivered: &mut bool,
) -> Result<StreamEnd, StoreError> {
    log::debug!("Opening stream {}", request.url);
    let token = request.owner.id_token();
    let response = with_auth(request.owner.client.get(&request.url), token.as_deref())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;
    let response = check_status(response, &request.path).await?;

    let mut body = response.bytes_stream();
    let mut parser = SseParser::default();
    let mut root = Value::Null;

    loop {
        let chunk = tokio::select! {
            chunk = body.next() => chunk,
            () = tx.closed() => return Ok(StreamEnd::ReceiverGone),
        };
        let Some(chunk) = chunk else {
            return Ok(StreamEnd::Closed);
        };
        let chunk = chunk?;

        for event in parser.feed(&chunk) {
            match event.name.as_str() {
                "put" | "patch" => {
                    let payload: StreamPayload = serde_json::from_str(&event.data)?;
                    if event.name == "put" {
                        mirror::put(&mut root, &payload.path, payload.data);
                    } else {
                        mirror::patch(&mut root, &payload.path, payload.data);
                    }
                    *delivered = true;
                    let snapshot = mirror::snapshot_from_value(root.clone());
                    if tx.send(SnapshotEvent::Snapshot(snapshot)).is_err() {
                        return Ok(StreamEnd::ReceiverGone);
                    }
                }
                "keep-alive" => {}
                "cancel" | "auth_revoked" => return Ok(StreamEnd::Revoked),
                other => log::debug!("Ignoring stream event {other} on {}", request.path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_location_urls() {
        let root = "https://mangrove-default-rtdb.firebaseio.com";
        assert_eq!(
            location_url(root, "points/", None),
            "https://mangrove-default-rtdb.firebaseio.com/points.json"
        );
        assert_eq!(
            location_url(root, "/other_sightings/", Some("-Nabc")),
            "https://mangrove-default-rtdb.firebaseio.com/other_sightings/-Nabc.json"
        );
    }
}
