//! Identity toolkit email/password endpoints and the secure token
//! refresh exchange.

use serde::{Deserialize, Serialize};

use crate::{AuthUser, FirebaseConfig, StoreError};

/// Which account endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordEndpoint {
    SignIn,
    SignUp,
}

impl PasswordEndpoint {
    const fn method(self) -> &'static str {
        match self {
            Self::SignIn => "signInWithPassword",
            Self::SignUp => "signUp",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Extracts the provider error code (e.g. `INVALID_PASSWORD`) from an
/// error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body).map_or_else(
        |_| body.trim().to_string(),
        |response| response.error.message,
    )
}

/// Calls `accounts:signInWithPassword` or `accounts:signUp`.
pub async fn password_request(
    client: &reqwest::Client,
    config: &FirebaseConfig,
    endpoint: PasswordEndpoint,
    email: &str,
    password: &str,
) -> Result<AuthUser, StoreError> {
    let url = format!(
        "{}/v1/accounts:{}",
        config.auth_url.trim_end_matches('/'),
        endpoint.method()
    );
    log::debug!("POST {url}");

    let response = client
        .post(&url)
        .query(&[("key", config.api_key.as_str())])
        .json(&PasswordRequest {
            email,
            password,
            return_secure_token: true,
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(StoreError::Auth {
            message: error_message(&body),
        });
    }

    let response: PasswordResponse = serde_json::from_str(&body)?;
    Ok(AuthUser {
        uid: response.local_id,
        email: response.email.unwrap_or_else(|| email.to_string()),
        id_token: response.id_token,
        refresh_token: response.refresh_token,
    })
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: Option<String>,
    user_id: Option<String>,
}

/// Trades `user`'s refresh token for a fresh ID token via
/// `<token_url>/v1/token`.
///
/// The returned user keeps `user`'s email and, when the response omits
/// them, its UID and refresh token.
pub async fn refresh(
    client: &reqwest::Client,
    config: &FirebaseConfig,
    user: &AuthUser,
    refresh_token: &str,
) -> Result<AuthUser, StoreError> {
    let url = format!("{}/v1/token", config.token_url.trim_end_matches('/'));
    log::debug!("POST {url}");

    let response = client
        .post(&url)
        .query(&[("key", config.api_key.as_str())])
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(StoreError::Auth {
            message: error_message(&body),
        });
    }

    let response: RefreshResponse = serde_json::from_str(&body)?;
    Ok(AuthUser {
        uid: response.user_id.unwrap_or_else(|| user.uid.clone()),
        email: user.email.clone(),
        id_token: response.id_token,
        refresh_token: response
            .refresh_token
            .or_else(|| Some(refresh_token.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_provider_error_code() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(error_message(body), "EMAIL_EXISTS");
        assert_eq!(error_message(" Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn serializes_request_in_camel_case() {
        let body = serde_json::to_value(PasswordRequest {
            email: "ranger@example.com",
            password: "secret",
            return_secure_token: true,
        })
        .unwrap();
        assert_eq!(body["returnSecureToken"], true);
        assert_eq!(PasswordEndpoint::SignUp.method(), "signUp");
    }

    #[test]
    fn refresh_response_is_snake_case() {
        let body = r#"{"expires_in":"3600","token_type":"Bearer","refresh_token":"r2","id_token":"t2","user_id":"u1","project_id":"1"}"#;
        let response: RefreshResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.id_token, "t2");
        assert_eq!(response.refresh_token.as_deref(), Some("r2"));
        assert_eq!(response.user_id.as_deref(), Some("u1"));
    }
}
