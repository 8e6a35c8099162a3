#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clients for the hosted services behind the survey app.
//!
//! Three collaborators are modelled as traits so that consumers can be
//! handed either the hosted client or an in-memory stand-in:
//!
//! - [`RealtimeStore`]: a hierarchical document database addressed by
//!   collection path. [`RealtimeStore::subscribe`] returns a
//!   [`Subscription`] that yields a full [`Snapshot`] immediately and
//!   again after every change.
//! - [`AuthProvider`]: email/password accounts with an observable
//!   current-user state.
//! - [`BlobStore`]: uploads raw bytes and returns a durable download URL.
//!
//! [`firebase::FirebaseClient`] talks to the hosted REST and streaming
//! endpoints; [`memory::MemoryStore`] keeps everything in process. Both
//! are constructed explicitly and passed to whatever needs them.

pub mod config;
pub mod firebase;
pub mod memory;
pub mod session;
pub mod subscription;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use config::{ConfigError, FirebaseConfig};
pub use subscription::Subscription;

/// A full copy of one collection: generated record ID → record fields.
pub type Snapshot = BTreeMap<String, serde_json::Value>;

/// Errors that can occur while talking to the store, auth or blob
/// services.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (session file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client configuration is incomplete.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The service answered with a non-success status.
    #[error("Request to {path} failed with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Collection path or endpoint.
        path: String,
        /// Response body or error message.
        message: String,
    },

    /// Access to a path was refused or revoked.
    #[error("Permission denied for {path}")]
    PermissionDenied {
        /// Collection path.
        path: String,
    },

    /// A live subscription stream broke.
    #[error("Stream for {path} failed: {message}")]
    Stream {
        /// Collection path.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Sign-in, sign-up or sign-out was rejected.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Provider error code or description.
        message: String,
    },

    /// A service URL could not be built.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,
}

/// One item delivered by a [`Subscription`].
#[derive(Debug)]
pub enum SnapshotEvent {
    /// The current contents of the subscribed path.
    Snapshot(Snapshot),
    /// The subscription failed. Later events may still follow if the
    /// client reconnects.
    Error(StoreError),
}

/// A signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Stable account ID.
    pub uid: String,
    /// Account email.
    pub email: String,
    /// Short-lived bearer token for database and storage requests.
    pub id_token: String,
    /// Long-lived token for refreshing `id_token`.
    pub refresh_token: Option<String>,
}

/// A hierarchical real-time document database.
///
/// Paths are collection paths such as `"points/"`; leading and trailing
/// slashes are ignored.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Opens a live subscription on `path`.
    ///
    /// The first event is delivered as soon as the current contents are
    /// known. Connection failures are delivered as
    /// [`SnapshotEvent::Error`] rather than returned.
    fn subscribe(&self, path: &str) -> Subscription;

    /// Reads the current contents of `path` once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get(&self, path: &str) -> Result<Snapshot, StoreError>;

    /// Merges `fields` into the record `id` under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn update(
        &self,
        path: &str,
        id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError>;

    /// Deletes the record `id` under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    async fn remove(&self, path: &str, id: &str) -> Result<(), StoreError>;

    /// Appends `value` under `path` with a generated ID and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn push(&self, path: &str, value: serde_json::Value) -> Result<String, StoreError>;
}

/// Email/password account management.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Signs in an existing account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Auth`] if the credentials are rejected.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, StoreError>;

    /// Creates a new account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Auth`] if the account cannot be created.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, StoreError>;

    /// Signs out the current user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if sign-out fails.
    async fn sign_out(&self) -> Result<(), StoreError>;

    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Observes the current user. The receiver holds the current value
    /// immediately and is notified on every sign-in and sign-out.
    fn watch(&self) -> tokio::sync::watch::Receiver<Option<AuthUser>>;
}

/// Binary object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `path` and returns a download URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the upload fails.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

/// Strips leading and trailing slashes from a collection path.
#[must_use]
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Builds a blob path of the form `<folder>/<unix-millis>.<extension>`.
#[must_use]
pub fn generated_blob_path(folder: &str, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}/{millis}.{extension}", normalize_path(folder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_collection_paths() {
        assert_eq!(normalize_path("points/"), "points");
        assert_eq!(normalize_path("/other_sightings/"), "other_sightings");
        assert_eq!(normalize_path("pollution"), "pollution");
    }

    #[test]
    fn generated_blob_path_uses_folder_and_extension() {
        let path = generated_blob_path("pollution/", "jpg");
        assert!(path.starts_with("pollution/"));
        assert!(path.ends_with(".jpg"));
    }
}
