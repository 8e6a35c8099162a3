//! Client for the hosted database, auth and storage services.

mod auth;
mod database;
#[cfg(test)]
mod local_server;
pub mod mirror;
pub mod sse;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::{
    AuthProvider, AuthUser, BlobStore, FirebaseConfig, RealtimeStore, Snapshot, StoreError,
    Subscription, normalize_path,
};

/// First stream reconnect delay is twice this, doubling per attempt.
const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Hosted client implementing [`RealtimeStore`], [`AuthProvider`] and
/// [`BlobStore`].
///
/// Cloning is cheap and clones share the signed-in user. A request
/// refused with 401/403 is retried once after refreshing the ID token.
#[derive(Debug, Clone)]
pub struct FirebaseClient {
    config: FirebaseConfig,
    client: reqwest::Client,
    user: Arc<watch::Sender<Option<AuthUser>>>,
    reconnect_base: Duration,
}

impl FirebaseClient {
    /// Creates a signed-out client.
    #[must_use]
    pub fn new(config: FirebaseConfig) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            config,
            client: reqwest::Client::new(),
            user: Arc::new(user),
            reconnect_base: DEFAULT_RECONNECT_BASE,
        }
    }

    /// Sets the unit of the stream reconnect backoff.
    #[must_use]
    pub fn with_reconnect_base(mut self, base: Duration) -> Self {
        self.reconnect_base = base;
        self
    }

    /// Restores a previously signed-in user (e.g. from a saved session).
    #[must_use]
    pub fn with_user(self, user: Option<AuthUser>) -> Self {
        self.user.send_replace(user);
        self
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    fn id_token(&self) -> Option<String> {
        self.user.borrow().as_ref().map(|u| u.id_token.clone())
    }

    /// Exchanges the refresh token for a new ID token and shares the
    /// refreshed user with every clone.
    ///
    /// Returns `Ok(None)` when nobody is signed in or the session carries
    /// no refresh token.
    ///
    /// # Errors
    ///
    /// * [`StoreError::Auth`] if the token service rejects the refresh token
    /// * [`StoreError::Http`] if the token service is unreachable
    pub async fn refresh_session(&self) -> Result<Option<AuthUser>, StoreError> {
        let Some(user) = self.user.borrow().clone() else {
            return Ok(None);
        };
        let Some(refresh_token) = user.refresh_token.clone() else {
            return Ok(None);
        };

        let refreshed = auth::refresh(&self.client, &self.config, &user, &refresh_token).await?;
        log::debug!("Refreshed ID token for {}", refreshed.email);
        self.user.send_replace(Some(refreshed.clone()));
        Ok(Some(refreshed))
    }

    /// Runs `op` with the current ID token, refreshing and retrying once
    /// if it is refused.
    async fn with_fresh_token<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: Fn(Option<String>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        match op(self.id_token()).await {
            Err(StoreError::PermissionDenied { path }) => match self.refresh_session().await {
                Ok(Some(_)) => {
                    log::debug!("Retrying {path} with a refreshed token");
                    op(self.id_token()).await
                }
                Ok(None) => Err(StoreError::PermissionDenied { path }),
                Err(e) => {
                    log::warn!("Could not refresh token: {e}");
                    Err(StoreError::PermissionDenied { path })
                }
            },
            other => other,
        }
    }
}

#[async_trait]
impl RealtimeStore for FirebaseClient {
    fn subscribe(&self, path: &str) -> Subscription {
        let path = normalize_path(path).to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let request = database::StreamRequest {
            owner: self.clone(),
            url: database::location_url(self.config.database_root(), &path, None),
            path: path.clone(),
        };
        log::debug!("Subscribing to {path}");
        let task = tokio::spawn(database::run_stream(request, tx));

        Subscription::new(path, rx, move || task.abort())
    }

    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> {
        let (client, root) = (&self.client, self.config.database_root());
        self.with_fresh_token(move |token| async move {
            database::get(client, root, token.as_deref(), path).await
        })
        .await
    }

    async fn update(
        &self,
        path: &str,
        id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let (client, root, fields) = (&self.client, self.config.database_root(), &fields);
        self.with_fresh_token(move |token| async move {
            database::update(client, root, token.as_deref(), path, id, fields.clone()).await
        })
        .await
    }

    async fn remove(&self, path: &str, id: &str) -> Result<(), StoreError> {
        let (client, root) = (&self.client, self.config.database_root());
        self.with_fresh_token(move |token| async move {
            database::remove(client, root, token.as_deref(), path, id).await
        })
        .await
    }

    async fn push(&self, path: &str, value: serde_json::Value) -> Result<String, StoreError> {
        let (client, root, value) = (&self.client, self.config.database_root(), &value);
        self.with_fresh_token(move |token| async move {
            database::push(client, root, token.as_deref(), path, value).await
        })
        .await
    }
}

#[async_trait]
impl AuthProvider for FirebaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, StoreError> {
        let user = auth::password_request(
            &self.client,
            &self.config,
            auth::PasswordEndpoint::SignIn,
            email,
            password,
        )
        .await?;
        log::info!("Signed in as {}", user.email);
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, StoreError> {
        let user = auth::password_request(
            &self.client,
            &self.config,
            auth::PasswordEndpoint::SignUp,
            email,
            password,
        )
        .await?;
        log::info!("Created account {}", user.email);
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        // Tokens are bearer tokens; dropping them locally is the sign-out.
        self.user.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.user.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.user.subscribe()
    }
}

#[async_trait]
impl BlobStore for FirebaseClient {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let token = self.id_token().ok_or(StoreError::NotSignedIn)?;
        storage::upload(
            &self.client,
            &self.config,
            &token,
            normalize_path(path),
            bytes,
            content_type,
        )
        .await
    }
}
