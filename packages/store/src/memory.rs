//! In-process store, auth and blob implementation.
//!
//! Behaves like the hosted database from a subscriber's point of view:
//! every subscription gets the current snapshot of its path immediately,
//! and every mutation re-broadcasts a full snapshot of the affected path.
//! Paths can be marked as denied to exercise failure handling.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::{
    AuthProvider, AuthUser, BlobStore, RealtimeStore, Snapshot, SnapshotEvent, StoreError,
    Subscription, normalize_path,
};

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, Snapshot>,
    subscribers: BTreeMap<u64, (String, mpsc::UnboundedSender<SnapshotEvent>)>,
    next_subscriber: u64,
    next_push: u64,
    denied: BTreeSet<String>,
    accounts: BTreeMap<String, (String, String)>,
    blobs: BTreeMap<String, (String, Vec<u8>)>,
}

impl MemoryState {
    fn snapshot(&self, path: &str) -> Snapshot {
        self.collections.get(path).cloned().unwrap_or_default()
    }

    fn broadcast(&mut self, path: &str) {
        let snapshot = self.snapshot(path);
        self.subscribers.retain(|_, (sub_path, tx)| {
            if sub_path != path {
                return true;
            }
            tx.send(SnapshotEvent::Snapshot(snapshot.clone())).is_ok()
        });
    }

    fn check_access(&self, path: &str) -> Result<(), StoreError> {
        if self.denied.contains(path) {
            return Err(StoreError::PermissionDenied {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// An in-memory [`RealtimeStore`], [`AuthProvider`] and [`BlobStore`].
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    user: Arc<watch::Sender<Option<AuthUser>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with no accounts.
    #[must_use]
    pub fn new() -> Self {
        let (user, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            user: Arc::new(user),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the whole contents of `path` and notifies subscribers.
    pub fn seed(&self, path: &str, records: Snapshot) {
        let path = normalize_path(path);
        let mut state = self.lock();
        state.collections.insert(path.to_string(), records);
        state.broadcast(path);
    }

    /// Refuses all access to `path`. Live subscribers receive one
    /// [`SnapshotEvent::Error`]; new subscribers receive an error instead
    /// of a snapshot.
    pub fn deny(&self, path: &str) {
        let path = normalize_path(path);
        let mut state = self.lock();
        state.denied.insert(path.to_string());
        state.subscribers.retain(|_, (sub_path, tx)| {
            if sub_path != path {
                return true;
            }
            tx.send(SnapshotEvent::Error(StoreError::PermissionDenied {
                path: path.to_string(),
            }))
            .is_ok()
        });
    }

    /// Lifts a [`Self::deny`] and re-broadcasts the current snapshot.
    pub fn allow(&self, path: &str) {
        let path = normalize_path(path);
        let mut state = self.lock();
        if state.denied.remove(path) {
            state.broadcast(path);
        }
    }

    /// Number of live subscriptions on `path`.
    #[must_use]
    pub fn subscriber_count(&self, path: &str) -> usize {
        let path = normalize_path(path);
        self.lock()
            .subscribers
            .values()
            .filter(|(sub_path, _)| sub_path == path)
            .count()
    }

    /// Bytes and content type stored under a blob path.
    #[must_use]
    pub fn blob(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.lock().blobs.get(path).cloned()
    }

    fn detach(state: &Weak<Mutex<MemoryState>>, id: u64) {
        if let Some(state) = state.upgrade() {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&id);
        }
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    fn subscribe(&self, path: &str) -> Subscription {
        let path = normalize_path(path).to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.lock();
        let first = match state.check_access(&path) {
            Ok(()) => SnapshotEvent::Snapshot(state.snapshot(&path)),
            Err(e) => SnapshotEvent::Error(e),
        };
        // The receiver is alive, so the initial send cannot fail.
        let _ = tx.send(first);

        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.insert(id, (path.clone(), tx));
        drop(state);

        let weak = Arc::downgrade(&self.state);
        Subscription::new(path, rx, move || Self::detach(&weak, id))
    }

    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> {
        let path = normalize_path(path);
        let state = self.lock();
        state.check_access(path)?;
        Ok(state.snapshot(path))
    }

    async fn update(
        &self,
        path: &str,
        id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let path = normalize_path(path);
        let mut state = self.lock();
        state.check_access(path)?;
        let record = state
            .collections
            .entry(path.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !record.is_object() {
            *record = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(object) = record.as_object_mut() {
            for (key, value) in fields {
                if value.is_null() {
                    object.remove(&key);
                } else {
                    object.insert(key, value);
                }
            }
        }
        state.broadcast(path);
        Ok(())
    }

    async fn remove(&self, path: &str, id: &str) -> Result<(), StoreError> {
        let path = normalize_path(path);
        let mut state = self.lock();
        state.check_access(path)?;
        if let Some(records) = state.collections.get_mut(path) {
            records.remove(id);
        }
        state.broadcast(path);
        Ok(())
    }

    async fn push(&self, path: &str, value: serde_json::Value) -> Result<String, StoreError> {
        let path = normalize_path(path);
        let mut state = self.lock();
        state.check_access(path)?;
        let id = format!("mem{:016}", state.next_push);
        state.next_push += 1;
        state
            .collections
            .entry(path.to_string())
            .or_default()
            .insert(id.clone(), value);
        state.broadcast(path);
        Ok(id)
    }
}

#[async_trait]
impl AuthProvider for MemoryStore {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, StoreError> {
        let account = self.lock().accounts.get(email).cloned();
        let Some((uid, stored_password)) = account else {
            return Err(StoreError::Auth {
                message: "EMAIL_NOT_FOUND".to_string(),
            });
        };
        if stored_password != password {
            return Err(StoreError::Auth {
                message: "INVALID_PASSWORD".to_string(),
            });
        }
        let user = AuthUser {
            uid: uid.clone(),
            email: email.to_string(),
            id_token: format!("memory-token-{uid}"),
            refresh_token: None,
        };
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, StoreError> {
        {
            let mut state = self.lock();
            if state.accounts.contains_key(email) {
                return Err(StoreError::Auth {
                    message: "EMAIL_EXISTS".to_string(),
                });
            }
            let uid = format!("uid{:08}", state.accounts.len());
            state
                .accounts
                .insert(email.to_string(), (uid, password.to_string()));
        }
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
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
impl BlobStore for MemoryStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        self.lock()
            .blobs
            .insert(path.to_string(), (content_type.to_string(), bytes));
        Ok(format!("memory://{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> serde_json::Value {
        serde_json::json!({ "name": name, "coordinates": "-6.2,106.8" })
    }

    async fn next_snapshot(sub: &mut Subscription) -> Snapshot {
        match sub.next_event().await {
            Some(SnapshotEvent::Snapshot(snapshot)) => snapshot,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_and_changed_snapshots() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("points/");
        assert!(next_snapshot(&mut sub).await.is_empty());

        let id = store.push("points/", record("Plot A")).await.unwrap();
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&id]["name"], "Plot A");

        let mut fields = serde_json::Map::new();
        fields.insert("synced".to_string(), serde_json::json!(true));
        store.update("points", &id, fields).await.unwrap();
        assert_eq!(next_snapshot(&mut sub).await[&id]["synced"], true);

        store.remove("points", &id).await.unwrap();
        assert!(next_snapshot(&mut sub).await.is_empty());
    }

    #[tokio::test]
    async fn push_ids_sort_in_insertion_order() {
        let store = MemoryStore::new();
        let first = store.push("pollution", record("a")).await.unwrap();
        let second = store.push("pollution", record("b")).await.unwrap();
        assert!(first < second);
        let keys: Vec<_> = store.get("pollution").await.unwrap().into_keys().collect();
        assert_eq!(keys, vec![first, second]);
    }

    #[tokio::test]
    async fn cancelling_one_subscription_keeps_others_live() {
        let store = MemoryStore::new();
        let mut kept = store.subscribe("points");
        let mut cancelled = store.subscribe("points");
        next_snapshot(&mut kept).await;
        assert_eq!(store.subscriber_count("points"), 2);

        cancelled.cancel();
        assert_eq!(store.subscriber_count("points"), 1);
        assert!(cancelled.next_event().await.is_none());

        store.push("points", record("Plot B")).await.unwrap();
        assert_eq!(next_snapshot(&mut kept).await.len(), 1);
    }

    #[tokio::test]
    async fn denied_path_reports_errors() {
        let store = MemoryStore::new();
        let mut live = store.subscribe("disturbance");
        next_snapshot(&mut live).await;

        store.deny("disturbance");
        assert!(matches!(
            live.next_event().await,
            Some(SnapshotEvent::Error(StoreError::PermissionDenied { .. }))
        ));

        let mut late = store.subscribe("disturbance");
        assert!(matches!(
            late.next_event().await,
            Some(SnapshotEvent::Error(_))
        ));
        assert!(store.push("disturbance", record("x")).await.is_err());

        store.allow("disturbance");
        assert!(next_snapshot(&mut live).await.is_empty());
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let store = MemoryStore::new();
        let mut watcher = store.watch();
        assert!(watcher.borrow().is_none());

        let user = store.sign_up("ranger@example.com", "secret").await.unwrap();
        watcher.changed().await.unwrap();
        assert_eq!(watcher.borrow().as_ref(), Some(&user));

        assert!(store.sign_up("ranger@example.com", "other").await.is_err());
        assert!(store.sign_in("ranger@example.com", "wrong").await.is_err());

        store.sign_out().await.unwrap();
        assert!(store.current_user().is_none());
        let again = store.sign_in("ranger@example.com", "secret").await.unwrap();
        assert_eq!(again.uid, user.uid);
    }

    #[tokio::test]
    async fn upload_returns_url() {
        let store = MemoryStore::new();
        let url = store
            .upload("pollution/1.jpg", vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "memory://pollution/1.jpg");
        assert_eq!(
            store.blob("pollution/1.jpg"),
            Some(("image/jpeg".to_string(), vec![1, 2, 3]))
        );
    }
}
