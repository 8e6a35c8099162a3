//! Cancellable live subscription handle.
//!
//! A [`Subscription`] is the receiving end of a per-path event channel
//! plus a cancel hook supplied by the store that created it. Cancelling
//! (explicitly or by dropping) runs the hook exactly once, which detaches
//! the subscription from its store without touching any other
//! subscription.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::SnapshotEvent;

type CancelHook = Box<dyn FnOnce() + Send>;

/// A live subscription on one collection path.
pub struct Subscription {
    path: String,
    receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
    cancel: Option<CancelHook>,
}

impl Subscription {
    /// Wraps a receiver and the hook that detaches it from its store.
    pub fn new<F>(
        path: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
        cancel: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            path: path.into(),
            receiver,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// The path this subscription observes.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether [`Self::cancel`] has already run.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }

    /// Waits for the next event. Returns `None` once the store side has
    /// gone away or the subscription was cancelled.
    pub async fn next_event(&mut self) -> Option<SnapshotEvent> {
        self.receiver.recv().await
    }

    /// Detaches from the store. Events already queued are discarded.
    pub fn cancel(&mut self) {
        if let Some(hook) = self.cancel.take() {
            log::debug!("Cancelling subscription on {}", self.path);
            hook();
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Stream for Subscription {
    type Item = SnapshotEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
