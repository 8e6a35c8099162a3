//! One cancellable handle over a subscription per category.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{SelectAll, Stream, StreamExt as _};
use mangrove_record_models::Category;
use mangrove_store::{RealtimeStore, SnapshotEvent, Subscription};

/// A subscription tagged with the category it observes.
struct CategoryStream {
    category: Category,
    subscription: Subscription,
}

impl Stream for CategoryStream {
    type Item = (Category, SnapshotEvent);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let category = self.category;
        self.subscription
            .poll_next_unpin(cx)
            .map(|event| event.map(|event| (category, event)))
    }
}

/// Merged events from a set of per-category subscriptions.
///
/// Cancelling (or dropping) the aggregate cancels every underlying
/// subscription. Individual subscriptions are independent of each other
/// on the store side.
pub struct AggregateSubscription {
    streams: SelectAll<CategoryStream>,
    cancelled: bool,
}

impl AggregateSubscription {
    /// Subscribes to every category.
    #[must_use]
    pub fn open(store: &dyn RealtimeStore) -> Self {
        Self::open_categories(store, Category::all())
    }

    /// Subscribes to each of `categories`.
    #[must_use]
    pub fn open_categories(store: &dyn RealtimeStore, categories: &[Category]) -> Self {
        let streams = futures::stream::select_all(categories.iter().map(|category| {
            log::debug!("Subscribing to {category} at {}", category.path());
            CategoryStream {
                category: *category,
                subscription: store.subscribe(category.path()),
            }
        }));
        Self {
            streams,
            cancelled: false,
        }
    }

    /// Waits for the next event from any category. Returns `None` once
    /// cancelled or when every store side has gone away.
    pub async fn next_event(&mut self) -> Option<(Category, SnapshotEvent)> {
        if self.cancelled {
            return None;
        }
        self.streams.next().await
    }

    /// Cancels every underlying subscription.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        log::debug!("Cancelling {} category subscriptions", self.streams.len());
        for stream in self.streams.iter_mut() {
            stream.subscription.cancel();
        }
        self.streams.clear();
        self.cancelled = true;
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for AggregateSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mangrove_store::memory::MemoryStore;
    use mangrove_store::Snapshot;
    use serde_json::json;

    use super::*;
    use crate::aggregator::Aggregator;

    async fn drain_initial(sub: &mut AggregateSubscription, aggregator: &mut Aggregator) {
        while aggregator.is_loading() {
            let (category, event) = sub.next_event().await.unwrap();
            aggregator.apply_event(category, &event);
        }
    }

    #[tokio::test]
    async fn initial_snapshots_clear_loading() {
        let store = MemoryStore::new();
        store.seed(
            "points/",
            [("o1".to_string(), json!({"coordinates": "-6.2,106.8"}))].into(),
        );

        let mut sub = AggregateSubscription::open(&store);
        let mut aggregator = Aggregator::new();
        drain_initial(&mut sub, &mut aggregator).await;

        assert_eq!(aggregator.points().len(), 1);
        assert!((aggregator.points()[0].latitude - -6.2).abs() < f64::EPSILON);
        for category in Category::all() {
            assert_eq!(store.subscriber_count(category.path()), 1);
        }
    }

    #[tokio::test]
    async fn denied_category_warns_without_blocking_others() {
        let store = MemoryStore::new();
        store.deny("other_sightings/");

        let mut sub = AggregateSubscription::open(&store);
        let mut aggregator = Aggregator::new();
        let mut warnings = Vec::new();
        while aggregator.is_loading() {
            let (category, event) = sub.next_event().await.unwrap();
            warnings.extend(aggregator.apply_event(category, &event));
        }
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].category, Category::Sightings);

        store.seed(
            "pollution/",
            [("p1".to_string(), json!({"latitude": 1, "longitude": 2}))].into(),
        );
        let (category, event) = sub.next_event().await.unwrap();
        assert_eq!(category, Category::Pollution);
        assert!(aggregator.apply_event(category, &event).is_none());
        assert_eq!(aggregator.slice(Category::Pollution).len(), 1);
    }

    #[tokio::test]
    async fn cancel_detaches_every_category() {
        let store = MemoryStore::new();
        let mut sub = AggregateSubscription::open(&store);
        assert_eq!(store.subscriber_count("planning_plots/"), 1);

        sub.cancel();
        assert!(sub.is_cancelled());
        for category in Category::all() {
            assert_eq!(store.subscriber_count(category.path()), 0);
        }
        assert!(sub.next_event().await.is_none());
    }

    #[tokio::test]
    async fn cancelling_one_aggregate_leaves_another_live() {
        let store = MemoryStore::new();
        let mut first = AggregateSubscription::open_categories(&store, &[Category::Observations]);
        let mut second = AggregateSubscription::open_categories(&store, &[Category::Observations]);
        let _ = first.next_event().await;
        let _ = second.next_event().await;

        drop(first);
        assert_eq!(store.subscriber_count("points/"), 1);

        store.seed("points/", Snapshot::new());
        let next = tokio::time::timeout(Duration::from_secs(1), second.next_event())
            .await
            .unwrap();
        assert!(matches!(next, Some((Category::Observations, SnapshotEvent::Snapshot(_)))));
    }

    #[tokio::test]
    async fn summary_counts_stay_live_across_categories() {
        let store = MemoryStore::new();
        store.seed(
            "points/",
            [
                ("o1".to_string(), json!({"synced": true})),
                ("o2".to_string(), json!({"synced": false})),
            ]
            .into(),
        );

        let categories = mangrove_record::Summary::categories();
        let mut sub = AggregateSubscription::open_categories(&store, categories);
        let mut summary = mangrove_record::Summary::default();
        for _ in categories {
            let (category, event) = sub.next_event().await.unwrap();
            assert!(summary.apply_event(category, &event).is_none());
        }
        assert_eq!((summary.observations, summary.unsynced), (1, 1));
        assert_eq!(store.subscriber_count("other_forms/"), 0);

        store.push("other_sightings/", json!({"speciesName": "Kuntul"})).await.unwrap();
        let (category, event) = sub.next_event().await.unwrap();
        assert_eq!(category, Category::Sightings);
        summary.apply_event(category, &event);
        assert_eq!(summary.sightings, 1);
        sub.cancel();
    }
}
