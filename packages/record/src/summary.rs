//! Home-screen counts and the observation sync action.

use mangrove_record_models::{Category, CategoryWarning};
use mangrove_store::{RealtimeStore, Snapshot, SnapshotEvent, StoreError};
use serde::Serialize;
use serde_json::Value;

fn synced_flag(value: &Value) -> Option<bool> {
    value.get("synced").and_then(Value::as_bool)
}

/// Record counts shown on the home screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Observations with `synced == true`.
    pub observations: usize,
    /// Observations with `synced == false`. Records without a flag count
    /// as neither.
    pub unsynced: usize,
    pub pollution: usize,
    pub disturbance: usize,
    pub sightings: usize,
}

impl Summary {
    /// Updates the count for `category` from its latest snapshot.
    pub fn apply_snapshot(&mut self, category: Category, snapshot: &Snapshot) {
        match category {
            Category::Observations => {
                self.observations = snapshot
                    .values()
                    .filter(|v| synced_flag(v) == Some(true))
                    .count();
                self.unsynced = snapshot
                    .values()
                    .filter(|v| synced_flag(v) == Some(false))
                    .count();
            }
            Category::Pollution => self.pollution = snapshot.len(),
            Category::Disturbance => self.disturbance = snapshot.len(),
            Category::Sightings => self.sightings = snapshot.len(),
            Category::OtherForms | Category::PlanningPlots => {}
        }
    }

    /// Applies one live event. A failed category keeps its last count and
    /// yields a warning.
    pub fn apply_event(
        &mut self,
        category: Category,
        event: &SnapshotEvent,
    ) -> Option<CategoryWarning> {
        match event {
            SnapshotEvent::Snapshot(snapshot) => {
                self.apply_snapshot(category, snapshot);
                None
            }
            SnapshotEvent::Error(error) => Some(CategoryWarning {
                category,
                message: error.to_string(),
            }),
        }
    }

    /// Categories that feed the summary.
    #[must_use]
    pub const fn categories() -> &'static [Category] {
        &[
            Category::Observations,
            Category::Pollution,
            Category::Disturbance,
            Category::Sightings,
        ]
    }

    /// Reads every summary category once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any read fails.
    pub async fn load(store: &dyn RealtimeStore) -> Result<Self, StoreError> {
        let mut summary = Self::default();
        for category in Self::categories() {
            let snapshot = store.get(category.path()).await?;
            summary.apply_snapshot(*category, &snapshot);
        }
        Ok(summary)
    }
}

/// Outcome of [`sync_observations`].
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Records successfully marked as synced.
    pub updated: usize,
    /// Records whose update failed.
    pub failed: Vec<(String, StoreError)>,
}

/// Marks every observation not already `synced == true` as synced.
///
/// Failures are collected in the report and not retried.
///
/// # Errors
///
/// Returns [`StoreError`] if the initial read of `points/` fails.
pub async fn sync_observations(store: &dyn RealtimeStore) -> Result<SyncReport, StoreError> {
    let path = Category::Observations.path();
    let snapshot = store.get(path).await?;
    let mut report = SyncReport::default();

    for (id, value) in &snapshot {
        if synced_flag(value) == Some(true) {
            continue;
        }
        let mut fields = serde_json::Map::new();
        fields.insert("synced".to_string(), Value::Bool(true));
        match store.update(path, id, fields).await {
            Ok(()) => report.updated += 1,
            Err(e) => {
                log::warn!("Failed to sync observation {id}: {e}");
                report.failed.push((id.clone(), e));
            }
        }
    }

    log::info!(
        "Synced {} observations ({} failed)",
        report.updated,
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use mangrove_store::memory::MemoryStore;
    use serde_json::json;

    use super::*;

    fn observations() -> Snapshot {
        [
            ("a".to_string(), json!({"synced": true})),
            ("b".to_string(), json!({"synced": false})),
            ("c".to_string(), json!({"synced": "true"})),
            ("d".to_string(), json!({})),
        ]
        .into()
    }

    #[test]
    fn counts_only_strict_flags() {
        let mut summary = Summary::default();
        summary.apply_snapshot(Category::Observations, &observations());
        summary.apply_snapshot(
            Category::Pollution,
            &[("p".to_string(), json!({"synced": false}))].into(),
        );
        summary.apply_snapshot(Category::OtherForms, &observations());
        assert_eq!(
            summary,
            Summary {
                observations: 1,
                unsynced: 1,
                pollution: 1,
                disturbance: 0,
                sightings: 0,
            }
        );
    }

    #[tokio::test]
    async fn live_counts_follow_new_records_and_keep_on_error() {
        let store = MemoryStore::new();
        store.seed("pollution/", [("p1".to_string(), json!({}))].into());
        let mut subscription = store.subscribe(Category::Pollution.path());
        let mut summary = Summary::default();

        let event = subscription.next_event().await.unwrap();
        assert!(summary.apply_event(Category::Pollution, &event).is_none());
        assert_eq!(summary.pollution, 1);

        store.push("pollution/", json!({"type": "Oil"})).await.unwrap();
        let event = subscription.next_event().await.unwrap();
        summary.apply_event(Category::Pollution, &event);
        assert_eq!(summary.pollution, 2);

        let failure = SnapshotEvent::Error(StoreError::PermissionDenied {
            path: "pollution".to_string(),
        });
        let warning = summary.apply_event(Category::Pollution, &failure).unwrap();
        assert_eq!(warning.category, Category::Pollution);
        assert_eq!(summary.pollution, 2);
        subscription.cancel();
    }

    #[tokio::test]
    async fn sync_marks_everything_not_already_synced() {
        let store = MemoryStore::new();
        store.seed("points/", observations());

        let report = sync_observations(&store).await.unwrap();
        assert_eq!(report.updated, 3);
        assert!(report.failed.is_empty());

        let summary = Summary::load(&store).await.unwrap();
        assert_eq!(summary.observations, 4);
        assert_eq!(summary.unsynced, 0);

        let again = sync_observations(&store).await.unwrap();
        assert_eq!(again.updated, 0);
    }

    #[tokio::test]
    async fn sync_read_failure_is_an_error() {
        let store = MemoryStore::new();
        store.deny("points/");
        assert!(matches!(
            sync_observations(&store).await,
            Err(StoreError::PermissionDenied { .. })
        ));
    }
}
