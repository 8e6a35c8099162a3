//! Merges per-category snapshots into one point set.
//!
//! Each category owns a slice that is replaced wholesale whenever that
//! category delivers a snapshot. The aggregate is the concatenation of the
//! slices in [`Category::all`] order. Errors only clear the category's
//! loading flag; whatever was received before stays.

use std::collections::{BTreeMap, BTreeSet};

use mangrove_map_models::CategoryWarning;
use mangrove_record::normalize_snapshot;
use mangrove_record_models::{Category, MapPoint};
use mangrove_store::{Snapshot, SnapshotEvent, StoreError};

#[derive(Debug, Clone)]
pub struct Aggregator {
    slices: BTreeMap<Category, Vec<MapPoint>>,
    loading: BTreeSet<Category>,
    points: Vec<MapPoint>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// An empty aggregate waiting on every category.
    #[must_use]
    pub fn new() -> Self {
        Self::for_categories(Category::all())
    }

    /// An empty aggregate waiting only on `categories`.
    #[must_use]
    pub fn for_categories(categories: &[Category]) -> Self {
        Self {
            slices: BTreeMap::new(),
            loading: categories.iter().copied().collect(),
            points: Vec::new(),
        }
    }

    /// Replaces `category`'s slice with the normalized snapshot.
    pub fn apply_snapshot(&mut self, category: Category, snapshot: &Snapshot) {
        let slice = normalize_snapshot(category, snapshot);
        log::debug!(
            "{category}: {} of {} records placed on the map",
            slice.len(),
            snapshot.len()
        );
        self.slices.insert(category, slice);
        self.loading.remove(&category);
        self.rebuild();
    }

    /// Notes a failure for `category` and returns the warning to surface.
    pub fn apply_error(&mut self, category: Category, error: &StoreError) -> CategoryWarning {
        log::warn!("Subscription for {category} failed: {error}");
        self.loading.remove(&category);
        CategoryWarning {
            category,
            message: error.to_string(),
        }
    }

    /// Applies one subscription event. Returns a warning for errors.
    pub fn apply_event(&mut self, category: Category, event: &SnapshotEvent) -> Option<CategoryWarning> {
        match event {
            SnapshotEvent::Snapshot(snapshot) => {
                self.apply_snapshot(category, snapshot);
                None
            }
            SnapshotEvent::Error(error) => Some(self.apply_error(category, error)),
        }
    }

    fn rebuild(&mut self) {
        self.points = Category::all()
            .iter()
            .filter_map(|category| self.slices.get(category))
            .flatten()
            .cloned()
            .collect();
    }

    /// True until every category has reported once.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.loading.is_empty()
    }

    /// The merged point set.
    #[must_use]
    pub fn points(&self) -> &[MapPoint] {
        &self.points
    }

    /// The current slice for one category.
    #[must_use]
    pub fn slice(&self, category: Category) -> &[MapPoint] {
        self.slices.get(&category).map_or(&[], Vec::as_slice)
    }
}
