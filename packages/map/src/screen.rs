//! Map screen state: viewport, aggregate and the clustered nodes to draw.

use mangrove_map_models::{CategoryWarning, ClusterNode, Region};
use mangrove_record_models::{Category, MapPoint};
use mangrove_store::SnapshotEvent;
use serde::Serialize;

use crate::aggregator::Aggregator;
use crate::cluster::cluster_points;

/// Whether the initial load is still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapState {
    Loading,
    Ready,
}

/// Everything the map view renders.
///
/// Starts in [`MapState::Loading`] and moves to [`MapState::Ready`] once
/// every category has reported. Nodes are recomputed on every point-set
/// or viewport change.
#[derive(Debug, Clone)]
pub struct MapScreen {
    aggregator: Aggregator,
    region: Region,
    state: MapState,
    nodes: Vec<ClusterNode>,
}

impl Default for MapScreen {
    fn default() -> Self {
        Self::new(Aggregator::new())
    }
}

impl MapScreen {
    #[must_use]
    pub fn new(aggregator: Aggregator) -> Self {
        let mut screen = Self {
            aggregator,
            region: Region::default(),
            state: MapState::Loading,
            nodes: Vec::new(),
        };
        screen.refresh();
        screen
    }

    fn refresh(&mut self) {
        if self.state == MapState::Loading && !self.aggregator.is_loading() {
            log::debug!("Map ready with {} points", self.aggregator.points().len());
            self.state = MapState::Ready;
        }
        self.nodes = cluster_points(self.aggregator.points(), &self.region);
    }

    /// Applies a subscription event. Errors come back as warnings and
    /// never change the state beyond clearing the category's loading flag.
    pub fn apply(&mut self, category: Category, event: &SnapshotEvent) -> Option<CategoryWarning> {
        let warning = self.aggregator.apply_event(category, event);
        self.refresh();
        warning
    }

    /// Replaces the viewport.
    pub fn on_region_change(&mut self, region: Region) {
        self.region = region;
        self.refresh();
    }

    /// Drills into the cluster at `index`, returning the new viewport.
    /// Markers and out-of-range indices leave the viewport alone.
    pub fn select_cluster(&mut self, index: usize) -> Option<Region> {
        let node = self.nodes.get(index).filter(|n| n.is_cluster())?;
        let region = self.region.drill_down(node.latitude(), node.longitude());
        self.on_region_change(region);
        Some(region)
    }

    /// Scales the viewport span by `factor` (below 1 zooms in).
    pub fn zoom(&mut self, factor: f64) {
        self.on_region_change(self.region.zoom(factor));
    }

    /// Returns to the default survey region.
    pub fn recenter(&mut self) {
        self.on_region_change(Region::default());
    }

    #[must_use]
    pub const fn state(&self) -> MapState {
        self.state
    }

    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    #[must_use]
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}

/// Directions link for a point.
#[must_use]
pub fn navigation_url(point: &MapPoint) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&destination={},{}",
        point.latitude, point.longitude
    )
}
