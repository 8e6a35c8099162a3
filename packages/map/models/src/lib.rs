#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Viewport and cluster types shared by the map aggregator and its
//! consumers.

use mangrove_record_models::MapPoint;
use serde::{Deserialize, Serialize};

pub use mangrove_record_models::CategoryWarning;

/// Viewport span divided by this gives the clustering distance.
pub const CLUSTER_SPAN_DIVISOR: f64 = 8.0;

/// Both deltas are divided by this when a cluster is selected.
pub const DRILL_DOWN_FACTOR: f64 = 1.8;

/// Smallest delta reachable by manual zoom.
pub const MIN_ZOOM_DELTA: f64 = 0.005;

/// A visible map viewport: centre plus span in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Default for Region {
    /// The survey area the map opens on.
    fn default() -> Self {
        Self {
            latitude: -5.8364,
            longitude: 110.4495,
            latitude_delta: 0.1,
            longitude_delta: 0.1,
        }
    }
}

impl Region {
    /// Clustering distance per axis: `(latitude, longitude)`.
    #[must_use]
    pub fn thresholds(&self) -> (f64, f64) {
        (
            self.latitude_delta / CLUSTER_SPAN_DIVISOR,
            self.longitude_delta / CLUSTER_SPAN_DIVISOR,
        )
    }

    /// Re-centres on `(latitude, longitude)` and narrows both deltas by
    /// [`DRILL_DOWN_FACTOR`].
    #[must_use]
    pub fn drill_down(&self, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            latitude_delta: self.latitude_delta / DRILL_DOWN_FACTOR,
            longitude_delta: self.longitude_delta / DRILL_DOWN_FACTOR,
        }
    }

    /// Multiplies both deltas by `factor` about the same centre. Deltas
    /// never drop below [`MIN_ZOOM_DELTA`].
    #[must_use]
    pub fn zoom(&self, factor: f64) -> Self {
        Self {
            latitude_delta: (self.latitude_delta * factor).max(MIN_ZOOM_DELTA),
            longitude_delta: (self.longitude_delta * factor).max(MIN_ZOOM_DELTA),
            ..*self
        }
    }
}

/// One visual element produced by a clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClusterNode {
    /// A point with no neighbours within the threshold.
    Marker(MapPoint),
    /// Two or more points, positioned at the first point absorbed.
    Cluster {
        latitude: f64,
        longitude: f64,
        points: Vec<MapPoint>,
    },
}

impl ClusterNode {
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        match self {
            Self::Marker(point) => point.latitude,
            Self::Cluster { latitude, .. } => *latitude,
        }
    }

    #[must_use]
    pub const fn longitude(&self) -> f64 {
        match self {
            Self::Marker(point) => point.longitude,
            Self::Cluster { longitude, .. } => *longitude,
        }
    }

    /// The points this node stands for.
    #[must_use]
    pub fn points(&self) -> &[MapPoint] {
        match self {
            Self::Marker(point) => std::slice::from_ref(point),
            Self::Cluster { points, .. } => points,
        }
    }

    #[must_use]
    pub const fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster { .. })
    }
}
