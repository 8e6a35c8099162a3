#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey record categories and the common map point shape.
//!
//! Every collection in the hosted database holds records of one
//! [`Category`]. Raw records are decoded into their category's typed
//! struct (see [`raw`]) and then normalized into a [`MapPoint`], the shape
//! all map and list consumers share.

pub mod loose;
pub mod raw;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use raw::{
    CommonFields, Coordinate, DisturbanceRecord, ObservationRecord, PlanningRecord,
    PollutionRecord, RawRecord, SightingRecord,
};

/// The fixed set of record collections.
///
/// Variant order is the order in which category slices are concatenated
/// into the aggregate point set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Mangrove stand observations (species, health, substrate)
    Observations,
    /// Pollution incident reports
    Pollution,
    /// Disturbance incident reports (cutting, land conversion, ...)
    Disturbance,
    /// Wildlife and other sightings
    Sightings,
    /// Planning points captured from the quick-entry form
    OtherForms,
    /// Planning plots
    PlanningPlots,
}

impl Category {
    /// Returns all variants of this enum in aggregation order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Observations,
            Self::Pollution,
            Self::Disturbance,
            Self::Sightings,
            Self::OtherForms,
            Self::PlanningPlots,
        ]
    }

    /// Collection path in the real-time database, with trailing slash.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Observations => "points/",
            Self::Pollution => "pollution/",
            Self::Disturbance => "disturbance/",
            Self::Sightings => "other_sightings/",
            Self::OtherForms => "other_forms/",
            Self::PlanningPlots => "planning_plots/",
        }
    }

    /// Storage folder for the category's photos. Observation photos live
    /// under `observations/` although the records live under `points/`.
    #[must_use]
    pub const fn photo_folder(self) -> &'static str {
        match self {
            Self::Observations => "observations",
            Self::Pollution => "pollution",
            Self::Disturbance => "disturbance",
            Self::Sightings => "other_sightings",
            Self::OtherForms => "other_forms",
            Self::PlanningPlots => "planning_plots",
        }
    }

    /// Section title shown on list screens.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Observations => "Record Observation",
            Self::Pollution => "Record Pollution",
            Self::Disturbance => "Record Disturbance",
            Self::Sightings => "Other Sightings",
            Self::OtherForms => "Planning Point",
            Self::PlanningPlots => "Planning Plot",
        }
    }

    /// Last-resort map title for a record with no descriptive fields,
    /// e.g. `"pollution record"`.
    #[must_use]
    pub fn fallback_title(self) -> String {
        format!("{} record", self.as_ref())
    }
}

/// A survey record reduced to what the map needs.
///
/// `id` is unique within its category only; `category` disambiguates
/// across collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    /// Generated record ID within its collection.
    pub id: String,
    /// Display title. Never empty.
    pub title: String,
    /// Free-text notes or description.
    pub description: Option<String>,
    /// Latitude (WGS84). Always finite.
    pub latitude: f64,
    /// Longitude (WGS84). Always finite.
    pub longitude: f64,
    /// Source collection.
    pub category: Category,
    /// Download URL of the attached photo.
    pub photo_url: Option<String>,
}

/// A subscription failure scoped to one category.
///
/// Raised once per failure; the category's previously received records
/// stay in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryWarning {
    /// The failing collection.
    pub category: Category,
    /// Human-readable cause.
    pub message: String,
}

impl std::fmt::Display for CategoryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to load {}: {}", self.category.title(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn category_paths_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for category in Category::all() {
            assert!(
                seen.insert(category.path()),
                "{category:?} shares path {}",
                category.path()
            );
            assert!(category.path().ends_with('/'));
        }
    }

    #[test]
    fn category_names_roundtrip() {
        for category in Category::all() {
            let parsed = Category::from_str(category.as_ref()).unwrap();
            assert_eq!(parsed, *category);
        }
        assert_eq!(Category::OtherForms.to_string(), "other_forms");
        assert_eq!(
            serde_json::to_value(Category::PlanningPlots).unwrap(),
            serde_json::json!("planning_plots")
        );
    }

    #[test]
    fn photo_folders_follow_collections_except_observations() {
        assert_eq!(Category::Observations.photo_folder(), "observations");
        assert_eq!(Category::Sightings.photo_folder(), "other_sightings");
        assert_eq!(
            format!("{}/", Category::Pollution.photo_folder()),
            Category::Pollution.path()
        );
    }

    #[test]
    fn fallback_title_uses_snake_case_key() {
        assert_eq!(Category::Sightings.fallback_title(), "sightings record");
        assert_eq!(Category::OtherForms.fallback_title(), "other_forms record");
    }
}
