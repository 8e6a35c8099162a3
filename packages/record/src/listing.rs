//! Per-category record lists for the "my records" view.

use std::collections::{BTreeMap, BTreeSet};

use mangrove_record_models::{
    Category, CategoryWarning, CommonFields, Coordinate, RawRecord, loose::first_non_empty,
};
use mangrove_store::{Snapshot, StoreError};
use serde::Serialize;
use serde_json::Value;

use crate::normalize;

/// One labelled field on a record card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

/// A record as shown on a list card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    pub id: String,
    pub category: Category,
    pub title: String,
    /// Creation timestamp as stored.
    pub subtitle: Option<String>,
    pub location: Option<String>,
    pub accuracy: Option<String>,
    pub photo_url: Option<String>,
    pub details: Vec<DetailRow>,
    /// Resolved position, when the record has one.
    pub position: Option<(f64, f64)>,
}

impl RecordEntry {
    /// Builds a list entry from a typed record.
    #[must_use]
    pub fn from_record(id: &str, record: &RawRecord) -> Self {
        let category = record.category();
        let common = record.common();

        Self {
            id: id.to_string(),
            category,
            title: first_non_empty([
                common.name.as_ref(),
                common.species_name.as_ref(),
                common.record_type.as_ref(),
                common.category.as_ref(),
            ])
            .unwrap_or_else(|| category.title())
            .to_string(),
            subtitle: non_empty(common.timestamp.as_ref()),
            location: location_text(common),
            accuracy: non_empty(common.accuracy.as_ref()),
            photo_url: non_empty(common.photo_url.as_ref()),
            details: detail_rows(record),
            position: normalize::position(common),
        }
    }

    /// Decodes a snapshot value. Values that are not objects yield `None`.
    #[must_use]
    pub fn from_value(category: Category, id: &str, value: &Value) -> Option<Self> {
        RawRecord::from_value(category, value)
            .map(|record| Self::from_record(id, &record))
            .map_err(|e| log::debug!("Skipping {category} entry {id}: {e}"))
            .ok()
    }

    /// First six characters of the ID, used as a card tag.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id
            .char_indices()
            .nth(6)
            .map_or(self.id.as_str(), |(i, _)| &self.id[..i])
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    first_non_empty([value]).map(ToString::to_string)
}

fn coordinate_text(coordinate: Option<&Coordinate>) -> Option<String> {
    match coordinate? {
        Coordinate::Number(n) => Some(n.to_string()),
        Coordinate::Text(t) if !t.trim().is_empty() => Some(t.clone()),
        Coordinate::Text(_) | Coordinate::Invalid => None,
    }
}

/// `coordinates` as stored, else the explicit fields joined with `", "`.
fn location_text(common: &CommonFields) -> Option<String> {
    if let Some(joined) = non_empty(common.coordinates.as_ref()) {
        return Some(joined);
    }
    let parts: Vec<String> = [
        coordinate_text(common.latitude.as_ref()),
        coordinate_text(common.longitude.as_ref()),
    ]
    .into_iter()
    .flatten()
    .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn row(label: &'static str, value: Option<&String>) -> Option<DetailRow> {
    non_empty(value).map(|value| DetailRow { label, value })
}

fn row_with_unit(label: &'static str, value: Option<&String>, unit: &str) -> Option<DetailRow> {
    non_empty(value).map(|value| DetailRow {
        label,
        value: format!("{value} {unit}"),
    })
}

fn row_either(label: &'static str, first: Option<&String>, second: Option<&String>) -> Option<DetailRow> {
    first_non_empty([first, second]).map(|value| DetailRow {
        label,
        value: value.to_string(),
    })
}

fn detail_rows(record: &RawRecord) -> Vec<DetailRow> {
    let rows = match record {
        RawRecord::Observation(r) => vec![
            row("Species", r.species.as_ref()),
            row_with_unit("DBH", r.dbh.as_ref(), "cm"),
            row_with_unit("Height", r.height.as_ref(), "m"),
            row("Density", r.density.as_ref()),
            row("Health", r.health_status.as_ref()),
            row("Substrate", r.substrate.as_ref()),
            row_either("Notes", r.common.notes.as_ref(), r.common.description.as_ref()),
        ],
        RawRecord::Pollution(r) => vec![
            row("Pollution Type", r.common.record_type.as_ref()),
            row("Severity", r.severity.as_ref()),
            row("Spread", r.spread.as_ref()),
            row("Description", r.common.description.as_ref()),
        ],
        RawRecord::Disturbance(r) => vec![
            row("Disturbance Type", r.common.record_type.as_ref()),
            row("Scale", r.scale.as_ref()),
            row("Area", r.area.as_ref()),
            row_either("Notes", r.common.notes.as_ref(), r.common.description.as_ref()),
        ],
        RawRecord::Sighting(r) => vec![
            row("Category", r.common.category.as_ref()),
            row("Name", r.common.species_name.as_ref()),
            row("Population", r.population.as_ref()),
            row("Behavior", r.behavior.as_ref()),
            row("Status", r.rarity.as_ref()),
            row("Notes", r.common.notes.as_ref()),
        ],
        RawRecord::OtherForm(r) | RawRecord::PlanningPlot(r) => vec![
            row("Plot Name", r.common.name.as_ref()),
            row("GPS Accuracy", r.common.accuracy.as_ref()),
        ],
    };
    rows.into_iter().flatten().collect()
}

/// Live per-category lists, replaced wholesale on every snapshot.
#[derive(Debug, Clone)]
pub struct RecordLists {
    entries: BTreeMap<Category, Vec<RecordEntry>>,
    loading: BTreeSet<Category>,
}

impl Default for RecordLists {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordLists {
    /// Empty lists with every category loading.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            loading: Category::all().iter().copied().collect(),
        }
    }

    /// Replaces `category`'s list.
    pub fn apply_snapshot(&mut self, category: Category, snapshot: &Snapshot) {
        let entries = snapshot
            .iter()
            .filter_map(|(id, value)| RecordEntry::from_value(category, id, value))
            .collect();
        self.entries.insert(category, entries);
        self.loading.remove(&category);
    }

    /// Records a failure for `category`. Its previous list is kept.
    pub fn apply_error(&mut self, category: Category, error: &StoreError) -> CategoryWarning {
        log::warn!("Failed to load {category} records: {error}");
        self.loading.remove(&category);
        CategoryWarning {
            category,
            message: error.to_string(),
        }
    }

    /// Whether any category has yet to report.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.loading.is_empty()
    }

    /// Entries for one category, in snapshot key order.
    #[must_use]
    pub fn entries(&self, category: Category) -> &[RecordEntry] {
        self.entries.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Whether every category is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}
