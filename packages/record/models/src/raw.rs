//! Typed raw records, one struct per collection.
//!
//! Each form writes its own field set on top of a shared core
//! ([`CommonFields`]). Decoding is lenient (see [`crate::loose`]) so that
//! records from older form versions still load; unknown fields are
//! ignored.

use serde::Deserialize;

use crate::{Category, loose};

/// A coordinate value as stored: forms write strings, imports write
/// numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinate {
    /// A JSON number.
    Number(f64),
    /// A numeric string such as `"-6.200000"`.
    Text(String),
    /// Present but neither a number nor a string.
    Invalid,
}

impl Coordinate {
    /// Resolves to a finite value, or `None`.
    #[must_use]
    pub fn resolve(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Invalid => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// Fields every form writes (or may write).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFields {
    /// Plot or point name.
    #[serde(default, deserialize_with = "loose::text")]
    pub name: Option<String>,
    /// Species name (sightings).
    #[serde(default, deserialize_with = "loose::text")]
    pub species_name: Option<String>,
    /// Incident or sighting type.
    #[serde(rename = "type", default, deserialize_with = "loose::text")]
    pub record_type: Option<String>,
    /// Free-form category written by the form (not the collection).
    #[serde(default, deserialize_with = "loose::text")]
    pub category: Option<String>,
    /// Field notes.
    #[serde(default, deserialize_with = "loose::text")]
    pub notes: Option<String>,
    /// Description.
    #[serde(default, deserialize_with = "loose::text")]
    pub description: Option<String>,
    /// Explicit latitude.
    #[serde(default, deserialize_with = "loose::coordinate")]
    pub latitude: Option<Coordinate>,
    /// Explicit longitude.
    #[serde(default, deserialize_with = "loose::coordinate")]
    pub longitude: Option<Coordinate>,
    /// Combined `"lat,lon"` string.
    #[serde(default, deserialize_with = "loose::text")]
    pub coordinates: Option<String>,
    /// GPS accuracy as reported by the device.
    #[serde(default, deserialize_with = "loose::text")]
    pub accuracy: Option<String>,
    /// Download URL of the attached photo.
    #[serde(default, deserialize_with = "loose::text")]
    pub photo_url: Option<String>,
    /// ISO-8601 creation timestamp.
    #[serde(default, deserialize_with = "loose::text")]
    pub timestamp: Option<String>,
    /// Whether the record was marked as synced.
    #[serde(default, deserialize_with = "loose::flag")]
    pub synced: Option<bool>,
}

impl CommonFields {
    /// Splits the `coordinates` string into its latitude and longitude
    /// halves. Parts beyond the second are ignored.
    #[must_use]
    pub fn coordinate_halves(&self) -> (Option<&str>, Option<&str>) {
        let Some(joined) = self.coordinates.as_deref() else {
            return (None, None);
        };
        let mut parts = joined.split(',');
        (parts.next(), parts.next())
    }
}

/// A mangrove stand observation (`points/`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonFields,
    /// Mangrove species.
    #[serde(default, deserialize_with = "loose::text")]
    pub species: Option<String>,
    /// Diameter at breast height, cm.
    #[serde(default, deserialize_with = "loose::text")]
    pub dbh: Option<String>,
    /// Tree height, m.
    #[serde(default, deserialize_with = "loose::text")]
    pub height: Option<String>,
    /// Stand density.
    #[serde(default, deserialize_with = "loose::text")]
    pub density: Option<String>,
    /// Health status.
    #[serde(default, deserialize_with = "loose::text")]
    pub health_status: Option<String>,
    /// Substrate condition.
    #[serde(default, deserialize_with = "loose::text")]
    pub substrate: Option<String>,
}

/// A pollution incident (`pollution/`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutionRecord {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonFields,
    /// Severity level.
    #[serde(default, deserialize_with = "loose::text")]
    pub severity: Option<String>,
    /// How far the pollution has spread.
    #[serde(default, deserialize_with = "loose::text")]
    pub spread: Option<String>,
}

/// A disturbance incident (`disturbance/`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisturbanceRecord {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonFields,
    /// Scale of the disturbance.
    #[serde(default, deserialize_with = "loose::text")]
    pub scale: Option<String>,
    /// Impacted area.
    #[serde(default, deserialize_with = "loose::text")]
    pub area: Option<String>,
}

/// A wildlife or other sighting (`other_sightings/`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingRecord {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonFields,
    /// Estimated population.
    #[serde(default, deserialize_with = "loose::text")]
    pub population: Option<String>,
    /// Observed behavior.
    #[serde(default, deserialize_with = "loose::text")]
    pub behavior: Option<String>,
    /// Rarity status.
    #[serde(default, deserialize_with = "loose::text")]
    pub rarity: Option<String>,
}

/// A planning point or plot (`other_forms/`, `planning_plots/`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRecord {
    /// Shared fields.
    #[serde(flatten)]
    pub common: CommonFields,
}

/// A decoded record tagged by its collection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    /// From `points/`.
    Observation(ObservationRecord),
    /// From `pollution/`.
    Pollution(PollutionRecord),
    /// From `disturbance/`.
    Disturbance(DisturbanceRecord),
    /// From `other_sightings/`.
    Sighting(SightingRecord),
    /// From `other_forms/`.
    OtherForm(PlanningRecord),
    /// From `planning_plots/`.
    PlanningPlot(PlanningRecord),
}

impl RawRecord {
    /// Decodes a snapshot value into the typed record for `category`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_value(
        category: Category,
        value: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match category {
            Category::Observations => Self::Observation(ObservationRecord::deserialize(value)?),
            Category::Pollution => Self::Pollution(PollutionRecord::deserialize(value)?),
            Category::Disturbance => Self::Disturbance(DisturbanceRecord::deserialize(value)?),
            Category::Sightings => Self::Sighting(SightingRecord::deserialize(value)?),
            Category::OtherForms => Self::OtherForm(PlanningRecord::deserialize(value)?),
            Category::PlanningPlots => Self::PlanningPlot(PlanningRecord::deserialize(value)?),
        })
    }

    /// The collection this record came from.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Observation(_) => Category::Observations,
            Self::Pollution(_) => Category::Pollution,
            Self::Disturbance(_) => Category::Disturbance,
            Self::Sighting(_) => Category::Sightings,
            Self::OtherForm(_) => Category::OtherForms,
            Self::PlanningPlot(_) => Category::PlanningPlots,
        }
    }

    /// Shared fields of the record.
    #[must_use]
    pub const fn common(&self) -> &CommonFields {
        match self {
            Self::Observation(r) => &r.common,
            Self::Pollution(r) => &r.common,
            Self::Disturbance(r) => &r.common,
            Self::Sighting(r) => &r.common,
            Self::OtherForm(r) | Self::PlanningPlot(r) => &r.common,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_observation_form_payload() {
        let value = serde_json::json!({
            "name": "Plot 3",
            "species": "Rhizophora mucronata",
            "dbh": "12",
            "healthStatus": "Sehat",
            "latitude": "-6.200000",
            "longitude": "106.800000",
            "coordinates": "-6.200000,106.800000",
            "photoUrl": "",
            "synced": false,
            "category": "observation"
        });
        let RawRecord::Observation(record) =
            RawRecord::from_value(Category::Observations, &value).unwrap()
        else {
            panic!("expected observation");
        };
        assert_eq!(record.common.name.as_deref(), Some("Plot 3"));
        assert_eq!(record.species.as_deref(), Some("Rhizophora mucronata"));
        assert_eq!(record.health_status.as_deref(), Some("Sehat"));
        assert_eq!(record.common.synced, Some(false));
        assert_eq!(
            record.common.latitude.as_ref().and_then(Coordinate::resolve),
            Some(-6.2)
        );
    }

    #[test]
    fn rejects_non_object_values() {
        let value = serde_json::json!("just a string");
        assert!(RawRecord::from_value(Category::Pollution, &value).is_err());
    }

    #[test]
    fn resolve_rejects_non_finite() {
        assert_eq!(Coordinate::Text("inf".to_string()).resolve(), None);
        assert_eq!(Coordinate::Text("NaN".to_string()).resolve(), None);
        assert_eq!(Coordinate::Text(String::new()).resolve(), None);
        assert_eq!(Coordinate::Text(" 1.5 ".to_string()).resolve(), Some(1.5));
        assert_eq!(Coordinate::Invalid.resolve(), None);
    }

    #[test]
    fn coordinate_halves_ignore_extra_parts() {
        let common = CommonFields {
            coordinates: Some("1,2,3".to_string()),
            ..CommonFields::default()
        };
        assert_eq!(common.coordinate_halves(), (Some("1"), Some("2")));

        let common = CommonFields {
            coordinates: Some("1".to_string()),
            ..CommonFields::default()
        };
        assert_eq!(common.coordinate_halves(), (Some("1"), None));
    }
}
