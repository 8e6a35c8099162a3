//! Raw record → [`MapPoint`] normalization.
//!
//! Records arrive with inconsistent shapes: coordinates may be explicit
//! numbers, numeric strings, or only a combined `"lat,lon"` string; titles
//! may live in any of several fields. Normalization is pure and never
//! fails loudly. A record that cannot be placed on the map is dropped.

use mangrove_record_models::{
    Category, CommonFields, Coordinate, MapPoint, RawRecord, loose::first_non_empty,
};
use mangrove_store::Snapshot;
use serde_json::Value;

/// Resolves one axis: the explicit field wins when present (even if it
/// does not parse), otherwise the matching half of `coordinates`.
fn resolve_axis(explicit: Option<&Coordinate>, half: Option<&str>) -> Option<f64> {
    match explicit {
        Some(coordinate) => coordinate.resolve(),
        None => half.and_then(|h| Coordinate::Text(h.to_string()).resolve()),
    }
}

/// Resolves a record's position, or `None` if either axis is missing or
/// not finite.
#[must_use]
pub fn position(common: &CommonFields) -> Option<(f64, f64)> {
    let (lat_half, lon_half) = common.coordinate_halves();
    let latitude = resolve_axis(common.latitude.as_ref(), lat_half)?;
    let longitude = resolve_axis(common.longitude.as_ref(), lon_half)?;
    Some((latitude, longitude))
}

/// Map title: `name`, `speciesName`, `type`, `category`, then
/// `"<category> record"`.
#[must_use]
pub fn map_title(category: Category, common: &CommonFields) -> String {
    first_non_empty([
        common.name.as_ref(),
        common.species_name.as_ref(),
        common.record_type.as_ref(),
        common.category.as_ref(),
    ])
    .map_or_else(|| category.fallback_title(), ToString::to_string)
}

/// Converts a typed record into a map point.
#[must_use]
pub fn to_map_point(id: &str, record: &RawRecord) -> Option<MapPoint> {
    let category = record.category();
    let common = record.common();

    let Some((latitude, longitude)) = position(common) else {
        log::debug!("Dropping {category} record {id}: no usable coordinates");
        return None;
    };

    Some(MapPoint {
        id: id.to_string(),
        title: map_title(category, common),
        description: first_non_empty([common.notes.as_ref(), common.description.as_ref()])
            .map(ToString::to_string),
        latitude,
        longitude,
        category,
        photo_url: first_non_empty([common.photo_url.as_ref()]).map(ToString::to_string),
    })
}

/// Decodes and normalizes one snapshot value.
#[must_use]
pub fn normalize(category: Category, id: &str, value: &Value) -> Option<MapPoint> {
    match RawRecord::from_value(category, value) {
        Ok(record) => to_map_point(id, &record),
        Err(e) => {
            log::debug!("Dropping {category} record {id}: {e}");
            None
        }
    }
}

/// Normalizes a whole snapshot in key order, dropping unplaceable records.
#[must_use]
pub fn normalize_snapshot(category: Category, snapshot: &Snapshot) -> Vec<MapPoint> {
    snapshot
        .iter()
        .filter_map(|(id, value)| normalize(category, id, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn coordinates_string_is_split_and_trimmed() {
        let point = normalize(
            Category::Observations,
            "-Nabc",
            &json!({"coordinates": " -6.2 , 106.8 ", "name": "Plot A"}),
        )
        .unwrap();
        assert!((point.latitude - -6.2).abs() < f64::EPSILON);
        assert!((point.longitude - 106.8).abs() < f64::EPSILON);
        assert_eq!(point.title, "Plot A");
        assert_eq!(point.category, Category::Observations);
        assert_eq!(point.id, "-Nabc");
    }

    #[test]
    fn explicit_fields_win_over_coordinates() {
        let point = normalize(
            Category::Pollution,
            "p1",
            &json!({"latitude": "-5.5", "longitude": 110.25, "coordinates": "1,2"}),
        )
        .unwrap();
        assert!((point.latitude - -5.5).abs() < f64::EPSILON);
        assert!((point.longitude - 110.25).abs() < f64::EPSILON);
    }

    #[test]
    fn axes_resolve_independently() {
        let point = normalize(
            Category::Sightings,
            "s1",
            &json!({"latitude": "-5.5", "coordinates": "1,2"}),
        )
        .unwrap();
        assert!((point.latitude - -5.5).abs() < f64::EPSILON);
        assert!((point.longitude - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn extra_coordinate_parts_are_ignored() {
        let point = normalize(Category::OtherForms, "f1", &json!({"coordinates": "1,2,3"})).unwrap();
        assert!((point.latitude - 1.0).abs() < f64::EPSILON);
        assert!((point.longitude - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unplaceable_records_are_dropped() {
        let cases = [
            json!({"coordinates": "abc,def"}),
            json!({"coordinates": "-6.2"}),
            json!({"name": "no position"}),
            json!({"latitude": "", "longitude": "106.8"}),
            json!({"latitude": "bad", "longitude": "1", "coordinates": "1,1"}),
            json!({"latitude": "NaN", "longitude": "1"}),
            json!({"latitude": {"deg": 1}, "longitude": 1}),
            json!("just a string"),
            json!(42),
        ];
        for case in cases {
            assert!(
                normalize(Category::Disturbance, "d1", &case).is_none(),
                "expected {case} to be dropped"
            );
        }
    }

    #[test]
    fn title_fallback_chain() {
        let cases = [
            (json!({"name": "A", "speciesName": "B"}), "A"),
            (json!({"name": "  ", "speciesName": "B"}), "B"),
            (json!({"type": "Oil spill", "category": "x"}), "Oil spill"),
            (json!({"category": "Bird"}), "Bird"),
            (json!({}), "pollution record"),
        ];
        for (mut value, expected) in cases {
            value["coordinates"] = json!("1,1");
            let point = normalize(Category::Pollution, "p", &value).unwrap();
            assert_eq!(point.title, expected);
        }
    }

    #[test]
    fn description_and_photo() {
        let point = normalize(
            Category::Pollution,
            "p",
            &json!({
                "coordinates": "1,1",
                "notes": "",
                "description": "Plastic waste",
                "photoUrl": "https://example.com/p.jpg"
            }),
        )
        .unwrap();
        assert_eq!(point.description.as_deref(), Some("Plastic waste"));
        assert_eq!(point.photo_url.as_deref(), Some("https://example.com/p.jpg"));

        let point = normalize(
            Category::Pollution,
            "p",
            &json!({"coordinates": "1,1", "notes": "Oily", "photoUrl": ""}),
        )
        .unwrap();
        assert_eq!(point.description.as_deref(), Some("Oily"));
        assert!(point.photo_url.is_none());
    }

    #[test]
    fn snapshot_is_normalized_in_key_order() {
        let snapshot: Snapshot = [
            ("b".to_string(), json!({"coordinates": "2,2"})),
            ("a".to_string(), json!({"coordinates": "1,1"})),
            ("c".to_string(), json!({"coordinates": "bad"})),
        ]
        .into_iter()
        .collect();
        let ids: Vec<String> = normalize_snapshot(Category::PlanningPlots, &snapshot)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
