//! Survey forms: observation, pollution, disturbance and sighting
//! payloads, saving a new or edited record, and moving an observation.
//!
//! Every form writes its category-specific fields plus the shared
//! [`Location`] and a fresh timestamp. Saving with an ID merges the
//! payload into the existing record instead of pushing a new one.

use chrono::{DateTime, Utc};
use mangrove_record_models::Category;
use mangrove_store::{RealtimeStore, StoreError};
use serde::Serialize;
use serde_json::Value;

use crate::payload::{GpsFix, Location, PayloadError, timestamp};

/// Stored record fields, keyed by database field name.
pub type Fields = serde_json::Map<String, Value>;

/// A form that can be saved into its category's collection.
pub trait RecordForm: Send + Sync {
    /// Collection the record belongs to.
    fn category(&self) -> Category;

    /// Validates the form and builds its stored fields stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if a required field is blank or the GPS fix
    /// is invalid.
    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError>;
}

pub(crate) fn into_fields<T: Serialize>(payload: &T) -> Result<Fields, PayloadError> {
    let value = serde_json::to_value(payload).map_err(StoreError::from)?;
    Ok(serde_json::from_value(value).map_err(StoreError::from)?)
}

fn required(field: &'static str, value: &str) -> Result<String, PayloadError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PayloadError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

fn photo(url: Option<&str>) -> String {
    url.map(str::trim).unwrap_or_default().to_string()
}

/// A mangrove plot observation, stored under `points/`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub name: String,
    pub species: String,
    /// Trunk diameter at breast height, as entered.
    pub dbh: String,
    pub height: String,
    pub density: String,
    pub health_status: String,
    pub substrate: String,
    pub notes: String,
    pub photo_url: Option<String>,
    pub fix: GpsFix,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ObservationPayload {
    name: String,
    species: String,
    dbh: String,
    height: String,
    density: String,
    health_status: String,
    substrate: String,
    notes: String,
    description: String,
    photo_url: String,
    #[serde(flatten)]
    location: Location,
    timestamp: String,
    category: &'static str,
}

impl RecordForm for NewObservation {
    fn category(&self) -> Category {
        Category::Observations
    }

    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PayloadError::MissingName);
        }
        let notes = self.notes.trim().to_string();
        into_fields(&ObservationPayload {
            name: name.to_string(),
            species: required("species", &self.species)?,
            dbh: required("dbh", &self.dbh)?,
            height: required("height", &self.height)?,
            density: required("density", &self.density)?,
            health_status: required("health status", &self.health_status)?,
            substrate: required("substrate", &self.substrate)?,
            description: notes.clone(),
            notes,
            photo_url: photo(self.photo_url.as_deref()),
            location: self.fix.location()?,
            timestamp: timestamp(now),
            category: "observation",
        })
    }
}

/// A pollution report, stored under `pollution/`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPollution {
    pub pollution_type: String,
    pub severity: String,
    pub description: String,
    /// How far the pollution reaches, as entered.
    pub spread: String,
    pub photo_url: Option<String>,
    pub fix: GpsFix,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollutionPayload {
    #[serde(rename = "type")]
    pollution_type: String,
    severity: String,
    description: String,
    spread: String,
    #[serde(flatten)]
    location: Location,
    photo_url: String,
    timestamp: String,
    category: &'static str,
}

impl RecordForm for NewPollution {
    fn category(&self) -> Category {
        Category::Pollution
    }

    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError> {
        into_fields(&PollutionPayload {
            pollution_type: required("pollution type", &self.pollution_type)?,
            description: required("description", &self.description)?,
            severity: required("severity", &self.severity)?,
            spread: self.spread.trim().to_string(),
            location: self.fix.location()?,
            photo_url: photo(self.photo_url.as_deref()),
            timestamp: timestamp(now),
            category: "pollution",
        })
    }
}

/// A habitat disturbance report, stored under `disturbance/`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDisturbance {
    pub disturbance_type: String,
    pub scale: String,
    /// Affected area estimate, as entered.
    pub area: String,
    pub description: String,
    pub notes: String,
    pub photo_url: Option<String>,
    pub fix: GpsFix,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisturbancePayload {
    #[serde(rename = "type")]
    disturbance_type: String,
    scale: String,
    area: String,
    description: String,
    notes: String,
    #[serde(flatten)]
    location: Location,
    photo_url: String,
    timestamp: String,
    category: &'static str,
}

impl RecordForm for NewDisturbance {
    fn category(&self) -> Category {
        Category::Disturbance
    }

    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError> {
        into_fields(&DisturbancePayload {
            disturbance_type: required("disturbance type", &self.disturbance_type)?,
            scale: required("scale", &self.scale)?,
            area: required("area", &self.area)?,
            description: required("description", &self.description)?,
            notes: self.notes.trim().to_string(),
            location: self.fix.location()?,
            photo_url: photo(self.photo_url.as_deref()),
            timestamp: timestamp(now),
            category: "disturbance",
        })
    }
}

/// A wildlife or other sighting, stored under `other_sightings/`. A photo
/// is required.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSighting {
    /// What was sighted, e.g. `"Burung"`. Written as both `category` and
    /// `type`.
    pub kind: String,
    pub species_name: String,
    pub population: String,
    pub behavior: String,
    pub rarity: String,
    pub notes: String,
    pub photo_url: Option<String>,
    pub fix: GpsFix,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SightingPayload {
    category: String,
    species_name: String,
    population: String,
    behavior: String,
    rarity: String,
    notes: String,
    #[serde(flatten)]
    location: Location,
    photo_url: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
}

impl RecordForm for NewSighting {
    fn category(&self) -> Category {
        Category::Sightings
    }

    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError> {
        let kind = required("sighting category", &self.kind)?;
        into_fields(&SightingPayload {
            category: kind.clone(),
            species_name: required("species name", &self.species_name)?,
            population: required("population", &self.population)?,
            behavior: self.behavior.trim().to_string(),
            rarity: required("rarity", &self.rarity)?,
            notes: self.notes.trim().to_string(),
            location: self.fix.location()?,
            photo_url: required("photo", &photo(self.photo_url.as_deref()))?,
            timestamp: timestamp(now),
            kind,
        })
    }
}

/// Reads one record, or `None` if its collection has no such ID.
///
/// # Errors
///
/// Returns [`StoreError`] if the read is rejected.
pub async fn fetch_record(
    store: &dyn RealtimeStore,
    category: Category,
    id: &str,
) -> Result<Option<Value>, StoreError> {
    Ok(store.get(category.path()).await?.remove(id))
}

/// The stored `photoUrl` of a record, if it has a non-blank one.
///
/// # Errors
///
/// Returns [`StoreError`] if the read is rejected.
pub async fn stored_photo_url(
    store: &dyn RealtimeStore,
    category: Category,
    id: &str,
) -> Result<Option<String>, StoreError> {
    let record = fetch_record(store, category, id).await?;
    Ok(record
        .as_ref()
        .and_then(|r| r.get("photoUrl"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string))
}

async fn require_record(
    store: &dyn RealtimeStore,
    category: Category,
    id: &str,
) -> Result<Value, PayloadError> {
    fetch_record(store, category, id)
        .await?
        .ok_or_else(|| PayloadError::NotFound {
            category,
            id: id.to_string(),
        })
}

/// Saves `form` and returns the record ID.
///
/// Without `id` the record is pushed as new. With `id` the existing record
/// is updated in place; a blank `photoUrl` then keeps the stored photo.
///
/// # Errors
///
/// * [`PayloadError::NotFound`] if `id` names no existing record
/// * any validation error from [`RecordForm::to_fields`]
/// * [`PayloadError::Store`] if the write is rejected
pub async fn save_record(
    store: &dyn RealtimeStore,
    id: Option<&str>,
    form: &dyn RecordForm,
) -> Result<String, PayloadError> {
    let category = form.category();
    let mut fields = form.to_fields(Utc::now())?;

    let Some(id) = id else {
        let id = store.push(category.path(), Value::Object(fields)).await?;
        log::info!("Saved new {category} record {id}");
        return Ok(id);
    };

    require_record(store, category, id).await?;
    if fields.get("photoUrl").and_then(Value::as_str) == Some("") {
        fields.remove("photoUrl");
    }
    store.update(category.path(), id, fields).await?;
    log::info!("Updated {category} record {id}");
    Ok(id.to_string())
}

/// Renames an observation and moves it to `fix`.
///
/// Writes `name`, `coordinates` and `accuracy`, plus `latitude` and
/// `longitude` so they cannot disagree with the new coordinates.
///
/// # Errors
///
/// * [`PayloadError::MissingName`] if the trimmed name is empty
/// * [`PayloadError::InvalidCoordinate`] if the fix is invalid
/// * [`PayloadError::NotFound`] if `id` is not under `points/`
/// * [`PayloadError::Store`] if the write is rejected
pub async fn update_location(
    store: &dyn RealtimeStore,
    id: &str,
    name: &str,
    fix: &GpsFix,
) -> Result<(), PayloadError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PayloadError::MissingName);
    }
    let location = fix.location()?;

    require_record(store, Category::Observations, id).await?;
    let mut fields = into_fields(&location)?;
    fields.insert("name".to_string(), Value::String(name.to_string()));
    store
        .update(Category::Observations.path(), id, fields)
        .await?;
    log::info!("Moved observation {id} to {}", location.coordinates);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use mangrove_store::memory::MemoryStore;
    use serde_json::json;

    use super::*;
    use crate::listing::RecordEntry;

    fn fix() -> GpsFix {
        GpsFix {
            latitude: -5.8,
            longitude: 110.45,
            accuracy: Some(3.0),
        }
    }

    fn observation() -> NewObservation {
        NewObservation {
            name: "Plot 7".to_string(),
            species: "Rhizophora apiculata".to_string(),
            dbh: "12".to_string(),
            height: "6.5".to_string(),
            density: "15".to_string(),
            health_status: "Sehat".to_string(),
            substrate: "Lumpur".to_string(),
            notes: " seedlings nearby ".to_string(),
            photo_url: None,
            fix: fix(),
        }
    }

    fn pollution() -> NewPollution {
        NewPollution {
            pollution_type: "Sampah Plastik".to_string(),
            severity: "Tinggi".to_string(),
            description: "Bottles along the bank".to_string(),
            spread: "20 m".to_string(),
            photo_url: Some("https://img/p.jpg".to_string()),
            fix: fix(),
        }
    }

    fn sighting() -> NewSighting {
        NewSighting {
            kind: "Burung".to_string(),
            species_name: "Kuntul".to_string(),
            population: "4".to_string(),
            behavior: "Foraging".to_string(),
            rarity: "Umum".to_string(),
            notes: String::new(),
            photo_url: Some("https://img/s.jpg".to_string()),
            fix: fix(),
        }
    }

    #[test]
    fn observation_fields_match_form() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let fields = observation().to_fields(now).unwrap();
        assert_eq!(
            Value::Object(fields),
            json!({
                "name": "Plot 7",
                "species": "Rhizophora apiculata",
                "dbh": "12",
                "height": "6.5",
                "density": "15",
                "healthStatus": "Sehat",
                "substrate": "Lumpur",
                "notes": "seedlings nearby",
                "description": "seedlings nearby",
                "photoUrl": "",
                "latitude": "-5.800000",
                "longitude": "110.450000",
                "accuracy": "3.00 m",
                "coordinates": "-5.800000,110.450000",
                "timestamp": "2024-05-01T08:30:00.000Z",
                "category": "observation"
            })
        );
    }

    #[test]
    fn category_forms_write_type_and_category() {
        let now = Utc::now();
        let fields = pollution().to_fields(now).unwrap();
        assert_eq!(fields["type"], "Sampah Plastik");
        assert_eq!(fields["category"], "pollution");
        assert_eq!(fields["photoUrl"], "https://img/p.jpg");

        let disturbance = NewDisturbance {
            disturbance_type: "Penebangan".to_string(),
            scale: "Sedang".to_string(),
            area: "0.5 ha".to_string(),
            description: "Fresh stumps".to_string(),
            notes: String::new(),
            photo_url: None,
            fix: fix(),
        };
        let fields = disturbance.to_fields(now).unwrap();
        assert_eq!(fields["type"], "Penebangan");
        assert_eq!(fields["area"], "0.5 ha");
        assert_eq!(fields["category"], "disturbance");

        let fields = sighting().to_fields(now).unwrap();
        assert_eq!(fields["category"], "Burung");
        assert_eq!(fields["type"], "Burung");
        assert_eq!(fields["speciesName"], "Kuntul");
    }

    #[test]
    fn blank_required_fields_are_named() {
        let now = Utc::now();
        let mut form = observation();
        form.substrate = " ".to_string();
        assert!(matches!(
            form.to_fields(now),
            Err(PayloadError::MissingField("substrate"))
        ));

        let mut form = pollution();
        form.severity = String::new();
        assert!(matches!(
            form.to_fields(now),
            Err(PayloadError::MissingField("severity"))
        ));

        let mut form = sighting();
        form.photo_url = None;
        assert!(matches!(
            form.to_fields(now),
            Err(PayloadError::MissingField("photo"))
        ));

        let mut form = sighting();
        form.fix.longitude = 200.0;
        assert!(matches!(
            form.to_fields(now),
            Err(PayloadError::InvalidCoordinate { axis: "longitude", .. })
        ));
    }

    #[tokio::test]
    async fn saved_forms_read_back_as_entries() {
        let store = MemoryStore::new();
        let observation_id = save_record(&store, None, &observation()).await.unwrap();
        let sighting_id = save_record(&store, None, &sighting()).await.unwrap();

        let stored = fetch_record(&store, Category::Observations, &observation_id)
            .await
            .unwrap()
            .unwrap();
        let entry = RecordEntry::from_value(Category::Observations, &observation_id, &stored)
            .unwrap();
        assert_eq!(entry.title, "Plot 7");
        assert_eq!(entry.position, Some((-5.8, 110.45)));

        let stored = fetch_record(&store, Category::Sightings, &sighting_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["speciesName"], "Kuntul");
        assert!(
            fetch_record(&store, Category::Observations, &sighting_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn editing_updates_in_place_and_keeps_photo() {
        let store = MemoryStore::new();
        let id = save_record(&store, None, &pollution()).await.unwrap();

        let mut edited = pollution();
        edited.severity = "Rendah".to_string();
        edited.photo_url = None;
        let saved = save_record(&store, Some(&id), &edited).await.unwrap();
        assert_eq!(saved, id);

        let snapshot = store.get("pollution/").await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&id]["severity"], "Rendah");
        assert_eq!(snapshot[&id]["photoUrl"], "https://img/p.jpg");
        assert_eq!(
            stored_photo_url(&store, Category::Pollution, &id).await.unwrap().as_deref(),
            Some("https://img/p.jpg")
        );
        assert_eq!(
            stored_photo_url(&store, Category::Pollution, "missing").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn editing_unknown_record_is_rejected() {
        let store = MemoryStore::new();
        let result = save_record(&store, Some("missing"), &pollution()).await;
        assert!(matches!(
            result,
            Err(PayloadError::NotFound { category: Category::Pollution, ref id }) if id == "missing"
        ));
        assert!(store.get("pollution/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_location_moves_observation() {
        let store = MemoryStore::new();
        store.seed(
            "points/",
            [(
                "p1".to_string(),
                json!({"name": "Old", "latitude": 1.0, "longitude": 2.0, "species": "Avicennia"}),
            )]
            .into(),
        );

        let moved = GpsFix {
            latitude: -6.1,
            longitude: 106.8,
            accuracy: None,
        };
        update_location(&store, "p1", " Plot 9 ", &moved).await.unwrap();

        let record = &store.get("points/").await.unwrap()["p1"];
        assert_eq!(record["name"], "Plot 9");
        assert_eq!(record["coordinates"], "-6.100000,106.800000");
        assert_eq!(record["latitude"], "-6.100000");
        assert_eq!(record["accuracy"], "N/A");
        assert_eq!(record["species"], "Avicennia");

        let entry = RecordEntry::from_value(Category::Observations, "p1", record).unwrap();
        assert_eq!(entry.position, Some((-6.1, 106.8)));

        assert!(matches!(
            update_location(&store, "nope", "Plot", &moved).await,
            Err(PayloadError::NotFound { .. })
        ));
        assert!(matches!(
            update_location(&store, "p1", "  ", &moved).await,
            Err(PayloadError::MissingName)
        ));
    }
}
