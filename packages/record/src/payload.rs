//! Shared pieces of submission payloads: validation errors, the GPS fix
//! every form stamps, the planning point quick entry and photo upload.

use chrono::{DateTime, SecondsFormat, Utc};
use mangrove_record_models::Category;
use mangrove_store::{BlobStore, RealtimeStore, StoreError, generated_blob_path};
use serde::Serialize;

use crate::forms::{Fields, RecordForm, into_fields, save_record};

/// Errors that can occur while building or submitting a record.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The plot name is blank.
    #[error("Plot name is required")]
    MissingName,

    /// A required form field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A coordinate is outside its valid range or not finite.
    #[error("Invalid {axis}: {value}")]
    InvalidCoordinate {
        /// `"latitude"` or `"longitude"`.
        axis: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The record to edit does not exist.
    #[error("No {category} record {id}")]
    NotFound {
        /// Collection searched.
        category: Category,
        /// Requested record ID.
        id: String,
    },

    /// The store rejected the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A device GPS reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in metres, if the device reported one.
    pub accuracy: Option<f64>,
}

/// The location fields every form writes. Coordinates are strings, as the
/// forms write them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    pub accuracy: String,
    pub coordinates: String,
}

impl GpsFix {
    /// Validates the fix and formats its stored fields.
    ///
    /// Coordinates are written with six decimals; accuracy as
    /// `"<metres> m"` with two decimals, or `"N/A"`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidCoordinate`] if either axis is out of
    /// range or not finite.
    pub fn location(&self) -> Result<Location, PayloadError> {
        check_axis("latitude", self.latitude, 90.0)?;
        check_axis("longitude", self.longitude, 180.0)?;

        let latitude = format!("{:.6}", self.latitude);
        let longitude = format!("{:.6}", self.longitude);
        Ok(Location {
            coordinates: format!("{latitude},{longitude}"),
            latitude,
            longitude,
            accuracy: self
                .accuracy
                .map_or_else(|| "N/A".to_string(), |a| format!("{a:.2} m")),
        })
    }
}

fn check_axis(axis: &'static str, value: f64, limit: f64) -> Result<(), PayloadError> {
    if value.is_finite() && value.abs() <= limit {
        Ok(())
    } else {
        Err(PayloadError::InvalidCoordinate { axis, value })
    }
}

/// ISO-8601 UTC timestamp with milliseconds, e.g.
/// `2024-05-01T08:30:00.000Z`.
pub(crate) fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A planning point captured from the quick-entry form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanningPoint {
    pub name: String,
    pub fix: GpsFix,
}

/// The stored shape of a planning point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanningPayload {
    pub name: String,
    #[serde(flatten)]
    pub location: Location,
    pub timestamp: String,
}

impl NewPlanningPoint {
    /// Validates the point and builds its payload stamped with `now`.
    ///
    /// # Errors
    ///
    /// * [`PayloadError::MissingName`] if the trimmed name is empty
    /// * [`PayloadError::InvalidCoordinate`] if either axis is out of range
    pub fn to_payload(&self, now: DateTime<Utc>) -> Result<PlanningPayload, PayloadError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PayloadError::MissingName);
        }
        Ok(PlanningPayload {
            name: name.to_string(),
            location: self.fix.location()?,
            timestamp: timestamp(now),
        })
    }
}

impl RecordForm for NewPlanningPoint {
    fn category(&self) -> Category {
        Category::OtherForms
    }

    fn to_fields(&self, now: DateTime<Utc>) -> Result<Fields, PayloadError> {
        into_fields(&self.to_payload(now)?)
    }
}

/// Pushes a planning point to `other_forms/` and returns its generated ID.
///
/// # Errors
///
/// Returns [`PayloadError`] if the point is invalid or the write fails.
pub async fn submit_planning_point(
    store: &dyn RealtimeStore,
    point: &NewPlanningPoint,
) -> Result<String, PayloadError> {
    save_record(store, None, point).await
}

/// Uploads a JPEG photo as `<folder>/<unix-millis>.jpg`, using the
/// category's [`photo_folder`](Category::photo_folder), and returns its
/// download URL.
///
/// # Errors
///
/// Returns [`StoreError`] if the upload fails.
pub async fn upload_photo(
    blobs: &dyn BlobStore,
    category: Category,
    bytes: Vec<u8>,
) -> Result<String, StoreError> {
    let path = generated_blob_path(category.photo_folder(), "jpg");
    log::debug!("Uploading {category} photo to {path}");
    blobs.upload(&path, bytes, "image/jpeg").await
}
