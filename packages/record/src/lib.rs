#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record handling on top of the store: normalization into map points,
//! list-screen entries, home-screen counts, sync, deletion, and saving
//! new or edited records from the survey forms.

pub mod forms;
pub mod listing;
pub mod normalize;
pub mod payload;
pub mod summary;

use mangrove_record_models::Category;
use mangrove_store::{RealtimeStore, StoreError};

pub use listing::{DetailRow, RecordEntry, RecordLists};
pub use normalize::{normalize, normalize_snapshot};
pub use forms::{
    NewDisturbance, NewObservation, NewPollution, NewSighting, RecordForm, fetch_record,
    save_record, stored_photo_url, update_location,
};
pub use payload::{GpsFix, NewPlanningPoint, PayloadError, submit_planning_point, upload_photo};
pub use summary::{Summary, SyncReport, sync_observations};

/// Deletes one record from its category's collection.
///
/// # Errors
///
/// Returns [`StoreError`] if the delete is rejected.
pub async fn delete_record(
    store: &dyn RealtimeStore,
    category: Category,
    id: &str,
) -> Result<(), StoreError> {
    store.remove(category.path(), id).await?;
    log::info!("Deleted {category} record {id}");
    Ok(())
}
