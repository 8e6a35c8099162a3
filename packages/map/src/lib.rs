#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Live survey map.
//!
//! [`AggregateSubscription`] opens one store subscription per record
//! category and merges their events. [`Aggregator`] folds those events
//! into a single point set, and [`MapScreen`] clusters that set for the
//! current viewport with [`cluster_points`].

pub mod aggregator;
pub mod cluster;
pub mod live;
pub mod screen;

pub use aggregator::Aggregator;
pub use cluster::cluster_points;
pub use live::AggregateSubscription;
pub use screen::{MapScreen, MapState, navigation_url};
