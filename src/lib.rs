// Library for the binary and the integration tests

pub mod config;
pub mod geofence;
pub mod metrics_store;
pub mod models;
pub mod simulation;
pub mod tracker;
pub mod version;
pub mod worker;
