// Application layer - Fleet state synchronization and view use cases
pub mod fleet_view_service;
pub mod ingestion;
pub mod snapshot_store;
pub mod telemetry_source;
