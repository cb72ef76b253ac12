// Domain layer - Fleet telemetry model and the pure view rules
pub mod filter;
pub mod fleet_view;
pub mod focus;
pub mod robot;
pub mod status;
