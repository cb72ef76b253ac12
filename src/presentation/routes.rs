// Router - HTTP surface consumed by the map and table renderer
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    fleet_status, get_filter, get_fleet, health_check, put_filter, stream_fleet,
};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/fleet", get(get_fleet))
        .route("/fleet/filter", get(get_filter).put(put_filter))
        .route("/fleet/stream", get(stream_fleet))
        .route("/fleet/status", get(fleet_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
