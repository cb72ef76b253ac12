// HTTP request handlers
use crate::domain::filter::FilterMode;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::infrastructure::view_mapper::{
    fleet_view_to_dto, status_to_dto, FilterDto, IngestionStatusDto,
};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct FleetQuery {
    pub filter: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current fleet view; `?filter=` previews another mode without changing the selection
pub async fn get_fleet(
    Query(query): Query<FleetQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let view = match query.filter.as_deref() {
        Some(label) => state.view_service.view_with(FilterMode::from_label(label)),
        None => state.view_service.view(),
    };

    match json_response(&fleet_view_to_dto(view), accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub async fn get_filter(State(state): State<Arc<AppState>>) -> Json<FilterDto> {
    Json(FilterDto::from(state.view_service.filter()))
}

/// Select a filter mode; unknown modes select `all`
pub async fn put_filter(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(body): Json<FilterDto>,
) -> impl IntoResponse {
    state.view_service.set_filter(FilterMode::from_label(&body.mode));

    let view = state.view_service.view();
    match json_response(&fleet_view_to_dto(view), accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Live view stream: one NDJSON line per snapshot replace or filter change
pub async fn stream_fleet(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rx = state.view_service.stream_views();
    stream_from_receiver(rx)
}

pub async fn fleet_status(State(state): State<Arc<AppState>>) -> Json<IngestionStatusDto> {
    let snapshot = state.view_service.snapshot();
    Json(status_to_dto(
        state.ingestion.status(),
        &snapshot,
        state.view_service.filter(),
    ))
}
