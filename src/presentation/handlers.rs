// HTTP request handlers
use crate::application::query_service::TimeRange;
use crate::domain::detector::DetectorId;
use crate::domain::measurement::MeasurementKind;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

/// Optional time-range parameters, integer/float epoch seconds.
#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub last: Option<f64>,
}

impl From<SeriesParams> for TimeRange {
    fn from(params: SeriesParams) -> Self {
        Self {
            start: params.start,
            stop: params.stop,
            last: params.last,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NameParams {
    pub name: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all registered detectors
pub async fn list_detectors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.query_service.detectors().await {
        Ok(detectors) => Json(detectors).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "detector listing failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fetch one detector by its packed id, 404 when unknown
pub async fn get_detector(
    Path(id): Path<u32>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.query_service.detector(DetectorId(id)).await {
        Ok(Some(detector)) => Json(detector).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!(error = %err, id, "detector lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Find detectors by name; names are not unique, so this is a list
pub async fn find_detectors(
    Query(params): Query<NameParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.query_service.detectors_by_name(&params.name).await {
        Ok(detectors) => Json(detectors).into_response(),
        Err(err) => {
            tracing::error!(error = %err, name = %params.name, "detector search failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn series(
    state: &AppState,
    kind: MeasurementKind,
    id: u32,
    params: SeriesParams,
) -> axum::response::Response {
    match state
        .query_service
        .series(kind, DetectorId(id), params.into())
        .await
    {
        Ok(series) => Json(series).into_response(),
        Err(err) => {
            tracing::error!(error = %err, %kind, id, "series query failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Voltage time series for one detector, volts
pub async fn get_voltage(
    Path(id): Path<u32>,
    Query(params): Query<SeriesParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    series(&state, MeasurementKind::Voltage, id, params).await
}

/// Current time series for one detector, milliamps
pub async fn get_current(
    Path(id): Path<u32>,
    Query(params): Query<SeriesParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    series(&state, MeasurementKind::Current, id, params).await
}
