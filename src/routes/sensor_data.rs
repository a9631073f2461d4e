//! `/sensor-data`: device ingestion endpoint.
//!
//! - `GET ?limit=N` lists the latest readings
//! - `POST` ingests one reading
//! - `OPTIONS` answers CORS preflight
//! - anything else is `405`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AppState, CORS_ALLOWED_HEADERS};
use crate::{
    ingest::{self, IngestError},
    models::{NewSensorReading, SensorReading},
    ApiError,
};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route(
        "/sensor-data",
        get(list_readings)
            .post(create_reading)
            .options(preflight)
            .head(method_not_allowed)
            .fallback(method_not_allowed),
    )
}

/// Query parameters for `GET /sensor-data`.
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ReadingsResponse {
    data: Vec<SensorReading>,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    success: bool,
    data: SensorReading,
}

async fn list_readings(
    State(state): State<AppState>,
    params: Result<Query<ReadingsQuery>, QueryRejection>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    // ---
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(state.config.readings_default_limit);
    debug!("GET /sensor-data - limit {}", limit);

    let data = ingest::latest_readings(state.store.as_ref(), limit).await?;
    Ok(Json(ReadingsResponse { data }))
}

async fn create_reading(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewSensorReading>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    // ---
    state.authorize_write(&headers)?;
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    info!("POST /sensor-data - received {:?}", payload);

    let reading = ingest::ingest_reading(state.store.as_ref(), &payload)
        .await
        .map_err(|e| match e {
            IngestError::Validation(msg) => ApiError::BadRequest(msg),
            // A failed reading insert is reported as a rejected request
            IngestError::Store(e) => ApiError::BadRequest(e.to_string()),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            data: reading,
        }),
    ))
}

async fn preflight() -> impl IntoResponse {
    // ---
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, CORS_ALLOWED_HEADERS),
        ],
    )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
