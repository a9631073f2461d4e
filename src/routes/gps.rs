//! `/gps`: tracker overview with battery and signal alerts.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::{models::GpsTrackingRecord, ApiError};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/gps", get(list_tracking))
}

#[derive(Debug, Serialize)]
struct TrackerStatus {
    #[serde(flatten)]
    record: GpsTrackingRecord,
    low_battery: bool,
    weak_signal: bool,
}

impl From<GpsTrackingRecord> for TrackerStatus {
    fn from(record: GpsTrackingRecord) -> Self {
        TrackerStatus {
            low_battery: record.low_battery(),
            weak_signal: record.weak_signal(),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
struct TrackingResponse {
    data: Vec<TrackerStatus>,
}

async fn list_tracking(State(state): State<AppState>) -> Result<Json<TrackingResponse>, ApiError> {
    // ---
    let records = state.store.list_gps_tracking().await?;
    let data: Vec<TrackerStatus> = records.into_iter().map(TrackerStatus::from).collect();

    let alerts = data.iter().filter(|t| t.low_battery || t.weak_signal).count();
    if alerts > 0 {
        tracing::info!("{} of {} trackers need attention", alerts, data.len());
    }
    Ok(Json(TrackingResponse { data }))
}
