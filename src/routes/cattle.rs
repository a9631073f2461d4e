//! `/cattle`: herd listing and user/administrative changes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::AppState;
use crate::{
    models::{CattlePatch, CattleRecord},
    ApiError, StoreError,
};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/cattle", get(list_cattle))
        .route(
            "/cattle/{id}",
            axum::routing::patch(update_cattle).delete(delete_cattle),
        )
}

#[derive(Debug, Serialize)]
struct CattleList {
    data: Vec<CattleRecord>,
}

#[derive(Debug, Serialize)]
struct CattleResponse {
    data: CattleRecord,
}

async fn list_cattle(State(state): State<AppState>) -> Result<Json<CattleList>, ApiError> {
    let data = state.store.list_cattle().await?;
    Ok(Json(CattleList { data }))
}

/// Change health status and/or location, e.g. when an animal is treated.
async fn update_cattle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    patch: Result<Json<CattlePatch>, JsonRejection>,
) -> Result<Json<CattleResponse>, ApiError> {
    // ---
    state.authorize_write(&headers)?;
    let Json(patch) = patch.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest(
            "health_status or location is required".to_string(),
        ));
    }

    let data = state
        .store
        .patch_cattle(&id, &patch)
        .await
        .map_err(|e| not_found_as(e, &id))?;
    info!("PATCH /cattle/{} - applied {:?}", id, patch);
    Ok(Json(CattleResponse { data }))
}

async fn delete_cattle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    // ---
    state.authorize_write(&headers)?;
    state
        .store
        .delete_cattle(&id)
        .await
        .map_err(|e| not_found_as(e, &id))?;
    info!("DELETE /cattle/{}", id);
    Ok(StatusCode::NO_CONTENT)
}

fn not_found_as(e: StoreError, id: &str) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::NotFound(format!("cattle {}", id)),
        other => ApiError::Store(other),
    }
}
