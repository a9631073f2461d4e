//! `/feed-distribution`: feed ration reference data.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::{models::FeedDistribution, ApiError};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/feed-distribution", get(list_feed))
}

#[derive(Debug, Serialize)]
struct FeedResponse {
    data: Vec<FeedDistribution>,
}

async fn list_feed(State(state): State<AppState>) -> Result<Json<FeedResponse>, ApiError> {
    let data = state.store.list_feed_distribution().await?;
    Ok(Json(FeedResponse { data }))
}
