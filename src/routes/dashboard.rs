//! `/dashboard/summary`: the live herd summary.

use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::aggregate::DashboardSummary;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/summary", get(summary))
}

/// Serve the latest summary computed by the live aggregation view.
///
/// Never touches the store; the view refreshes itself on row changes.
async fn summary(State(state): State<AppState>) -> Json<DashboardSummary> {
    // ---
    let current = state.summary.borrow().clone();
    Json(current.as_ref().clone())
}
