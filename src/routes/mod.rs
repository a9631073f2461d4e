//! HTTP gateway: merges every sub-router and applies the shared layers.

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderName},
    Router,
};
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{aggregate::DashboardSummary, store::DynStore, ApiError, Config};

mod cattle;
mod dashboard;
mod feed;
mod gps;
mod health;
mod sensor_data;

/// Request headers a browser client may send cross-origin.
pub const CORS_ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

// ---

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Config,
    pub summary: watch::Receiver<Arc<DashboardSummary>>,
}

impl AppState {
    pub fn new(
        store: DynStore,
        config: Config,
        summary: watch::Receiver<Arc<DashboardSummary>>,
    ) -> Self {
        AppState {
            store,
            config,
            summary,
        }
    }

    /// Reject write requests that lack the configured service credential.
    ///
    /// Accepts the key as `apikey: <key>` or `Authorization: Bearer <key>`.
    pub fn authorize_write(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        // ---
        let Some(expected) = self.config.service_role_key.as_deref() else {
            return Ok(());
        };

        let api_key = headers.get("apikey").and_then(|v| v.to_str().ok());
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if api_key == Some(expected) || bearer == Some(expected) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .merge(sensor_data::router())
        .merge(dashboard::router())
        .merge(cattle::router())
        .merge(gps::router())
        .merge(feed::router())
        .merge(health::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
