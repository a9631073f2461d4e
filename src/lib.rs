//! `herdwatch`: livestock sensor ingestion and herd aggregation.
//!
//! Devices post readings to `/sensor-data`; each reading is stored as
//! immutable telemetry and then propagated to the animal's temperature and
//! GPS tracking record. Herd summaries are recomputed from the full row set
//! whenever the store reports a change.
//!
//! Module map:
//! - [`store`] – injectable persistence (`PgStore`, `MemoryStore`)
//! - [`ingest`] – validation and derived-state propagation
//! - [`aggregate`] – location, health and weight views, plus the live view
//! - [`realtime`] – change-event subscriptions and the PostgreSQL listener
//! - [`routes`] – the axum HTTP surface
//! - [`config`], [`schema`] – startup plumbing used by `main.rs`

pub mod aggregate;
pub mod config;
mod error;
pub mod ingest;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::Config;
pub use error::{ApiError, StoreError};
pub use models::{
    CattlePatch, CattleRecord, FeedDistribution, GpsTrackingPatch, GpsTrackingRecord,
    HealthStatus, Location, NewSensorReading, SensorReading,
};
