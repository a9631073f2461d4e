//! Persistent store abstraction.
//!
//! Ingestion, aggregation and the HTTP routes only ever see a [`DynStore`]
//! handle, injected at startup. [`PgStore`] backs it with PostgreSQL;
//! [`MemoryStore`] keeps everything in process for tests and local runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    models::{
        CattlePatch, CattleRecord, FeedDistribution, GpsTrackingPatch, GpsTrackingRecord,
        NewSensorReading, SensorReading,
    },
    StoreError,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared, injectable store handle.
pub type DynStore = Arc<dyn Store>;

// ---

/// Operations the service needs from its backing database.
///
/// Readings are append-only: there is no way to update or delete one.
#[async_trait]
pub trait Store: Send + Sync {
    // ---
    /// Append one reading and return it as stored.
    async fn insert_reading(&self, reading: &NewSensorReading) -> Result<SensorReading, StoreError>;

    /// Most recent readings first, at most `limit`.
    async fn latest_readings(&self, limit: u32) -> Result<Vec<SensorReading>, StoreError>;

    async fn list_cattle(&self) -> Result<Vec<CattleRecord>, StoreError>;

    /// Set the last measured temperature of one animal.
    async fn update_cattle_temperature(
        &self,
        cattle_id: &str,
        temperature: f64,
    ) -> Result<(), StoreError>;

    /// Apply a user/administrative patch and return the updated record.
    async fn patch_cattle(
        &self,
        cattle_id: &str,
        patch: &CattlePatch,
    ) -> Result<CattleRecord, StoreError>;

    /// Remove an animal together with its tracking record.
    async fn delete_cattle(&self, cattle_id: &str) -> Result<(), StoreError>;

    async fn find_gps_tracking(
        &self,
        cattle_id: &str,
    ) -> Result<Option<GpsTrackingRecord>, StoreError>;

    /// Apply `patch` to the animal's tracking record in one atomic step,
    /// creating the record on first sight. Absent fields keep their stored
    /// value; `last_updated` is always refreshed.
    async fn upsert_gps_tracking(
        &self,
        cattle_id: &str,
        patch: &GpsTrackingPatch,
    ) -> Result<GpsTrackingRecord, StoreError>;

    async fn list_gps_tracking(&self) -> Result<Vec<GpsTrackingRecord>, StoreError>;

    async fn list_feed_distribution(&self) -> Result<Vec<FeedDistribution>, StoreError>;
}
