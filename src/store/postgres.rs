//! PostgreSQL implementation of [`Store`].
//!
//! Row changes are announced by the triggers from [`crate::schema`], so this
//! store never publishes events itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::Store;
use crate::{
    models::{
        CattlePatch, CattleRecord, FeedDistribution, GpsTrackingPatch, GpsTrackingRecord,
        NewSensorReading, SensorReading,
    },
    StoreError,
};

const READING_COLUMNS: &str =
    "id, temperature, humidity, battery_level, signal_strength, lat, lng, cattle_id, created_at";

const CATTLE_COLUMNS: &str =
    "id, tag_number, temperature, weight, health_status, location, created_at, updated_at";

const GPS_COLUMNS: &str =
    "id, cattle_id, battery_level, signal_strength, lat, lng, last_updated";

// ---

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Cattle row as stored; labels are free text in the database.
#[derive(Debug, sqlx::FromRow)]
struct CattleRow {
    id: String,
    tag_number: String,
    temperature: Option<f64>,
    weight: Option<f64>,
    health_status: Option<String>,
    location: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CattleRow> for CattleRecord {
    fn from(row: CattleRow) -> Self {
        // ---
        // Unrecognised labels fall into the "unknown" aggregation buckets
        let health_status = row.health_status.as_deref().and_then(|s| {
            s.parse()
                .map_err(|e| tracing::debug!("cattle {}: {}", row.id, e))
                .ok()
        });
        let location = row.location.as_deref().and_then(|s| {
            s.parse()
                .map_err(|e| tracing::debug!("cattle {}: {}", row.id, e))
                .ok()
        });

        CattleRecord {
            id: row.id,
            tag_number: row.tag_number,
            temperature: row.temperature,
            weight: row.weight,
            health_status,
            location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_reading(&self, reading: &NewSensorReading) -> Result<SensorReading, StoreError> {
        // ---
        let stored = sqlx::query_as::<_, SensorReading>(&format!(
            r#"
            INSERT INTO sensor_readings (
                id, temperature, humidity, battery_level,
                signal_strength, lat, lng, cattle_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {READING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.battery_level)
        .bind(reading.signal_strength)
        .bind(reading.lat)
        .bind(reading.lng)
        .bind(&reading.cattle_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn latest_readings(&self, limit: u32) -> Result<Vec<SensorReading>, StoreError> {
        // ---
        let readings = sqlx::query_as::<_, SensorReading>(&format!(
            "SELECT {READING_COLUMNS} FROM sensor_readings ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }

    async fn list_cattle(&self) -> Result<Vec<CattleRecord>, StoreError> {
        // ---
        let rows = sqlx::query_as::<_, CattleRow>(&format!(
            "SELECT {CATTLE_COLUMNS} FROM cattle ORDER BY tag_number"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CattleRecord::from).collect())
    }

    async fn update_cattle_temperature(
        &self,
        cattle_id: &str,
        temperature: f64,
    ) -> Result<(), StoreError> {
        // ---
        let result =
            sqlx::query("UPDATE cattle SET temperature = $2, updated_at = now() WHERE id = $1")
                .bind(cattle_id)
                .bind(temperature)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("cattle {}", cattle_id)));
        }
        Ok(())
    }

    async fn patch_cattle(
        &self,
        cattle_id: &str,
        patch: &CattlePatch,
    ) -> Result<CattleRecord, StoreError> {
        // ---
        let row = sqlx::query_as::<_, CattleRow>(&format!(
            r#"
            UPDATE cattle SET
                health_status = COALESCE($2, health_status),
                location      = COALESCE($3, location),
                updated_at    = now()
            WHERE id = $1
            RETURNING {CATTLE_COLUMNS}
            "#
        ))
        .bind(cattle_id)
        .bind(patch.health_status.map(|s| s.as_str()))
        .bind(patch.location.map(|l| l.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(CattleRecord::from)
            .ok_or_else(|| StoreError::NotFound(format!("cattle {}", cattle_id)))
    }

    async fn delete_cattle(&self, cattle_id: &str) -> Result<(), StoreError> {
        // ---
        let result = sqlx::query("DELETE FROM cattle WHERE id = $1")
            .bind(cattle_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("cattle {}", cattle_id)));
        }
        Ok(())
    }

    async fn find_gps_tracking(
        &self,
        cattle_id: &str,
    ) -> Result<Option<GpsTrackingRecord>, StoreError> {
        // ---
        let record = sqlx::query_as::<_, GpsTrackingRecord>(&format!(
            "SELECT {GPS_COLUMNS} FROM gps_tracking WHERE cattle_id = $1"
        ))
        .bind(cattle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn upsert_gps_tracking(
        &self,
        cattle_id: &str,
        patch: &GpsTrackingPatch,
    ) -> Result<GpsTrackingRecord, StoreError> {
        // ---
        // One statement, so concurrent readings for the same animal merge
        let record = sqlx::query_as::<_, GpsTrackingRecord>(&format!(
            r#"
            INSERT INTO gps_tracking (
                id, cattle_id, battery_level, signal_strength, lat, lng, last_updated
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (cattle_id) DO UPDATE SET
                battery_level   = COALESCE(EXCLUDED.battery_level, gps_tracking.battery_level),
                signal_strength = COALESCE(EXCLUDED.signal_strength, gps_tracking.signal_strength),
                lat             = COALESCE(EXCLUDED.lat, gps_tracking.lat),
                lng             = COALESCE(EXCLUDED.lng, gps_tracking.lng),
                last_updated    = EXCLUDED.last_updated
            RETURNING {GPS_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(cattle_id)
        .bind(patch.battery_level)
        .bind(patch.signal_strength)
        .bind(patch.lat)
        .bind(patch.lng)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_gps_tracking(&self) -> Result<Vec<GpsTrackingRecord>, StoreError> {
        // ---
        let records = sqlx::query_as::<_, GpsTrackingRecord>(&format!(
            "SELECT {GPS_COLUMNS} FROM gps_tracking ORDER BY last_updated DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_feed_distribution(&self) -> Result<Vec<FeedDistribution>, StoreError> {
        // ---
        let rows = sqlx::query_as::<_, FeedDistribution>(
            "SELECT id, feed_type, percentage, details FROM feed_distribution ORDER BY feed_type",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
