//! Sensor reading ingestion.
//!
//! A reading is written first and is authoritative. Propagating it to the
//! cattle record (temperature) and to the tracking record (position, battery,
//! signal) happens afterwards, step by step, without a transaction: a failure
//! there is logged and swallowed, and the reading stays.

use std::fmt;

use tracing::{debug, info, warn};

use crate::{
    models::{NewSensorReading, SensorReading},
    store::Store,
    StoreError,
};

/// Upper bound on `limit` for reading queries.
pub const MAX_READINGS_LIMIT: u32 = 1000;

pub const MISSING_MEASUREMENT: &str = "Temperature or humidity data is required";

// ---

#[derive(Debug)]
pub enum IngestError {
    // ---
    /// The payload carries neither temperature nor humidity.
    Validation(String),
    /// The reading itself could not be written.
    Store(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Validation(msg) => write!(f, "{}", msg),
            IngestError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::Store(e)
    }
}

/// Validate and store one reading, then propagate it to derived records.
pub async fn ingest_reading(
    store: &dyn Store,
    payload: &NewSensorReading,
) -> Result<SensorReading, IngestError> {
    // ---
    if !payload.has_measurement() {
        return Err(IngestError::Validation(MISSING_MEASUREMENT.to_string()));
    }

    let reading = store.insert_reading(payload).await?;
    info!(
        "Stored reading {} (cattle: {})",
        reading.id,
        reading.cattle_id.as_deref().unwrap_or("-")
    );

    if let Some(cattle_id) = payload.cattle_id.as_deref() {
        if let Some(temperature) = payload.temperature {
            if let Err(e) = store.update_cattle_temperature(cattle_id, temperature).await {
                warn!("Failed to update temperature of cattle {}: {}", cattle_id, e);
            }
        }

        if let Some(patch) = payload.tracking_patch() {
            match store.upsert_gps_tracking(cattle_id, &patch).await {
                Ok(record) => {
                    debug!("Tracking record {} of cattle {} updated", record.id, cattle_id)
                }
                Err(e) => {
                    warn!("Failed to update GPS tracking of cattle {}: {}", cattle_id, e)
                }
            }
        }
    }

    Ok(reading)
}

/// The most recent `limit` readings, newest first.
pub async fn latest_readings(
    store: &dyn Store,
    limit: u32,
) -> Result<Vec<SensorReading>, StoreError> {
    store.latest_readings(limit.min(MAX_READINGS_LIMIT)).await
}
