//! In-process implementation of [`Store`].
//!
//! Mirrors the PostgreSQL constraints that matter to the service: one
//! tracking record per animal, tracking records must reference an existing
//! animal and go away with it. A tracking upsert runs under a single lock.
//! When built with a [`Notifier`] it publishes a [`ChangeEvent`] after every
//! write, the way the database triggers do.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::Store;
use crate::{
    models::{
        CattlePatch, CattleRecord, FeedDistribution, GpsTrackingPatch, GpsTrackingRecord,
        NewSensorReading, SensorReading,
    },
    realtime::{ChangeEvent, ChangeKind, Notifier, Table},
    StoreError,
};

// ---

#[derive(Default)]
struct Tables {
    cattle: BTreeMap<String, CattleRecord>,
    // Insertion order is creation order
    readings: Vec<SensorReading>,
    gps: HashMap<String, GpsTrackingRecord>,
    feed: Vec<FeedDistribution>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    notifier: Option<Notifier>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that announces its writes on `notifier`.
    pub fn with_notifier(notifier: Notifier) -> Self {
        MemoryStore {
            tables: Mutex::new(Tables::default()),
            notifier: Some(notifier),
        }
    }

    /// Insert or replace an animal.
    pub async fn insert_cattle(&self, record: CattleRecord) {
        // ---
        let id = record.id.clone();
        let replaced = self
            .tables
            .lock()
            .await
            .cattle
            .insert(id.clone(), record)
            .is_some();
        let kind = if replaced {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        self.emit(Table::Cattle, kind, id);
    }

    pub async fn seed_feed_distribution(&self, rows: Vec<FeedDistribution>) {
        self.tables.lock().await.feed = rows;
    }

    pub async fn cattle(&self, cattle_id: &str) -> Option<CattleRecord> {
        self.tables.lock().await.cattle.get(cattle_id).cloned()
    }

    pub async fn reading_count(&self) -> usize {
        self.tables.lock().await.readings.len()
    }

    fn emit(&self, table: Table, kind: ChangeKind, row_id: impl Into<String>) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(&ChangeEvent::new(table, kind, row_id));
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_reading(&self, reading: &NewSensorReading) -> Result<SensorReading, StoreError> {
        // ---
        let stored = SensorReading::from_new(reading, Uuid::new_v4(), Utc::now());
        self.tables.lock().await.readings.push(stored.clone());
        self.emit(Table::SensorReadings, ChangeKind::Insert, stored.id.to_string());
        Ok(stored)
    }

    async fn latest_readings(&self, limit: u32) -> Result<Vec<SensorReading>, StoreError> {
        // ---
        let tables = self.tables.lock().await;
        Ok(tables
            .readings
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_cattle(&self) -> Result<Vec<CattleRecord>, StoreError> {
        Ok(self.tables.lock().await.cattle.values().cloned().collect())
    }

    async fn update_cattle_temperature(
        &self,
        cattle_id: &str,
        temperature: f64,
    ) -> Result<(), StoreError> {
        // ---
        {
            let mut tables = self.tables.lock().await;
            let cow = tables
                .cattle
                .get_mut(cattle_id)
                .ok_or_else(|| StoreError::NotFound(format!("cattle {}", cattle_id)))?;
            cow.temperature = Some(temperature);
            cow.updated_at = Utc::now();
        }
        self.emit(Table::Cattle, ChangeKind::Update, cattle_id);
        Ok(())
    }

    async fn patch_cattle(
        &self,
        cattle_id: &str,
        patch: &CattlePatch,
    ) -> Result<CattleRecord, StoreError> {
        // ---
        let updated = {
            let mut tables = self.tables.lock().await;
            let cow = tables
                .cattle
                .get_mut(cattle_id)
                .ok_or_else(|| StoreError::NotFound(format!("cattle {}", cattle_id)))?;
            patch.apply(cow, Utc::now());
            cow.clone()
        };
        self.emit(Table::Cattle, ChangeKind::Update, cattle_id);
        Ok(updated)
    }

    async fn delete_cattle(&self, cattle_id: &str) -> Result<(), StoreError> {
        // ---
        let tracking = {
            let mut tables = self.tables.lock().await;
            if tables.cattle.remove(cattle_id).is_none() {
                return Err(StoreError::NotFound(format!("cattle {}", cattle_id)));
            }
            tables.gps.remove(cattle_id)
        };
        if let Some(record) = tracking {
            self.emit(Table::GpsTracking, ChangeKind::Delete, record.id.to_string());
        }
        self.emit(Table::Cattle, ChangeKind::Delete, cattle_id);
        Ok(())
    }

    async fn find_gps_tracking(
        &self,
        cattle_id: &str,
    ) -> Result<Option<GpsTrackingRecord>, StoreError> {
        Ok(self.tables.lock().await.gps.get(cattle_id).cloned())
    }

    async fn upsert_gps_tracking(
        &self,
        cattle_id: &str,
        patch: &GpsTrackingPatch,
    ) -> Result<GpsTrackingRecord, StoreError> {
        // ---
        let now = Utc::now();
        let (record, kind) = {
            let mut tables = self.tables.lock().await;
            if !tables.cattle.contains_key(cattle_id) {
                return Err(StoreError::Constraint(format!(
                    "gps_tracking.cattle_id references unknown cattle {}",
                    cattle_id
                )));
            }
            match tables.gps.get_mut(cattle_id) {
                Some(existing) => {
                    patch.apply(existing, now);
                    (existing.clone(), ChangeKind::Update)
                }
                None => {
                    let record = GpsTrackingRecord::from_patch(cattle_id, patch, now);
                    tables.gps.insert(cattle_id.to_string(), record.clone());
                    (record, ChangeKind::Insert)
                }
            }
        };
        self.emit(Table::GpsTracking, kind, record.id.to_string());
        Ok(record)
    }

    async fn list_gps_tracking(&self) -> Result<Vec<GpsTrackingRecord>, StoreError> {
        // ---
        let mut records: Vec<_> = self.tables.lock().await.gps.values().cloned().collect();
        records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(records)
    }

    async fn list_feed_distribution(&self) -> Result<Vec<FeedDistribution>, StoreError> {
        Ok(self.tables.lock().await.feed.clone())
    }
}
