//! Data models for cattle, sensor readings, and GPS tracking.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Body temperature above which an animal is flagged as febrile (°C).
pub const FEVER_THRESHOLD_C: f64 = 39.5;

/// Body temperature below which an animal is flagged as too cold (°C).
pub const LOW_TEMPERATURE_THRESHOLD_C: f64 = 37.5;

/// Battery level (percent) below which a tracker is reported as low.
pub const LOW_BATTERY_THRESHOLD: f64 = 20.0;

/// Signal strength (percent) below which a tracker is reported as weak.
pub const WEAK_SIGNAL_THRESHOLD: f64 = 50.0;

/// Administrative health status of an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    // ---
    Healthy,
    #[serde(rename = "Under Treatment")]
    UnderTreatment,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::UnderTreatment => "Under Treatment",
            HealthStatus::Critical => "Critical",
        }
    }
}

/// Area of the farm an animal was last seen in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    // ---
    Feeding,
    Water,
    Resting,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Feeding => "Feeding",
            Location::Water => "Water",
            Location::Resting => "Resting",
        }
    }
}

/// Error returned when a stored label matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for HealthStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Healthy" => Ok(HealthStatus::Healthy),
            "Under Treatment" => Ok(HealthStatus::UnderTreatment),
            "Critical" => Ok(HealthStatus::Critical),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

impl FromStr for Location {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Feeding" => Ok(Location::Feeding),
            "Water" => Ok(Location::Water),
            "Resting" => Ok(Location::Resting),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// One tracked animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CattleRecord {
    // ---
    pub id: String,
    pub tag_number: String,
    pub temperature: Option<f64>,
    pub weight: Option<f64>,
    pub health_status: Option<HealthStatus>,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CattleRecord {
    /// A new record with no measurements, stamped with the current time.
    pub fn new(id: impl Into<String>, tag_number: impl Into<String>) -> Self {
        // ---
        let now = Utc::now();
        CattleRecord {
            id: id.into(),
            tag_number: tag_number.into(),
            temperature: None,
            weight: None,
            health_status: None,
            location: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Classify the last recorded body temperature, if any.
    pub fn temperature_band(&self) -> Option<TemperatureBand> {
        self.temperature.map(TemperatureBand::classify)
    }
}

/// Coarse classification of a body temperature used for health alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemperatureBand {
    Low,
    Normal,
    Fever,
}

impl TemperatureBand {
    pub fn classify(temperature_c: f64) -> Self {
        // ---
        if temperature_c > FEVER_THRESHOLD_C {
            TemperatureBand::Fever
        } else if temperature_c < LOW_TEMPERATURE_THRESHOLD_C {
            TemperatureBand::Low
        } else {
            TemperatureBand::Normal
        }
    }
}

/// User/administrative change to a cattle record.
///
/// Only `Some` fields are applied. This is the only path that changes
/// `health_status`; ingestion never does.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CattlePatch {
    // ---
    pub health_status: Option<HealthStatus>,
    pub location: Option<Location>,
}

impl CattlePatch {
    pub fn is_empty(&self) -> bool {
        self.health_status.is_none() && self.location.is_none()
    }

    pub fn apply(&self, record: &mut CattleRecord, now: DateTime<Utc>) {
        // ---
        if let Some(status) = self.health_status {
            record.health_status = Some(status);
        }
        if let Some(location) = self.location {
            record.location = Some(location);
        }
        record.updated_at = now;
    }
}

/// Sensor payload as posted by a device. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSensorReading {
    // ---
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub cattle_id: Option<String>,
}

impl NewSensorReading {
    /// A reading must carry at least one environmental measurement.
    pub fn has_measurement(&self) -> bool {
        self.temperature.is_some() || self.humidity.is_some()
    }

    /// The tracking fields of this payload, if it carries any.
    pub fn tracking_patch(&self) -> Option<GpsTrackingPatch> {
        // ---
        let patch = GpsTrackingPatch {
            lat: self.lat,
            lng: self.lng,
            battery_level: self.battery_level,
            signal_strength: self.signal_strength,
        };
        (!patch.is_empty()).then_some(patch)
    }
}

/// Stored sensor observation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    // ---
    pub id: Uuid,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub cattle_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn from_new(reading: &NewSensorReading, id: Uuid, created_at: DateTime<Utc>) -> Self {
        // ---
        SensorReading {
            id,
            temperature: reading.temperature,
            humidity: reading.humidity,
            battery_level: reading.battery_level,
            signal_strength: reading.signal_strength,
            lat: reading.lat,
            lng: reading.lng,
            cattle_id: reading.cattle_id.clone(),
            created_at,
        }
    }
}

/// Latest known position, battery and signal for one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GpsTrackingRecord {
    // ---
    pub id: Uuid,
    pub cattle_id: String,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl GpsTrackingRecord {
    /// Build a fresh record from a patch; absent fields stay null.
    pub fn from_patch(cattle_id: &str, patch: &GpsTrackingPatch, now: DateTime<Utc>) -> Self {
        // ---
        GpsTrackingRecord {
            id: Uuid::new_v4(),
            cattle_id: cattle_id.to_string(),
            battery_level: patch.battery_level,
            signal_strength: patch.signal_strength,
            lat: patch.lat,
            lng: patch.lng,
            last_updated: now,
        }
    }

    pub fn low_battery(&self) -> bool {
        self.battery_level.is_some_and(|level| level < LOW_BATTERY_THRESHOLD)
    }

    pub fn weak_signal(&self) -> bool {
        self.signal_strength.is_some_and(|level| level < WEAK_SIGNAL_THRESHOLD)
    }
}

/// Partial update of a tracking record. `None` keeps the prior value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsTrackingPatch {
    // ---
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
}

impl GpsTrackingPatch {
    pub fn is_empty(&self) -> bool {
        self.lat.is_none()
            && self.lng.is_none()
            && self.battery_level.is_none()
            && self.signal_strength.is_none()
    }

    /// Overwrite only the supplied fields and refresh `last_updated`.
    pub fn apply(&self, record: &mut GpsTrackingRecord, now: DateTime<Utc>) {
        // ---
        if let Some(lat) = self.lat {
            record.lat = Some(lat);
        }
        if let Some(lng) = self.lng {
            record.lng = Some(lng);
        }
        if let Some(level) = self.battery_level {
            record.battery_level = Some(level);
        }
        if let Some(level) = self.signal_strength {
            record.signal_strength = Some(level);
        }
        record.last_updated = now;
    }
}

/// Share of the feed ration per feed type. Reference data, read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedDistribution {
    // ---
    pub id: Uuid,
    pub feed_type: String,
    pub percentage: Option<f64>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tracking_record() -> GpsTrackingRecord {
        // ---
        GpsTrackingRecord {
            id: Uuid::new_v4(),
            cattle_id: "cow-17".to_string(),
            battery_level: Some(80.0),
            signal_strength: Some(64.0),
            lat: Some(-1.2921),
            lng: Some(36.8219),
            last_updated: Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
        }
    }

    #[test]
    fn test_measurement_required() {
        // ---
        assert!(!NewSensorReading::default().has_measurement());

        let humidity_only = NewSensorReading {
            humidity: Some(55.0),
            ..Default::default()
        };
        assert!(humidity_only.has_measurement());

        let temperature_only = NewSensorReading {
            temperature: Some(38.4),
            ..Default::default()
        };
        assert!(temperature_only.has_measurement());
    }

    #[test]
    fn test_null_fields_deserialize_as_absent() {
        // ---
        let payload: NewSensorReading =
            serde_json::from_str(r#"{"temperature": null, "humidity": null, "cattle_id": "abc"}"#)
                .unwrap();
        assert!(!payload.has_measurement());
        assert_eq!(payload.cattle_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_tracking_patch_only_when_fields_present() {
        // ---
        let no_tracking = NewSensorReading {
            temperature: Some(38.0),
            ..Default::default()
        };
        assert!(no_tracking.tracking_patch().is_none());

        let battery_only = NewSensorReading {
            temperature: Some(38.0),
            battery_level: Some(42.0),
            ..Default::default()
        };
        let patch = battery_only.tracking_patch().unwrap();
        assert_eq!(patch.battery_level, Some(42.0));
        assert_eq!(patch.lat, None);
    }

    #[test]
    fn test_patch_keeps_unsupplied_fields() {
        // ---
        let mut record = tracking_record();
        let before = record.clone();
        let now = before.last_updated + Duration::minutes(5);

        let patch = GpsTrackingPatch {
            battery_level: Some(15.0),
            ..Default::default()
        };
        patch.apply(&mut record, now);

        assert_eq!(record.battery_level, Some(15.0));
        assert_eq!(record.lat, before.lat);
        assert_eq!(record.lng, before.lng);
        assert_eq!(record.signal_strength, before.signal_strength);
        assert_eq!(record.last_updated, now);
    }

    #[test]
    fn test_new_tracking_record_from_patch() {
        // ---
        let now = Utc::now();
        let patch = GpsTrackingPatch {
            lat: Some(10.5),
            lng: Some(20.25),
            ..Default::default()
        };
        let record = GpsTrackingRecord::from_patch("cow-3", &patch, now);

        assert_eq!(record.cattle_id, "cow-3");
        assert_eq!(record.lat, Some(10.5));
        assert_eq!(record.lng, Some(20.25));
        assert_eq!(record.battery_level, None);
        assert_eq!(record.signal_strength, None);
        assert_eq!(record.last_updated, now);
    }

    #[test]
    fn test_tracker_alerts() {
        // ---
        let mut record = tracking_record();
        assert!(!record.low_battery());
        assert!(!record.weak_signal());

        record.battery_level = Some(19.9);
        record.signal_strength = Some(30.0);
        assert!(record.low_battery());
        assert!(record.weak_signal());

        // Unknown levels never raise an alert
        record.battery_level = None;
        record.signal_strength = None;
        assert!(!record.low_battery());
        assert!(!record.weak_signal());
    }

    #[test]
    fn test_temperature_bands() {
        // ---
        assert_eq!(TemperatureBand::classify(38.6), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::classify(39.8), TemperatureBand::Fever);
        assert_eq!(TemperatureBand::classify(36.9), TemperatureBand::Low);

        // Edge cases
        assert_eq!(TemperatureBand::classify(39.5), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::classify(37.5), TemperatureBand::Normal);
    }

    #[test]
    fn test_cattle_patch_leaves_temperature() {
        // ---
        let mut cow = CattleRecord::new("abc", "TAG-001");
        cow.temperature = Some(38.1);
        cow.location = Some(Location::Water);

        let patch = CattlePatch {
            health_status: Some(HealthStatus::UnderTreatment),
            location: None,
        };
        let now = cow.updated_at + Duration::seconds(1);
        patch.apply(&mut cow, now);

        assert_eq!(cow.health_status, Some(HealthStatus::UnderTreatment));
        assert_eq!(cow.location, Some(Location::Water));
        assert_eq!(cow.temperature, Some(38.1));
        assert_eq!(cow.updated_at, now);
    }

    #[test]
    fn test_labels_round_trip_through_text() {
        // ---
        for status in [
            HealthStatus::Healthy,
            HealthStatus::UnderTreatment,
            HealthStatus::Critical,
        ] {
            assert_eq!(status.as_str().parse::<HealthStatus>(), Ok(status));
        }
        assert_eq!(
            serde_json::to_string(&HealthStatus::UnderTreatment).unwrap(),
            "\"Under Treatment\""
        );
        assert!("Pasture".parse::<Location>().is_err());
    }
}
