//! Herd summary statistics.
//!
//! Every view is recomputed from the full current row set; nothing is
//! maintained incrementally. At herd sizes of a few hundred animals the full
//! scan is cheap and can never drift from the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    models::{CattleRecord, HealthStatus, Location, TemperatureBand},
    store::Store,
    StoreError,
};

pub mod live;

pub use live::{LiveAggregation, LiveOptions};

// ---

/// `count` as a percentage of `total`, rounded to one decimal place.
///
/// An empty total yields 0 rather than NaN.
pub fn percentage(count: usize, total: usize) -> f64 {
    // ---
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

/// A count and its share of the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub count: usize,
    pub percentage: f64,
}

impl Tally {
    pub fn of(count: usize, total: usize) -> Self {
        Tally {
            count,
            percentage: percentage(count, total),
        }
    }
}

/// Where the herd currently is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LocationCounts {
    // ---
    pub feeding: Tally,
    pub water: Tally,
    pub resting: Tally,
    /// Animals with no (or an unrecognised) location.
    pub unknown: Tally,
    pub total: usize,
}

pub fn location_counts(cattle: &[CattleRecord]) -> LocationCounts {
    // ---
    let total = cattle.len();
    let (mut feeding, mut water, mut resting, mut unknown) = (0, 0, 0, 0);
    for cow in cattle {
        match cow.location {
            Some(Location::Feeding) => feeding += 1,
            Some(Location::Water) => water += 1,
            Some(Location::Resting) => resting += 1,
            None => unknown += 1,
        }
    }

    LocationCounts {
        feeding: Tally::of(feeding, total),
        water: Tally::of(water, total),
        resting: Tally::of(resting, total),
        unknown: Tally::of(unknown, total),
        total,
    }
}

/// Health status breakdown plus temperature-based alerts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthBreakdown {
    // ---
    pub healthy: Tally,
    pub under_treatment: Tally,
    pub critical: Tally,
    pub unknown: Tally,
    pub total: usize,
    /// Animals whose last temperature is above the fever threshold.
    pub fever_alerts: usize,
    /// Animals whose last temperature is below the low threshold.
    pub low_temperature_alerts: usize,
}

pub fn health_breakdown(cattle: &[CattleRecord]) -> HealthBreakdown {
    // ---
    let total = cattle.len();
    let (mut healthy, mut treated, mut critical, mut unknown) = (0, 0, 0, 0);
    let (mut fever, mut low) = (0, 0);

    for cow in cattle {
        match cow.health_status {
            Some(HealthStatus::Healthy) => healthy += 1,
            Some(HealthStatus::UnderTreatment) => treated += 1,
            Some(HealthStatus::Critical) => critical += 1,
            None => unknown += 1,
        }
        match cow.temperature_band() {
            Some(TemperatureBand::Fever) => fever += 1,
            Some(TemperatureBand::Low) => low += 1,
            Some(TemperatureBand::Normal) | None => {}
        }
    }

    HealthBreakdown {
        healthy: Tally::of(healthy, total),
        under_treatment: Tally::of(treated, total),
        critical: Tally::of(critical, total),
        unknown: Tally::of(unknown, total),
        total,
        fever_alerts: fever,
        low_temperature_alerts: low,
    }
}

/// One `[min_kg, max_kg)` weight range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightBucket {
    pub min_kg: f64,
    pub max_kg: f64,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightHistogram {
    // ---
    pub bucket_width_kg: u32,
    /// Contiguous buckets from the lightest to the heaviest animal.
    pub buckets: Vec<WeightBucket>,
    /// Animals with no usable weight; excluded from bucket percentages.
    pub unweighed: usize,
}

/// Heaviest weight accepted into the histogram; heavier values count as
/// unweighed.
pub const MAX_PLAUSIBLE_WEIGHT_KG: f64 = 5_000.0;

pub fn weight_histogram(cattle: &[CattleRecord], bucket_width_kg: u32) -> WeightHistogram {
    // ---
    let width = bucket_width_kg.max(1);
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    let mut unweighed = 0;

    for cow in cattle {
        match cow.weight {
            Some(kg) if (0.0..=MAX_PLAUSIBLE_WEIGHT_KG).contains(&kg) => {
                // Bounded by MAX_PLAUSIBLE_WEIGHT_KG, so the cast cannot saturate
                let index = (kg / f64::from(width)).floor() as u32;
                *counts.entry(index).or_default() += 1;
            }
            _ => unweighed += 1,
        }
    }

    let weighed: usize = counts.values().sum();
    let bound = |index: u32| f64::from(index) * f64::from(width);
    let buckets = match (counts.keys().next(), counts.keys().next_back()) {
        (Some(&first), Some(&last)) => (first..=last)
            .map(|index| {
                let count = counts.get(&index).copied().unwrap_or(0);
                WeightBucket {
                    min_kg: bound(index),
                    max_kg: bound(index) + f64::from(width),
                    count,
                    percentage: percentage(count, weighed),
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    WeightHistogram {
        bucket_width_kg: width,
        buckets,
        unweighed,
    }
}

/// Everything the dashboard shows, computed in one pass over the herd.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    // ---
    pub locations: LocationCounts,
    pub health: HealthBreakdown,
    pub weights: WeightHistogram,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSummary {
    pub fn from_cattle(cattle: &[CattleRecord], bucket_width_kg: u32) -> Self {
        // ---
        DashboardSummary {
            locations: location_counts(cattle),
            health: health_breakdown(cattle),
            weights: weight_histogram(cattle, bucket_width_kg),
            generated_at: Utc::now(),
        }
    }
}

/// Fetch the whole herd and summarize it.
pub async fn summarize(
    store: &dyn Store,
    bucket_width_kg: u32,
) -> Result<DashboardSummary, StoreError> {
    // ---
    let cattle = store.list_cattle().await?;
    tracing::debug!("Summarizing {} cattle", cattle.len());
    Ok(DashboardSummary::from_cattle(&cattle, bucket_width_kg))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn cow(id: &str, location: Option<Location>) -> CattleRecord {
        // ---
        let mut cow = CattleRecord::new(id, format!("TAG-{}", id));
        cow.location = location;
        cow
    }

    fn weighed(id: &str, kg: Option<f64>) -> CattleRecord {
        let mut cow = CattleRecord::new(id, format!("TAG-{}", id));
        cow.weight = kg;
        cow
    }

    #[test]
    fn test_percentage_rounding() {
        // ---
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(0, 3), 0.0);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn test_percentage_of_empty_total_is_zero() {
        // ---
        let p = percentage(0, 0);
        assert_eq!(p, 0.0);
        assert!(!p.is_nan());
    }

    #[test]
    fn test_location_counts() {
        // ---
        let herd = vec![
            cow("1", Some(Location::Feeding)),
            cow("2", Some(Location::Feeding)),
            cow("3", Some(Location::Water)),
        ];

        let counts = location_counts(&herd);

        assert_eq!(counts.total, 3);
        assert_eq!(counts.feeding, Tally { count: 2, percentage: 66.7 });
        assert_eq!(counts.water, Tally { count: 1, percentage: 33.3 });
        assert_eq!(counts.resting, Tally { count: 0, percentage: 0.0 });
        assert_eq!(counts.unknown.count, 0);
    }

    #[test]
    fn test_location_counts_empty_herd() {
        // ---
        let counts = location_counts(&[]);
        assert_eq!(counts.total, 0);
        for tally in [counts.feeding, counts.water, counts.resting, counts.unknown] {
            assert_eq!(tally.percentage, 0.0);
        }
    }

    #[test]
    fn test_missing_location_is_unknown() {
        // ---
        let herd = vec![cow("1", None), cow("2", Some(Location::Resting))];
        let counts = location_counts(&herd);
        assert_eq!(counts.unknown, Tally { count: 1, percentage: 50.0 });
        assert_eq!(counts.resting.count, 1);
    }

    #[test]
    fn test_health_breakdown_and_alerts() {
        // ---
        let mut herd = Vec::new();
        for (id, status, temp) in [
            ("1", Some(HealthStatus::Healthy), Some(38.6)),
            ("2", Some(HealthStatus::Healthy), Some(39.9)),
            ("3", Some(HealthStatus::UnderTreatment), Some(37.1)),
            ("4", Some(HealthStatus::Critical), None),
            ("5", None, Some(38.0)),
        ] {
            let mut c = CattleRecord::new(id, id);
            c.health_status = status;
            c.temperature = temp;
            herd.push(c);
        }

        let health = health_breakdown(&herd);

        assert_eq!(health.total, 5);
        assert_eq!(health.healthy, Tally { count: 2, percentage: 40.0 });
        assert_eq!(health.under_treatment.count, 1);
        assert_eq!(health.critical.count, 1);
        assert_eq!(health.unknown.count, 1);
        assert_eq!(health.fever_alerts, 1);
        assert_eq!(health.low_temperature_alerts, 1);
    }

    #[test]
    fn test_weight_histogram_is_contiguous() {
        // ---
        let herd = vec![
            weighed("1", Some(410.0)),
            weighed("2", Some(449.9)),
            weighed("3", Some(560.0)),
            weighed("4", None),
            weighed("5", Some(f64::NAN)),
        ];

        let histogram = weight_histogram(&herd, 50);

        let ranges: Vec<_> = histogram
            .buckets
            .iter()
            .map(|b| (b.min_kg, b.max_kg, b.count))
            .collect();
        assert_eq!(
            ranges,
            vec![
                (400.0, 450.0, 2),
                (450.0, 500.0, 0),
                (500.0, 550.0, 0),
                (550.0, 600.0, 1),
            ]
        );
        assert_eq!(histogram.buckets[0].percentage, 66.7);
        assert_eq!(histogram.unweighed, 2);
    }

    #[test]
    fn test_weight_histogram_empty() {
        // ---
        let histogram = weight_histogram(&[weighed("1", None)], 50);
        assert!(histogram.buckets.is_empty());
        assert_eq!(histogram.unweighed, 1);

        // A zero width is treated as 1 kg rather than dividing by zero
        let histogram = weight_histogram(&[weighed("1", Some(12.5))], 0);
        assert_eq!(histogram.bucket_width_kg, 1);
        assert_eq!(histogram.buckets[0].min_kg, 12.0);
    }

    #[test]
    fn test_weight_histogram_ignores_implausible_weights() {
        // ---
        let herd = vec![
            weighed("1", Some(400.0)),
            weighed("2", Some(1e300)),
            weighed("3", Some(1e10)),
            weighed("4", Some(f64::INFINITY)),
            weighed("5", Some(-20.0)),
            weighed("6", Some(MAX_PLAUSIBLE_WEIGHT_KG)),
        ];

        let histogram = weight_histogram(&herd, 50);

        assert_eq!(histogram.unweighed, 4);
        assert_eq!(histogram.buckets.first().map(|b| b.min_kg), Some(400.0));
        assert_eq!(histogram.buckets.last().map(|b| b.max_kg), Some(5_050.0));
        assert_eq!(histogram.buckets.len(), 93);
        let counted: usize = histogram.buckets.iter().map(|b| b.count).sum();
        assert_eq!(counted, 2);
    }
}
