use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tokio::time::timeout;
use tower::ServiceExt;

use herdwatch::{
    aggregate::{LiveAggregation, LiveOptions},
    ingest,
    realtime::{ChangeEvent, ChangeKind, Notifier, Table},
    routes::{self, AppState},
    store::{MemoryStore, Store},
    CattlePatch, CattleRecord, Config, HealthStatus, Location, NewSensorReading,
};

// ---

const WAIT: Duration = Duration::from_secs(2);

fn cow(id: &str, location: Option<Location>, weight: Option<f64>) -> CattleRecord {
    // ---
    let mut cow = CattleRecord::new(id, format!("TAG-{}", id));
    cow.location = location;
    cow.weight = weight;
    cow.temperature = Some(38.5);
    cow.health_status = Some(HealthStatus::Healthy);
    cow
}

async fn seeded_store(notifier: &Notifier) -> Arc<MemoryStore> {
    // ---
    let store = Arc::new(MemoryStore::with_notifier(notifier.clone()));
    store.insert_cattle(cow("1", Some(Location::Feeding), Some(420.0))).await;
    store.insert_cattle(cow("2", Some(Location::Feeding), Some(455.0))).await;
    store.insert_cattle(cow("3", Some(Location::Water), None)).await;
    store
}

fn options() -> LiveOptions {
    LiveOptions {
        bucket_width_kg: 50,
        refresh_interval: None,
    }
}

#[tokio::test]
async fn initial_summary_reflects_the_herd() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;

    let live = LiveAggregation::start(store, notifier, options()).await.unwrap();
    let summary = live.current();

    assert_eq!(summary.locations.total, 3);
    assert_eq!(summary.locations.feeding.count, 2);
    assert_eq!(summary.locations.feeding.percentage, 66.7);
    assert_eq!(summary.locations.water.percentage, 33.3);
    assert_eq!(summary.locations.resting.percentage, 0.0);
    assert_eq!(summary.health.healthy.count, 3);
    assert_eq!(summary.weights.buckets.len(), 2);
    assert_eq!(summary.weights.unweighed, 1);
}

#[tokio::test]
async fn empty_herd_reports_zero_percentages() {
    // ---
    let notifier = Notifier::new();
    let store = Arc::new(MemoryStore::with_notifier(notifier.clone()));

    let live = LiveAggregation::start(store, notifier, options()).await.unwrap();
    let summary = live.current();

    assert_eq!(summary.locations.total, 0);
    assert_eq!(summary.locations.feeding.percentage, 0.0);
    assert_eq!(summary.health.healthy.percentage, 0.0);
    assert!(summary.weights.buckets.is_empty());
}

#[tokio::test]
async fn outlier_weight_is_reported_as_unweighed() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    store.insert_cattle(cow("4", Some(Location::Resting), Some(1e300))).await;

    let live = LiveAggregation::start(store, notifier, options()).await.unwrap();
    let summary = live.current();

    assert_eq!(summary.locations.total, 4);
    assert_eq!(summary.weights.unweighed, 2);
    assert_eq!(summary.weights.buckets.len(), 2);
}

#[tokio::test]
async fn ingestion_refreshes_the_summary() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    let live = LiveAggregation::start(store.clone(), notifier, options()).await.unwrap();
    let mut updates = live.watch();
    assert_eq!(live.current().health.fever_alerts, 0);

    let payload = NewSensorReading {
        temperature: Some(39.8),
        cattle_id: Some("2".to_string()),
        ..Default::default()
    };
    ingest::ingest_reading(store.as_ref(), &payload).await.unwrap();

    // The watch guard must not outlive the assertion
    assert!(
        matches!(
            timeout(WAIT, updates.wait_for(|s| s.health.fever_alerts == 1)).await,
            Ok(Ok(_))
        ),
        "summary never showed the fever"
    );
    // Ingestion flags the fever but leaves the status alone
    assert_eq!(live.current().health.healthy.count, 3);
}

#[tokio::test]
async fn administrative_changes_refresh_the_summary() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    let live = LiveAggregation::start(store.clone(), notifier, options()).await.unwrap();
    let mut updates = live.watch();

    let patch = CattlePatch {
        health_status: Some(HealthStatus::Critical),
        location: Some(Location::Resting),
    };
    store.patch_cattle("3", &patch).await.unwrap();

    assert!(matches!(
        timeout(
            WAIT,
            updates.wait_for(|s| s.health.critical.count == 1 && s.locations.resting.count == 1),
        )
        .await,
        Ok(Ok(_))
    ));

    store.delete_cattle("1").await.unwrap();
    assert!(matches!(
        timeout(WAIT, updates.wait_for(|s| s.locations.total == 2)).await,
        Ok(Ok(_))
    ));
}

#[tokio::test]
async fn tracking_events_do_not_trigger_a_refresh() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    let live = LiveAggregation::start(store, notifier.clone(), options()).await.unwrap();
    let mut updates = live.watch();
    updates.mark_unchanged();

    notifier.publish(&ChangeEvent::new(Table::GpsTracking, ChangeKind::Update, "g1"));

    let changed = timeout(Duration::from_millis(200), updates.changed()).await;
    assert!(changed.is_err(), "gps events must not recompute the summary");
}

#[tokio::test]
async fn periodic_refresh_runs_without_events() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    let opts = LiveOptions {
        refresh_interval: Some(Duration::from_millis(20)),
        ..options()
    };
    let live = LiveAggregation::start(store, notifier, opts).await.unwrap();
    let mut updates = live.watch();
    let first = live.current().generated_at;

    let changed = timeout(WAIT, updates.changed()).await;
    assert!(matches!(changed, Ok(Ok(()))));
    assert!(live.current().generated_at >= first);
}

#[tokio::test]
async fn dropping_the_view_unsubscribes() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;

    let live = LiveAggregation::start(store, notifier.clone(), options()).await.unwrap();
    assert_eq!(notifier.subscriber_count(), 2);

    live.shutdown();
    assert_eq!(notifier.subscriber_count(), 0);
    assert_eq!(
        notifier.publish(&ChangeEvent::new(Table::Cattle, ChangeKind::Update, "1")),
        0
    );
}

#[tokio::test]
async fn dashboard_endpoint_serves_the_live_summary() {
    // ---
    let notifier = Notifier::new();
    let store = seeded_store(&notifier).await;
    let config = Config::default();
    let live = LiveAggregation::start(store.clone(), notifier, LiveOptions::from(&config))
        .await
        .unwrap();
    let router = routes::router(AppState::new(store, config, live.watch()));

    let request = Request::builder()
        .uri("/dashboard/summary")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["locations"]["total"], 3);
    assert_eq!(body["locations"]["feeding"]["count"], 2);
    assert_eq!(body["locations"]["feeding"]["percentage"], 66.7);
    assert_eq!(body["weights"]["bucket_width_kg"], 50);
    assert_eq!(body["weights"]["buckets"][0]["min_kg"], 400.0);
}
