//! Row-level change notification.
//!
//! A [`Notifier`] fans [`ChangeEvent`]s out to subscribed handlers. It knows
//! nothing about the transport: the PostgreSQL store feeds it from
//! `LISTEN/NOTIFY` (see [`pg_listener`]), the in-memory store publishes
//! directly after each write.
//!
//! Handlers are synchronous and must not block; the usual handler just wakes
//! a task that does the real work (see [`crate::aggregate::live`]).

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

pub mod pg_listener;

// ---

/// Tables that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Cattle,
    SensorReadings,
    GpsTracking,
}

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    // ---
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: String,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, row_id: impl Into<String>) -> Self {
        ChangeEvent {
            table,
            kind,
            row_id: row_id.into(),
        }
    }
}

/// Selects which events a handler receives. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub table: Option<Table>,
    pub kind: Option<ChangeKind>,
}

impl EventFilter {
    /// Every change on one table.
    pub fn table(table: Table) -> Self {
        EventFilter {
            table: Some(table),
            kind: None,
        }
    }

    /// One kind of change on one table.
    pub fn table_kind(table: Table, kind: ChangeKind) -> Self {
        EventFilter {
            table: Some(table),
            kind: Some(kind),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table.map_or(true, |t| t == event.table) && self.kind.map_or(true, |k| k == event.kind)
    }
}

/// Handle returned by [`Notifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(SubscriptionToken, EventFilter, Handler)>,
}

/// Cloneable fan-out point for change events.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events matching `filter`.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionToken
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        // ---
        let mut registry = self.registry();
        registry.next_id += 1;
        let token = SubscriptionToken(registry.next_id);
        registry.subscribers.push((token, filter, Arc::new(handler)));
        tracing::debug!("Subscribed {} to {:?}", token, filter);
        token
    }

    /// Remove a subscription. Returns `false` if the token was unknown.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        // ---
        let mut registry = self.registry();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(t, _, _)| *t != token);
        let removed = registry.subscribers.len() != before;
        if removed {
            tracing::debug!("Unsubscribed {}", token);
        }
        removed
    }

    /// Deliver `event` to every matching handler. Returns how many ran.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        // ---
        // Handlers run outside the lock so they may (un)subscribe themselves
        let handlers: Vec<Handler> = self
            .registry()
            .subscribers
            .iter()
            .filter(|(_, filter, _)| filter.matches(event))
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect();

        tracing::trace!("Publishing {:?} to {} handler(s)", event, handlers.len());
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panicking handler never runs under the lock, so the data is intact
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(notifier: &Notifier, filter: EventFilter) -> (SubscriptionToken, Arc<AtomicUsize>) {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let token = notifier.subscribe(filter, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (token, hits)
    }

    #[test]
    fn test_filter_matching() {
        // ---
        let insert = ChangeEvent::new(Table::Cattle, ChangeKind::Insert, "abc");
        assert!(EventFilter::default().matches(&insert));
        assert!(EventFilter::table(Table::Cattle).matches(&insert));
        assert!(!EventFilter::table(Table::SensorReadings).matches(&insert));
        assert!(EventFilter::table_kind(Table::Cattle, ChangeKind::Insert).matches(&insert));
        assert!(!EventFilter::table_kind(Table::Cattle, ChangeKind::Delete).matches(&insert));
    }

    #[test]
    fn test_publish_reaches_matching_handlers_only() {
        // ---
        let notifier = Notifier::new();
        let (_, cattle_hits) = counter(&notifier, EventFilter::table(Table::Cattle));
        let (_, reading_hits) = counter(&notifier, EventFilter::table(Table::SensorReadings));

        let delivered = notifier.publish(&ChangeEvent::new(Table::Cattle, ChangeKind::Update, "abc"));

        assert_eq!(delivered, 1);
        assert_eq!(cattle_hits.load(Ordering::SeqCst), 1);
        assert_eq!(reading_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        // ---
        let notifier = Notifier::new();
        let (token, hits) = counter(&notifier, EventFilter::default());
        let event = ChangeEvent::new(Table::GpsTracking, ChangeKind::Insert, "g1");

        notifier.publish(&event);
        assert!(notifier.unsubscribe(token));
        notifier.publish(&event);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
        // A second unsubscribe is a no-op
        assert!(!notifier.unsubscribe(token));
    }

    #[test]
    fn test_clones_share_subscribers() {
        // ---
        let notifier = Notifier::new();
        let (_, hits) = counter(&notifier, EventFilter::default());

        let publisher = notifier.clone();
        publisher.publish(&ChangeEvent::new(Table::Cattle, ChangeKind::Delete, "abc"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_wire_format() {
        // ---
        let event: ChangeEvent =
            serde_json::from_str(r#"{"table":"sensor_readings","kind":"INSERT","row_id":"42"}"#)
                .unwrap();
        assert_eq!(
            event,
            ChangeEvent::new(Table::SensorReadings, ChangeKind::Insert, "42")
        );
    }
}
