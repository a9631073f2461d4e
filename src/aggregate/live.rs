//! Dashboard summary that follows the store.
//!
//! [`LiveAggregation`] subscribes to every change on `cattle` and
//! `sensor_readings` and recomputes the whole [`DashboardSummary`] when one
//! arrives. Change handlers only wake the refresh task, so a burst of events
//! costs a single refetch. Dropping the view unsubscribes its handlers and
//! stops the task.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use super::{summarize, DashboardSummary};
use crate::{
    realtime::{EventFilter, Notifier, SubscriptionToken, Table},
    store::DynStore,
    Config, StoreError,
};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub bucket_width_kg: u32,
    /// Recompute on this period as well as on change events.
    pub refresh_interval: Option<Duration>,
}

impl From<&Config> for LiveOptions {
    fn from(cfg: &Config) -> Self {
        LiveOptions {
            bucket_width_kg: cfg.weight_bucket_kg,
            refresh_interval: (cfg.summary_refresh_secs > 0)
                .then(|| Duration::from_secs(u64::from(cfg.summary_refresh_secs))),
        }
    }
}

pub struct LiveAggregation {
    notifier: Notifier,
    tokens: Vec<SubscriptionToken>,
    summary: watch::Receiver<Arc<DashboardSummary>>,
    task: JoinHandle<()>,
}

impl LiveAggregation {
    /// Compute the first summary, then keep it current.
    pub async fn start(
        store: DynStore,
        notifier: Notifier,
        options: LiveOptions,
    ) -> Result<Self, StoreError> {
        // ---
        let initial = summarize(store.as_ref(), options.bucket_width_kg).await?;
        let (tx, rx) = watch::channel(Arc::new(initial));
        let wake = Arc::new(Notify::new());

        let tokens = [Table::Cattle, Table::SensorReadings]
            .into_iter()
            .map(|table| {
                let wake = Arc::clone(&wake);
                notifier.subscribe(EventFilter::table(table), move |_| wake.notify_one())
            })
            .collect();

        let task = tokio::spawn(refresh_loop(store, tx, wake, options));
        info!("Live dashboard aggregation started");

        Ok(LiveAggregation {
            notifier,
            tokens,
            summary: rx,
            task,
        })
    }

    /// The most recent summary.
    pub fn current(&self) -> Arc<DashboardSummary> {
        Arc::clone(&self.summary.borrow())
    }

    /// A receiver that observes every new summary.
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardSummary>> {
        self.summary.clone()
    }

    /// Unsubscribe and stop refreshing.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for LiveAggregation {
    fn drop(&mut self) {
        // ---
        for token in self.tokens.drain(..) {
            self.notifier.unsubscribe(token);
        }
        self.task.abort();
        debug!("Live dashboard aggregation stopped");
    }
}

async fn refresh_loop(
    store: DynStore,
    tx: watch::Sender<Arc<DashboardSummary>>,
    wake: Arc<Notify>,
    options: LiveOptions,
) {
    // ---
    let mut ticker = options
        .refresh_interval
        .map(|period| time::interval_at(Instant::now() + period, period));

    loop {
        match ticker.as_mut() {
            Some(ticker) => {
                tokio::select! {
                    _ = wake.notified() => {}
                    _ = ticker.tick() => {}
                }
            }
            None => wake.notified().await,
        }

        match summarize(store.as_ref(), options.bucket_width_kg).await {
            Ok(summary) => {
                debug!("Dashboard summary refreshed ({} cattle)", summary.locations.total);
                if tx.send(Arc::new(summary)).is_err() {
                    // Every receiver is gone
                    break;
                }
            }
            // The previous summary stays; the next event or tick retries
            Err(e) => warn!("Dashboard refresh failed: {}", e),
        }
    }
}
