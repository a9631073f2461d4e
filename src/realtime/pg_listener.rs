//! Feeds a [`Notifier`] from PostgreSQL `LISTEN/NOTIFY`.
//!
//! The triggers installed by [`crate::schema::create_schema`] publish one JSON
//! payload per row change on [`CHANNEL`]; this task decodes each payload into
//! a [`ChangeEvent`] and publishes it.

use sqlx::{postgres::PgListener, PgPool};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ChangeEvent, Notifier};

/// Notification channel written by the change triggers.
pub const CHANNEL: &str = "livestock_changes";

// ---

/// Spawn the listener on the current runtime.
///
/// Abort the returned handle to stop listening.
pub fn spawn(pool: PgPool, notifier: Notifier) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        if let Err(e) = run(pool, notifier).await {
            error!("Change listener stopped: {}", e);
        }
    })
}

/// Listen on [`CHANNEL`] until the connection fails for good.
///
/// Lost connections are re-established by `PgListener` on the next `recv`.
pub async fn run(pool: PgPool, notifier: Notifier) -> Result<(), sqlx::Error> {
    // ---
    let mut listener = PgListener::connect_with(&pool).await?;
    listener.listen(CHANNEL).await?;
    info!("Listening for row changes on '{}'", CHANNEL);

    loop {
        let notification = listener.recv().await?;
        match decode(notification.payload()) {
            Some(event) => {
                let delivered = notifier.publish(&event);
                debug!("Change {:?} delivered to {} handler(s)", event, delivered);
            }
            None => warn!("Ignoring malformed change payload: {}", notification.payload()),
        }
    }
}

fn decode(payload: &str) -> Option<ChangeEvent> {
    serde_json::from_str(payload).ok()
}
