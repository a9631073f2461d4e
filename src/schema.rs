//! Database schema management for `herdwatch`.
//!
//! Ensures required tables, indexes, and change triggers exist before serving
//! requests. Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

use crate::realtime::pg_listener::CHANNEL;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `cattle`, `sensor_readings`, `gps_tracking` and
/// `feed_distribution` tables, plus the trigger that publishes row changes on
/// the notification channel. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cattle (
            id            TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,
            tag_number    TEXT        NOT NULL UNIQUE,
            temperature   DOUBLE PRECISION,
            weight        DOUBLE PRECISION,
            health_status TEXT,
            location      TEXT,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Append-only telemetry; cattle_id is deliberately not a foreign key so
    // readings survive the animal's record
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id              UUID PRIMARY KEY,
            temperature     DOUBLE PRECISION,
            humidity        DOUBLE PRECISION,
            battery_level   DOUBLE PRECISION,
            signal_strength DOUBLE PRECISION,
            lat             DOUBLE PRECISION,
            lng             DOUBLE PRECISION,
            cattle_id       TEXT,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gps_tracking (
            id              UUID PRIMARY KEY,
            cattle_id       TEXT NOT NULL UNIQUE REFERENCES cattle (id) ON DELETE CASCADE,
            battery_level   DOUBLE PRECISION,
            signal_strength DOUBLE PRECISION,
            lat             DOUBLE PRECISION,
            lng             DOUBLE PRECISION,
            last_updated    TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feed_distribution (
            id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            feed_type  TEXT NOT NULL,
            percentage DOUBLE PRECISION,
            details    TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_created_at
            ON sensor_readings (created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_cattle_id
            ON sensor_readings (cattle_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One JSON payload per row change: {"table", "kind", "row_id"}
    let notify_fn = format!(
        r#"
        CREATE OR REPLACE FUNCTION notify_livestock_change() RETURNS trigger AS $$
        DECLARE
            changed_id TEXT;
        BEGIN
            IF TG_OP = 'DELETE' THEN
                changed_id := OLD.id::text;
            ELSE
                changed_id := NEW.id::text;
            END IF;
            PERFORM pg_notify(
                '{CHANNEL}',
                json_build_object(
                    'table', TG_TABLE_NAME,
                    'kind', TG_OP,
                    'row_id', changed_id
                )::text
            );
            RETURN NULL;
        END;
        $$ LANGUAGE plpgsql;
        "#
    );
    sqlx::query(&notify_fn).execute(&mut *tx).await?;

    for table in ["cattle", "sensor_readings", "gps_tracking"] {
        sqlx::query(&format!(
            "DROP TRIGGER IF EXISTS {table}_notify_change ON {table};"
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TRIGGER {table}_notify_change
                AFTER INSERT OR UPDATE OR DELETE ON {table}
                FOR EACH ROW EXECUTE FUNCTION notify_livestock_change();
            "#
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Database schema ready");
    Ok(())
}
