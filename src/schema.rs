//! Database schema management for `codemetal-roomsentry`.
//!
//! Ensures required tables and indexes exist before the controller starts.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `measures` table for paired sensor samples and the
/// `alarm_events` table for alarm transitions and actuator feedback. Safe to
/// call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Paired temperature/humidity samples, one row per humidity arrival
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measures (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            temperature REAL NOT NULL,
            humidity    REAL NOT NULL,
            ts          TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Alarm transitions (auto/manual) and actuator feedback reports
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alarm_events (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            value  TEXT NOT NULL,
            ts     TEXT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Recency indexes for external consumers of the database file
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_measures_ts
            ON measures (ts DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alarm_events_ts
            ON alarm_events (ts DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
