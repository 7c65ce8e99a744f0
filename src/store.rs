//! Append-only persistence for measurements and alarm events.
//!
//! Thin wrapper around the SQLite pool exposing the handful of queries the
//! controller and the reporting API need. Every call is a single statement,
//! so each append is atomic on its own.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::{AlarmCommand, AlarmSource, Measurement};

// ---

/// Handle to the event store. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    pub fn new(pool: SqlitePool) -> Self {
        // ---
        EventStore { pool }
    }

    /// Append a paired temperature/humidity sample, stamped with the current
    /// server time.
    pub async fn append_measurement(&self, temperature: f64, humidity: f64) -> Result<()> {
        // ---
        sqlx::query("INSERT INTO measures (temperature, humidity, ts) VALUES (?, ?, ?)")
            .bind(temperature)
            .bind(humidity)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        debug!("Stored measurement {:.1}C / {:.1}%", temperature, humidity);
        Ok(())
    }

    /// Append an alarm transition or feedback report.
    pub async fn append_alarm_event(&self, source: AlarmSource, value: AlarmCommand) -> Result<()> {
        // ---
        sqlx::query("INSERT INTO alarm_events (source, value, ts) VALUES (?, ?, ?)")
            .bind(source.as_str())
            .bind(value.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        debug!("Stored alarm event {}/{}", source.as_str(), value.as_str());
        Ok(())
    }

    /// Most recently appended measurement, if any.
    pub async fn latest_measurement(&self) -> Result<Option<Measurement>> {
        // ---
        let row = sqlx::query_as::<_, Measurement>(
            "SELECT temperature, humidity, ts FROM measures ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Value of the most recently appended alarm event, if any.
    pub async fn latest_alarm_event_value(&self) -> Result<Option<AlarmCommand>> {
        // ---
        let value =
            sqlx::query_scalar::<_, String>("SELECT value FROM alarm_events ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.as_deref().and_then(|v| match v {
            "ON" => Some(AlarmCommand::On),
            "OFF" => Some(AlarmCommand::Off),
            _ => None,
        }))
    }

    /// Up to `limit` most recent measurements, newest first.
    pub async fn recent_measurements(&self, limit: u32) -> Result<Vec<Measurement>> {
        // ---
        let rows = sqlx::query_as::<_, Measurement>(
            "SELECT temperature, humidity, ts FROM measures ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::schema::create_schema;

    // In-memory SQLite gives every pooled connection its own database, so
    // the test pool is capped at a single connection.
    async fn test_store() -> EventStore {
        // ---
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        EventStore::new(pool)
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        // ---
        let store = test_store().await;
        create_schema(&store.pool).await.unwrap();
        create_schema(&store.pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_measurement_recency_order() {
        // ---
        let store = test_store().await;
        assert!(store.latest_measurement().await.unwrap().is_none());

        store.append_measurement(21.5, 40.0).await.unwrap();
        store.append_measurement(22.5, 41.0).await.unwrap();

        let latest = store.latest_measurement().await.unwrap().unwrap();
        assert_eq!(latest.temperature, 22.5);
        assert_eq!(latest.humidity, 41.0);

        let recent = store.recent_measurements(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].temperature, 22.5, "newest first");
        assert_eq!(recent[1].temperature, 21.5);

        let capped = store.recent_measurements(1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].temperature, 22.5);
    }

    #[tokio::test]
    async fn test_latest_alarm_event_value() {
        // ---
        let store = test_store().await;
        assert!(store.latest_alarm_event_value().await.unwrap().is_none());

        store
            .append_alarm_event(AlarmSource::Auto, AlarmCommand::On)
            .await
            .unwrap();
        store
            .append_alarm_event(AlarmSource::Manual, AlarmCommand::Off)
            .await
            .unwrap();

        assert_eq!(
            store.latest_alarm_event_value().await.unwrap(),
            Some(AlarmCommand::Off)
        );

        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT source, value FROM alarm_events ORDER BY id",
        )
        .fetch_all(&store.pool)
        .await
        .unwrap();
        assert_eq!(
            rows,
            vec![
                ("auto".to_string(), "ON".to_string()),
                ("manual".to_string(), "OFF".to_string())
            ]
        );
    }
}
