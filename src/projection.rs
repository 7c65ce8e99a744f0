//! State projection for the reporting layer.
//!
//! Read-only views over the live controller state with event-store fallback,
//! so answers stay meaningful right after a restart when the in-memory state
//! has not yet been refreshed by traffic.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{AlarmState, ControllerState, EventStore};

// ---

/// Snapshot of the system served by the reporting API.
#[derive(Debug, Serialize)]
pub struct SystemSnapshot {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub threshold: f64,
    pub alarm_state: AlarmState,
    pub node_online: bool,
}

/// Resolve the current alarm state. Never fails.
///
/// Preference order: live actuator feedback, then the controller's own last
/// published command, then the newest persisted alarm event. `Unknown` only
/// on a fresh system with an empty store. A store error during the fallback
/// is logged and treated as no history.
pub async fn resolve_alarm_state(
    state: &RwLock<ControllerState>,
    store: &EventStore,
) -> AlarmState {
    // ---
    let (live, last_command) = {
        let st = state.read().await;
        (st.latest_alarm_state, st.last_command)
    };

    if live != AlarmState::Unknown {
        return live;
    }
    if let Some(cmd) = last_command {
        return cmd.into();
    }

    match store.latest_alarm_event_value().await {
        Ok(Some(value)) => value.into(),
        Ok(None) => AlarmState::Unknown,
        Err(e) => {
            warn!("Alarm state fallback query failed: {}", e);
            AlarmState::Unknown
        }
    }
}

/// Build the reporting snapshot: live readings when present, otherwise the
/// most recent persisted measurement, plus the resolved alarm state.
pub async fn system_snapshot(
    state: &RwLock<ControllerState>,
    store: &EventStore,
    threshold: f64,
) -> SystemSnapshot {
    // ---
    let (mut temperature, mut humidity, node_online) = {
        let st = state.read().await;
        (st.latest_temperature, st.latest_humidity, st.node_online)
    };

    if temperature.is_none() || humidity.is_none() {
        match store.latest_measurement().await {
            Ok(Some(m)) => {
                temperature = temperature.or(Some(m.temperature));
                humidity = humidity.or(Some(m.humidity));
            }
            Ok(None) => {}
            Err(e) => warn!("Measurement fallback query failed: {}", e),
        }
    }

    SystemSnapshot {
        temperature,
        humidity,
        threshold,
        alarm_state: resolve_alarm_state(state, store).await,
        node_online,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::schema::create_schema;
    use crate::{AlarmCommand, AlarmSource};

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
    async fn test_fresh_system_is_unknown() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;

        assert_eq!(
            resolve_alarm_state(&state, &store).await,
            AlarmState::Unknown
        );
    }

    #[tokio::test]
    async fn test_store_fallback_when_live_unknown() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;
        store
            .append_alarm_event(AlarmSource::Auto, AlarmCommand::Off)
            .await
            .unwrap();

        assert_eq!(resolve_alarm_state(&state, &store).await, AlarmState::Off);
    }

    #[tokio::test]
    async fn test_live_feedback_beats_stored_history() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;
        store
            .append_alarm_event(AlarmSource::Auto, AlarmCommand::Off)
            .await
            .unwrap();

        state.write().await.latest_alarm_state = AlarmState::On;

        assert_eq!(resolve_alarm_state(&state, &store).await, AlarmState::On);
    }

    #[tokio::test]
    async fn test_last_command_fills_feedback_gap() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;

        // Command published, actuator has not reported back yet
        state.write().await.last_command = Some(AlarmCommand::On);

        assert_eq!(resolve_alarm_state(&state, &store).await, AlarmState::On);
    }

    #[tokio::test]
    async fn test_snapshot_falls_back_to_stored_measurement() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;
        store.append_measurement(21.0, 55.0).await.unwrap();

        let snapshot = system_snapshot(&state, &store, 24.0).await;
        assert_eq!(snapshot.temperature, Some(21.0));
        assert_eq!(snapshot.humidity, Some(55.0));
        assert_eq!(snapshot.threshold, 24.0);
        assert_eq!(snapshot.alarm_state, AlarmState::Unknown);
        assert!(!snapshot.node_online);
    }

    #[tokio::test]
    async fn test_snapshot_prefers_live_readings() {
        // ---
        let state = RwLock::new(ControllerState::new());
        let store = test_store().await;
        store.append_measurement(21.0, 55.0).await.unwrap();

        {
            let mut st = state.write().await;
            st.latest_temperature = Some(30.0);
            st.node_online = true;
        }

        let snapshot = system_snapshot(&state, &store, 24.0).await;
        assert_eq!(snapshot.temperature, Some(30.0));
        // Humidity has no live value yet, so the stored pair fills it
        assert_eq!(snapshot.humidity, Some(55.0));
        assert!(snapshot.node_online);
    }
}
