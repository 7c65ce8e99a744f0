//! Domain types for the alarm controller: command/state/source enums,
//! payload normalization, and the persisted measurement record.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---

/// Alarm command as published on the command topic (`ON`/`OFF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCommand {
    On,
    Off,
}

impl AlarmCommand {
    /// Wire/database representation of the command.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlarmCommand::On => "ON",
            AlarmCommand::Off => "OFF",
        }
    }
}

/// Alarm state as reported by the actuator. `Unknown` until the first
/// feedback message arrives (e.g., right after a controller restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    On,
    Off,
    Unknown,
}

impl From<AlarmCommand> for AlarmState {
    fn from(cmd: AlarmCommand) -> Self {
        // ---
        match cmd {
            AlarmCommand::On => AlarmState::On,
            AlarmCommand::Off => AlarmState::Off,
        }
    }
}

/// Origin of a persisted alarm event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSource {
    /// Threshold evaluation decided the command.
    Auto,
    /// An operator issued the command over the control topic.
    Manual,
    /// The physical actuator reported its state on the feedback topic.
    Actuator,
}

impl AlarmSource {
    /// Database representation of the source.
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AlarmSource::Auto => "auto",
            AlarmSource::Manual => "manual",
            AlarmSource::Actuator => "actuator",
        }
    }
}

/// Normalized form of a control-topic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Force the alarm to the given state and enter manual mode.
    Switch(AlarmCommand),
    /// Leave manual mode and resume threshold evaluation.
    Auto,
}

/// Normalize a control/feedback payload to a [`ControlRequest`].
///
/// Trimmed and case-insensitive. `ON`/`1`/`TRUE` and `OFF`/`0`/`FALSE` map to
/// switch requests, `AUTO` returns to automatic mode, anything else is
/// rejected with `None`.
pub fn normalize_alarm(payload: &str) -> Option<ControlRequest> {
    // ---
    match payload.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Some(ControlRequest::Switch(AlarmCommand::On)),
        "OFF" | "0" | "FALSE" => Some(ControlRequest::Switch(AlarmCommand::Off)),
        "AUTO" => Some(ControlRequest::Auto),
        _ => None,
    }
}

/// Paired temperature/humidity sample persisted by the telemetry path.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Measurement {
    // ---
    pub temperature: f64,
    pub humidity: f64,
    pub ts: DateTime<Utc>,
}
