//! Alarm control state machine.
//!
//! Every inbound MQTT publish is decoded into an [`InboundEvent`] and applied
//! through [`Controller::apply`], the single decision point for the alarm: it
//! caches sensor readings, runs threshold evaluation, enforces the manual
//! override, deduplicates outbound commands, and triggers persistence. The
//! transport loop in `main.rs` is the only caller, so events are handled one
//! at a time in arrival order.

use std::sync::Arc;

use anyhow::Result;
use rumqttc::{AsyncClient, QoS};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::{
    normalize_alarm, AlarmCommand, AlarmSource, AlarmState, ControlRequest, EventStore, Topics,
};

// ---

/// Shared handle to the controller state. The transport task is the only
/// writer; the reporting layer takes read snapshots.
pub type SharedState = Arc<RwLock<ControllerState>>;

/// In-memory controller state, single instance for the process lifetime.
#[derive(Debug)]
pub struct ControllerState {
    /// Last received temperature reading; `None` until the first message.
    pub latest_temperature: Option<f64>,

    /// Last received humidity reading.
    pub latest_humidity: Option<f64>,

    /// True while an operator command overrides threshold evaluation.
    pub manual_mode: bool,

    /// Last alarm command actually published; the deduplication key.
    pub last_command: Option<AlarmCommand>,

    /// Last state reported by the actuator on the feedback topic. Ground
    /// truth from the device, never written from our own commands.
    pub latest_alarm_state: AlarmState,

    /// Liveness of the sensor node per its status topic, last write wins.
    pub node_online: bool,
}

impl ControllerState {
    pub fn new() -> Self {
        // ---
        ControllerState {
            latest_temperature: None,
            latest_humidity: None,
            manual_mode: false,
            last_command: None,
            latest_alarm_state: AlarmState::Unknown,
            node_online: false,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

// ---

/// Inbound message decoded by topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundEvent {
    Temperature(f64),
    Humidity(f64),
    Control(ControlRequest),
    ActuatorState(AlarmCommand),
    NodeStatus(bool),
}

impl InboundEvent {
    /// Decode a raw publish into an event, keyed by topic.
    ///
    /// Malformed payloads (non-numeric readings, unrecognized command tokens)
    /// are logged and dropped here, so the state machine only ever sees valid
    /// transitions. Messages on unrouted topics decode to `None`.
    pub fn from_message(topics: &Topics, topic: &str, payload: &[u8]) -> Option<InboundEvent> {
        // ---
        let text = String::from_utf8_lossy(payload);
        let text = text.trim();

        if topic == topics.temperature {
            return match text.parse::<f64>() {
                Ok(value) => Some(InboundEvent::Temperature(value)),
                Err(_) => {
                    warn!("Discarding non-numeric temperature payload {:?}", text);
                    None
                }
            };
        }

        if topic == topics.humidity {
            return match text.parse::<f64>() {
                Ok(value) => Some(InboundEvent::Humidity(value)),
                Err(_) => {
                    warn!("Discarding non-numeric humidity payload {:?}", text);
                    None
                }
            };
        }

        if topic == topics.control {
            return match normalize_alarm(text) {
                Some(request) => Some(InboundEvent::Control(request)),
                None => {
                    warn!("Discarding unrecognized control payload {:?}", text);
                    None
                }
            };
        }

        if topic == topics.alarm_state {
            // AUTO is a control token; the actuator only ever reports ON/OFF
            return match normalize_alarm(text) {
                Some(ControlRequest::Switch(cmd)) => Some(InboundEvent::ActuatorState(cmd)),
                _ => {
                    warn!("Discarding unrecognized actuator feedback {:?}", text);
                    None
                }
            };
        }

        if topic == topics.node_status {
            return Some(InboundEvent::NodeStatus(text.eq_ignore_ascii_case("online")));
        }

        debug!("Ignoring message on unrouted topic {}", topic);
        None
    }
}

// ---

/// The alarm control state machine.
pub struct Controller {
    state: SharedState,
    store: EventStore,
    client: AsyncClient,
    topics: Topics,
    threshold: f64,
}

impl Controller {
    pub fn new(
        state: SharedState,
        store: EventStore,
        client: AsyncClient,
        topics: Topics,
        threshold: f64,
    ) -> Self {
        // ---
        Controller {
            state,
            store,
            client,
            topics,
            threshold,
        }
    }

    /// Apply one inbound event to the controller state.
    ///
    /// The state write guard is held across the whole handling step, so the
    /// order of persisted events matches the order of decisions. Store
    /// failures are logged and handling continues (a persistence gap, not a
    /// lost decision). Publish failures are returned to the caller with
    /// `last_command` untouched, so the next evaluation trigger republishes.
    pub async fn apply(&self, event: InboundEvent) -> Result<()> {
        // ---
        let mut st = self.state.write().await;

        match event {
            InboundEvent::Temperature(value) => {
                st.latest_temperature = Some(value);
                if !st.manual_mode {
                    self.evaluate_auto(&mut st).await?;
                }
            }
            InboundEvent::Humidity(value) => {
                st.latest_humidity = Some(value);
                if let Some(temperature) = st.latest_temperature {
                    if let Err(e) = self.store.append_measurement(temperature, value).await {
                        error!("Failed to store measurement: {}", e);
                    }
                }
            }
            InboundEvent::Control(ControlRequest::Auto) => {
                info!("Control: AUTO, resuming threshold evaluation");
                st.manual_mode = false;
                self.evaluate_auto(&mut st).await?;
            }
            InboundEvent::Control(ControlRequest::Switch(cmd)) => {
                info!("Control: manual override {}", cmd.as_str());
                st.manual_mode = true;
                self.publish_alarm_command(&mut st, cmd, AlarmSource::Manual)
                    .await?;
            }
            InboundEvent::ActuatorState(cmd) => {
                st.latest_alarm_state = cmd.into();
                if let Err(e) = self
                    .store
                    .append_alarm_event(AlarmSource::Actuator, cmd)
                    .await
                {
                    error!("Failed to store actuator feedback: {}", e);
                }
            }
            InboundEvent::NodeStatus(online) => {
                info!("Sensor node is {}", if online { "online" } else { "offline" });
                st.node_online = online;
            }
        }

        Ok(())
    }

    /// Threshold evaluation: no-op until the first temperature reading,
    /// otherwise desired state is `ON` strictly above the threshold and
    /// `OFF` at or below it.
    async fn evaluate_auto(&self, st: &mut ControllerState) -> Result<()> {
        // ---
        let temperature = match st.latest_temperature {
            Some(t) => t,
            None => return Ok(()),
        };

        let desired = if temperature > self.threshold {
            AlarmCommand::On
        } else {
            AlarmCommand::Off
        };

        self.publish_alarm_command(st, desired, AlarmSource::Auto)
            .await
    }

    /// Publish an alarm command (QoS 1, retained) and persist the transition.
    ///
    /// Auto commands repeating `last_command` are suppressed; manual commands
    /// always go out, since a repeated override is an auditable operator
    /// action rather than noise.
    async fn publish_alarm_command(
        &self,
        st: &mut ControllerState,
        desired: AlarmCommand,
        source: AlarmSource,
    ) -> Result<()> {
        // ---
        if source != AlarmSource::Manual && st.last_command == Some(desired) {
            debug!(
                "Suppressing duplicate {} command (source {})",
                desired.as_str(),
                source.as_str()
            );
            return Ok(());
        }

        self.client
            .publish(
                self.topics.alarm_command.as_str(),
                QoS::AtLeastOnce,
                true,
                desired.as_str(),
            )
            .await?;

        st.last_command = Some(desired);
        info!(
            "Published alarm command {} (source {})",
            desired.as_str(),
            source.as_str()
        );

        if let Err(e) = self.store.append_alarm_event(source, desired).await {
            error!("Failed to store alarm event: {}", e);
        }

        Ok(())
    }
}
