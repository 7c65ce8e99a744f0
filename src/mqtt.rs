//! MQTT wiring: topic layout, client options, and the connection-time
//! announcement shared by first connect and every reconnect.

use std::time::Duration;

use anyhow::Result;
use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use tracing::info;

use crate::Config;

// ---

/// Topic layout rooted at the configured prefix.
#[derive(Debug, Clone)]
pub struct Topics {
    /// Inbound: decimal temperature readings from the sensor node.
    pub temperature: String,
    /// Inbound: decimal humidity readings from the sensor node.
    pub humidity: String,
    /// Inbound: operator commands (`ON`/`OFF`/`AUTO`).
    pub control: String,
    /// Outbound: deduplicated alarm commands, retained.
    pub alarm_command: String,
    /// Inbound: actuator feedback (`ON`/`OFF`).
    pub alarm_state: String,
    /// Outbound: controller liveness (`online`/`offline`), retained.
    pub controller_status: String,
    /// Inbound: sensor node liveness (`online`/`offline`).
    pub node_status: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        // ---
        Topics {
            temperature: format!("{prefix}/sensor/temperature"),
            humidity: format!("{prefix}/sensor/humidity"),
            control: format!("{prefix}/control/alarm"),
            alarm_command: format!("{prefix}/alarm/cmd"),
            alarm_state: format!("{prefix}/alarm/state"),
            controller_status: format!("{prefix}/status/controller"),
            node_status: format!("{prefix}/status/node"),
        }
    }

    /// The topics the controller subscribes to.
    pub fn subscriptions(&self) -> [&str; 5] {
        // ---
        [
            &self.temperature,
            &self.humidity,
            &self.control,
            &self.alarm_state,
            &self.node_status,
        ]
    }
}

// ---

/// Build client options from the configuration: identity, keep-alive,
/// credentials when a username is set, and a retained last-will `offline`
/// marker so peers see an ungraceful exit.
pub fn mqtt_options(cfg: &Config, topics: &Topics) -> MqttOptions {
    // ---
    let mut opts = MqttOptions::new(
        cfg.mqtt_client_id.as_str(),
        cfg.mqtt_host.as_str(),
        cfg.mqtt_port,
    );
    opts.set_keep_alive(Duration::from_secs(cfg.mqtt_keepalive));

    if !cfg.mqtt_username.is_empty() {
        opts.set_credentials(cfg.mqtt_username.as_str(), cfg.mqtt_password.as_str());
    }

    opts.set_last_will(LastWill::new(
        topics.controller_status.as_str(),
        b"offline".to_vec(),
        QoS::AtLeastOnce,
        true,
    ));

    opts
}

/// Declare liveness and (re)establish the subscription set.
///
/// Called on every connection acknowledgement, so a broker reconnect restores
/// the same session shape without touching controller state.
pub async fn announce_session(client: &AsyncClient, topics: &Topics) -> Result<()> {
    // ---
    client
        .publish(
            topics.controller_status.as_str(),
            QoS::AtLeastOnce,
            true,
            "online",
        )
        .await?;

    for topic in topics.subscriptions() {
        client.subscribe(topic, QoS::AtLeastOnce).await?;
    }

    info!(
        "Announced online, subscribed to {} topics",
        topics.subscriptions().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_topic_layout() {
        // ---
        let topics = Topics::new("server_room");

        assert_eq!(topics.temperature, "server_room/sensor/temperature");
        assert_eq!(topics.humidity, "server_room/sensor/humidity");
        assert_eq!(topics.control, "server_room/control/alarm");
        assert_eq!(topics.alarm_command, "server_room/alarm/cmd");
        assert_eq!(topics.alarm_state, "server_room/alarm/state");
        assert_eq!(topics.controller_status, "server_room/status/controller");
        assert_eq!(topics.node_status, "server_room/status/node");
    }

    #[test]
    fn test_subscriptions_exclude_outbound_topics() {
        // ---
        let topics = Topics::new("server_room");
        let subs = topics.subscriptions();

        assert_eq!(subs.len(), 5);
        assert!(subs.contains(&topics.control.as_str()));
        assert!(subs.contains(&topics.alarm_state.as_str()));
        assert!(!subs.contains(&topics.alarm_command.as_str()));
        assert!(!subs.contains(&topics.controller_status.as_str()));
    }
}
