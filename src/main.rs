//! Application entry point for the `codemetal-roomsentry` controller.
//!
//! This binary orchestrates the full startup sequence for the server-room
//! alarm service, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a SQLite connection pool
//! - Creating the database schema if it does not exist
//! - Mounting the reporting API via the `routes` gateway (EMBP pattern)
//! - Driving the MQTT event loop that feeds the alarm state machine
//!
//! # Environment Variables
//! - `MQTT_BROKER` / `MQTT_PORT` / `MQTT_USERNAME` / `MQTT_PASSWORD`
//!   (optional) – broker location and credentials
//! - `TEMP_THRESHOLD` (optional) – alarm threshold in °C (default: 24.0)
//! - `DB_PATH` (optional) – SQLite file path (default: `sensors.db`)
//! - `ROOMSENTRY_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `ROOMSENTRY_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP) by
//! delegating schema setup to `schema`, configuration parsing to `config`,
//! message decoding and alarm decisions to `controller`, and route
//! registration to `routes`.
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::RwLock;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod config;
mod controller;
mod models;
mod mqtt;
mod projection;
mod routes;
mod schema;
mod store;

pub use config::Config;
pub use controller::{Controller, ControllerState, InboundEvent, SharedState};

// Some of these are not used here but they are re-exported for the sibling
// modules, that way refactoring is easier since store/controller/routes only
// know their parent module (main.rs), not each other's files.
pub use models::{
    normalize_alarm, AlarmCommand, AlarmSource, AlarmState, ControlRequest, Measurement,
};
pub use mqtt::Topics;
pub use projection::system_snapshot;
pub use store::EventStore;

// ---

/// Delay before re-polling the MQTT event loop after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to open database: {}", cfg.db_url());

    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database '{}': {}", cfg.db_url(), e))?;

    tracing::info!("Successfully opened database");

    schema::create_schema(&pool).await?;
    let store = EventStore::new(pool);

    let state: SharedState = Arc::new(RwLock::new(ControllerState::new()));
    let topics = Topics::new(&cfg.topic_prefix);

    let (client, eventloop) = AsyncClient::new(mqtt::mqtt_options(&cfg, &topics), 64);

    let controller = Controller::new(
        state.clone(),
        store.clone(),
        client.clone(),
        topics.clone(),
        cfg.temp_threshold,
    );

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(
        store.clone(),
        state.clone(),
        client.clone(),
        topics.clone(),
        cfg.clone(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Reporting API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Reporting API server error: {}", e);
        }
    });

    run_event_loop(eventloop, controller, client, topics).await
}

// ---

/// Drive the MQTT connection until shutdown.
///
/// Poll errors are retried with a fixed delay; the client re-establishes the
/// session on the next poll, and every connection acknowledgement re-declares
/// liveness plus the subscription set. Controller state survives reconnects
/// untouched.
async fn run_event_loop(
    mut eventloop: rumqttc::EventLoop,
    controller: Controller,
    client: AsyncClient,
    topics: Topics,
) -> Result<()> {
    // ---
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, going offline");
                let _ = client
                    .publish(
                        topics.controller_status.as_str(),
                        QoS::AtLeastOnce,
                        true,
                        "offline",
                    )
                    .await;
                let _ = client.disconnect().await;

                // Drain the event loop so the offline publish and the
                // disconnect reach the wire before the process exits
                for _ in 0..16 {
                    match eventloop.poll().await {
                        Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                return Ok(());
            }
            polled = eventloop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Connected to MQTT broker");
                    if let Err(e) = mqtt::announce_session(&client, &topics).await {
                        tracing::error!("Failed to announce session: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(event) =
                        InboundEvent::from_message(&topics, &publish.topic, &publish.payload)
                    {
                        if let Err(e) = controller.apply(event).await {
                            tracing::error!("Failed to handle {:?}: {}", event, e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        "MQTT connection error: {} - retrying in {:?}",
                        e,
                        RECONNECT_DELAY
                    );
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
        }
    }
}

/// Resolve when the process is asked to stop (SIGINT, or SIGTERM on unix).
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `ROOMSENTRY_SPAN_EVENTS` env
///   var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `ROOMSENTRY_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("ROOMSENTRY_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to ROOMSENTRY_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ROOMSENTRY_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,rumqttc=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
