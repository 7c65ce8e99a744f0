//! Manual alarm override endpoint.
//!
//! The handler publishes the operator's request to the control topic instead
//! of touching controller state directly, so the state machine stays the
//! single decision point and the override is recorded like any other manual
//! command.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use rumqttc::QoS;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::AlarmCommand;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/alarm", post(handler))
}

/// Request body for the override endpoint.
#[derive(Debug, Deserialize)]
pub struct AlarmRequest {
    on: bool,
}

async fn handler(State(app): State<AppState>, Json(body): Json<AlarmRequest>) -> impl IntoResponse {
    // ---
    let command = if body.on {
        AlarmCommand::On
    } else {
        AlarmCommand::Off
    };
    info!("POST /api/alarm - requesting {}", command.as_str());

    match app
        .client
        .publish(
            app.topics.control.as_str(),
            QoS::AtLeastOnce,
            false,
            command.as_str(),
        )
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "sent", "state": command.as_str() })),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to publish control command: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to publish control command"),
            )
                .into_response()
        }
    }
}
