//! Read-only reporting endpoints: live system snapshot and measurement
//! history. Both answer from the projection layer, so they keep working
//! (with store fallback) right after a controller restart.

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use tracing::{debug, error};

use super::AppState;
use crate::system_snapshot;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/data", get(data_handler))
        .route("/api/measurements", get(measurements_handler))
}

async fn data_handler(State(app): State<AppState>) -> impl IntoResponse {
    // ---
    debug!("GET /api/data");

    let snapshot =
        system_snapshot(&app.state, &app.store, app.config.temp_threshold).await;
    Json(snapshot)
}

/// Query parameters for the measurement history.
#[derive(Debug, Deserialize)]
pub struct MeasurementsQuery {
    limit: Option<u32>,
}

async fn measurements_handler(
    Query(params): Query<MeasurementsQuery>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    // ---
    let limit = params.limit.unwrap_or(50).min(500);
    debug!("GET /api/measurements - limit {}", limit);

    match app.store.recent_measurements(limit).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => {
            error!("Failed to load measurements: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to load measurements"),
            )
                .into_response()
        }
    }
}
