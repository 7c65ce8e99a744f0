use axum::Router;
use rumqttc::AsyncClient;

use crate::{Config, EventStore, SharedState, Topics};

mod control;
mod health;
mod status;

// ---

/// State shared by all API routes.
#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
    pub state: SharedState,
    pub client: AsyncClient,
    pub topics: Topics,
    pub config: Config,
}

pub fn router(
    store: EventStore,
    state: SharedState,
    client: AsyncClient,
    topics: Topics,
    config: Config,
) -> Router {
    // ---
    Router::new()
        .merge(status::router())
        .merge(control::router())
        .merge(health::router())
        .with_state(AppState {
            store,
            state,
            client,
            topics,
            config,
        })
}
