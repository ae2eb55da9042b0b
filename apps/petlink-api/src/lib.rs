pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod response;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use config::Config;
use db::store::ChatStore;
use gateway::fanout::Dispatcher;
use gateway::server::Liveness;

/// Shared application state available to all route handlers and realtime
/// connections.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub config: Arc<Config>,
    /// Room fanout; built once per process and shared by REST and the socket.
    pub dispatcher: Dispatcher,
    /// Heartbeat timings for realtime connections.
    pub liveness: Liveness,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn ChatStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            dispatcher: Dispatcher::new(),
            liveness: Liveness::default(),
            started_at: Instant::now(),
        }
    }
}

/// Full application router with CORS and request tracing applied.
pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .merge(routes::router())
        .layer(routes::cors(&state.config))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
