//! Collection-bot HTTP server (Axum).
//!
//! Receives chat webhooks, runs them through the conversation service and
//! answers with the agent's reply. Also exposes health and a read-only
//! session listing.

pub mod cli;
pub mod error;
pub mod routes;
pub mod schema;
pub mod state;
pub mod telemetry;

use axum::Router;
use state::AppState;
use tower_http::trace::TraceLayer;

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::webhook_routes())
        .merge(routes::session_routes())
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
