//! HTTP/WebSocket surface: the read-only directory endpoints and the
//! real-time game channel.

mod tables;
mod websocket;

use crate::config::ServerConfig;
use axum::routing::get;
use axum::Router;
use holdem::ledger::PgLedger;
use holdem::session::SessionManager;
use holdem::social::SocialHub;
use holdem::table::TableRegistry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub registry: Arc<TableRegistry>,
    pub social: Arc<SocialHub>,
    /// Kept for the health probe; `None` in mock mode.
    pub pg: Option<PgLedger>,
    pub config: ServerConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(tables::health))
        .route("/tables", get(tables::list_tables))
        .route("/ws", get(websocket::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
