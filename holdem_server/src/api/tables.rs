//! Read-only directory endpoints.

use super::AppState;
use axum::extract::State;
use axum::Json;
use holdem::table::TableSummary;
use serde_json::{json, Value};

/// `GET /health`: process liveness plus a database probe when one is
/// configured.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.pg {
        Some(pg) => match pg.health_check().await {
            Ok(()) => "ok",
            Err(_) => "error",
        },
        None => "mock",
    };
    Json(json!({
        "status": "ok",
        "tables": state.registry.table_count().await,
        "sessions": state.sessions.session_count().await,
        "database": database,
        "defaultBuyIn": state.config.default_buy_in,
    }))
}

/// `GET /tables`: public summaries from the registry.
pub async fn list_tables(State(state): State<AppState>) -> Json<Vec<TableSummary>> {
    Json(state.registry.list().await)
}
