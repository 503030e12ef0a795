//! Health check handler

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::state::AppState;

/// GET /health - Liveness probe with store status
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let summary = state.graph.summary();

    Json(json!({
        "status": "healthy",
        "graph": {
            "total_nodes": summary.total_nodes,
            "total_relationships": summary.total_relationships,
        },
    }))
}
