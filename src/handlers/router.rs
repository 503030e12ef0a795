//! Router Configuration - Centralized route definitions
//!
//! Routes are organized by domain and split into public (no auth) and
//! protected (bearer token required).

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::auth_middleware;

use super::state::AppState;
use super::{graph, health, ingest, qa};

/// Build the public routes (no authentication required)
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
}

/// Build the protected API routes (bearer token required)
pub fn build_protected_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // INGESTION
        // =================================================================
        .route("/api/ingest/jobs", post(ingest::create_ingest_job))
        .route("/api/ingest/jobs/{job_id}", get(ingest::get_ingest_job))
        // =================================================================
        // GRAPH BUILD & INSPECTION
        // =================================================================
        .route("/api/graph/build", post(graph::build_graph))
        .route("/api/graph/build/{sync_id}", get(graph::get_build_status))
        .route("/api/graph/summary", get(graph::get_graph_summary))
        .route("/api/graph/subgraph", post(graph::get_subgraph))
        .route("/api/graph/nodes/{node_id}", get(graph::get_node_details))
        .route("/api/graph/search", get(graph::search_concepts))
        // =================================================================
        // QUESTION ANSWERING
        // =================================================================
        .route("/api/qa/ask", post(qa::ask_question))
        .route("/api/qa/logs", get(qa::get_qa_logs))
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}

/// Build the complete router: public routes plus auth-protected API
/// routes.
pub fn build_router(state: AppState) -> Router {
    let public = build_public_routes(state.clone());
    let protected = build_protected_routes(state.clone())
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public).merge(protected)
}
