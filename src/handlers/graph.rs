//! Graph handlers - build, status, summary, subgraph, node detail,
//! concept search

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SEARCH_LIMIT, LAYOUT_SEED};
use crate::docstore::{JobStatus, SyncStats};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::graph::merge::run_build;
use crate::graph::retrieve::{self, Subgraph, SubgraphRequest};
use crate::graph::store::{ConceptSummary, GraphSummary};
use crate::validation;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BuildRequest {
    pub ingest_job_id: String,
}

#[derive(Debug, Serialize)]
pub struct BuildResponse {
    pub sync_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BuildStatusResponse {
    pub sync_id: String,
    pub status: &'static str,
    pub stats: SyncStats,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/graph/build - Start a graph build for a completed job
pub async fn build_graph(
    State(state): State<AppState>,
    Json(request): Json<BuildRequest>,
) -> Result<(StatusCode, Json<BuildResponse>)> {
    let job = state
        .docs
        .job(&request.ingest_job_id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::JobNotFound(request.ingest_job_id.clone()))?;

    if job.status != JobStatus::Completed {
        return Err(AppError::JobNotCompleted {
            status: job.status.as_str().to_string(),
        });
    }

    let guard = state
        .try_begin_build(&job.id)
        .ok_or_else(|| AppError::BuildInProgress(job.id.clone()))?;

    let sync = state
        .docs
        .create_sync(&job.id)
        .map_err(AppError::Internal)?;

    let sync_id = sync.id.clone();
    let ctx = state.clone();
    let job_id = job.id;
    tokio::task::spawn_blocking(move || {
        run_build(&ctx.docs, &ctx.graph, &ctx.analyzer, &sync.id, &job_id);
        drop(guard);
    });

    Ok((
        StatusCode::CREATED,
        Json(BuildResponse {
            sync_id,
            status: "pending",
        }),
    ))
}

/// GET /api/graph/build/{sync_id} - Graph build status
pub async fn get_build_status(
    State(state): State<AppState>,
    Path(sync_id): Path<String>,
) -> Result<Json<BuildStatusResponse>> {
    let sync = state
        .docs
        .sync(&sync_id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::SyncNotFound(sync_id.clone()))?;

    Ok(Json(BuildStatusResponse {
        sync_id: sync.id,
        status: sync.status.as_str(),
        stats: sync.stats,
        error: sync.error,
        created_at: sync.created_at,
        updated_at: sync.updated_at,
    }))
}

/// GET /api/graph/summary - Node and relationship counts
pub async fn get_graph_summary(State(state): State<AppState>) -> Json<GraphSummary> {
    Json(state.graph.summary())
}

#[derive(Debug, Deserialize)]
pub struct SubgraphBody {
    pub concept_ids: Option<Vec<String>>,
    pub query: Option<String>,
    pub max_hops: Option<usize>,
    pub max_nodes: Option<usize>,
    pub relation_types: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SubgraphResponse {
    #[serde(flatten)]
    pub subgraph: Subgraph,
    pub layout_seed: u64,
}

/// POST /api/graph/subgraph - Bounded subgraph for visualization
pub async fn get_subgraph(
    State(state): State<AppState>,
    Json(body): Json<SubgraphBody>,
) -> Result<Json<SubgraphResponse>> {
    let relation_types = match &body.relation_types {
        Some(names) => {
            Some(validation::parse_relation_types(names).map_validation_err("relation_types")?)
        }
        None => None,
    };

    let request = SubgraphRequest {
        concept_ids: body.concept_ids,
        query: body.query,
        max_hops: body.max_hops.map(validation::clamp_hops),
        max_nodes: body.max_nodes.map(validation::clamp_max_nodes),
        relation_types,
    };

    let subgraph = retrieve::subgraph(&state.graph, &request).map_err(AppError::Internal)?;

    Ok(Json(SubgraphResponse {
        subgraph,
        layout_seed: LAYOUT_SEED,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProvenanceDocument {
    pub id: String,
    pub source_type: &'static str,
    pub source_uri: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Provenance {
    pub documents: Vec<ProvenanceDocument>,
    pub source_count: usize,
}

#[derive(Debug, Serialize)]
pub struct NodeDetailResponse {
    pub node_id: String,
    pub neighbors: Subgraph,
    pub provenance: Provenance,
}

/// GET /api/graph/nodes/{node_id} - Neighbor subgraph plus provenance
pub async fn get_node_details(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeDetailResponse>> {
    state
        .graph
        .node(&node_id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NodeNotFound(node_id.clone()))?;

    let neighbors = retrieve::neighbors(&state.graph, &node_id).map_err(AppError::Internal)?;

    let mut documents = Vec::new();
    for doc_id in state
        .graph
        .documents_mentioning(&node_id)
        .map_err(AppError::Internal)?
    {
        if let Some(doc) = state.docs.document(&doc_id).map_err(AppError::Internal)? {
            documents.push(ProvenanceDocument {
                id: doc.id,
                source_type: match doc.source_type {
                    crate::docstore::SourceType::File => "file",
                    crate::docstore::SourceType::Url => "url",
                },
                source_uri: doc.source_uri,
                created_at: doc.created_at,
            });
        }
    }

    let source_count = documents.len();

    Ok(Json(NodeDetailResponse {
        node_id,
        neighbors,
        provenance: Provenance {
            documents,
            source_count,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub concepts: Vec<ConceptSummary>,
}

/// GET /api/graph/search - Substring concept search
pub async fn search_concepts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let query = params.q.unwrap_or_default();
    let limit = validation::clamp_search_limit(params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));

    Json(SearchResponse {
        concepts: state.graph.search_concepts(&query, limit),
    })
}
