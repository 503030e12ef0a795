//! QA handlers - ask a question, list recent interactions
//!
//! Every ask appends exactly one log entry, success or failure. A
//! failure degrades to an apology answer with an error flag instead of
//! propagating the raw error to the caller.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::constants::{DEFAULT_QA_LOG_LIMIT, QA_ERROR_ANSWER};
use crate::docstore::{QaLogEntry, QaStatus};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::qa::engine::{answer_question, Evidence, QaOptions};
use crate::validation;

use super::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AskOptions {
    #[serde(default)]
    pub return_subgraph: bool,
    pub max_hops: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub options: Option<AskOptions>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub evidence: Evidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<crate::graph::retrieve::Subgraph>,
}

/// POST /api/qa/ask - Answer a question against the knowledge graph
pub async fn ask_question(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Response {
    let question = request.question.trim().to_string();
    if let Err(e) = validation::validate_question(&question).map_validation_err("question") {
        return e.into_response();
    }

    let opts = request.options.unwrap_or_default();
    let options = QaOptions {
        max_hops: validation::clamp_hops(opts.max_hops.unwrap_or(2)),
        return_subgraph: opts.return_subgraph,
    };

    let started = Instant::now();
    let outcome = answer_question(&question, options, &state.graph, &state.docs);
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(outcome) => {
            log_interaction(
                &state,
                &question,
                options,
                Some(outcome.answer.clone()),
                &outcome.evidence,
                QaStatus::Ok,
                duration_ms,
                None,
            );

            Json(AskResponse {
                answer: outcome.answer,
                evidence: outcome.evidence,
                subgraph: outcome.subgraph,
            })
            .into_response()
        }
        Err(e) => {
            error!("Question processing failed: {e:#}");
            log_interaction(
                &state,
                &question,
                options,
                None,
                &Evidence::default(),
                QaStatus::Error,
                duration_ms,
                Some(format!("{e:#}")),
            );

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to process question",
                    "answer": QA_ERROR_ANSWER,
                    "evidence": Evidence::default(),
                })),
            )
                .into_response()
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn log_interaction(
    state: &AppState,
    question: &str,
    options: QaOptions,
    answer_text: Option<String>,
    evidence: &Evidence,
    status: QaStatus,
    duration_ms: u64,
    error_text: Option<String>,
) {
    let entry = QaLogEntry {
        id: Uuid::new_v4().to_string(),
        question: question.to_string(),
        max_hops: options.max_hops,
        return_subgraph: options.return_subgraph,
        answer_text,
        node_ids: evidence.node_ids.clone(),
        edge_ids: evidence.edge_ids.clone(),
        document_ids: evidence.document_ids.clone(),
        status,
        duration_ms,
        error: error_text,
        created_at: Utc::now(),
    };

    if let Err(e) = state.docs.append_qa_log(&entry) {
        error!("Failed to append QA log entry: {e:#}");
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EvidenceCounts {
    pub nodes: usize,
    pub edges: usize,
    pub documents: usize,
}

#[derive(Debug, Serialize)]
pub struct QaLogView {
    pub id: String,
    pub question: String,
    pub answer_text: Option<String>,
    pub status: &'static str,
    pub duration_ms: u64,
    pub evidence_counts: EvidenceCounts,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<QaLogView>,
}

/// GET /api/qa/logs - Recent QA interactions, newest first
pub async fn get_qa_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Result<Json<LogsResponse>> {
    let limit = validation::clamp_qa_log_limit(params.limit.unwrap_or(DEFAULT_QA_LOG_LIMIT));

    let logs = state
        .docs
        .recent_qa_logs(limit)
        .map_err(AppError::Internal)?
        .into_iter()
        .map(|entry| QaLogView {
            id: entry.id,
            question: entry.question,
            answer_text: entry.answer_text,
            status: entry.status.as_str(),
            duration_ms: entry.duration_ms,
            evidence_counts: EvidenceCounts {
                nodes: entry.node_ids.len(),
                edges: entry.edge_ids.len(),
                documents: entry.document_ids.len(),
            },
            created_at: entry.created_at,
        })
        .collect();

    Ok(Json(LogsResponse { logs }))
}
