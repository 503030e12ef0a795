//! Ingestion handlers
//!
//! Job creation accepts multipart uploads (repeated `files` parts plus a
//! `urls` part holding a JSON array) and spawns background processing;
//! callers poll the status endpoint until they observe a terminal
//! status.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::docstore::{IngestInput, SourceType};
use crate::errors::{AppError, Result};
use crate::fetch::ContentFetcher;
use crate::ingest::{process_ingest_job, UploadedFile};

use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status: &'static str,
    pub total_bytes: u64,
    pub inputs_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: &'static str,
    pub inputs: Vec<IngestInput>,
    pub total_bytes: u64,
    pub documents_count: usize,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/ingest/jobs - Create an ingestion job from files and URLs
pub async fn create_ingest_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateJobResponse>)> {
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut urls: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::InvalidInput {
            field: "multipart".to_string(),
            reason: e.to_string(),
        }
    })? {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("files") => {
                let name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload.txt")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::InvalidInput {
                    field: "files".to_string(),
                    reason: e.to_string(),
                })?;
                files.push(UploadedFile {
                    name,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Some("urls") => {
                let raw = field.text().await.map_err(|e| AppError::InvalidInput {
                    field: "urls".to_string(),
                    reason: e.to_string(),
                })?;
                if !raw.trim().is_empty() {
                    urls = serde_json::from_str(&raw).map_err(|_| AppError::InvalidInput {
                        field: "urls".to_string(),
                        reason: "must be a valid JSON array of strings".to_string(),
                    })?;
                }
            }
            _ => {}
        }
    }

    if files.is_empty() && urls.is_empty() {
        return Err(AppError::InvalidInput {
            field: "payload".to_string(),
            reason: "no files or URLs provided".to_string(),
        });
    }

    let mut total_bytes = 0u64;
    let mut inputs = Vec::with_capacity(files.len() + urls.len());

    for file in &files {
        let byte_size = file.content.len() as u64;
        total_bytes += byte_size;
        inputs.push(IngestInput {
            source_type: SourceType::File,
            name: file.name.clone(),
            byte_size,
        });
    }

    for url in &urls {
        let byte_size = if ContentFetcher::is_valid_url(url) {
            state.fetcher.estimate_size(url).await
        } else {
            warn!(%url, "Invalid URL in ingestion payload");
            0
        };
        total_bytes += byte_size;
        inputs.push(IngestInput {
            source_type: SourceType::Url,
            name: url.clone(),
            byte_size,
        });
    }

    if total_bytes > state.config.max_content_length {
        return Err(AppError::PayloadTooLarge {
            size: total_bytes,
            max: state.config.max_content_length,
        });
    }

    let job = state
        .docs
        .create_job(inputs, total_bytes)
        .map_err(AppError::Internal)?;

    let inputs_count = job.inputs.len();
    let job_id = job.id.clone();
    tokio::spawn(process_ingest_job(state.clone(), job.id, files, urls));

    Ok((
        StatusCode::CREATED,
        Json(CreateJobResponse {
            job_id,
            status: "queued",
            total_bytes,
            inputs_count,
        }),
    ))
}

/// GET /api/ingest/jobs/{job_id} - Ingestion job status and manifest
pub async fn get_ingest_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>> {
    let job = state
        .docs
        .job(&job_id)
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::JobNotFound(job_id.clone()))?;

    let documents_count = state.docs.document_count_for_job(&job.id);

    Ok(Json(JobStatusResponse {
        job_id: job.id,
        status: job.status.as_str(),
        inputs: job.inputs,
        total_bytes: job.total_bytes,
        documents_count,
        error: job.error,
        created_at: job.created_at,
        updated_at: job.updated_at,
    }))
}
