//! Ingestion job processing
//!
//! Runs in the background after job creation: decodes uploaded files,
//! fetches URL content, deduplicates documents by content hash, and
//! drives the job status machine to a terminal state. One input failing
//! never aborts the batch; the job fails only when every input failed.

use std::sync::Arc;

use tracing::{error, info};

use crate::constants::ERROR_SUMMARY_CAP;
use crate::docstore::{JobStatus, SourceType};
use crate::handlers::state::AppContext;

/// An uploaded file captured from the multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content: String,
}

/// Process one ingestion job to a terminal status.
pub async fn process_ingest_job(
    ctx: Arc<AppContext>,
    job_id: String,
    files: Vec<UploadedFile>,
    urls: Vec<String>,
) {
    if let Err(e) = ctx
        .docs
        .update_job_status(&job_id, JobStatus::Processing, None)
    {
        error!(%job_id, "Failed to mark job processing: {e:#}");
        return;
    }

    let mut processed = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for file in files {
        match ctx
            .docs
            .insert_document(SourceType::File, &file.name, file.content, &job_id)
        {
            Ok((doc, created)) => {
                processed += 1;
                if created {
                    info!(%job_id, doc_id = %doc.id, name = %file.name, "Stored file document");
                } else {
                    info!(%job_id, doc_id = %doc.id, name = %file.name, "Duplicate content, reusing document");
                }
            }
            Err(e) => {
                let msg = format!("Failed to process file {}: {e}", file.name);
                error!(%job_id, "{msg}");
                errors.push(msg);
            }
        }
    }

    for url in urls {
        match ctx.fetcher.fetch_text(&url).await {
            Ok(content) => {
                match ctx
                    .docs
                    .insert_document(SourceType::Url, &url, content, &job_id)
                {
                    Ok((doc, created)) => {
                        processed += 1;
                        if created {
                            info!(%job_id, doc_id = %doc.id, %url, "Stored URL document");
                        } else {
                            info!(%job_id, doc_id = %doc.id, %url, "Duplicate content, reusing document");
                        }
                    }
                    Err(e) => {
                        let msg = format!("Failed to store content from {url}: {e}");
                        error!(%job_id, "{msg}");
                        errors.push(msg);
                    }
                }
            }
            Err(e) => {
                let msg = format!("Failed to fetch {url}: {e}");
                error!(%job_id, "{msg}");
                errors.push(msg);
            }
        }
    }

    let summary = errors
        .iter()
        .take(ERROR_SUMMARY_CAP)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    let result = if !errors.is_empty() && processed == 0 {
        ctx.docs.update_job_status(
            &job_id,
            JobStatus::Failed,
            Some(format!("All inputs failed: {summary}")),
        )
    } else if !errors.is_empty() {
        ctx.docs.update_job_status(
            &job_id,
            JobStatus::Completed,
            Some(format!("Partial success. Errors: {summary}")),
        )
    } else {
        ctx.docs
            .update_job_status(&job_id, JobStatus::Completed, None)
    };

    match result {
        Ok(job) => info!(
            %job_id,
            status = job.status.as_str(),
            documents = processed,
            "Ingestion job finished"
        ),
        Err(e) => error!(%job_id, "Failed to finalize job status: {e:#}"),
    }
}
