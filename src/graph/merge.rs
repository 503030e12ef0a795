//! Graph Merger - deduplicating merge of analyzer candidates into the
//! graph store
//!
//! Documents of one job are processed sequentially. A failure on one
//! document is caught, logged, and skips only that document; the sync
//! completes as long as at least one document succeeds. Every write is
//! an upsert keyed by stable identity, so re-running a build is a no-op
//! beyond field refresh.

use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{error, info};

use crate::analyzer::TextAnalyzer;
use crate::constants::ERROR_SUMMARY_CAP;
use crate::docstore::{Document, DocumentStore, SyncStats, SyncStatus};
use crate::graph::store::{
    ConceptNode, DocumentNode, EdgeProps, GraphEdge, GraphStore, RelationType,
};

/// Run one graph build to completion, flipping the sync record to a
/// terminal state on the way out. Never panics across the boundary: any
/// unhandled error lands in the sync record as `failed`.
pub fn run_build(
    docs: &DocumentStore,
    graph: &GraphStore,
    analyzer: &TextAnalyzer,
    sync_id: &str,
    job_id: &str,
) {
    if let Err(e) = build_job_graph(docs, graph, analyzer, sync_id, job_id) {
        error!(sync_id, job_id, "Graph build failed: {e:#}");
        if let Err(update_err) =
            docs.update_sync(sync_id, SyncStatus::Failed, None, Some(format!("{e:#}")))
        {
            error!(sync_id, "Failed to record build failure: {update_err:#}");
        }
    }
}

fn build_job_graph(
    docs: &DocumentStore,
    graph: &GraphStore,
    analyzer: &TextAnalyzer,
    sync_id: &str,
    job_id: &str,
) -> Result<()> {
    docs.update_sync(sync_id, SyncStatus::InProgress, None, None)?;

    let documents = docs.documents_for_job(job_id)?;

    let mut stats = SyncStats::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut errors: Vec<String> = Vec::new();

    for doc in &documents {
        match merge_document(graph, analyzer, doc, &mut seen_keys, &mut stats) {
            Ok((concepts, relations)) => {
                stats.documents_processed += 1;
                info!(
                    doc_id = %doc.id,
                    concepts,
                    relations,
                    "Merged document into graph"
                );
            }
            Err(e) => {
                error!(doc_id = %doc.id, "Skipping document: {e:#}");
                errors.push(format!("document {} ({}): {e}", doc.id, doc.source_uri));
            }
        }
    }

    if !documents.is_empty() && stats.documents_processed == 0 {
        bail!("all documents failed: {}", summarize_errors(&errors));
    }

    let error_summary = if errors.is_empty() {
        None
    } else {
        Some(format!("Partial success. Errors: {}", summarize_errors(&errors)))
    };

    docs.update_sync(sync_id, SyncStatus::Completed, Some(stats), error_summary)?;

    info!(
        sync_id,
        job_id,
        nodes_created = stats.nodes_created,
        edges_created = stats.edges_created,
        concepts_merged = stats.concepts_merged,
        documents_processed = stats.documents_processed,
        "Graph build completed"
    );

    Ok(())
}

/// Merge one document's candidates. Returns (concepts, relations) counts
/// for logging.
fn merge_document(
    graph: &GraphStore,
    analyzer: &TextAnalyzer,
    doc: &Document,
    seen_keys: &mut HashSet<String>,
    stats: &mut SyncStats,
) -> Result<(usize, usize)> {
    graph.upsert_document_node(DocumentNode {
        id: doc.id.clone(),
        source_uri: doc.source_uri.clone(),
        content_hash: doc.content_hash.clone(),
    })?;

    let analysis = analyzer.analyze(&doc.text)?;
    let now = Utc::now();

    for candidate in &analysis.concepts {
        // Repeat canonical keys within the job merge instead of creating
        if !seen_keys.insert(candidate.canonical_key.clone()) {
            stats.concepts_merged += 1;
        }

        let created = graph.upsert_concept(ConceptNode {
            id: candidate.id.clone(),
            label: candidate.label.clone(),
            canonical_key: candidate.canonical_key.clone(),
            kind: candidate.kind,
            created_at: now,
            doc_ids: vec![doc.id.clone()],
        })?;
        if created {
            stats.nodes_created += 1;
        }

        // Provenance edge from the owning document, span as properties
        let created = graph.upsert_edge(GraphEdge {
            source_id: doc.id.clone(),
            target_id: candidate.id.clone(),
            relation: RelationType::Mentions,
            weight: 1.0,
            props: EdgeProps {
                dependency: None,
                doc_id: None,
                span_start: candidate.span.map(|s| s.start),
                span_end: candidate.span.map(|s| s.end),
            },
            created_at: now,
        })?;
        if created {
            stats.edges_created += 1;
        }
    }

    for relation in &analysis.relations {
        let created = graph.upsert_edge(GraphEdge {
            source_id: relation.source_id.clone(),
            target_id: relation.target_id.clone(),
            relation: relation.relation,
            weight: relation.weight,
            props: EdgeProps {
                dependency: Some(relation.dependency.clone()),
                doc_id: Some(doc.id.clone()),
                span_start: None,
                span_end: None,
            },
            created_at: now,
        })?;
        if created {
            stats.edges_created += 1;
        }
    }

    Ok((analysis.concepts.len(), analysis.relations.len()))
}

fn summarize_errors(errors: &[String]) -> String {
    errors
        .iter()
        .take(ERROR_SUMMARY_CAP)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ")
}
