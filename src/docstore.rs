//! Document store - documents, ingest jobs, sync records, and QA logs
//!
//! Embedded RocksDB storage, one database per collection. Document
//! identity is the content hash: re-ingesting identical content returns
//! the existing record instead of creating a second one. Job and sync
//! status enums own their transition rules — forward-only, terminal at
//! completed/failed — and the store rejects invalid transitions.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rocksdb::{Options, DB};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::MAX_QA_LOG_LIMIT;

/// Where a document's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Url,
}

/// Ingestion job lifecycle. Forward-only; completed and failed are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Processing | Self::Completed | Self::Failed),
            Self::Processing => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

/// Graph build lifecycle. Forward-only; completed and failed are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_advance_to(&self, next: SyncStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Completed | Self::Failed),
            Self::InProgress => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

/// One entry in an ingestion job's input manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestInput {
    pub source_type: SourceType,
    pub name: String,
    pub byte_size: u64,
}

/// A stored document. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source_type: SourceType,
    pub source_uri: String,
    pub content_hash: String,
    pub text: String,
    pub byte_size: u64,
    pub ingest_job_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: String,
    pub status: JobStatus,
    pub inputs: Vec<IngestInput>,
    pub total_bytes: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate statistics for one graph build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub nodes_created: usize,
    pub edges_created: usize,
    pub concepts_merged: usize,
    pub documents_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSync {
    pub id: String,
    pub ingest_job_id: String,
    pub status: SyncStatus,
    pub stats: SyncStats,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Ok,
    Error,
}

impl QaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Append-only record of one question/answer interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaLogEntry {
    pub id: String,
    pub question: String,
    pub max_hops: usize,
    pub return_subgraph: bool,
    pub answer_text: Option<String>,
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    pub document_ids: Vec<String>,
    pub status: QaStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Content hash used as the document dedup identity.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(
        value,
        bincode::config::standard(),
    )?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::serde::decode_from_slice(bytes, bincode::config::standard())?.0)
}

/// Persistent store for documents, jobs, syncs, and QA logs.
pub struct DocumentStore {
    documents_db: DB,
    doc_hash_db: DB,
    jobs_db: DB,
    syncs_db: DB,
    qa_logs_db: DB,

    /// In-memory job -> document ids index, rebuilt from documents_db at
    /// startup.
    doc_job_index: RwLock<HashMap<String, Vec<String>>>,
}

impl DocumentStore {
    pub fn new(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let documents_db = DB::open(&opts, path.join("documents"))?;
        let doc_hash_db = DB::open(&opts, path.join("documents_by_hash"))?;
        let jobs_db = DB::open(&opts, path.join("ingest_jobs"))?;
        let syncs_db = DB::open(&opts, path.join("graph_syncs"))?;
        let qa_logs_db = DB::open(&opts, path.join("qa_logs"))?;

        let mut doc_job_index: HashMap<String, Vec<String>> = HashMap::new();
        let mut document_count = 0usize;
        for (_, value) in documents_db.iterator(rocksdb::IteratorMode::Start).flatten() {
            if let Ok(doc) = decode::<Document>(&value) {
                doc_job_index
                    .entry(doc.ingest_job_id.clone())
                    .or_default()
                    .push(doc.id.clone());
                document_count += 1;
            }
        }

        if document_count > 0 {
            tracing::info!("Loaded document store with {} documents", document_count);
        }

        Ok(Self {
            documents_db,
            doc_hash_db,
            jobs_db,
            syncs_db,
            qa_logs_db,
            doc_job_index: RwLock::new(doc_job_index),
        })
    }

    // === Documents ===

    /// Insert a document, deduplicating by content hash. Returns the
    /// stored document and whether it was newly created.
    pub fn insert_document(
        &self,
        source_type: SourceType,
        source_uri: &str,
        text: String,
        ingest_job_id: &str,
    ) -> Result<(Document, bool)> {
        let hash = content_hash(&text);

        if let Some(existing_id) = self.doc_hash_db.get(hash.as_bytes())? {
            let id = String::from_utf8_lossy(&existing_id).to_string();
            if let Some(doc) = self.document(&id)? {
                return Ok((doc, false));
            }
            // Stale hash entry - document missing from the primary DB;
            // fall through and recreate
            tracing::warn!("Stale hash index entry for {hash}, recreating document");
        }

        let now = Utc::now();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            source_type,
            source_uri: source_uri.to_string(),
            content_hash: hash.clone(),
            byte_size: text.len() as u64,
            text,
            ingest_job_id: ingest_job_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.doc_hash_db.put(hash.as_bytes(), doc.id.as_bytes())?;
        self.documents_db.put(doc.id.as_bytes(), encode(&doc)?)?;
        self.doc_job_index
            .write()
            .entry(ingest_job_id.to_string())
            .or_default()
            .push(doc.id.clone());

        Ok((doc, true))
    }

    pub fn document(&self, id: &str) -> Result<Option<Document>> {
        match self.documents_db.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn document_by_hash(&self, hash: &str) -> Result<Option<Document>> {
        match self.doc_hash_db.get(hash.as_bytes())? {
            Some(id) => self.document(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn documents_for_job(&self, job_id: &str) -> Result<Vec<Document>> {
        let ids = self
            .doc_job_index
            .read()
            .get(job_id)
            .cloned()
            .unwrap_or_default();

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.document(&id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    pub fn document_count_for_job(&self, job_id: &str) -> usize {
        self.doc_job_index
            .read()
            .get(job_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    // === Ingest jobs ===

    pub fn create_job(&self, inputs: Vec<IngestInput>, total_bytes: u64) -> Result<IngestJob> {
        let now = Utc::now();
        let job = IngestJob {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            inputs,
            total_bytes,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.jobs_db.put(job.id.as_bytes(), encode(&job)?)?;
        Ok(job)
    }

    pub fn job(&self, id: &str) -> Result<Option<IngestJob>> {
        match self.jobs_db.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Advance a job's status. Rejects backward or out-of-terminal
    /// transitions.
    pub fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<IngestJob> {
        let mut job = self
            .job(id)?
            .ok_or_else(|| anyhow!("ingest job not found: {id}"))?;

        if !job.status.can_advance_to(status) {
            bail!(
                "invalid job transition {} -> {}",
                job.status.as_str(),
                status.as_str()
            );
        }

        job.status = status;
        if error.is_some() {
            job.error = error;
        }
        job.updated_at = Utc::now();

        self.jobs_db.put(job.id.as_bytes(), encode(&job)?)?;
        Ok(job)
    }

    // === Graph syncs ===

    pub fn create_sync(&self, ingest_job_id: &str) -> Result<GraphSync> {
        let now = Utc::now();
        let sync = GraphSync {
            id: Uuid::new_v4().to_string(),
            ingest_job_id: ingest_job_id.to_string(),
            status: SyncStatus::Pending,
            stats: SyncStats::default(),
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.syncs_db.put(sync.id.as_bytes(), encode(&sync)?)?;
        Ok(sync)
    }

    pub fn sync(&self, id: &str) -> Result<Option<GraphSync>> {
        match self.syncs_db.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Advance a sync's status, optionally attaching final stats and an
    /// error summary. Rejects invalid transitions.
    pub fn update_sync(
        &self,
        id: &str,
        status: SyncStatus,
        stats: Option<SyncStats>,
        error: Option<String>,
    ) -> Result<GraphSync> {
        let mut sync = self
            .sync(id)?
            .ok_or_else(|| anyhow!("graph sync not found: {id}"))?;

        if !sync.status.can_advance_to(status) {
            bail!(
                "invalid sync transition {} -> {}",
                sync.status.as_str(),
                status.as_str()
            );
        }

        sync.status = status;
        if let Some(stats) = stats {
            sync.stats = stats;
        }
        if error.is_some() {
            sync.error = error;
        }
        sync.updated_at = Utc::now();

        self.syncs_db.put(sync.id.as_bytes(), encode(&sync)?)?;
        Ok(sync)
    }

    // === QA logs ===

    /// Append one QA interaction. Entries are keyed newest-first and
    /// never updated.
    pub fn append_qa_log(&self, entry: &QaLogEntry) -> Result<()> {
        let nanos = entry.created_at.timestamp_nanos_opt().unwrap_or(0).max(0) as u64;
        let mut key = Vec::with_capacity(8 + entry.id.len());
        key.extend_from_slice(&(u64::MAX - nanos).to_be_bytes());
        key.extend_from_slice(entry.id.as_bytes());

        self.qa_logs_db.put(key, encode(entry)?)?;
        Ok(())
    }

    /// Most recent QA interactions, newest first. The limit is clamped
    /// to [1, 100].
    pub fn recent_qa_logs(&self, limit: usize) -> Result<Vec<QaLogEntry>> {
        let limit = limit.clamp(1, MAX_QA_LOG_LIMIT);
        let mut entries = Vec::with_capacity(limit);

        for (_, value) in self.qa_logs_db.iterator(rocksdb::IteratorMode::Start).flatten() {
            entries.push(decode::<QaLogEntry>(&value)?);
            if entries.len() >= limit {
                break;
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (DocumentStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = DocumentStore::new(temp.path()).expect("document store");
        (store, temp)
    }

    #[test]
    fn test_document_dedup_by_content_hash() {
        let (store, _temp) = setup();

        let (a, created_a) = store
            .insert_document(SourceType::File, "a.txt", "same content".to_string(), "job1")
            .unwrap();
        let (b, created_b) = store
            .insert_document(SourceType::File, "b.txt", "same content".to_string(), "job1")
            .unwrap();

        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a.id, b.id);
        assert_eq!(store.document_count_for_job("job1"), 1);
    }

    #[test]
    fn test_job_status_forward_only() {
        let (store, _temp) = setup();
        let job = store.create_job(Vec::new(), 0).unwrap();

        store
            .update_job_status(&job.id, JobStatus::Processing, None)
            .unwrap();
        store
            .update_job_status(&job.id, JobStatus::Completed, None)
            .unwrap();

        // Terminal states reject every further transition
        assert!(store
            .update_job_status(&job.id, JobStatus::Processing, None)
            .is_err());
        assert!(store
            .update_job_status(&job.id, JobStatus::Failed, None)
            .is_err());
    }

    #[test]
    fn test_sync_status_transitions() {
        let (store, _temp) = setup();
        let sync = store.create_sync("job1").unwrap();
        assert_eq!(sync.status, SyncStatus::Pending);

        store
            .update_sync(&sync.id, SyncStatus::InProgress, None, None)
            .unwrap();
        let done = store
            .update_sync(
                &sync.id,
                SyncStatus::Completed,
                Some(SyncStats {
                    nodes_created: 3,
                    edges_created: 2,
                    concepts_merged: 1,
                    documents_processed: 2,
                }),
                None,
            )
            .unwrap();

        assert_eq!(done.stats.nodes_created, 3);
        assert!(store
            .update_sync(&sync.id, SyncStatus::InProgress, None, None)
            .is_err());
    }

    #[test]
    fn test_qa_logs_newest_first_and_clamped() {
        let (store, _temp) = setup();

        for i in 0..5 {
            let entry = QaLogEntry {
                id: format!("q{i}"),
                question: format!("question {i}"),
                max_hops: 2,
                return_subgraph: false,
                answer_text: Some("answer".to_string()),
                node_ids: Vec::new(),
                edge_ids: Vec::new(),
                document_ids: Vec::new(),
                status: QaStatus::Ok,
                duration_ms: i,
                error: None,
                created_at: Utc::now() + chrono::Duration::milliseconds(i as i64),
            };
            store.append_qa_log(&entry).unwrap();
        }

        let logs = store.recent_qa_logs(3).unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].question, "question 4");

        // Oversized limits are clamped, not rejected
        let logs = store.recent_qa_logs(10_000).unwrap();
        assert_eq!(logs.len(), 5);
    }

    #[test]
    fn test_documents_survive_restart() {
        let temp = TempDir::new().unwrap();
        {
            let store = DocumentStore::new(temp.path()).unwrap();
            store
                .insert_document(SourceType::File, "a.txt", "hello world".to_string(), "job1")
                .unwrap();
        }

        let store = DocumentStore::new(temp.path()).unwrap();
        assert_eq!(store.document_count_for_job("job1"), 1);
        assert!(store
            .document_by_hash(&content_hash("hello world"))
            .unwrap()
            .is_some());
    }
}
