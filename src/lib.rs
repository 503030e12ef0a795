//! Graphmind Library
//!
//! Knowledge-graph construction and question answering over ingested
//! documents.
//!
//! # Pipeline
//! - Ingestion: files and URLs become deduplicated documents
//! - Analysis: rule-based concept and relation extraction from raw text
//! - Merge: idempotent upserts into an embedded property graph
//! - Retrieval: bounded subgraph traversal and substring concept search
//! - QA: lexical concept matching, templated answers, traceable evidence
//!
//! # Storage
//! Everything is embedded RocksDB — no external database. The document
//! store holds documents, jobs, sync records, and QA logs; the graph
//! store holds concept/document nodes and typed edges.

pub mod analyzer;
pub mod auth;
pub mod canonical;
pub mod config;
pub mod constants;
pub mod docstore;
pub mod errors;
pub mod fetch;
pub mod graph;
pub mod handlers;
pub mod ingest;
pub mod qa;
pub mod validation;

// Re-export dependencies to ensure tests use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;
