//! Graph store - concept/document nodes and typed edges on RocksDB
//!
//! Merge-by-identity semantics throughout: node identity is the id,
//! edge identity is the (source, target, type) triple. Upserting an
//! existing identity refreshes mutable fields and is safe to repeat, so
//! build retries and re-runs never duplicate graph content.
//!
//! Relation types are a closed enum. Storage keys are built from
//! `RelationType::as_str()` only — free-text type names never reach a
//! key or query.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rocksdb::{Options, DB};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::analyzer::ConceptKind;

/// Closed set of edge types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Mentions,
    SubjectOf,
    ObjectOf,
    PrepositionalObject,
    CompoundWith,
    CoOccurs,
    RelatedTo,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mentions => "MENTIONS",
            Self::SubjectOf => "SUBJECT_OF",
            Self::ObjectOf => "OBJECT_OF",
            Self::PrepositionalObject => "PREPOSITIONAL_OBJECT",
            Self::CompoundWith => "COMPOUND_WITH",
            Self::CoOccurs => "CO_OCCURS",
            Self::RelatedTo => "RELATED_TO",
        }
    }

    /// Parse an API-supplied type name. Unknown names are rejected at
    /// the boundary, never spliced into storage keys.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "MENTIONS" => Some(Self::Mentions),
            "SUBJECT_OF" => Some(Self::SubjectOf),
            "OBJECT_OF" => Some(Self::ObjectOf),
            "PREPOSITIONAL_OBJECT" => Some(Self::PrepositionalObject),
            "COMPOUND_WITH" => Some(Self::CompoundWith),
            "CO_OCCURS" => Some(Self::CoOccurs),
            "RELATED_TO" => Some(Self::RelatedTo),
            _ => None,
        }
    }
}

/// Mutable edge properties carried alongside the weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeProps {
    pub dependency: Option<String>,
    pub doc_id: Option<String>,
    pub span_start: Option<usize>,
    pub span_end: Option<usize>,
}

/// A concept node in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    pub canonical_key: String,
    pub kind: ConceptKind,
    pub created_at: DateTime<Utc>,
    /// Documents this concept was observed in.
    pub doc_ids: Vec<String>,
}

/// A document node in the graph (provenance anchor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: String,
    pub source_uri: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphNode {
    Concept(ConceptNode),
    Document(DocumentNode),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Concept(c) => &c.id,
            Self::Document(d) => &d.id,
        }
    }

    pub fn label_name(&self) -> &'static str {
        match self {
            Self::Concept(_) => "Concept",
            Self::Document(_) => "Document",
        }
    }
}

/// A typed edge. Identity = (source_id, target_id, relation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub relation: RelationType,
    pub weight: f32,
    pub props: EdgeProps,
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    /// Storage key for the identity triple.
    pub fn key(&self) -> String {
        edge_key(&self.source_id, &self.target_id, self.relation)
    }

    /// Client-facing edge id, stable across calls.
    pub fn display_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.source_id,
            self.target_id,
            self.relation.as_str()
        )
    }
}

pub fn edge_key(source: &str, target: &str, relation: RelationType) -> String {
    format!("{source}|{target}|{}", relation.as_str())
}

/// Lightweight concept record kept in memory for search and QA scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub id: String,
    pub label: String,
    pub canonical_key: String,
    pub kind: ConceptKind,
}

/// Graph-wide statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes_by_label: HashMap<String, usize>,
    pub relationships_by_type: HashMap<String, usize>,
    pub total_nodes: usize,
    pub total_relationships: usize,
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

/// Embedded property graph.
pub struct GraphStore {
    nodes_db: DB,
    edges_db: DB,

    /// node id -> edge keys touching it, rebuilt from edges_db at
    /// startup.
    adjacency: RwLock<HashMap<String, Vec<String>>>,

    /// Concept summaries for substring search and QA scoring.
    concepts: RwLock<HashMap<String, ConceptSummary>>,

    nodes_by_label: RwLock<HashMap<String, usize>>,
    edges_by_type: RwLock<HashMap<String, usize>>,
}

impl GraphStore {
    pub fn new(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let nodes_db = DB::open(&opts, path.join("graph_nodes"))?;
        let edges_db = DB::open(&opts, path.join("graph_edges"))?;

        let mut concepts = HashMap::new();
        let mut nodes_by_label: HashMap<String, usize> = HashMap::new();
        for (_, value) in nodes_db.iterator(rocksdb::IteratorMode::Start).flatten() {
            if let Ok(node) = decode::<GraphNode>(&value) {
                *nodes_by_label
                    .entry(node.label_name().to_string())
                    .or_insert(0) += 1;
                if let GraphNode::Concept(c) = node {
                    concepts.insert(
                        c.id.clone(),
                        ConceptSummary {
                            id: c.id,
                            label: c.label,
                            canonical_key: c.canonical_key,
                            kind: c.kind,
                        },
                    );
                }
            }
        }

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut edges_by_type: HashMap<String, usize> = HashMap::new();
        let mut edge_count = 0usize;
        for (key, value) in edges_db.iterator(rocksdb::IteratorMode::Start).flatten() {
            if let Ok(edge) = decode::<GraphEdge>(&value) {
                let key = String::from_utf8_lossy(&key).to_string();
                adjacency
                    .entry(edge.source_id.clone())
                    .or_default()
                    .push(key.clone());
                adjacency.entry(edge.target_id.clone()).or_default().push(key);
                *edges_by_type
                    .entry(edge.relation.as_str().to_string())
                    .or_insert(0) += 1;
                edge_count += 1;
            }
        }

        let node_count: usize = nodes_by_label.values().sum();
        if node_count > 0 || edge_count > 0 {
            tracing::info!(
                "Loaded graph with {} nodes and {} edges",
                node_count,
                edge_count
            );
        }

        Ok(Self {
            nodes_db,
            edges_db,
            adjacency: RwLock::new(adjacency),
            concepts: RwLock::new(concepts),
            nodes_by_label: RwLock::new(nodes_by_label),
            edges_by_type: RwLock::new(edges_by_type),
        })
    }

    // === Upserts ===

    /// Create-if-absent, else merge: the existing node keeps its
    /// created_at and accumulates contributing doc ids. Returns whether
    /// a node was newly created.
    pub fn upsert_concept(&self, mut node: ConceptNode) -> Result<bool> {
        let created = match self.nodes_db.get(node.id.as_bytes())? {
            Some(value) => {
                if let GraphNode::Concept(existing) = decode::<GraphNode>(&value)? {
                    node.created_at = existing.created_at;
                    let mut doc_ids = existing.doc_ids;
                    for id in node.doc_ids {
                        if !doc_ids.contains(&id) {
                            doc_ids.push(id);
                        }
                    }
                    node.doc_ids = doc_ids;
                }
                false
            }
            None => true,
        };

        self.nodes_db
            .put(node.id.as_bytes(), encode(&GraphNode::Concept(node.clone()))?)?;

        self.concepts.write().insert(
            node.id.clone(),
            ConceptSummary {
                id: node.id.clone(),
                label: node.label,
                canonical_key: node.canonical_key,
                kind: node.kind,
            },
        );

        if created {
            *self
                .nodes_by_label
                .write()
                .entry("Concept".to_string())
                .or_insert(0) += 1;
        }

        Ok(created)
    }

    /// Upsert a document node. Returns whether it was newly created.
    pub fn upsert_document_node(&self, node: DocumentNode) -> Result<bool> {
        let id = node.id.clone();
        let created = self.nodes_db.get(id.as_bytes())?.is_none();

        self.nodes_db
            .put(id.as_bytes(), encode(&GraphNode::Document(node))?)?;

        if created {
            *self
                .nodes_by_label
                .write()
                .entry("Document".to_string())
                .or_insert(0) += 1;
        }

        Ok(created)
    }

    /// Upsert an edge by its identity triple. An existing edge keeps its
    /// created_at; weight and properties are refreshed. Returns whether
    /// the edge was newly created.
    pub fn upsert_edge(&self, mut edge: GraphEdge) -> Result<bool> {
        let key = edge.key();

        let created = match self.edges_db.get(key.as_bytes())? {
            Some(value) => {
                let existing = decode::<GraphEdge>(&value)?;
                edge.created_at = existing.created_at;
                false
            }
            None => true,
        };

        self.edges_db.put(key.as_bytes(), encode(&edge)?)?;

        if created {
            let mut adjacency = self.adjacency.write();
            adjacency
                .entry(edge.source_id.clone())
                .or_default()
                .push(key.clone());
            adjacency.entry(edge.target_id.clone()).or_default().push(key);
            drop(adjacency);

            *self
                .edges_by_type
                .write()
                .entry(edge.relation.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(created)
    }

    // === Reads ===

    pub fn node(&self, id: &str) -> Result<Option<GraphNode>> {
        match self.nodes_db.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    /// All edges touching a node, in either direction.
    pub fn edges_of(&self, node_id: &str) -> Result<Vec<GraphEdge>> {
        let keys = self
            .adjacency
            .read()
            .get(node_id)
            .cloned()
            .unwrap_or_default();

        let mut edges = Vec::with_capacity(keys.len());
        let mut seen = HashSet::new();
        for key in keys {
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(value) = self.edges_db.get(key.as_bytes())? {
                edges.push(decode(&value)?);
            }
        }
        Ok(edges)
    }

    pub fn concept_summaries(&self) -> Vec<ConceptSummary> {
        self.concepts.read().values().cloned().collect()
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.read().len()
    }

    /// Concepts whose label or canonical key contains the query,
    /// case-insensitively. No ordering guarantee; callers sort.
    pub fn matching_concepts(&self, query: &str) -> Vec<ConceptSummary> {
        let query = query.to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.concepts
            .read()
            .values()
            .filter(|c| {
                c.label.to_lowercase().contains(&query) || c.canonical_key.contains(&query)
            })
            .cloned()
            .collect()
    }

    /// Substring concept search: ordered by label ascending, limit
    /// clamped to [1, 50]. An empty query yields an empty result, never
    /// "match everything".
    pub fn search_concepts(&self, query: &str, limit: usize) -> Vec<ConceptSummary> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.clamp(1, crate::constants::MAX_SEARCH_LIMIT);

        let mut matches = self.matching_concepts(query);
        matches.sort_by(|a, b| a.label.cmp(&b.label));
        matches.truncate(limit);
        matches
    }

    /// Document node ids reachable from a concept over MENTIONS edges.
    pub fn documents_mentioning(&self, concept_id: &str) -> Result<Vec<String>> {
        let mut doc_ids = Vec::new();
        for edge in self.edges_of(concept_id)? {
            if edge.relation == RelationType::Mentions {
                let other = if edge.target_id == concept_id {
                    edge.source_id
                } else {
                    edge.target_id
                };
                if !doc_ids.contains(&other) {
                    doc_ids.push(other);
                }
            }
        }
        Ok(doc_ids)
    }

    pub fn summary(&self) -> GraphSummary {
        let nodes_by_label = self.nodes_by_label.read().clone();
        let relationships_by_type = self.edges_by_type.read().clone();
        let total_nodes = nodes_by_label.values().sum();
        let total_relationships = relationships_by_type.values().sum();

        GraphSummary {
            nodes_by_label,
            relationships_by_type,
            total_nodes,
            total_relationships,
        }
    }
}
