//! Bounded subgraph retrieval
//!
//! Seeds come from explicit concept ids (which take precedence), a
//! free-text substring query, or — with neither — a broad sample of the
//! graph. Traversal walks both edge directions up to a clamped hop
//! limit and truncates at a clamped node cap. Truncation follows store
//! enumeration order, so results for over-cap graphs are not guaranteed
//! stable across calls.

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::analyzer::ConceptKind;
use crate::constants::{
    DEFAULT_SUBGRAPH_HOPS, DEFAULT_SUBGRAPH_NODES, MAX_SUBGRAPH_HOPS, MAX_SUBGRAPH_NODES,
};
use crate::graph::store::{EdgeProps, GraphNode, GraphStore, RelationType};

/// Retrieval parameters. Out-of-range limits are clamped, not rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubgraphRequest {
    pub concept_ids: Option<Vec<String>>,
    pub query: Option<String>,
    pub max_hops: Option<usize>,
    pub max_nodes: Option<usize>,
    pub relation_types: Option<Vec<RelationType>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphNode {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub kind: Option<ConceptKind>,
    pub canonical_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubgraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub weight: f32,
    pub props: EdgeProps,
}

/// De-duplicated nodes and edges, size-bounded by the node cap.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<SubgraphNode>,
    pub edges: Vec<SubgraphEdge>,
}

/// Retrieve a bounded subgraph.
pub fn subgraph(store: &GraphStore, request: &SubgraphRequest) -> Result<Subgraph> {
    let max_hops = request
        .max_hops
        .unwrap_or(DEFAULT_SUBGRAPH_HOPS)
        .min(MAX_SUBGRAPH_HOPS);
    let max_nodes = request
        .max_nodes
        .unwrap_or(DEFAULT_SUBGRAPH_NODES)
        .clamp(1, MAX_SUBGRAPH_NODES);

    let seeds = seed_ids(store, request, max_nodes);

    // Seed nodes are always included, even with no relationships
    let mut included: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    for id in seeds {
        if visited.insert(id.clone()) {
            included.push(id);
        }
        if included.len() >= max_nodes {
            break;
        }
    }

    let allowed = request.relation_types.as_deref();
    let mut frontier = included.clone();

    'expand: for _hop in 0..max_hops {
        let mut next_frontier = Vec::new();

        for node_id in &frontier {
            for edge in store.edges_of(node_id)? {
                if included.len() >= max_nodes {
                    break 'expand;
                }
                if !relation_allowed(allowed, edge.relation) {
                    continue;
                }

                let other = if edge.source_id == *node_id {
                    edge.target_id.clone()
                } else {
                    edge.source_id.clone()
                };

                if visited.insert(other.clone()) {
                    included.push(other.clone());
                    next_frontier.push(other);
                }
            }
        }

        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    build_subgraph(store, &included, allowed)
}

/// One-hop neighborhood of a single node.
pub fn neighbors(store: &GraphStore, node_id: &str) -> Result<Subgraph> {
    subgraph(
        store,
        &SubgraphRequest {
            concept_ids: Some(vec![node_id.to_string()]),
            max_hops: Some(1),
            ..Default::default()
        },
    )
}

fn seed_ids(store: &GraphStore, request: &SubgraphRequest, max_nodes: usize) -> Vec<String> {
    if let Some(ids) = request
        .concept_ids
        .as_ref()
        .filter(|ids| !ids.is_empty())
    {
        return ids.clone();
    }

    if let Some(query) = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        return store
            .matching_concepts(query)
            .into_iter()
            .map(|c| c.id)
            .collect();
    }

    // Broad sample in store enumeration order
    store
        .concept_summaries()
        .into_iter()
        .take(max_nodes)
        .map(|c| c.id)
        .collect()
}

fn relation_allowed(allowed: Option<&[RelationType]>, relation: RelationType) -> bool {
    match allowed {
        Some(types) => types.contains(&relation),
        None => true,
    }
}

/// Materialize nodes and the de-duplicated edge set among them.
fn build_subgraph(
    store: &GraphStore,
    included: &[String],
    allowed: Option<&[RelationType]>,
) -> Result<Subgraph> {
    let id_set: HashSet<&str> = included.iter().map(String::as_str).collect();

    let mut nodes = Vec::with_capacity(included.len());
    for id in included {
        if let Some(node) = store.node(id)? {
            nodes.push(to_subgraph_node(node));
        }
    }

    let mut edges = Vec::new();
    let mut seen_edges: HashSet<String> = HashSet::new();
    for id in included {
        for edge in store.edges_of(id)? {
            if !relation_allowed(allowed, edge.relation) {
                continue;
            }
            if !id_set.contains(edge.source_id.as_str())
                || !id_set.contains(edge.target_id.as_str())
            {
                continue;
            }
            if !seen_edges.insert(edge.key()) {
                continue;
            }
            edges.push(SubgraphEdge {
                id: edge.display_id(),
                source: edge.source_id,
                target: edge.target_id,
                edge_type: edge.relation.as_str().to_string(),
                weight: edge.weight,
                props: edge.props,
            });
        }
    }

    Ok(Subgraph { nodes, edges })
}

fn to_subgraph_node(node: GraphNode) -> SubgraphNode {
    match node {
        GraphNode::Concept(c) => SubgraphNode {
            id: c.id,
            label: c.label,
            node_type: "Concept".to_string(),
            kind: Some(c.kind),
            canonical_key: Some(c.canonical_key),
        },
        GraphNode::Document(d) => SubgraphNode {
            id: d.id,
            label: d.source_uri,
            node_type: "Document".to_string(),
            kind: None,
            canonical_key: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{ConceptNode, GraphEdge};
    use chrono::Utc;
    use tempfile::TempDir;

    fn setup_chain(len: usize) -> (GraphStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = GraphStore::new(temp.path()).expect("graph store");

        for i in 0..len {
            store
                .upsert_concept(ConceptNode {
                    id: format!("c{i}"),
                    label: format!("Concept {i}"),
                    canonical_key: format!("concept {i}"),
                    kind: ConceptKind::Keyword,
                    created_at: Utc::now(),
                    doc_ids: Vec::new(),
                })
                .unwrap();
        }
        for i in 0..len.saturating_sub(1) {
            store
                .upsert_edge(GraphEdge {
                    source_id: format!("c{i}"),
                    target_id: format!("c{}", i + 1),
                    relation: RelationType::RelatedTo,
                    weight: 1.0,
                    props: EdgeProps::default(),
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        (store, temp)
    }

    #[test]
    fn test_hop_limit_bounds_traversal() {
        let (store, _temp) = setup_chain(10);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec!["c0".to_string()]),
                max_hops: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        // c0 + 2 hops along the chain
        assert_eq!(result.nodes.len(), 3);
    }

    #[test]
    fn test_hops_clamped_to_three() {
        let (store, _temp) = setup_chain(10);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec!["c0".to_string()]),
                max_hops: Some(50),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.nodes.len(), 4);
    }

    #[test]
    fn test_node_cap_clamped() {
        let (store, _temp) = setup_chain(250);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                max_nodes: Some(5_000),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(result.nodes.len() <= MAX_SUBGRAPH_NODES);
    }

    #[test]
    fn test_isolated_seed_included() {
        let temp = TempDir::new().unwrap();
        let store = GraphStore::new(temp.path()).unwrap();
        store
            .upsert_concept(ConceptNode {
                id: "lonely".to_string(),
                label: "Lonely".to_string(),
                canonical_key: "lonely".to_string(),
                kind: ConceptKind::Keyword,
                created_at: Utc::now(),
                doc_ids: Vec::new(),
            })
            .unwrap();

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec!["lonely".to_string()]),
                max_hops: Some(3),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_explicit_ids_take_precedence_over_query() {
        let (store, _temp) = setup_chain(5);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec!["c4".to_string()]),
                query: Some("Concept 0".to_string()),
                max_hops: Some(0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "c4");
    }

    #[test]
    fn test_relation_type_allow_list() {
        let (store, _temp) = setup_chain(3);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec!["c0".to_string()]),
                max_hops: Some(3),
                relation_types: Some(vec![RelationType::CoOccurs]),
                ..Default::default()
            },
        )
        .unwrap();

        // The chain is RELATED_TO only, so nothing is traversable
        assert_eq!(result.nodes.len(), 1);
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_query_seeds_by_substring() {
        let (store, _temp) = setup_chain(5);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                query: Some("concept 2".to_string()),
                max_hops: Some(0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "c2");
    }

    #[test]
    fn test_edges_deduplicated() {
        let (store, _temp) = setup_chain(3);

        let result = subgraph(
            &store,
            &SubgraphRequest {
                concept_ids: Some(vec![
                    "c0".to_string(),
                    "c1".to_string(),
                    "c2".to_string(),
                ]),
                max_hops: Some(1),
                ..Default::default()
            },
        )
        .unwrap();

        let mut keys: Vec<&str> = result.edges.iter().map(|e| e.id.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), result.edges.len());
    }
}
