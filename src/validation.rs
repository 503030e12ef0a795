//! Input validation for the API surface
//!
//! Out-of-range numeric limits are clamped rather than rejected; only
//! malformed or missing input is an error. Relation type names are
//! validated against the closed enum before they reach any storage key.

use anyhow::{anyhow, Result};

use crate::constants::{
    MAX_QA_LOG_LIMIT, MAX_SEARCH_LIMIT, MAX_SUBGRAPH_HOPS, MAX_SUBGRAPH_NODES,
};
use crate::graph::store::RelationType;

/// Questions longer than this are rejected as malformed input.
pub const MAX_QUESTION_LENGTH: usize = 2_000;

pub fn validate_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(anyhow!("question cannot be empty"));
    }
    if question.len() > MAX_QUESTION_LENGTH {
        return Err(anyhow!(
            "question too long: {} chars (max: {})",
            question.len(),
            MAX_QUESTION_LENGTH
        ));
    }
    Ok(())
}

/// Parse API-supplied relation type names into the closed enum. Unknown
/// names are rejected.
pub fn parse_relation_types(names: &[String]) -> Result<Vec<RelationType>> {
    names
        .iter()
        .map(|name| {
            RelationType::parse(name)
                .ok_or_else(|| anyhow!("unknown relation type: {name}"))
        })
        .collect()
}

pub fn clamp_hops(hops: usize) -> usize {
    hops.min(MAX_SUBGRAPH_HOPS)
}

pub fn clamp_max_nodes(max_nodes: usize) -> usize {
    max_nodes.clamp(1, MAX_SUBGRAPH_NODES)
}

pub fn clamp_search_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_SEARCH_LIMIT)
}

pub fn clamp_qa_log_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_QA_LOG_LIMIT)
}
