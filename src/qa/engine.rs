//! QA Engine - concept scoring, answer synthesis, evidence assembly
//!
//! All matching is lexical: question terms against concept labels and
//! canonical keys. Answers are synthesized from intent-specific
//! templates over the top-scoring concepts, their direct neighbors, and
//! a short excerpt from the source text, located through the MENTIONS
//! provenance chain. Every answer carries the node/edge/document ids it
//! cites.

use std::collections::HashSet;
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;

use crate::constants::{
    ANSWER_NEIGHBOR_CAP, EVIDENCE_DOC_CAP, EVIDENCE_EDGE_CAP, EVIDENCE_NODE_CAP,
    EXCERPT_MAX_WORDS, MIN_QUESTION_TERM_LEN, NO_MATCH_ANSWER, QA_SCORE_FULL_QUESTION,
    QA_SCORE_KEY_WORD, QA_SCORE_LABEL_WORD, QA_SCORE_SUBSTRING,
};
use crate::docstore::DocumentStore;
use crate::graph::retrieve::{self, Subgraph, SubgraphRequest};
use crate::graph::store::{ConceptSummary, GraphEdge, GraphNode, GraphStore, RelationType};
use crate::qa::intent::{classify, Intent};

/// Options accompanying one question.
#[derive(Debug, Clone, Copy)]
pub struct QaOptions {
    pub max_hops: usize,
    pub return_subgraph: bool,
}

/// The node, edge, and document ids an answer cites as support.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evidence {
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
    pub document_ids: Vec<String>,
}

/// A synthesized answer with its evidence.
#[derive(Debug)]
pub struct QaOutcome {
    pub answer: String,
    pub evidence: Evidence,
    pub subgraph: Option<Subgraph>,
}

/// A concept with its lexical relevance score.
#[derive(Debug, Clone)]
pub struct ScoredConcept {
    pub concept: ConceptSummary,
    pub score: f32,
}

fn term_regex() -> &'static Regex {
    static TERM_RE: OnceLock<Regex> = OnceLock::new();
    TERM_RE.get_or_init(|| Regex::new(r"[a-zA-Z]{3,}").expect("static term regex"))
}

/// Tokenize a question into lowercase alphabetic terms of length >= 3.
pub fn extract_terms(question: &str) -> Vec<String> {
    term_regex()
        .find_iter(&question.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() >= MIN_QUESTION_TERM_LEN)
        .collect()
}

/// Score every concept against the question and return the positive
/// scorers, highest first.
pub fn score_concepts(question: &str, concepts: &[ConceptSummary]) -> Vec<ScoredConcept> {
    let q = question.to_lowercase();
    let terms = extract_terms(question);

    let mut scored: Vec<ScoredConcept> = concepts
        .iter()
        .filter_map(|concept| {
            let label = concept.label.to_lowercase();
            let key = concept.canonical_key.as_str();

            let mut score = 0.0f32;
            if q.contains(&label) || q.contains(key) {
                score += QA_SCORE_FULL_QUESTION;
            }

            let label_words: HashSet<&str> = label.split_whitespace().collect();
            let key_words: HashSet<&str> = key.split_whitespace().collect();

            for term in &terms {
                let mut whole_word = false;
                if label_words.contains(term.as_str()) {
                    score += QA_SCORE_LABEL_WORD;
                    whole_word = true;
                }
                if key_words.contains(term.as_str()) {
                    score += QA_SCORE_KEY_WORD;
                    whole_word = true;
                }
                if !whole_word && (label.contains(term.as_str()) || key.contains(term.as_str())) {
                    score += QA_SCORE_SUBSTRING;
                }
            }

            (score > 0.0).then(|| ScoredConcept {
                concept: concept.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.concept.label.cmp(&b.concept.label))
    });

    scored
}

/// Answer one question against the graph. A question with no matching
/// concepts gets the fixed no-information answer with empty evidence —
/// that is a normal outcome, not an error.
pub fn answer_question(
    question: &str,
    options: QaOptions,
    graph: &GraphStore,
    docs: &DocumentStore,
) -> Result<QaOutcome> {
    let intent = classify(question);
    let scored = score_concepts(question, &graph.concept_summaries());

    // Count questions answer from graph-wide stats, so they work even
    // when no concept matches the question terms
    if intent == Intent::Count {
        return count_outcome(&scored, options, graph);
    }

    if scored.is_empty() {
        return Ok(QaOutcome {
            answer: NO_MATCH_ANSWER.to_string(),
            evidence: Evidence::default(),
            subgraph: None,
        });
    }

    let answer = synthesize(intent, &scored, graph, docs)?;
    let evidence = assemble_evidence(&scored, graph)?;
    let subgraph = evidence_subgraph(&evidence, options, graph)?;

    Ok(QaOutcome {
        answer,
        evidence,
        subgraph,
    })
}

fn count_outcome(
    scored: &[ScoredConcept],
    options: QaOptions,
    graph: &GraphStore,
) -> Result<QaOutcome> {
    let summary = graph.summary();
    let concept_count = summary
        .nodes_by_label
        .get("Concept")
        .copied()
        .unwrap_or(0);
    let relationship_count = summary.total_relationships;

    let mut evidence_ids: Vec<String> = scored
        .iter()
        .take(ANSWER_NEIGHBOR_CAP)
        .map(|s| s.concept.id.clone())
        .collect();
    if evidence_ids.is_empty() {
        evidence_ids = graph
            .concept_summaries()
            .into_iter()
            .take(ANSWER_NEIGHBOR_CAP)
            .map(|c| c.id)
            .collect();
    }

    let examples: Vec<String> = evidence_ids
        .iter()
        .filter_map(|id| concept_label(graph, id))
        .collect();

    let mut answer = format!(
        "The knowledge graph contains {concept_count} concepts and {relationship_count} relationships."
    );
    if !examples.is_empty() {
        answer.push_str(&format!(" Some examples: {}.", examples.join(", ")));
    }

    let evidence = Evidence {
        edge_ids: edges_touching(&evidence_ids, graph)?,
        document_ids: provenance_documents(&evidence_ids, graph)?,
        node_ids: evidence_ids,
    };
    let subgraph = evidence_subgraph(&evidence, options, graph)?;

    Ok(QaOutcome {
        answer,
        evidence,
        subgraph,
    })
}

/// Intent-specific answer templates over the top concepts.
fn synthesize(
    intent: Intent,
    scored: &[ScoredConcept],
    graph: &GraphStore,
    docs: &DocumentStore,
) -> Result<String> {
    let primary = &scored[0].concept;
    let neighbors = neighbor_labels(graph, &primary.id, ANSWER_NEIGHBOR_CAP)?;
    let excerpt = source_excerpt(graph, docs, primary)?;

    let mut answer = match intent {
        Intent::Meaning | Intent::What => {
            if neighbors.is_empty() {
                format!(
                    "{} is a concept in the knowledge graph, but I don't have additional context about it.",
                    primary.label
                )
            } else {
                format!(
                    "{} is a concept related to: {}.",
                    primary.label,
                    neighbors.join(", ")
                )
            }
        }
        Intent::Relationship => relationship_answer(scored, graph)?,
        Intent::Comparison => comparison_answer(scored, graph)?,
        Intent::Characteristic => {
            if neighbors.is_empty() {
                format!(
                    "{} appears in the knowledge graph without recorded attributes.",
                    primary.label
                )
            } else {
                format!(
                    "{} is characterized by its connections to: {}.",
                    primary.label,
                    neighbors.join(", ")
                )
            }
        }
        Intent::Summary => {
            let labels: Vec<&str> = scored
                .iter()
                .take(ANSWER_NEIGHBOR_CAP)
                .map(|s| s.concept.label.as_str())
                .collect();
            format!(
                "The most relevant concepts for your question are: {}.",
                labels.join(", ")
            )
        }
        Intent::List => {
            let labels: Vec<&str> = scored
                .iter()
                .take(ANSWER_NEIGHBOR_CAP)
                .map(|s| s.concept.label.as_str())
                .collect();
            format!("Matching concepts: {}.", labels.join(", "))
        }
        Intent::Where => {
            if neighbors.is_empty() {
                format!(
                    "I found {} in the knowledge graph, but no location context around it.",
                    primary.label
                )
            } else {
                format!(
                    "{} appears in context with: {}.",
                    primary.label,
                    neighbors.join(", ")
                )
            }
        }
        Intent::When | Intent::Why | Intent::How => {
            if neighbors.is_empty() {
                format!(
                    "I found {} in the knowledge graph, but it has limited connections to answer that.",
                    primary.label
                )
            } else {
                format!(
                    "Based on the knowledge graph, {} is connected to: {}.",
                    primary.label,
                    neighbors.join(", ")
                )
            }
        }
        Intent::Count => unreachable!("count handled before synthesis"),
        Intent::General => {
            if neighbors.is_empty() {
                format!(
                    "I found {} in the knowledge graph, but it has limited connections.",
                    primary.label
                )
            } else {
                format!(
                    "Based on the knowledge graph, {} is connected to: {}.",
                    primary.label,
                    neighbors.join(", ")
                )
            }
        }
    };

    if let Some(excerpt) = excerpt {
        answer.push_str(&format!(" One source mentions: \"{excerpt}\""));
    }

    Ok(answer)
}

fn relationship_answer(scored: &[ScoredConcept], graph: &GraphStore) -> Result<String> {
    if scored.len() < 2 {
        let primary = &scored[0].concept;
        let neighbors = neighbor_labels(graph, &primary.id, ANSWER_NEIGHBOR_CAP)?;
        return Ok(if neighbors.is_empty() {
            format!("{} has no recorded relationships.", primary.label)
        } else {
            format!(
                "{} is related to: {}.",
                primary.label,
                neighbors.join(", ")
            )
        });
    }

    let matched_ids: HashSet<&str> = scored
        .iter()
        .take(EVIDENCE_NODE_CAP)
        .map(|s| s.concept.id.as_str())
        .collect();

    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    for s in scored.iter().take(EVIDENCE_NODE_CAP) {
        for edge in graph.edges_of(&s.concept.id)? {
            if matched_ids.contains(edge.source_id.as_str())
                && matched_ids.contains(edge.target_id.as_str())
                && seen.insert(edge.key())
            {
                if let (Some(a), Some(b)) = (
                    concept_label(graph, &edge.source_id),
                    concept_label(graph, &edge.target_id),
                ) {
                    pairs.push(format!("{a} -> {b} ({})", edge.relation.as_str()));
                }
            }
        }
    }

    Ok(if pairs.is_empty() {
        let labels: Vec<&str> = scored
            .iter()
            .take(3)
            .map(|s| s.concept.label.as_str())
            .collect();
        format!(
            "The concepts {} appear in the knowledge graph but don't have direct relationships.",
            labels.join(", ")
        )
    } else {
        pairs.truncate(3);
        format!("Found the following relationships: {}.", pairs.join("; "))
    })
}

fn comparison_answer(scored: &[ScoredConcept], graph: &GraphStore) -> Result<String> {
    if scored.len() < 2 {
        let primary = &scored[0].concept;
        return Ok(format!(
            "I only found {} to compare against your question.",
            primary.label
        ));
    }

    let a = &scored[0].concept;
    let b = &scored[1].concept;
    let neighbors_a: HashSet<String> =
        neighbor_labels(graph, &a.id, EVIDENCE_NODE_CAP)?.into_iter().collect();
    let neighbors_b: HashSet<String> =
        neighbor_labels(graph, &b.id, EVIDENCE_NODE_CAP)?.into_iter().collect();

    let shared: Vec<&String> = neighbors_a.intersection(&neighbors_b).collect();

    Ok(if shared.is_empty() {
        format!(
            "{} and {} both appear in the knowledge graph but share no direct connections.",
            a.label, b.label
        )
    } else {
        let mut shared: Vec<String> = shared.into_iter().cloned().collect();
        shared.sort();
        shared.truncate(ANSWER_NEIGHBOR_CAP);
        format!(
            "{} and {} are both connected to: {}.",
            a.label,
            b.label,
            shared.join(", ")
        )
    })
}

/// Evidence: concepts used in the answer (cap 10), edges touching them
/// (cap 10), and their provenance documents via MENTIONS (cap 20).
fn assemble_evidence(scored: &[ScoredConcept], graph: &GraphStore) -> Result<Evidence> {
    let node_ids: Vec<String> = scored
        .iter()
        .take(EVIDENCE_NODE_CAP)
        .map(|s| s.concept.id.clone())
        .collect();

    Ok(Evidence {
        edge_ids: edges_touching(&node_ids, graph)?,
        document_ids: provenance_documents(&node_ids, graph)?,
        node_ids,
    })
}

fn edges_touching(node_ids: &[String], graph: &GraphStore) -> Result<Vec<String>> {
    let mut edge_ids = Vec::new();
    let mut seen = HashSet::new();

    'outer: for id in node_ids {
        for edge in graph.edges_of(id)? {
            if seen.insert(edge.key()) {
                edge_ids.push(edge.display_id());
                if edge_ids.len() >= EVIDENCE_EDGE_CAP {
                    break 'outer;
                }
            }
        }
    }

    Ok(edge_ids)
}

fn provenance_documents(node_ids: &[String], graph: &GraphStore) -> Result<Vec<String>> {
    let mut doc_ids = Vec::new();

    'outer: for id in node_ids {
        for doc_id in graph.documents_mentioning(id)? {
            if !doc_ids.contains(&doc_id) {
                doc_ids.push(doc_id);
                if doc_ids.len() >= EVIDENCE_DOC_CAP {
                    break 'outer;
                }
            }
        }
    }

    Ok(doc_ids)
}

fn evidence_subgraph(
    evidence: &Evidence,
    options: QaOptions,
    graph: &GraphStore,
) -> Result<Option<Subgraph>> {
    if !options.return_subgraph || evidence.node_ids.is_empty() {
        return Ok(None);
    }

    let subgraph = retrieve::subgraph(
        graph,
        &SubgraphRequest {
            concept_ids: Some(evidence.node_ids.clone()),
            max_hops: Some(options.max_hops),
            ..Default::default()
        },
    )?;

    Ok(Some(subgraph))
}

/// Labels of a node's direct neighbors, deduplicated, document nodes
/// excluded.
fn neighbor_labels(graph: &GraphStore, node_id: &str, cap: usize) -> Result<Vec<String>> {
    let mut labels = Vec::new();

    for edge in graph.edges_of(node_id)? {
        if edge.relation == RelationType::Mentions {
            continue;
        }
        let other = neighbor_id(&edge, node_id);
        if let Some(label) = concept_label(graph, other) {
            if !labels.contains(&label) {
                labels.push(label);
                if labels.len() >= cap {
                    break;
                }
            }
        }
    }

    Ok(labels)
}

fn neighbor_id<'a>(edge: &'a GraphEdge, node_id: &str) -> &'a str {
    if edge.source_id == node_id {
        &edge.target_id
    } else {
        &edge.source_id
    }
}

fn concept_label(graph: &GraphStore, id: &str) -> Option<String> {
    match graph.node(id) {
        Ok(Some(GraphNode::Concept(c))) => Some(c.label),
        _ => None,
    }
}

/// Find a short excerpt of source text where the concept label occurs:
/// first sentence containing the label, truncated to a word budget.
fn source_excerpt(
    graph: &GraphStore,
    docs: &DocumentStore,
    concept: &ConceptSummary,
) -> Result<Option<String>> {
    let needle = concept.label.to_lowercase();

    for doc_id in graph.documents_mentioning(&concept.id)? {
        let Some(doc) = docs.document(&doc_id)? else {
            continue;
        };

        for sentence in doc.text.split_inclusive(['.', '!', '?']) {
            if sentence.to_lowercase().contains(&needle) {
                return Ok(Some(truncate_words(sentence.trim(), EXCERPT_MAX_WORDS)));
            }
        }
    }

    Ok(None)
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        words.join(" ")
    } else {
        format!("{}...", words[..max_words].join(" "))
    }
}
