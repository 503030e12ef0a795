//! QA engine tests over a real merged graph
//!
//! Builds a small corpus through the full analyzer/merger pipeline, then
//! exercises scoring, intent dispatch, answer synthesis, and evidence
//! assembly.

use graphmind::analyzer::TextAnalyzer;
use graphmind::constants::{EVIDENCE_DOC_CAP, EVIDENCE_EDGE_CAP, EVIDENCE_NODE_CAP, NO_MATCH_ANSWER};
use graphmind::docstore::{DocumentStore, SourceType};
use graphmind::graph::merge::run_build;
use graphmind::graph::store::GraphStore;
use graphmind::qa::engine::{answer_question, QaOptions};
use tempfile::TempDir;

struct Fixture {
    docs: DocumentStore,
    graph: GraphStore,
    _temp: TempDir,
}

const OPTS: QaOptions = QaOptions {
    max_hops: 2,
    return_subgraph: false,
};

fn setup_corpus() -> Fixture {
    let temp = TempDir::new().expect("temp dir");
    let docs = DocumentStore::new(&temp.path().join("documents")).expect("document store");
    let graph = GraphStore::new(&temp.path().join("graph")).expect("graph store");
    let analyzer = TextAnalyzer::new();

    let texts = [
        (
            "ml.txt",
            "Machine Learning powers modern recommendation engines. \
             Machine Learning depends on training data. \
             Neural Networks extend Machine Learning with deep architectures.",
        ),
        (
            "infra.txt",
            "Neural Networks run on specialized hardware. \
             Training data flows through preprocessing pipelines into Neural Networks.",
        ),
    ];

    for (name, text) in texts {
        docs.insert_document(SourceType::File, name, text.to_string(), "job1")
            .expect("insert document");
    }

    let sync = docs.create_sync("job1").expect("create sync");
    run_build(&docs, &graph, &analyzer, &sync.id, "job1");
    assert_eq!(
        docs.sync(&sync.id).unwrap().unwrap().status,
        graphmind::docstore::SyncStatus::Completed
    );

    Fixture {
        docs,
        graph,
        _temp: temp,
    }
}

#[test]
fn test_count_question_reports_graph_totals() {
    let f = setup_corpus();
    let summary = f.graph.summary();
    let concepts = summary.nodes_by_label.get("Concept").copied().unwrap_or(0);
    let relationships = summary.total_relationships;
    assert!(concepts > 0);
    assert!(relationships > 0);

    let outcome = answer_question("How many concepts are there?", OPTS, &f.graph, &f.docs)
        .expect("count question");

    assert!(outcome.answer.contains(&concepts.to_string()));
    assert!(outcome.answer.contains(&relationships.to_string()));
    assert!(!outcome.evidence.node_ids.is_empty());
}

#[test]
fn test_no_match_returns_fixed_answer() {
    let f = setup_corpus();

    let outcome = answer_question(
        "Tell me something about quasar spectroscopy?",
        OPTS,
        &f.graph,
        &f.docs,
    )
    .expect("no-match question");

    assert_eq!(outcome.answer, NO_MATCH_ANSWER);
    assert!(outcome.evidence.node_ids.is_empty());
    assert!(outcome.evidence.edge_ids.is_empty());
    assert!(outcome.evidence.document_ids.is_empty());
}

#[test]
fn test_what_question_names_the_concept_and_neighbors() {
    let f = setup_corpus();

    let outcome = answer_question("What is machine learning?", OPTS, &f.graph, &f.docs)
        .expect("what question");

    assert!(outcome.answer.contains("Machine Learning"));
    assert!(!outcome.evidence.node_ids.is_empty());
    assert!(!outcome.evidence.document_ids.is_empty());
}

#[test]
fn test_answer_includes_source_excerpt() {
    let f = setup_corpus();

    let outcome = answer_question("What is machine learning?", OPTS, &f.graph, &f.docs)
        .expect("what question");

    assert!(outcome.answer.contains("One source mentions:"));
}

#[test]
fn test_relationship_question_between_matched_concepts() {
    let f = setup_corpus();

    let outcome = answer_question(
        "How are machine learning and neural networks related?",
        OPTS,
        &f.graph,
        &f.docs,
    )
    .expect("relationship question");

    // Both concepts matched; the answer reports graph relationships
    assert!(
        outcome.answer.contains("relationships")
            || outcome.answer.contains("don't have direct relationships")
    );
    assert!(outcome.evidence.node_ids.len() >= 2);
}

#[test]
fn test_evidence_caps_respected() {
    let f = setup_corpus();

    let outcome = answer_question(
        "What connects machine learning, neural networks, training data and pipelines?",
        OPTS,
        &f.graph,
        &f.docs,
    )
    .expect("broad question");

    assert!(outcome.evidence.node_ids.len() <= EVIDENCE_NODE_CAP);
    assert!(outcome.evidence.edge_ids.len() <= EVIDENCE_EDGE_CAP);
    assert!(outcome.evidence.document_ids.len() <= EVIDENCE_DOC_CAP);
}

#[test]
fn test_subgraph_returned_when_requested() {
    let f = setup_corpus();

    let outcome = answer_question(
        "What is machine learning?",
        QaOptions {
            max_hops: 1,
            return_subgraph: true,
        },
        &f.graph,
        &f.docs,
    )
    .expect("subgraph question");

    let subgraph = outcome.subgraph.expect("subgraph requested");
    assert!(!subgraph.nodes.is_empty());
}

#[test]
fn test_subgraph_omitted_by_default() {
    let f = setup_corpus();

    let outcome = answer_question("What is machine learning?", OPTS, &f.graph, &f.docs)
        .expect("question");

    assert!(outcome.subgraph.is_none());
}

#[test]
fn test_evidence_documents_resolve_in_store() {
    let f = setup_corpus();

    let outcome = answer_question("What is machine learning?", OPTS, &f.graph, &f.docs)
        .expect("question");

    for doc_id in &outcome.evidence.document_ids {
        assert!(f.docs.document(doc_id).unwrap().is_some());
    }
}
