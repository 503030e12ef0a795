//! Documented constants for the extraction and retrieval pipeline
//!
//! All tunable parameters in one place. Centralizing constants prevents
//! magic numbers scattered through the analyzer and QA scoring code.

// =============================================================================
// TEXT ANALYZER
// =============================================================================

/// Maximum input length the analyzer will process, in bytes.
///
/// Longer documents are silently truncated at a char boundary before
/// extraction. Matches the upstream NLP pipeline cap so a single huge
/// upload cannot stall a build.
pub const MAX_ANALYZER_INPUT_BYTES: usize = 2_000_000;

/// Minimum surface length for a concept candidate.
pub const MIN_CONCEPT_LEN: usize = 3;

/// Maximum surface length for a concept candidate.
///
/// Anything longer is almost always a sentence fragment, not a concept.
pub const MAX_CONCEPT_LEN: usize = 100;

/// Hard cap on concepts extracted from a single document.
pub const MAX_CONCEPTS_PER_DOC: usize = 200;

/// Cap on noun-phrase candidates per document.
///
/// Noun phrases are the noisiest generator; entities and keywords get
/// the remaining budget under [`MAX_CONCEPTS_PER_DOC`].
pub const MAX_NOUN_PHRASES_PER_DOC: usize = 120;

/// Number of top frequency-ranked keywords kept per document.
pub const MAX_KEYWORDS_PER_DOC: usize = 50;

/// A stemmed word must occur at least this often to qualify as a keyword.
pub const MIN_KEYWORD_FREQ: usize = 2;

/// Floor for co-occurrence edge weights.
///
/// weight = max(floor, 1 / (1 + distance/scale)) — monotonically
/// decreasing in span distance, never below the floor.
pub const COOCCURRENCE_MIN_WEIGHT: f32 = 0.1;

/// Distance scale (in offset units) for co-occurrence weight decay.
pub const COOCCURRENCE_DISTANCE_SCALE: f32 = 100.0;

// =============================================================================
// SUBGRAPH RETRIEVAL
// =============================================================================

/// Traversal depth is clamped to this many hops.
pub const MAX_SUBGRAPH_HOPS: usize = 3;

/// Returned node count is clamped to this cap.
pub const MAX_SUBGRAPH_NODES: usize = 200;

/// Default node cap when the caller does not specify one.
pub const DEFAULT_SUBGRAPH_NODES: usize = 100;

/// Default hop limit when the caller does not specify one.
pub const DEFAULT_SUBGRAPH_HOPS: usize = 1;

/// Concept search result limit is clamped to this cap.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Default concept search limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Fixed seed returned with subgraph responses so clients can lay out
/// the same subgraph the same way across calls.
pub const LAYOUT_SEED: u64 = 42;

// =============================================================================
// QA ENGINE
// =============================================================================

/// Score when the full lowercased question contains a concept's label or
/// canonical key verbatim.
pub const QA_SCORE_FULL_QUESTION: f32 = 3.0;

/// Score for a whole-word match between a question term and the label.
pub const QA_SCORE_LABEL_WORD: f32 = 2.0;

/// Score for a whole-word match between a question term and the
/// canonical key.
pub const QA_SCORE_KEY_WORD: f32 = 1.5;

/// Score for any substring match of a question term.
pub const QA_SCORE_SUBSTRING: f32 = 1.0;

/// QA question terms must be alphabetic and at least this long.
pub const MIN_QUESTION_TERM_LEN: usize = 3;

/// Caps on the evidence id lists attached to an answer.
pub const EVIDENCE_NODE_CAP: usize = 10;
pub const EVIDENCE_EDGE_CAP: usize = 10;
pub const EVIDENCE_DOC_CAP: usize = 20;

/// Neighbors mentioned in a synthesized answer.
pub const ANSWER_NEIGHBOR_CAP: usize = 5;

/// Source excerpts quoted in answers are truncated to this many words.
pub const EXCERPT_MAX_WORDS: usize = 25;

/// QA log listing limit is clamped to this cap.
pub const MAX_QA_LOG_LIMIT: usize = 100;

/// Default QA log listing limit.
pub const DEFAULT_QA_LOG_LIMIT: usize = 20;

/// Answer returned when no concept matches the question. Not an error.
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge graph to answer your question.";

/// Answer returned when question processing fails internally.
pub const QA_ERROR_ANSWER: &str = "I encountered an error while processing your question.";

// =============================================================================
// INGESTION & FETCHING
// =============================================================================

/// Default cap on the total byte size of one ingestion payload (100 MB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 100 * 1024 * 1024;

/// Assumed size for a URL whose content length cannot be determined
/// up front (average web page).
pub const DEFAULT_URL_SIZE_ESTIMATE: u64 = 50_000;

/// Bounded retries for content fetching.
pub const FETCH_MAX_RETRIES: u32 = 3;

/// Base backoff between fetch retries, in milliseconds (doubles per
/// attempt).
pub const FETCH_BACKOFF_BASE_MS: u64 = 1_000;

/// HTTP statuses worth retrying: rate limiting and transient upstream
/// failures. Anything else fails immediately.
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// How many per-document errors are quoted in a job/sync error summary.
pub const ERROR_SUMMARY_CAP: usize = 3;
