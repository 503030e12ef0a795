//! Canonicalization and deterministic concept identity
//!
//! The canonical key is the deduplication identity for a concept: two
//! surface forms with the same canonical key resolve to the same graph
//! node, across documents, runs, and processes. The concept id is a
//! stable hash of the canonical key, so it carries the same guarantee.

use sha2::{Digest, Sha256};

/// Leading determiners stripped from canonical keys.
const DETERMINERS: [&str; 3] = ["the", "a", "an"];

/// Trailing corporate suffixes stripped from canonical keys.
const CORP_SUFFIXES: [&str; 4] = ["inc", "corp", "ltd", "llc"];

/// Normalize concept text to its canonical key: lowercase, collapse
/// internal whitespace, strip a leading determiner and a trailing
/// corporate suffix.
pub fn canonical_key(text: &str) -> String {
    let mut words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();

    if words.len() > 1 && DETERMINERS.contains(&words[0].as_str()) {
        words.remove(0);
    }

    if words.len() > 1 {
        let last = words[words.len() - 1].trim_end_matches('.').to_string();
        if CORP_SUFFIXES.contains(&last.as_str()) {
            words.pop();
        }
    }

    words.join(" ")
}

/// Deterministic concept id: the first 16 hex characters of the SHA-256
/// digest of the canonical key. Independent of document, run, and
/// process — the contract the merger relies on for cross-document
/// deduplication.
pub fn concept_id(canonical_key: &str) -> String {
    let digest = Sha256::digest(canonical_key.as_bytes());
    let hex = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_lowercases_and_collapses() {
        assert_eq!(canonical_key("  Machine   Learning "), "machine learning");
    }

    #[test]
    fn test_canonical_key_strips_determiner() {
        assert_eq!(canonical_key("The Neural Network"), "neural network");
        assert_eq!(canonical_key("a graph"), "graph");
        assert_eq!(canonical_key("An Algorithm"), "algorithm");
        // A lone determiner is not stripped to empty
        assert_eq!(canonical_key("The"), "the");
    }

    #[test]
    fn test_canonical_key_strips_corp_suffix() {
        assert_eq!(canonical_key("Acme Inc"), "acme");
        assert_eq!(canonical_key("Globex Corp."), "globex");
        assert_eq!(canonical_key("Initech LLC"), "initech");
        // A lone suffix word survives
        assert_eq!(canonical_key("Inc"), "inc");
    }

    #[test]
    fn test_concept_id_deterministic() {
        let key = canonical_key("The Machine Learning");
        let a = concept_id(&key);
        let b = concept_id(&canonical_key("machine   learning"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_concept_id_distinct_keys() {
        assert_ne!(concept_id("machine learning"), concept_id("deep learning"));
    }
}
