//! Question intent classification
//!
//! An ordered rule table of (keyword patterns, category) pairs,
//! evaluated in sequence against the lowercased question — the first
//! category with a matching pattern wins. Order matters: "how many" must
//! classify as Count before the generic How rule can see it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Count,
    Meaning,
    Relationship,
    Comparison,
    Characteristic,
    Summary,
    List,
    Where,
    When,
    Why,
    What,
    How,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Meaning => "meaning",
            Self::Relationship => "relationship",
            Self::Comparison => "comparison",
            Self::Characteristic => "characteristic",
            Self::Summary => "summary",
            Self::List => "list",
            Self::Where => "where",
            Self::When => "when",
            Self::Why => "why",
            Self::What => "what",
            Self::How => "how",
            Self::General => "general",
        }
    }
}

/// The ordered rule table. Specific phrasings come before the generic
/// single-word rules they would otherwise shadow.
const INTENT_RULES: &[(&[&str], Intent)] = &[
    (&["how many", "count", "number of"], Intent::Count),
    (
        &["what does", "meaning of", "define", "definition"],
        Intent::Meaning,
    ),
    (
        &["related", "connected", "relationship", "associated", "linked"],
        Intent::Relationship,
    ),
    (
        &["compare", "difference between", "versus", " vs "],
        Intent::Comparison,
    ),
    (
        &["characteristic", "propert", "feature", "attribute"],
        Intent::Characteristic,
    ),
    (
        &["summarize", "summary", "overview", "tell me about"],
        Intent::Summary,
    ),
    (&["list", "show me", "examples of"], Intent::List),
    (&["where"], Intent::Where),
    (&["when"], Intent::When),
    (&["why"], Intent::Why),
    (&["what"], Intent::What),
    (&["how"], Intent::How),
];

/// Classify a question. No matching rule means General.
pub fn classify(question: &str) -> Intent {
    let q = question.to_lowercase();

    for (patterns, intent) in INTENT_RULES {
        if patterns.iter().any(|p| q.contains(p)) {
            return *intent;
        }
    }

    Intent::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_beats_how() {
        assert_eq!(classify("How many concepts are there?"), Intent::Count);
        assert_eq!(classify("how does caching work"), Intent::How);
    }

    #[test]
    fn test_meaning_beats_what() {
        assert_eq!(classify("What does entropy mean?"), Intent::Meaning);
        assert_eq!(classify("what is entropy"), Intent::What);
    }

    #[test]
    fn test_categories() {
        assert_eq!(classify("is rust related to tokio"), Intent::Relationship);
        assert_eq!(classify("compare rust and go"), Intent::Comparison);
        assert_eq!(classify("what are the properties of water"), Intent::Characteristic);
        assert_eq!(classify("give me an overview of the corpus"), Intent::Summary);
        assert_eq!(classify("list all databases"), Intent::List);
        assert_eq!(classify("where is the data stored"), Intent::Where);
        assert_eq!(classify("when was this written"), Intent::When);
        assert_eq!(classify("why do we need indexes"), Intent::Why);
    }

    #[test]
    fn test_no_match_is_general() {
        assert_eq!(classify("rust tokio"), Intent::General);
        assert_eq!(classify(""), Intent::General);
    }
}
