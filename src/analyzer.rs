//! Text Analyzer - rule-based concept and relation extraction
//!
//! Turns raw document text into concept candidates (entities, noun
//! phrases, keywords, technical terms) and relation candidates
//! (dependency-tagged pairs plus sentence co-occurrence). No external
//! state: identical text always yields identical candidates, and concept
//! ids are a pure function of the canonical key.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_key, concept_id};
use crate::constants::{
    COOCCURRENCE_DISTANCE_SCALE, COOCCURRENCE_MIN_WEIGHT, MAX_ANALYZER_INPUT_BYTES,
    MAX_CONCEPTS_PER_DOC, MAX_CONCEPT_LEN, MAX_KEYWORDS_PER_DOC, MAX_NOUN_PHRASES_PER_DOC,
    MIN_CONCEPT_LEN, MIN_KEYWORD_FREQ,
};
use crate::graph::store::RelationType;

/// Byte-offset range marking where a concept was observed in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// What kind of surface form produced a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    Entity,
    NounPhrase,
    Keyword,
    Technical,
}

impl ConceptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::NounPhrase => "noun_phrase",
            Self::Keyword => "keyword",
            Self::Technical => "technical",
        }
    }
}

/// A concept candidate extracted from one document.
#[derive(Debug, Clone)]
pub struct ConceptCandidate {
    pub id: String,
    pub label: String,
    pub canonical_key: String,
    pub kind: ConceptKind,
    /// Keywords are frequency-derived and carry no span.
    pub span: Option<Span>,
}

/// A relation candidate between two extracted concepts.
#[derive(Debug, Clone)]
pub struct RelationCandidate {
    pub source_id: String,
    pub target_id: String,
    pub relation: RelationType,
    pub weight: f32,
    /// Originating dependency tag ("nsubj", "dobj", "pobj", "compound",
    /// "dep", or "co_occurrence").
    pub dependency: String,
}

/// Full analyzer output for one document.
#[derive(Debug, Default)]
pub struct DocumentAnalysis {
    pub concepts: Vec<ConceptCandidate>,
    pub relations: Vec<RelationCandidate>,
}

/// Map a dependency tag to its graph relation type.
///
/// Fixed table: unknown tags fall through to RELATED_TO.
pub fn relation_for_dependency(dependency: &str) -> RelationType {
    match dependency {
        "nsubj" => RelationType::SubjectOf,
        "dobj" => RelationType::ObjectOf,
        "pobj" => RelationType::PrepositionalObject,
        "compound" => RelationType::CompoundWith,
        _ => RelationType::RelatedTo,
    }
}

/// Co-occurrence weight for two spans starting `distance` offsets apart.
///
/// Monotonically decreasing in distance, floored at
/// [`COOCCURRENCE_MIN_WEIGHT`].
pub fn cooccurrence_weight(distance: usize) -> f32 {
    let w = 1.0 / (1.0 + distance as f32 / COOCCURRENCE_DISTANCE_SCALE);
    w.max(COOCCURRENCE_MIN_WEIGHT)
}

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Rule-based text analyzer.
///
/// Keyword sets drive entity typing and the shallow dependency scanner;
/// the Porter2 stemmer approximates lemmatization for keyword ranking.
pub struct TextAnalyzer {
    stop_words: HashSet<&'static str>,
    tech_keywords: HashSet<&'static str>,
    copulas: HashSet<&'static str>,
    verb_markers: HashSet<&'static str>,
    prepositions: HashSet<&'static str>,
    non_informative: HashSet<&'static str>,
}

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

const TECH_KEYWORDS: &[&str] = &[
    "rust", "python", "java", "javascript", "typescript", "react", "docker", "kubernetes", "aws",
    "azure", "gcp", "sql", "nosql", "mongodb", "postgresql", "redis", "kafka", "api", "rest",
    "graphql", "http", "tcp", "grpc", "linux", "neo4j", "elasticsearch", "nlp",
];

const COPULAS: &[&str] = &["is", "are", "was", "were", "be", "been", "being"];

const VERB_MARKERS: &[&str] = &[
    "has", "have", "had", "uses", "use", "used", "provides", "provide", "contains", "contain",
    "includes", "include", "supports", "support", "enables", "enable", "requires", "require",
    "creates", "create", "builds", "build", "runs", "run", "makes", "make", "allows", "allow",
    "depends", "depend", "produces", "produce", "processes", "process", "stores", "store",
    "connects", "connect", "powers", "power", "drives", "drive", "defines", "define",
];

const PREPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "by", "with", "for", "to", "from", "into", "over", "under", "between",
    "through", "via",
];

/// Deictic terms that carry no information as standalone concepts.
const NON_INFORMATIVE: &[&str] = &[
    "this", "that", "these", "those", "here", "there", "where", "when", "what", "how",
];

impl TextAnalyzer {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
            tech_keywords: TECH_KEYWORDS.iter().copied().collect(),
            copulas: COPULAS.iter().copied().collect(),
            verb_markers: VERB_MARKERS.iter().copied().collect(),
            prepositions: PREPOSITIONS.iter().copied().collect(),
            non_informative: NON_INFORMATIVE.iter().copied().collect(),
        }
    }

    /// Extract concept and relation candidates from one document.
    ///
    /// A failure here is per-document: the merger logs it and moves on
    /// to the next document in the batch.
    pub fn analyze(&self, text: &str) -> Result<DocumentAnalysis> {
        if text.trim().is_empty() {
            bail!("document contains no extractable text");
        }

        let text = truncate_at_char_boundary(text, MAX_ANALYZER_INPUT_BYTES);
        let tokens = tokenize(text);
        let sentences = split_sentences(text);
        let sentence_initial = sentence_initial_flags(&tokens, &sentences);

        let concepts = self.extract_concepts(text, &tokens, &sentence_initial);
        let relations = self.extract_relations(&tokens, &sentences, &concepts);

        Ok(DocumentAnalysis {
            concepts,
            relations,
        })
    }

    /// Merge the three candidate generators by canonical key, in order:
    /// entities/technical terms, noun phrases, keywords.
    fn extract_concepts(
        &self,
        text: &str,
        tokens: &[Token<'_>],
        sentence_initial: &[bool],
    ) -> Vec<ConceptCandidate> {
        let mut concepts: Vec<ConceptCandidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (label, span, kind) in self.extract_entities(text, tokens, sentence_initial) {
            if concepts.len() >= MAX_CONCEPTS_PER_DOC {
                break;
            }
            push_candidate(&mut concepts, &mut seen, self, label, Some(span), kind);
        }

        let mut noun_phrases = 0usize;
        for (label, span) in self.extract_noun_phrases(text, tokens) {
            if concepts.len() >= MAX_CONCEPTS_PER_DOC || noun_phrases >= MAX_NOUN_PHRASES_PER_DOC {
                break;
            }
            if push_candidate(
                &mut concepts,
                &mut seen,
                self,
                label,
                Some(span),
                ConceptKind::NounPhrase,
            ) {
                noun_phrases += 1;
            }
        }

        for label in self.extract_keywords(tokens) {
            if concepts.len() >= MAX_CONCEPTS_PER_DOC {
                break;
            }
            push_candidate(&mut concepts, &mut seen, self, label, None, ConceptKind::Keyword);
        }

        concepts
    }

    /// Capitalization-driven named-entity spans plus technical keyword
    /// hits. Multi-word capitalized runs are always taken; a single
    /// capitalized word only counts away from a sentence start, where
    /// capitalization is ambiguous.
    fn extract_entities(
        &self,
        text: &str,
        tokens: &[Token<'_>],
        sentence_initial: &[bool],
    ) -> Vec<(String, Span, ConceptKind)> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let tok = &tokens[i];
            let lower = tok.text.to_lowercase();

            if self.stop_words.contains(lower.as_str()) {
                i += 1;
                continue;
            }

            if self.tech_keywords.contains(lower.as_str()) {
                out.push((
                    tok.text.to_string(),
                    Span {
                        start: tok.start,
                        end: tok.end,
                    },
                    ConceptKind::Technical,
                ));
                i += 1;
                continue;
            }

            if starts_uppercase(tok.text) {
                let mut j = i + 1;
                // Adjacency means a single separating space: anything
                // wider (punctuation, newlines) breaks the run
                while j < tokens.len()
                    && starts_uppercase(tokens[j].text)
                    && tokens[j].start.saturating_sub(tokens[j - 1].end) <= 1
                    && !self
                        .stop_words
                        .contains(tokens[j].text.to_lowercase().as_str())
                {
                    j += 1;
                }

                if j > i + 1 {
                    let span = Span {
                        start: tok.start,
                        end: tokens[j - 1].end,
                    };
                    out.push((
                        text[span.start..span.end].to_string(),
                        span,
                        ConceptKind::Entity,
                    ));
                    i = j;
                    continue;
                }

                if !sentence_initial[i] {
                    out.push((
                        tok.text.to_string(),
                        Span {
                            start: tok.start,
                            end: tok.end,
                        },
                        ConceptKind::Entity,
                    ));
                }
            }

            i += 1;
        }

        out
    }

    /// Shallow noun-phrase chunking: adjacent runs of 2-4 lowercase
    /// content words ("training data", "model architecture").
    fn extract_noun_phrases(&self, text: &str, tokens: &[Token<'_>]) -> Vec<(String, Span)> {
        let mut out = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            if !self.is_content_word(tokens[i].text) || starts_uppercase(tokens[i].text) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < tokens.len()
                && j - i < 4
                && self.is_content_word(tokens[j].text)
                && !starts_uppercase(tokens[j].text)
                && tokens[j].start.saturating_sub(tokens[j - 1].end) <= 1
            {
                j += 1;
            }

            if j > i + 1 {
                let span = Span {
                    start: tokens[i].start,
                    end: tokens[j - 1].end,
                };
                out.push((text[span.start..span.end].to_string(), span));
                i = j;
            } else {
                i += 1;
            }
        }

        out
    }

    /// Frequency-ranked stemmed content words. The stem is the ranking
    /// key; the first surface form seen becomes the label.
    fn extract_keywords(&self, tokens: &[Token<'_>]) -> Vec<String> {
        let stemmer = Stemmer::create(Algorithm::English);
        let mut freq: HashMap<String, (usize, String)> = HashMap::new();

        for tok in tokens {
            if tok.text.len() < MIN_CONCEPT_LEN || !tok.text.chars().all(|c| c.is_alphabetic()) {
                continue;
            }
            let lower = tok.text.to_lowercase();
            if self.stop_words.contains(lower.as_str()) {
                continue;
            }
            let stem = stemmer.stem(&lower).to_string();
            freq.entry(stem)
                .and_modify(|(count, _)| *count += 1)
                .or_insert((1, lower));
        }

        let mut ranked: Vec<(String, usize, String)> = freq
            .into_iter()
            .filter(|(_, (count, _))| *count >= MIN_KEYWORD_FREQ)
            .map(|(stem, (count, surface))| (stem, count, surface))
            .collect();

        // Stem as tie-breaker keeps ranking deterministic across runs
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        ranked
            .into_iter()
            .take(MAX_KEYWORDS_PER_DOC)
            .map(|(_, _, surface)| surface)
            .collect()
    }

    /// Dependency-tagged relations plus per-sentence co-occurrence.
    fn extract_relations(
        &self,
        tokens: &[Token<'_>],
        sentences: &[(usize, usize)],
        concepts: &[ConceptCandidate],
    ) -> Vec<RelationCandidate> {
        // Span table in concept insertion order. Token resolution is by
        // start-offset containment with first-match-wins: nested or
        // overlapping spans may be attributed to the earlier concept.
        let span_table: Vec<(Span, usize)> = concepts
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.span.map(|s| (s, idx)))
            .collect();

        let resolve = |offset: usize| -> Option<usize> {
            span_table
                .iter()
                .find(|(span, _)| span.start <= offset && offset < span.end)
                .map(|(_, idx)| *idx)
        };

        let mut relations = Vec::new();

        for &(sent_start, sent_end) in sentences {
            let sent_tokens: Vec<&Token<'_>> = tokens
                .iter()
                .filter(|t| t.start >= sent_start && t.end <= sent_end)
                .collect();

            self.scan_dependencies(&sent_tokens, &resolve, concepts, &mut relations);
            cooccurrences(sent_start, sent_end, concepts, &mut relations);
        }

        relations
    }

    /// Shallow clause scanner: classify the gap between consecutive
    /// concept mentions in a sentence and tag the pair with a dependency
    /// label, which the fixed table maps to a relation type.
    fn scan_dependencies(
        &self,
        sent_tokens: &[&Token<'_>],
        resolve: &dyn Fn(usize) -> Option<usize>,
        concepts: &[ConceptCandidate],
        relations: &mut Vec<RelationCandidate>,
    ) {
        let mut prev: Option<usize> = None;
        let mut gap_len = 0usize;
        let mut saw_verb = false;
        let mut saw_copula = false;
        let mut saw_prep = false;

        for tok in sent_tokens {
            if let Some(ci) = resolve(tok.start) {
                if prev == Some(ci) {
                    // Still inside the same concept mention
                    continue;
                }

                if let Some(pi) = prev {
                    let dependency = if gap_len == 0 {
                        "compound"
                    } else if saw_prep {
                        "pobj"
                    } else if saw_copula {
                        "nsubj"
                    } else if saw_verb {
                        "dobj"
                    } else {
                        "dep"
                    };

                    let source = &concepts[pi];
                    let target = &concepts[ci];
                    if source.id != target.id {
                        relations.push(RelationCandidate {
                            source_id: source.id.clone(),
                            target_id: target.id.clone(),
                            relation: relation_for_dependency(dependency),
                            weight: 1.0,
                            dependency: dependency.to_string(),
                        });
                    }
                }

                prev = Some(ci);
                gap_len = 0;
                saw_verb = false;
                saw_copula = false;
                saw_prep = false;
                continue;
            }

            let lower = tok.text.to_lowercase();
            if self.copulas.contains(lower.as_str()) {
                saw_verb = true;
                saw_copula = true;
            } else if self.is_verb_like(&lower) {
                saw_verb = true;
            } else if self.prepositions.contains(lower.as_str()) {
                saw_prep = true;
            }
            gap_len += 1;
        }
    }

    fn is_verb_like(&self, lower: &str) -> bool {
        if self.verb_markers.contains(lower) {
            return true;
        }
        lower.len() > 4
            && (lower.ends_with("ing") || lower.ends_with("ed"))
            && !self.stop_words.contains(lower)
    }

    fn is_content_word(&self, word: &str) -> bool {
        word.len() >= MIN_CONCEPT_LEN
            && word.chars().all(|c| c.is_alphabetic())
            && !self.stop_words.contains(word.to_lowercase().as_str())
    }

    /// Validity filter applied to every concept candidate.
    fn is_valid_concept(&self, text: &str) -> bool {
        let text = text.trim();

        if text.len() < MIN_CONCEPT_LEN || text.len() > MAX_CONCEPT_LEN {
            return false;
        }

        let lower = text.to_lowercase();
        if lower
            .split_whitespace()
            .all(|w| self.stop_words.contains(w))
        {
            return false;
        }

        if !text.chars().any(|c| c.is_alphanumeric()) {
            return false;
        }
        if text.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }

        if self.non_informative.contains(lower.as_str()) {
            return false;
        }

        true
    }
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Push a validated, unseen candidate. Returns whether it was added.
fn push_candidate(
    concepts: &mut Vec<ConceptCandidate>,
    seen: &mut HashSet<String>,
    analyzer: &TextAnalyzer,
    label: String,
    span: Option<Span>,
    kind: ConceptKind,
) -> bool {
    if !analyzer.is_valid_concept(&label) {
        return false;
    }
    let key = canonical_key(&label);
    if key.is_empty() || seen.contains(&key) {
        return false;
    }

    concepts.push(ConceptCandidate {
        id: concept_id(&key),
        label: label.trim().to_string(),
        canonical_key: key.clone(),
        kind,
        span,
    });
    seen.insert(key);
    true
}

/// CO_OCCURS relations for every concept pair whose spans lie fully
/// inside the sentence.
fn cooccurrences(
    sent_start: usize,
    sent_end: usize,
    concepts: &[ConceptCandidate],
    relations: &mut Vec<RelationCandidate>,
) {
    let in_sentence: Vec<(&ConceptCandidate, Span)> = concepts
        .iter()
        .filter_map(|c| c.span.map(|s| (c, s)))
        .filter(|(_, s)| s.start >= sent_start && s.end <= sent_end)
        .collect();

    for i in 0..in_sentence.len() {
        for j in (i + 1)..in_sentence.len() {
            let (a, sa) = &in_sentence[i];
            let (b, sb) = &in_sentence[j];
            let distance = sa.start.abs_diff(sb.start);

            relations.push(RelationCandidate {
                source_id: a.id.clone(),
                target_id: b.id.clone(),
                relation: RelationType::CoOccurs,
                weight: cooccurrence_weight(distance),
                dependency: "co_occurrence".to_string(),
            });
        }
    }
}

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut n = max;
    while n > 0 && !text.is_char_boundary(n) {
        n -= 1;
    }
    &text[..n]
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        let is_word = c.is_alphanumeric() || c == '\'' || c == '-';
        match (start, is_word) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                tokens.push(Token {
                    text: &text[s..i],
                    start: s,
                    end: i,
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &text[s..],
            start: s,
            end: text.len(),
        });
    }

    tokens
}

/// Sentence ranges by terminator punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<(usize, usize)> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_end = match chars.peek() {
                Some((_, next)) => next.is_whitespace(),
                None => true,
            };
            if at_end {
                let end = i + c.len_utf8();
                if end > start {
                    sentences.push((start, end));
                }
                start = end;
            }
        }
    }

    if start < text.len() {
        sentences.push((start, text.len()));
    }

    sentences
}

fn sentence_initial_flags(tokens: &[Token<'_>], sentences: &[(usize, usize)]) -> Vec<bool> {
    let mut flags = vec![false; tokens.len()];
    let mut si = 0usize;
    let mut marked: Option<usize> = None;

    for (idx, tok) in tokens.iter().enumerate() {
        while si < sentences.len() && tok.start >= sentences[si].1 {
            si += 1;
        }
        if si < sentences.len() && marked != Some(si) {
            flags[idx] = true;
            marked = Some(si);
        }
    }

    flags
}
