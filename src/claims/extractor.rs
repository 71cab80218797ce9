//! Claim extraction from free-form agent output
//!
//! Two independent heuristics, concatenated in order:
//! - list items (bullets `-`, `*`, `•` or numbered `N.`)
//! - sentences carrying a comparison/capability indicator phrase
//!
//! Near-duplicates across the two passes are kept.

use lazy_static::lazy_static;
use regex::Regex;

/// Claims must be longer than this after trimming
pub const MIN_CLAIM_CHARS: usize = 15;

/// Indicator sentences must be longer than this
const MIN_SENTENCE_CHARS: usize = 20;

const CLAIM_INDICATORS: &[&str] = &[
    "compared to",
    "better than",
    "faster than",
    "supports",
    "offers",
    "provides",
];

lazy_static! {
    static ref LIST_ITEM_RE: Regex =
        Regex::new(r"(?m)^[ \t]*(?:[-*•]|\d+\.)[ \t]*(.+)$").unwrap();
    static ref SENTENCE_SPLIT_RE: Regex = Regex::new(r"[.!?]+").unwrap();
}

/// Stateless claim extractor
pub struct ClaimExtractor;

impl ClaimExtractor {
    pub fn extract(text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let list_items = LIST_ITEM_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str());

        let indicator_sentences = SENTENCE_SPLIT_RE
            .split(text)
            .map(str::trim)
            .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS && has_indicator(s));

        list_items
            .chain(indicator_sentences)
            .map(str::trim)
            .filter(|claim| claim.chars().count() > MIN_CLAIM_CHARS)
            .map(str::to_string)
            .collect()
    }
}

fn has_indicator(sentence: &str) -> bool {
    let lowered = sentence.to_lowercase();
    CLAIM_INDICATORS.iter().any(|kw| lowered.contains(kw))
}
