use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{Constraints, QuestionType};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "what",
    "which", "who", "when", "where", "why", "how", "this", "that", "these", "those",
];

const ACADEMIC_KEYWORDS: &[&str] = &["scholarly", "academic", "peer-reviewed"];
const NEWS_KEYWORDS: &[&str] = &["news", "recent"];
const DEFAULT_SOURCE_TYPES: &[&str] = &["peer-reviewed", "official", "news"];
const MAX_KEYWORDS: usize = 10;

static YEAR_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*(?:to|-|–)\s*(\d{4})").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[a-z]+\b").unwrap());

/// Keyword groups for `detect_question_type`, checked in order.
const TYPE_KEYWORDS: &[(QuestionType, &[&str])] = &[
    (QuestionType::Methodology, &["how", "method", "process", "way"]),
    (QuestionType::Causal, &["why", "cause", "reason", "effect"]),
    (QuestionType::Definition, &["what", "definition", "mean", "is"]),
    (QuestionType::Comparative, &["compare", "difference", "versus", "vs"]),
    (QuestionType::Historical, &["trend", "history", "evolution", "over time"]),
    (QuestionType::Impact, &["impact", "effect", "consequence", "result"]),
];

/// Meaningful lowercase words in first-occurrence order, deduplicated.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() > 3 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(*w))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Coarse question classification by substring match.
pub fn detect_question_type(text: &str) -> QuestionType {
    let lower = text.to_lowercase();
    TYPE_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(QuestionType::Analysis)
}

/// Date range, source preference and domain keyword, from the question alone.
pub fn derive_constraints(question: &str) -> Constraints {
    let time_horizon = YEAR_RANGE
        .captures(question)
        .map(|c| format!("{}-01-01 to {}-12-31", &c[1], &c[2]));

    let lower = question.to_lowercase();
    let source_types: &[&str] = if ACADEMIC_KEYWORDS.iter().any(|k| lower.contains(k)) {
        &["peer-reviewed"]
    } else if NEWS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        &["news", "official"]
    } else {
        DEFAULT_SOURCE_TYPES
    };

    Constraints {
        time_horizon,
        source_types: source_types.iter().map(|s| s.to_string()).collect(),
        domain_focus: extract_keywords(question).into_iter().next(),
    }
}
