//! Salvaging report text from a completion response that failed, timed out
//! or came back in an unexpected shape.
//!
//! Extractors are tried in order over the raw response body; the first one
//! whose output meets its minimum length wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::llm::extract_content;

const ASSISTANT_TURN: &str = "<|im_start|>assistant";
const ASSISTANT_LINE: &str = "assistant\n";
const END_OF_TURN: &str = "<|im_end|>";

/// Escape-aware, terminated JSON string.
static CONTENT_STRICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"content":\s*"((?:[^"\\]|\\.)*)""#).unwrap());
/// Lazy match up to a quote that is followed by `,` or `}`.
static CONTENT_LAZY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"content":\s*"(.+?)"\s*[,}]"#).unwrap());
/// Unterminated: runs to the end of a truncated body.
static CONTENT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"content":\s*"((?:[^"\\]|\\.)*)"#).unwrap());

static PROSE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][^.!?]*[.!?](?:\s+[A-Z][^.!?]*[.!?]){2,}").unwrap()
});
static PROSE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][^.!?]*[.!?]\s+[A-Z][^.!?]*[.!?]").unwrap());

pub struct Extractor {
    pub name: &'static str,
    /// Output shorter than this (in chars) is rejected.
    pub min_chars: usize,
    extract: fn(&str) -> Option<String>,
}

impl Extractor {
    pub fn apply(&self, raw: &str) -> Option<String> {
        (self.extract)(raw)
            .map(|text| text.trim().to_string())
            .filter(|text| text.chars().count() >= self.min_chars)
    }
}

pub const LADDER: &[Extractor] = &[
    Extractor {
        name: "json",
        min_chars: 100,
        extract: extract_content,
    },
    Extractor {
        name: "content-field",
        min_chars: 100,
        extract: content_field,
    },
    Extractor {
        name: "assistant-turn",
        min_chars: 100,
        extract: assistant_turn,
    },
    Extractor {
        name: "after-assistant",
        min_chars: 100,
        extract: after_assistant,
    },
    Extractor {
        name: "prose",
        min_chars: 201,
        extract: prose,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub strategy: &'static str,
    pub text: String,
}

/// Run the ladder over a raw response body.
pub fn recover(raw: &str) -> Option<Recovered> {
    LADDER.iter().find_map(|extractor| {
        extractor.apply(raw).map(|text| Recovered {
            strategy: extractor.name,
            text,
        })
    })
}

/// Decode the escapes that show up in JSON string bodies.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn content_field(raw: &str) -> Option<String> {
    [&*CONTENT_STRICT, &*CONTENT_LAZY, &*CONTENT_OPEN]
        .iter()
        .filter_map(|re| re.captures(raw))
        .map(|caps| unescape(&caps[1]))
        .find(|text| text.trim().chars().count() >= 100)
}

fn assistant_turn(raw: &str) -> Option<String> {
    let start = raw.rfind(ASSISTANT_TURN)? + ASSISTANT_TURN.len();
    let rest = &raw[start..];
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let end = rest.find(END_OF_TURN)?;
    Some(rest[..end].to_string())
}

fn after_assistant(raw: &str) -> Option<String> {
    let start = raw.rfind(ASSISTANT_LINE)? + ASSISTANT_LINE.len();
    let rest = &raw[start..];
    let end = rest.find(END_OF_TURN).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

fn prose(raw: &str) -> Option<String> {
    [&*PROSE_RUN, &*PROSE_PAIR]
        .iter()
        .flat_map(|re| re.find_iter(raw))
        .map(|m| m.as_str().trim().to_string())
        .find(|text| text.chars().count() > 200)
}
