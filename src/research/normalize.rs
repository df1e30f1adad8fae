//! Cleanup pass over raw report text before export.
//!
//! Not strictly idempotent: a line that only became short because of an
//! earlier pass can be dropped by a second one. In practice a second pass is
//! a no-op on text this module produced.

use std::collections::HashSet;

/// Anything after a line containing one of these is the prompt echoed back.
const ECHO_MARKERS: &[&str] = &["research question:", "research materials:"];

/// Labels that open a line, colon included.
const LABEL_PREFIXES: &[&str] = &[
    "introduction:",
    "background:",
    "analysis:",
    "summary:",
    "findings:",
    "methodology:",
    "results:",
    "discussion:",
    "conclusion:",
    "implications:",
    "body:",
];

/// Section names that count as a heading only when they make up the whole
/// line, give or take markdown, numbering and a trailing colon.
const SECTION_NAMES: &[&str] = &[
    "introduction",
    "background",
    "analysis",
    "summary",
    "findings",
    "key findings",
    "methodology",
    "results",
    "discussion",
    "conclusion",
    "conclusions",
    "implications",
    "future directions",
    "future trends",
    "impacts",
    "challenges",
    "comparisons",
    "abstract",
    "appendix",
    "acknowledgements",
];

/// Everything from one of these headings on is the bibliography.
const BIBLIOGRAPHY_NAMES: &[&str] = &["references", "bibliography", "sources", "works cited"];

/// Sub-questions echoed back as headings.
const QUESTION_PREFIXES: &[&str] = &[
    "what is",
    "what are",
    "how do",
    "how does",
    "advantages of",
    "comparison with",
    "different types of",
];

/// Instructions from the writer prompt that some models repeat verbatim.
const PROMPT_ECHO_PREFIXES: &[&str] = &[
    "write a comprehensive",
    "write an",
    "create a",
    "generate a",
    "requirements:",
    "instructions:",
    "use the research materials",
    "include citations",
    "do not",
    "don't",
    "must include",
    "should include",
    "each paragraph",
    "the report should",
];

/// Lines shorter than this (in chars) are dropped after a heading.
const SHORT_FOLLOWER: usize = 50;
/// Bracketed lines shorter than this are bare citation markers like `[1]`.
const BARE_CITATION: usize = 10;

/// Strip markdown, numbering and a trailing colon: `## 2. Analysis:` -> `analysis`.
fn heading_text(lower: &str) -> &str {
    lower
        .trim_start_matches(|c: char| {
            c == '#' || c == '*' || c == '.' || c == ')' || c.is_ascii_digit() || c.is_whitespace()
        })
        .trim_end_matches(|c: char| c == ':' || c == '*' || c == '#' || c.is_whitespace())
}

fn is_heading(line: &str, lower: &str) -> bool {
    line.starts_with('#')
        || LABEL_PREFIXES.iter().any(|p| lower.starts_with(p))
        || SECTION_NAMES.contains(&heading_text(lower))
        || (lower.ends_with('?') && QUESTION_PREFIXES.iter().any(|p| lower.starts_with(p)))
}

fn is_bibliography_heading(lower: &str) -> bool {
    BIBLIOGRAPHY_NAMES.contains(&heading_text(lower))
}

fn is_prompt_echo(lower: &str) -> bool {
    PROMPT_ECHO_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_bare_citation(line: &str) -> bool {
    line.starts_with('[') && line.contains(']') && line.chars().count() < BARE_CITATION
}

fn sentence_key(sentence: &str) -> &str {
    sentence.trim_end_matches('.').trim()
}

/// Strip headings, echoed prompt text and repeated sentences; rejoin the
/// rest as flowing paragraphs separated by blank lines.
pub fn normalize(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut skip_next = false;

    let mut flush = |current: &mut Vec<&str>| {
        if !current.is_empty() {
            let joined = current.join(" ");
            paragraphs.push(joined.split_whitespace().collect::<Vec<_>>().join(" "));
            current.clear();
        }
    };

    for line in raw.lines() {
        let line = line.trim();
        let lower = line.to_lowercase();

        if ECHO_MARKERS.iter().any(|m| lower.contains(m)) || is_bibliography_heading(&lower) {
            break;
        }
        // Blank lines end a paragraph but leave a pending heading skip alone.
        if line.is_empty() {
            flush(&mut current);
            continue;
        }
        if is_bare_citation(line) {
            continue;
        }
        if is_heading(line, &lower) || is_prompt_echo(&lower) {
            skip_next = true;
            continue;
        }
        if skip_next {
            skip_next = false;
            if line.chars().count() < SHORT_FOLLOWER {
                continue;
            }
        }
        current.push(line);
    }
    flush(&mut current);

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept_paragraphs = Vec::new();
    for paragraph in &paragraphs {
        let sentences: Vec<&str> = paragraph
            .split(". ")
            .map(str::trim)
            .filter(|s| !sentence_key(s).is_empty())
            .collect();
        let last = sentences.len().saturating_sub(1);

        let mut kept = Vec::new();
        let mut dropped_last = false;
        for (i, sentence) in sentences.iter().enumerate() {
            if seen.insert(sentence_key(sentence).to_string()) {
                kept.push(*sentence);
            } else if i == last {
                dropped_last = true;
            }
        }
        if kept.is_empty() {
            continue;
        }

        let mut text = kept.join(". ");
        if dropped_last && !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        kept_paragraphs.push(text);
    }

    let mut out = kept_paragraphs.join("\n\n");
    if !out.is_empty() && !out.ends_with('.') {
        out.push('.');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::citations::{append_bibliography, Citation};

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\n   \n"), "");
    }

    #[test]
    fn test_truncates_at_echoed_prompt() {
        let raw = "Solar output varies over an eleven year cycle.\n\nResearch Question: why?\nMore text.";
        assert_eq!(normalize(raw), "Solar output varies over an eleven year cycle.");
    }

    #[test]
    fn test_headings_and_short_followers_removed() {
        let raw = "# Introduction\nShort subtitle\nThe first real paragraph explains the observed pattern in detail across regions.\n\nConclusion\n\nA closing sentence that is long enough to survive the short follower rule.";
        let out = normalize(raw);
        assert!(!out.contains("Introduction"));
        assert!(!out.contains("Short subtitle"));
        assert!(!out.contains("Conclusion"));
        assert!(out.starts_with("The first real paragraph"));
        // Blank line after a heading does not reset the skip, but a long line survives it.
        assert!(out.contains("A closing sentence that is long enough"));
    }

    #[test]
    fn test_blank_line_does_not_reset_skip() {
        let raw = "Background\n\nToo short.\n\nThis paragraph is well beyond fifty characters in length and stays.";
        assert_eq!(
            normalize(raw),
            "This paragraph is well beyond fifty characters in length and stays."
        );
    }

    #[test]
    fn test_bare_citations_dropped() {
        let raw = "Ice sheets are thinning [Q11].\n[1]\n[Q12]\nMelt rates doubled since 1990.";
        assert_eq!(
            normalize(raw),
            "Ice sheets are thinning [Q11]. Melt rates doubled since 1990."
        );
    }

    #[test]
    fn test_prompt_echo_dropped() {
        let raw = "Write a comprehensive 8-paragraph report.\nOk.\nGlaciers retreat as summers lengthen and winter snowfall declines.";
        assert_eq!(
            normalize(raw),
            "Glaciers retreat as summers lengthen and winter snowfall declines."
        );
    }

    #[test]
    fn test_sentence_dedup_across_paragraphs() {
        let raw = "Rivers carry sediment. Deltas grow slowly.\n\nDeltas grow slowly. Storms reshape coasts.";
        assert_eq!(
            normalize(raw),
            "Rivers carry sediment. Deltas grow slowly.\n\nStorms reshape coasts."
        );
    }

    #[test]
    fn test_dedup_ignores_trailing_period() {
        let raw = "Deltas grow slowly. Rivers carry sediment.\n\nRivers carry sediment";
        assert_eq!(normalize(raw), "Deltas grow slowly. Rivers carry sediment.");
    }

    #[test]
    fn test_dropped_last_sentence_keeps_period() {
        let raw = "Rivers carry sediment.\n\nDeltas grow slowly. Rivers carry sediment.\n\nStorms reshape coasts.";
        assert_eq!(
            normalize(raw),
            "Rivers carry sediment.\n\nDeltas grow slowly.\n\nStorms reshape coasts."
        );
    }

    #[test]
    fn test_lines_joined_and_spaces_collapsed() {
        let raw = "Wind  turbines\nturn   faster at height";
        assert_eq!(normalize(raw), "Wind turbines turn faster at height.");
    }

    #[test]
    fn test_bibliography_cut_off() {
        let raw = "Body sentence about coastal erosion and its drivers.\n\nReferences:\n\n[Q11] Coastal Study\n   Available at: https://coast.example\n\n";
        assert_eq!(
            normalize(raw),
            "Body sentence about coastal erosion and its drivers."
        );
    }

    #[test]
    fn test_bibliography_with_long_titles_cut_off() {
        let citations = vec![
            Citation {
                key: "[Q11]".into(),
                title: "Climate change impacts on coral reefs: a systematic review | Nature".into(),
                url: "https://nature.example/reefs".into(),
            },
            Citation {
                key: "[Q12]".into(),
                title: "Global assessment of ocean warming trends and ecosystem responses".into(),
                url: "https://ocean.example/warming".into(),
            },
        ];
        let raw = append_bibliography(
            "Body sentence about reef decline across the western Pacific [Q11].".to_string(),
            &citations,
        );
        assert_eq!(
            normalize(&raw),
            "Body sentence about reef decline across the western Pacific [Q11]."
        );
        assert_eq!(
            normalize("Body text here.\n\n**Bibliography**\n[1] Some long source title that keeps going for a while"),
            "Body text here."
        );
    }

    #[test]
    fn test_prose_opening_with_section_words_kept() {
        let raw = "Coral reefs are declining across the Pacific basin at record pace.\n\n\
                   Analysis of satellite records shows bleaching events every two to three years.\n\n\
                   Background research points to marine heatwaves as the main driver.\n\n\
                   Implications for fisheries are severe in small island states.\n\n\
                   Challenges remain in funding long-term monitoring.";
        let out = normalize(raw);
        assert_eq!(out.split("\n\n").count(), 5);
        assert!(out.contains("Analysis of satellite records"));
        assert!(out.contains("Background research points"));
        assert!(out.contains("Implications for fisheries"));
        assert!(out.contains("Challenges remain"));
    }

    #[test]
    fn test_heading_forms() {
        for heading in [
            "## 2. Analysis",
            "**Findings:**",
            "Implications",
            "Methodology: how the data was gathered",
            "What are the impacts of reef loss?",
        ] {
            let raw = format!("{}\nShort line\nKept paragraph that is comfortably longer than fifty characters.", heading);
            assert_eq!(
                normalize(&raw),
                "Kept paragraph that is comfortably longer than fifty characters.",
                "heading: {}",
                heading
            );
        }
        // A question inside prose is not an echoed sub-question.
        assert_eq!(
            normalize("What is clear is that reefs recover slowly."),
            "What is clear is that reefs recover slowly."
        );
    }

    #[test]
    fn test_second_pass_is_stable() {
        let raw = "## Analysis\nThe survey found strong regional differences in adoption rates. Costs fell.\n\nCosts fell. Policy support mattered most";
        let once = normalize(raw);
        assert_eq!(normalize(&once), once);
    }
}
