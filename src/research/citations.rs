use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::search::types::RetrievalResult;

use super::types::SubQuestion;

/// Sources per sub-question that make it into the synthesis context.
pub const SOURCES_PER_SUBQUESTION: usize = 2;
/// Snippet length (chars) kept per source in the context.
pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// e.g. `[Q12]` for the second source of sub-question `q1`.
    pub key: String,
    pub title: String,
    pub url: String,
}

/// One source as presented to the writer model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextItem {
    pub topic: String,
    pub title: String,
    pub content: String,
    pub citation: String,
}

pub fn citation_key(subquestion_id: &str, seq: usize) -> String {
    format!("[{}{}]", subquestion_id.to_uppercase(), seq)
}

fn truncate_snippet(content: &str) -> String {
    if content.chars().count() > SNIPPET_CHARS {
        let head: String = content.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

/// Select the top sources per sub-question (in sub-question order) and
/// assign citation keys. Sources filed under ids the plan does not list
/// follow in id order, with the id standing in as the topic. Citations come
/// back in insertion order.
pub fn build_context(
    subquestions: &[SubQuestion],
    retrieval: &RetrievalResult,
) -> (Vec<ContextItem>, Vec<Citation>) {
    let mut items = Vec::new();
    let mut citations = Vec::new();
    let mut seen_ids = HashSet::new();

    let mut topics: Vec<(&str, &str)> = Vec::new();
    for sq in subquestions {
        // A sloppy model can hand us the same id twice.
        if seen_ids.insert(sq.id.as_str()) {
            topics.push((sq.id.as_str(), sq.text.as_str()));
        }
    }
    let mut orphans: Vec<&str> = retrieval
        .keys()
        .map(String::as_str)
        .filter(|id| !seen_ids.contains(id))
        .collect();
    orphans.sort_unstable();
    topics.extend(orphans.into_iter().map(|id| (id, id)));

    for (id, topic) in topics {
        let Some(sources) = retrieval.get(id) else {
            continue;
        };

        for (i, source) in sources.iter().take(SOURCES_PER_SUBQUESTION).enumerate() {
            let key = citation_key(id, i + 1);
            citations.push(Citation {
                key: key.clone(),
                title: source.title.clone(),
                url: source.url.clone(),
            });
            items.push(ContextItem {
                topic: topic.to_string(),
                title: source.title.clone(),
                content: truncate_snippet(&source.content),
                citation: key,
            });
        }
    }

    (items, citations)
}

pub fn render_context(items: &[ContextItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "Topic: {}\nSource: {}\nContent: {}\nCitation: {}",
                item.topic, item.title, item.content, item.citation
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn has_bibliography(report: &str) -> bool {
    report.contains("References") || report.contains("Bibliography")
}

/// Append a `References:` section unless the report already has one.
pub fn append_bibliography(report: String, citations: &[Citation]) -> String {
    if citations.is_empty() || has_bibliography(&report) {
        return report;
    }

    let mut out = report;
    out.push_str("\n\nReferences:\n\n");
    for c in citations {
        out.push_str(&format!("{} {}\n   Available at: {}\n\n", c.key, c.title, c.url));
    }
    out
}
