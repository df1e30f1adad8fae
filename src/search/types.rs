use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One search hit, normalized from the backend's result item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Snippet returned by the search backend; may be empty.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Sub-question id -> sources, in the backend's relevance order.
pub type RetrievalResult = HashMap<String, Vec<SourceRecord>>;

/// Request body for a Tavily-compatible `/search` endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub api_key: &'a str,
    pub query: &'a str,
    pub search_depth: &'static str,
    pub max_results: u32,
    pub include_images: bool,
    pub include_answer: bool,
    pub include_raw_content: bool,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<RawSearchResult>,
}

/// Result item as sent by the backend. Any field may be missing or null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawSearchResult {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    pub score: Option<f64>,
}

impl From<RawSearchResult> for SourceRecord {
    fn from(raw: RawSearchResult) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.url.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            score: raw.score.unwrap_or(0.0),
        }
    }
}
