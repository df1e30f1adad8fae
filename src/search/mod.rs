pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::research::types::SubQuestion;

use types::{RetrievalResult, SearchRequest, SearchResponse, SourceRecord};

const SEARCH_DEPTH: &str = "advanced";
const MAX_RESULTS: u32 = 5;

/// A web search provider. Errors are returned, not swallowed; the
/// `Retriever` decides what a failed lookup means.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>>;
}

/// Tavily-compatible search over HTTP.
pub struct TavilyClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl TavilyClient {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.search_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.search_url.clone(),
            api_key: config.search_api_key.clone(),
        })
    }
}

#[async_trait]
impl SearchBackend for TavilyClient {
    async fn search(&self, query: &str) -> Result<Vec<SourceRecord>> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: SEARCH_DEPTH,
            max_results: MAX_RESULTS,
            include_images: false,
            include_answer: false,
            include_raw_content: false,
            include_domains: vec![],
            exclude_domains: vec![],
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search endpoint returned an error status")?;

        let parsed: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse search response")?;

        Ok(parsed.results.into_iter().map(SourceRecord::from).collect())
    }
}

/// Fans sub-questions out to a search backend, one request each.
pub struct Retriever {
    backend: Arc<dyn SearchBackend>,
}

impl Retriever {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Every sub-question id ends up as a key. A failed lookup maps to an
    /// empty list and does not affect the others.
    pub async fn search(&self, subquestions: &[SubQuestion]) -> RetrievalResult {
        info!(count = subquestions.len(), "Searching sources for sub-questions");

        let lookups = subquestions.iter().map(|sq| async move {
            let sources = match self.backend.search(&sq.text).await {
                Ok(sources) => sources,
                Err(e) => {
                    warn!(id = %sq.id, "Search failed, continuing without sources: {:#}", e);
                    Vec::new()
                }
            };
            (sq.id.clone(), sources)
        });

        let results: RetrievalResult = join_all(lookups).await.into_iter().collect();

        for sq in subquestions {
            let sources = results.get(&sq.id).map(Vec::as_slice).unwrap_or_default();
            info!(id = %sq.id, sources = sources.len(), "Search complete");
            for (i, source) in sources.iter().enumerate() {
                debug!(
                    id = %sq.id,
                    rank = i + 1,
                    score = source.score,
                    title = %source.title,
                    url = %source.url,
                    "  source"
                );
            }
        }

        results
    }
}
