//! Web search with an encyclopedia fallback, plus content enrichment of results.

pub mod duckduckgo;
pub mod wikipedia;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::state::Source;
use duckduckgo::DuckDuckGoClient;
use wikipedia::WikipediaClient;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("search failed: status {0}")]
    Status(u16),

    #[error("unexpected search response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SearchError {
    pub fn is_retriable(&self) -> bool {
        match self {
            SearchError::Network(_) => true,
            SearchError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Search and enrichment as seen by the researcher step.
/// Implemented by `WebSearch` for production; mock implementations used in tests.
pub trait SearchClient {
    /// Never fails: provider errors degrade to an empty list.
    async fn aggregate_search(&self, query: &str, max_results: usize) -> Vec<Source>;

    /// Attach page text to results where a cheap source exists.
    async fn enrich_with_content(&self, results: Vec<Source>) -> Vec<Source>;
}

#[derive(Debug, Clone)]
pub struct WebSearch {
    ddg: DuckDuckGoClient,
    wikipedia: WikipediaClient,
}

impl WebSearch {
    pub fn new(http: Client, settings: &Settings) -> Self {
        Self {
            ddg: DuckDuckGoClient::new(http.clone(), settings.http_timeout),
            wikipedia: WikipediaClient::new(http, settings.http_timeout),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clients(ddg: DuckDuckGoClient, wikipedia: WikipediaClient) -> Self {
        Self { ddg, wikipedia }
    }
}

impl SearchClient for WebSearch {
    async fn aggregate_search(&self, query: &str, max_results: usize) -> Vec<Source> {
        match self.ddg.search(query, max_results).await {
            Ok(results) if !results.is_empty() => {
                info!(provider = "duckduckgo", results = results.len(), "search complete");
                return results.into_iter().take(max_results).collect();
            }
            Ok(_) => debug!("duckduckgo returned no results, trying wikipedia"),
            Err(e) => warn!(%e, "duckduckgo search failed, trying wikipedia"),
        }

        match self.wikipedia.search(query, max_results).await {
            Ok(results) => {
                info!(provider = "wikipedia", results = results.len(), "search complete");
                results.into_iter().take(max_results).collect()
            }
            Err(e) => {
                warn!(%e, "wikipedia search failed");
                Vec::new()
            }
        }
    }

    async fn enrich_with_content(&self, results: Vec<Source>) -> Vec<Source> {
        let mut enriched = Vec::with_capacity(results.len());
        for mut result in results {
            result.content = if wikipedia::is_article_url(&result.url) {
                self.wikipedia
                    .summary_from_url(&result.url)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(url = %result.url, %e, "wikipedia summary failed");
                        String::new()
                    })
            } else {
                String::new()
            };
            enriched.push(result);
        }
        enriched
    }
}
