use std::collections::BTreeMap;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::SearchError;
use crate::retry::{RetryPolicy, with_retries};
use crate::state::Source;

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const SUMMARY_MAX_CHARS: usize = 4000;

/// OpenSearch replies with `[query, titles, descriptions, urls]`.
#[derive(Debug, Deserialize)]
struct OpenSearchResponse(String, Vec<String>, Vec<String>, Vec<String>);

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: BTreeMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: String,
}

/// Client for the MediaWiki action API.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    http: Client,
    api_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl WikipediaClient {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(
        http: Client,
        api_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
            timeout,
            retry,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, SearchError> {
        let url = url::Url::parse_with_params(&self.api_url, params)?;
        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Title search, retried on transient failures.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        let limit = max_results.to_string();
        let params = [
            ("action", "opensearch"),
            ("search", query),
            ("limit", limit.as_str()),
            ("namespace", "0"),
            ("format", "json"),
        ];

        let OpenSearchResponse(_, titles, descriptions, urls) =
            with_retries(self.retry, SearchError::is_retriable, || {
                self.get_json::<OpenSearchResponse>(&params)
            })
            .await?;

        let results: Vec<Source> = titles
            .into_iter()
            .zip(descriptions)
            .zip(urls)
            .map(|((title, description), url)| Source {
                title,
                url,
                description,
                ..Default::default()
            })
            .collect();
        debug!(results = results.len(), "wikipedia search complete");
        Ok(results)
    }

    /// Plain-text extract of the article an URL points at, capped at 4000 characters.
    pub async fn summary_from_url(&self, url: &str) -> Result<String, SearchError> {
        let title = title_from_url(url);
        let params = [
            ("action", "query"),
            ("prop", "extracts"),
            ("explaintext", "1"),
            ("titles", title.as_str()),
            ("format", "json"),
        ];
        let response: ExtractResponse = self.get_json(&params).await?;
        let extract = response
            .query
            .and_then(|q| q.pages.into_values().next())
            .map(|page| page.extract)
            .unwrap_or_default();
        Ok(crate::markdown::truncate_chars(&extract, SUMMARY_MAX_CHARS).to_string())
    }
}

pub fn is_article_url(url: &str) -> bool {
    url.contains("wikipedia.org/wiki/")
}

/// Article title from a `/wiki/<Title>` URL; anything else is used as the title verbatim.
fn title_from_url(url: &str) -> String {
    match url.split_once("/wiki/") {
        Some((_, rest)) => {
            let rest = rest.split(['#', '?']).next().unwrap_or(rest);
            percent_decode_str(rest).decode_utf8_lossy().into_owned()
        }
        None => url.to_string(),
    }
}
