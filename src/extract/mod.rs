//! URL → Markdown through a fixed chain of providers, first non-empty result wins:
//! RapidAPI url-to-markdown, Tavily Extract, Jina Reader, then the local fetcher.

mod jina;
mod rapidapi;
mod tavily;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{ApiKey, RapidApiSettings, Settings};
use crate::fetch::{self, FetchError, FetchOptions, TokioDnsResolver};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{0} not set")]
    MissingKey(&'static str),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("status {0}")]
    Status(u16),

    #[error("empty result")]
    Empty,

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    RapidApi,
    Tavily,
    Jina,
    Local,
}

impl Provider {
    pub const CHAIN: [Provider; 4] = [
        Provider::RapidApi,
        Provider::Tavily,
        Provider::Jina,
        Provider::Local,
    ];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::RapidApi => "rapidapi",
            Provider::Tavily => "tavily",
            Provider::Jina => "jina",
            Provider::Local => "local",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub provider: Provider,
    pub markdown: String,
}

/// Page-to-Markdown conversion as seen by the writer step.
/// Implemented by `UrlExtractor` for production; mock implementations used in tests.
pub trait PageExtractor {
    /// Never fails: when every provider fails a placeholder document is returned.
    async fn url_to_markdown(&self, url: &str) -> String;
}

#[derive(Debug, Clone)]
struct Endpoints {
    rapidapi: String,
    tavily: String,
    jina: String,
}

impl Endpoints {
    fn from_settings(rapidapi: &RapidApiSettings) -> Self {
        Self {
            rapidapi: format!("{}{}", rapidapi.base.trim_end_matches('/'), rapidapi.endpoint),
            tavily: tavily::API_URL.to_string(),
            jina: jina::READER_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlExtractor {
    http: Client,
    rapidapi_key: Option<ApiKey>,
    rapidapi_host: String,
    tavily_key: Option<ApiKey>,
    endpoints: Endpoints,
    timeout: Duration,
}

impl UrlExtractor {
    pub fn new(http: Client, settings: &Settings) -> Self {
        Self {
            http,
            rapidapi_key: settings.rapidapi.key.clone(),
            rapidapi_host: settings.rapidapi.host.clone(),
            tavily_key: settings.tavily_api_key.clone(),
            endpoints: Endpoints::from_settings(&settings.rapidapi),
            timeout: settings.http_timeout,
        }
    }

    #[cfg(test)]
    fn for_tests(base: &str, rapidapi_key: Option<&str>, tavily_key: Option<&str>) -> Self {
        Self {
            http: Client::new(),
            rapidapi_key: rapidapi_key.map(ApiKey::new),
            rapidapi_host: "test.rapidapi.com".into(),
            tavily_key: tavily_key.map(ApiKey::new),
            endpoints: Endpoints {
                rapidapi: format!("{base}/convert"),
                tavily: format!("{base}/extract"),
                jina: format!("{base}/jina"),
            },
            timeout: Duration::from_secs(5),
        }
    }

    /// Walk the chain and report which provider produced the Markdown.
    pub async fn extract(&self, url: &str) -> Result<Extraction, ExtractError> {
        let mut last_err = ExtractError::Empty;
        for provider in Provider::CHAIN {
            match self.run_provider(provider, url).await {
                Ok(markdown) if !markdown.trim().is_empty() => {
                    info!(%provider, url, chars = markdown.len(), "page extracted");
                    return Ok(Extraction { provider, markdown });
                }
                Ok(_) => {
                    debug!(%provider, url, "provider returned empty markdown");
                    last_err = ExtractError::Empty;
                }
                Err(ExtractError::MissingKey(key)) => {
                    debug!(%provider, "skipping provider, {key} not set");
                    last_err = ExtractError::MissingKey(key);
                }
                Err(e) => {
                    warn!(%provider, url, error = %e, "extraction provider failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn run_provider(&self, provider: Provider, url: &str) -> Result<String, ExtractError> {
        match provider {
            Provider::RapidApi => {
                let key = self
                    .rapidapi_key
                    .as_ref()
                    .ok_or(ExtractError::MissingKey("RAPIDAPI_KEY"))?;
                rapidapi::convert(
                    &self.http,
                    &self.endpoints.rapidapi,
                    key,
                    &self.rapidapi_host,
                    url,
                    self.timeout,
                )
                .await
            }
            Provider::Tavily => {
                let key = self
                    .tavily_key
                    .as_ref()
                    .ok_or(ExtractError::MissingKey("TAVILY_API_KEY"))?;
                tavily::extract(&self.http, &self.endpoints.tavily, key, url, self.timeout).await
            }
            Provider::Jina => jina::read(&self.http, &self.endpoints.jina, url, self.timeout).await,
            Provider::Local => {
                let page = tokio::time::timeout(
                    self.timeout,
                    fetch::fetch_page(&self.http, url, FetchOptions::default(), &TokioDnsResolver),
                )
                .await
                .map_err(|_| ExtractError::Timeout(self.timeout.as_secs()))??;
                if page.used_raw_fallback {
                    debug!(url, "readability failed, converted whole page");
                }
                Ok(page.markdown)
            }
        }
    }
}

pub fn unable_to_convert(url: &str) -> String {
    format!("# Unable to convert\n\nFailed to fetch/convert: {url}\n")
}

impl PageExtractor for UrlExtractor {
    async fn url_to_markdown(&self, url: &str) -> String {
        match self.extract(url).await {
            Ok(extraction) => extraction.markdown,
            Err(e) => {
                warn!(url, error = %e, "all extraction providers failed");
                unable_to_convert(url)
            }
        }
    }
}
