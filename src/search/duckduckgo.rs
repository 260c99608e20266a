use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::SearchError;
use crate::state::Source;

const API_URL: &str = "https://api.duckduckgo.com/";

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a single topic (`FirstURL` + `Text`) or a named group of `Topics`.
#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "Topics")]
    topics: Option<Vec<RelatedTopic>>,
}

/// Client for the DuckDuckGo instant-answer JSON API.
#[derive(Debug, Clone)]
pub struct DuckDuckGoClient {
    http: Client,
    api_url: String,
    timeout: Duration,
}

impl DuckDuckGoClient {
    pub fn new(http: Client, timeout: Duration) -> Self {
        Self {
            http,
            api_url: API_URL.to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(http: Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Source>, SearchError> {
        let url = url::Url::parse_with_params(
            &self.api_url,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )?;

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

        // The API labels its JSON as application/x-javascript.
        let text = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&text)?;
        let results = to_sources(answer, max_results);
        debug!(results = results.len(), "duckduckgo search complete");
        Ok(results)
    }
}

fn to_sources(answer: InstantAnswer, max_results: usize) -> Vec<Source> {
    let mut out = Vec::new();

    if !answer.abstract_url.is_empty() {
        out.push(Source {
            title: answer.heading,
            url: answer.abstract_url,
            description: answer.abstract_text,
            ..Default::default()
        });
    }

    flatten_topics(answer.related_topics, &mut out);
    out.truncate(max_results);
    out
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<Source>) {
    for topic in topics {
        if let Some(children) = topic.topics {
            flatten_topics(children, out);
            continue;
        }
        let Some(url) = topic.first_url.filter(|u| !u.is_empty()) else {
            continue;
        };
        let text = topic.text.unwrap_or_default();
        let title = text
            .split_once(" - ")
            .map(|(title, _)| title.to_string())
            .unwrap_or_else(|| text.clone());
        out.push(Source {
            title,
            url,
            description: text,
            ..Default::default()
        });
    }
}
