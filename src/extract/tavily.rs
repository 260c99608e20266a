use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ExtractError;
use crate::config::ApiKey;

pub(super) const API_URL: &str = "https://api.tavily.com/extract";

#[derive(Serialize)]
struct ExtractRequest<'a> {
    api_key: &'a str,
    url: &'a str,
    urls: [&'a str; 1],
}

/// Accepts both the single-page shape (`title`/`content`) and the batch shape
/// (`results[].raw_content`).
#[derive(Debug, Default, Deserialize)]
struct ExtractResponse {
    title: Option<String>,
    content: Option<String>,
    #[serde(default)]
    results: Vec<ExtractResult>,
}

#[derive(Debug, Deserialize)]
struct ExtractResult {
    title: Option<String>,
    raw_content: Option<String>,
}

pub(super) async fn extract(
    http: &Client,
    endpoint: &str,
    key: &ApiKey,
    url: &str,
    timeout: Duration,
) -> Result<String, ExtractError> {
    let response = http
        .post(endpoint)
        .bearer_auth(key.expose())
        .json(&ExtractRequest {
            api_key: key.expose(),
            url,
            urls: [url],
        })
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(ExtractError::Status(status.as_u16()));
    }
    let body: ExtractResponse = response.json().await?;
    to_markdown(body, url).ok_or(ExtractError::Empty)
}

fn to_markdown(body: ExtractResponse, url: &str) -> Option<String> {
    let (title, text) = match body.content.filter(|c| !c.trim().is_empty()) {
        Some(content) => (body.title, content),
        None => {
            let first = body.results.into_iter().next()?;
            let text = first.raw_content.filter(|c| !c.trim().is_empty())?;
            (first.title, text)
        }
    };
    let title = title.filter(|t| !t.trim().is_empty());
    Some(format!(
        "# {}\n\n{text}",
        crate::markdown::sanitize_heading(title.as_deref().unwrap_or(url))
    ))
}
