use std::time::Duration;

use reqwest::Client;

use super::ExtractError;

pub(super) const READER_BASE: &str = "https://r.jina.ai";

/// Reader endpoint path for a page: the page URL re-prefixed with `http://`.
fn reader_url(base: &str, url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    format!("{base}/http://{rest}")
}

pub(super) async fn read(
    http: &Client,
    base: &str,
    url: &str,
    timeout: Duration,
) -> Result<String, ExtractError> {
    let response = http
        .get(reader_url(base, url))
        .header("User-Agent", crate::USER_AGENT)
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if status.as_u16() >= 400 {
        return Err(ExtractError::Status(status.as_u16()));
    }
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}
