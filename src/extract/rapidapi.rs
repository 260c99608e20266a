use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::ExtractError;
use crate::config::ApiKey;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertRequest<'a> {
    url: &'a str,
    return_type: &'a str,
}

pub(super) async fn convert(
    http: &Client,
    endpoint: &str,
    key: &ApiKey,
    host: &str,
    url: &str,
    timeout: Duration,
) -> Result<String, ExtractError> {
    let response = http
        .post(endpoint)
        .header("x-rapidapi-key", key.expose())
        .header("x-rapidapi-host", host)
        .json(&ConvertRequest {
            url,
            return_type: "markdown",
        })
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExtractError::Status(status.as_u16()));
    }
    let body: Value = response.json().await?;
    Ok(markdown_from_body(body))
}

/// The service answers `{"markdown": ...}`, a bare JSON string, or something else entirely.
fn markdown_from_body(body: Value) -> String {
    match body {
        Value::String(s) => s,
        Value::Object(mut map) if map.contains_key("markdown") => match map.remove("markdown") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        },
        other => other.to_string(),
    }
}
