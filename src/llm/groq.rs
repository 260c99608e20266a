use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ApiError, ChatMessage, ChatRequest, ChatResponse};
use super::{LlmClient, LlmError};
use crate::config::{ApiKey, Settings};
use crate::retry::{RetryPolicy, with_retries};

const TEMPERATURE: f32 = 0.2;

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default).
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GroqClient {
    pub fn from_settings(http: Client, settings: &Settings) -> Result<Self, LlmError> {
        let api_key = settings
            .groq_api_key
            .clone()
            .ok_or(LlmError::ApiKeyNotSet)?;
        Ok(Self {
            http,
            api_key,
            model: settings.groq_model.clone(),
            base_url: settings.groq_base_url.trim_end_matches('/').to_string(),
            timeout: settings.http_timeout,
            retry: RetryPolicy::default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            model: crate::config::DEFAULT_GROQ_MODEL.to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::immediate(3),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat_once(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("LLM API rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<ChatResponse>(&text)
                && let Some(err) = &body.error
            {
                let classified = classify_api_error(status.as_u16(), err);
                warn!(error = %classified, "LLM API error");
                return Err(classified);
            }
            let snippet = crate::markdown::truncate_chars(&text, 200);
            warn!(status = %status, "LLM API error (no structured body)");
            return Err(LlmError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        let body: ChatResponse = response.json().await?;
        if let Some(err) = &body.error {
            let classified = classify_api_error(status.as_u16(), err);
            warn!(error = %classified, "LLM API error in 200 response");
            return Err(classified);
        }

        let text = body
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

impl LlmClient for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        with_retries(self.retry, LlmError::is_retriable, || self.chat_once(prompt)).await
    }
}

fn classify_api_error(status: u16, err: &ApiError) -> LlmError {
    let message = err
        .message
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string());

    match (status, err.kind.as_deref()) {
        (429, _) | (_, Some("rate_limit_exceeded")) => LlmError::RateLimited,
        (code, _) => LlmError::Api { code, message },
    }
}
