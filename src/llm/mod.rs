//! Text completion backends: a hosted OpenAI-compatible endpoint and an offline stub.

pub mod groq;
pub mod json;
mod stub;
pub mod types;

pub use groq::GroqClient;
pub use stub::StubLlm;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::Settings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LlmMode {
    #[default]
    Groq,
    Stub,
}

impl LlmMode {
    /// Anything other than "groq" selects the stub.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("groq") {
            LlmMode::Groq
        } else {
            LlmMode::Stub
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("GROQ_API_KEY not set")]
    ApiKeyNotSet,

    #[error("LLM rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("LLM API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("LLM returned an empty completion")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl LlmError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited
                | LlmError::Api {
                    code: 500..=599,
                    ..
                }
        )
    }
}

/// Prompt in, text out. Implemented by `Llm` for production; mocks in tests.
pub trait LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub enum Llm {
    Groq(GroqClient),
    Stub(StubLlm),
}

impl Llm {
    /// Prefer the hosted model; fall back to the stub, which never fails.
    pub fn from_settings(http: Client, settings: &Settings) -> Self {
        if settings.use_hosted_llm() {
            match GroqClient::from_settings(http, settings) {
                Ok(client) => {
                    info!(model = %client.model(), "using hosted LLM");
                    return Llm::Groq(client);
                }
                Err(e) => warn!("hosted LLM not available: {e}"),
            }
        }
        info!("using stub LLM");
        Llm::Stub(StubLlm)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Llm::Groq(_) => "groq",
            Llm::Stub(_) => "stub",
        }
    }
}

impl LlmClient for Llm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self {
            Llm::Groq(client) => client.complete(prompt).await,
            Llm::Stub(stub) => stub.complete(prompt).await,
        }
    }
}
