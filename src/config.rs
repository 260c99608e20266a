//! Runtime settings resolved from environment variables.
//!
//! Every knob has a default so the binary runs with no configuration at all:
//! without `GROQ_API_KEY` the stub LLM is used, and without extraction keys the
//! chain starts at the keyless Jina reader.

use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::LlmMode;

pub const DEFAULT_GROQ_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_URL2MD_HOST: &str = "url-to-markdown-api.p.rapidapi.com";
pub const DEFAULT_URL2MD_BASE: &str = "https://url-to-markdown-api.p.rapidapi.com";
pub const DEFAULT_URL2MD_ENDPOINT: &str = "/convert";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_SOURCES: usize = 10;
const DEFAULT_MIN_NON_EMPTY: usize = 5;
const DEFAULT_TRACE_DIR: &str = "artifacts";

pub const HTTP_TIMEOUT_RANGE: RangeInclusive<u64> = 5..=60;
pub const MAX_SOURCES_RANGE: RangeInclusive<usize> = 3..=30;
pub const MIN_NON_EMPTY_RANGE: RangeInclusive<usize> = 1..=20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be between {min} and {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

/// Secret that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct RapidApiSettings {
    pub key: Option<ApiKey>,
    pub host: String,
    pub base: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm_mode: LlmMode,
    pub groq_api_key: Option<ApiKey>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub http_timeout: Duration,
    pub max_sources: usize,
    pub min_non_empty: usize,
    pub rapidapi: RapidApiSettings,
    pub tavily_api_key: Option<ApiKey>,
    pub trace_dir: PathBuf,
    pub trace_enabled: bool,
    pub default_query: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let llm_mode = var("LLM_MODE")
            .map(|m| LlmMode::parse_lenient(&m))
            .unwrap_or_default();

        Ok(Self {
            llm_mode,
            groq_api_key: var("GROQ_API_KEY").map(ApiKey::new),
            groq_model: var("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            groq_base_url: var("GROQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(parse_number(
                "HTTP_TIMEOUT",
                var("HTTP_TIMEOUT"),
                DEFAULT_HTTP_TIMEOUT_SECS,
                HTTP_TIMEOUT_RANGE,
            )?),
            max_sources: parse_number(
                "MAX_SOURCES",
                var("MAX_SOURCES"),
                DEFAULT_MAX_SOURCES,
                MAX_SOURCES_RANGE,
            )?,
            min_non_empty: parse_number(
                "MIN_NON_EMPTY_SOURCES",
                var("MIN_NON_EMPTY_SOURCES"),
                DEFAULT_MIN_NON_EMPTY,
                MIN_NON_EMPTY_RANGE,
            )?,
            rapidapi: RapidApiSettings {
                key: var("RAPIDAPI_KEY").map(ApiKey::new),
                host: var("URL2MD_HOST").unwrap_or_else(|| DEFAULT_URL2MD_HOST.to_string()),
                base: var("URL2MD_BASE").unwrap_or_else(|| DEFAULT_URL2MD_BASE.to_string()),
                endpoint: var("URL2MD_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_URL2MD_ENDPOINT.to_string()),
            },
            tavily_api_key: var("TAVILY_API_KEY").map(ApiKey::new),
            trace_dir: var("TRACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACE_DIR)),
            trace_enabled: var("TRACE_ENABLED").is_some_and(|v| is_truthy(&v)),
            default_query: var("QUERY").map(|q| q.trim_matches('"').to_string()),
        })
    }

    /// Groq is used only when selected and a key is present.
    pub fn use_hosted_llm(&self) -> bool {
        self.llm_mode == LlmMode::Groq && self.groq_api_key.is_some()
    }
}

/// Same bounds as the matching `run` flags.
fn parse_number<T>(
    name: &'static str,
    raw: Option<String>,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    let Ok(n) = value.parse::<T>() else {
        return Err(ConfigError::InvalidNumber { var: name, value });
    };
    if !range.contains(&n) {
        return Err(ConfigError::OutOfRange {
            var: name,
            value,
            min: range.start().to_string(),
            max: range.end().to_string(),
        });
    }
    Ok(n)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
