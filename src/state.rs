//! The record that flows through the pipeline, plus schema checks for its parts.

use serde::{Deserialize, Serialize};

/// A web page or document that contributes to the brief.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Source {
    /// Title for display, falling back to the URL.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub fact: String,
    #[serde(default)]
    pub evidence_url: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brief {
    pub topic: String,
    pub summary: String,
    #[serde(default)]
    pub key_facts: Vec<Fact>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(rename = "_markdown", default)]
    pub markdown: Option<String>,
}

/// Shared state handed from step to step. Each step overwrites only its own fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResearchState {
    pub query: String,
    pub sources: Vec<Source>,
    pub facts: Vec<Fact>,
    pub brief: Option<Brief>,
    pub tools_used: Vec<String>,
    pub violations: Vec<String>,
    pub tool_error: bool,
    pub schema_ok: bool,
    pub failure_count: u32,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

fn check_fact(fact: &Fact, field: &str) -> Result<(), ValidationError> {
    if fact.fact.chars().count() < 3 {
        return Err(ValidationError::new(
            format!("{field}.fact"),
            "must be at least 3 characters",
        ));
    }
    if let Some(url) = &fact.evidence_url
        && !is_http_url(url)
    {
        return Err(ValidationError::new(
            format!("{field}.evidence_url"),
            format!("'{url}' is not an http(s) URL"),
        ));
    }
    if !(0.0..=1.0).contains(&fact.confidence) {
        return Err(ValidationError::new(
            format!("{field}.confidence"),
            format!("{} is outside 0..=1", fact.confidence),
        ));
    }
    Ok(())
}

pub fn validate_facts(facts: &[Fact]) -> Result<(), ValidationError> {
    facts
        .iter()
        .enumerate()
        .try_for_each(|(i, f)| check_fact(f, &format!("facts[{i}]")))
}

pub fn validate_brief(brief: &Brief) -> Result<(), ValidationError> {
    if brief.topic.trim().is_empty() {
        return Err(ValidationError::new("topic", "must not be empty"));
    }
    for (i, fact) in brief.key_facts.iter().enumerate() {
        check_fact(fact, &format!("key_facts[{i}]"))?;
    }
    for (i, source) in brief.sources.iter().enumerate() {
        if !is_http_url(&source.url) {
            return Err(ValidationError::new(
                format!("sources[{i}].url"),
                format!("'{}' is not an http(s) URL", source.url),
            ));
        }
    }
    Ok(())
}
