use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::llm::LlmClient;
use crate::llm::json::parse_json_list_maybe;
use crate::markdown::truncate_chars;
use crate::state::{Fact, Source, validate_facts};

const MAX_SNIPPETS: usize = 8;
const SNIPPET_CHARS: usize = 900;
const FACT_CHARS: usize = 600;
const MAX_FACTS: usize = 8;
const DEFAULT_CONFIDENCE: f64 = 0.6;
const GENERIC_CONFIDENCE: f64 = 0.55;
const NO_SOURCE_URL: &str = "https://example.com";

fn facts_prompt(query: &str, sources: &[Source]) -> String {
    let snippets: Vec<String> = sources
        .iter()
        .take(MAX_SNIPPETS)
        .enumerate()
        .map(|(i, s)| {
            let body = if s.description.is_empty() {
                &s.content
            } else {
                &s.description
            };
            format!(
                "{}) {}\nURL: {}\n{}",
                i + 1,
                s.display_title(),
                s.url,
                truncate_chars(body, SNIPPET_CHARS)
            )
        })
        .collect();

    format!(
        "You are a precise market analyst. From the source snippets below, extract 6 concise facts about **{query}**.\n\
         Each fact MUST include an \"evidence_url\" from the provided URLs and a numeric \"confidence\" 0-1.\n\
         Return ONLY valid JSON list: [{{\"fact\":\"...\", \"evidence_url\":\"...\", \"confidence\":0.7}}, ...].\n\
         \n\
         SOURCE SNIPPETS:\n\
         \n\
         {}\n",
        snippets.join("\n")
    )
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(value_text))
}

fn parse_confidence(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_CONFIDENCE),
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Models name the fields inconsistently; accept the common spellings.
fn normalize_fact(raw: &Value, fallback_url: &str) -> Fact {
    let (text, url, confidence) = match raw {
        Value::Object(map) => (
            first_text(map, &["fact", "text", "statement"]).unwrap_or_default(),
            first_text(map, &["evidence_url", "source", "url"])
                .unwrap_or_else(|| fallback_url.to_string()),
            parse_confidence(map.get("confidence")),
        ),
        Value::String(s) => (s.clone(), fallback_url.to_string(), DEFAULT_CONFIDENCE),
        other => (other.to_string(), fallback_url.to_string(), DEFAULT_CONFIDENCE),
    };
    Fact {
        fact: truncate_chars(&text, FACT_CHARS).to_string(),
        evidence_url: Some(url),
        confidence,
    }
}

fn generic_fact(query: &str, fallback_url: &str) -> Fact {
    Fact {
        fact: format!("Market for {query} shows active ecosystem of tools and protocols."),
        evidence_url: Some(fallback_url.to_string()),
        confidence: GENERIC_CONFIDENCE,
    }
}

/// Ask the model for facts as a JSON list. Always returns at least one fact.
pub async fn run_analyst(llm: &impl LlmClient, query: &str, sources: &[Source]) -> Vec<Fact> {
    let fallback_url = sources
        .first()
        .map(|s| s.url.as_str())
        .filter(|u| !u.is_empty())
        .unwrap_or(NO_SOURCE_URL);

    let reply = match llm.complete(&facts_prompt(query, sources)).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(error = %e, "analyst completion failed");
            None
        }
    };
    let items = match reply.as_deref().and_then(parse_json_list_maybe) {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            if reply.is_some() {
                warn!("analyst reply held no JSON list, using a generic fact");
            }
            Vec::new()
        }
    };

    let mut facts: Vec<Fact> = items
        .iter()
        .take(MAX_FACTS)
        .map(|item| normalize_fact(item, fallback_url))
        .collect();
    if facts.is_empty() {
        facts.push(generic_fact(query, fallback_url));
    }

    if let Err(e) = validate_facts(&facts) {
        warn!(error = %e, "fact list failed validation, keeping the first fact");
        facts.truncate(1);
    }
    info!(facts = facts.len(), "analysis complete");
    facts
}
