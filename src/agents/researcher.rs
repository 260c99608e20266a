use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::search::SearchClient;
use crate::state::Source;

/// Results requested per kept source, so domain de-duplication has room to work.
const SEARCH_WIDENING: usize = 3;
const RECENCY_WEIGHT: f64 = 0.1;

/// Search wide, rank by query-term hits and recency, keep one source per domain.
pub async fn run_researcher(
    search: &impl SearchClient,
    query: &str,
    max_sources: usize,
    min_non_empty: usize,
) -> Vec<Source> {
    let raw = search
        .aggregate_search(query, max_sources.saturating_mul(SEARCH_WIDENING))
        .await;
    let enriched = search.enrich_with_content(raw).await;

    let ranked = rank(query, enriched, Utc::now());
    let chosen = pick_one_per_domain(&ranked, max_sources);
    let chosen = if chosen.is_empty() {
        ranked.into_iter().take(max_sources).collect()
    } else {
        chosen
    };

    let non_empty = chosen.iter().filter(|s| !s.content.trim().is_empty()).count();
    if non_empty < min_non_empty {
        warn!(
            non_empty,
            min_non_empty, "fewer sources with inline content than requested"
        );
    }
    info!(sources = chosen.len(), non_empty, "research complete");
    chosen
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(String::from)
        .collect()
}

fn score(terms: &[String], source: &Source, now: DateTime<Utc>) -> f64 {
    let text = format!("{} {}", source.title, source.description).to_lowercase();
    let hits = terms.iter().filter(|t| text.contains(t.as_str())).count() as f64;
    let recency = source
        .published_at
        .as_deref()
        .and_then(parse_published)
        .map(|published| {
            let age_days = (now - published).num_seconds() as f64 / 86_400.0;
            1.0 / age_days.max(1.0)
        })
        .unwrap_or(0.0);
    hits + RECENCY_WEIGHT * recency
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Stable descending sort by score.
fn rank(query: &str, sources: Vec<Source>, now: DateTime<Utc>) -> Vec<Source> {
    let terms = query_terms(query);
    let mut scored: Vec<(f64, Source)> = sources
        .into_iter()
        .map(|s| (score(&terms, &s, now), s))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, s)| s).collect()
}

fn domain_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest).to_ascii_lowercase()
}

fn pick_one_per_domain(ranked: &[Source], max_sources: usize) -> Vec<Source> {
    let mut seen = HashSet::new();
    ranked
        .iter()
        .filter(|s| !s.url.is_empty())
        .filter(|s| seen.insert(domain_of(&s.url)))
        .take(max_sources)
        .cloned()
        .collect()
}
