//! Linear step graph: researcher → analyst → writer → reviewer.

use serde_json::json;
use tracing::{info, warn};

use crate::agents::{run_analyst, run_researcher, run_reviewer, run_writer};
use crate::config::Settings;
use crate::extract::PageExtractor;
use crate::llm::LlmClient;
use crate::observability::Tracer;
use crate::search::SearchClient;
use crate::state::{Brief, ResearchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Researcher,
    Analyst,
    Writer,
    Reviewer,
}

impl Step {
    pub const GRAPH: [Step; 4] = [Step::Researcher, Step::Analyst, Step::Writer, Step::Reviewer];

    pub fn name(self) -> &'static str {
        match self {
            Step::Researcher => "researcher",
            Step::Analyst => "analyst",
            Step::Writer => "writer",
            Step::Reviewer => "reviewer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_sources: usize,
    pub min_non_empty: usize,
}

impl From<&Settings> for Limits {
    fn from(settings: &Settings) -> Self {
        Self {
            max_sources: settings.max_sources,
            min_non_empty: settings.min_non_empty,
        }
    }
}

pub struct Pipeline<S, E, L> {
    search: S,
    extractor: E,
    llm: L,
    limits: Limits,
    tracer: Tracer,
}

impl<S, E, L> Pipeline<S, E, L>
where
    S: SearchClient,
    E: PageExtractor,
    L: LlmClient,
{
    pub fn new(search: S, extractor: E, llm: L, limits: Limits, tracer: Tracer) -> Self {
        Self {
            search,
            extractor,
            llm,
            limits,
            tracer,
        }
    }

    /// Run every step in order. External failures never abort the run; they
    /// surface as a partial brief instead.
    pub async fn invoke(&self, query: &str) -> ResearchState {
        let mut state = ResearchState::new(query);
        for step in Step::GRAPH {
            let meta = match step {
                Step::Researcher => json!({ "q": query }),
                _ => json!({}),
            };
            let _span = self.tracer.span(step.name(), meta);
            self.run_step(step, &mut state).await;
        }
        info!(
            sources = state.sources.len(),
            facts = state.facts.len(),
            failures = state.failure_count,
            "pipeline finished"
        );
        state
    }

    async fn run_step(&self, step: Step, state: &mut ResearchState) {
        match step {
            Step::Researcher => {
                state.sources = run_researcher(
                    &self.search,
                    &state.query,
                    self.limits.max_sources,
                    self.limits.min_non_empty,
                )
                .await;
                state.tools_used.push("search".to_string());
                state.tool_error = false;
            }
            Step::Analyst => {
                state.facts = run_analyst(&self.llm, &state.query, &state.sources).await;
            }
            Step::Writer => match self.write(state).await {
                Some(brief) => {
                    state.brief = Some(brief);
                    state.schema_ok = true;
                }
                None => {
                    state.failure_count += 1;
                    state.tool_error = true;
                }
            },
            Step::Reviewer => run_reviewer(state),
        }
    }

    #[cfg(test)]
    pub(crate) fn llm_for_tests(&self) -> &L {
        &self.llm
    }

    /// Run the writer against the current state, recording a violation on failure.
    pub async fn write(&self, state: &mut ResearchState) -> Option<Brief> {
        match run_writer(
            &self.llm,
            &self.extractor,
            &state.query,
            &state.facts,
            &state.sources,
        )
        .await
        {
            Ok(brief) => Some(brief),
            Err(e) => {
                warn!(error = %e, "writer step failed");
                state.violations.push(e.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::extract::PageExtractor;
    use crate::llm::{LlmClient, LlmError};
    use crate::search::SearchClient;
    use crate::state::Source;

    pub struct FixedSearch(pub Vec<Source>);

    impl SearchClient for FixedSearch {
        async fn aggregate_search(&self, _query: &str, max_results: usize) -> Vec<Source> {
            self.0.iter().take(max_results).cloned().collect()
        }

        async fn enrich_with_content(&self, results: Vec<Source>) -> Vec<Source> {
            results
        }
    }

    pub struct EchoExtractor;

    impl PageExtractor for EchoExtractor {
        async fn url_to_markdown(&self, url: &str) -> String {
            format!("# Page\n\nContent of {url}")
        }
    }

    /// Replies with a JSON fact list to the analyst and a fixed draft to the writer;
    /// drafts grow with every call.
    #[derive(Default)]
    pub struct ScriptedLlm {
        pub calls: AtomicUsize,
    }

    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("precise market analyst") {
                Ok(r#"[{"fact": "Cafes grew 8% in 2024", "evidence_url": "https://a.com", "confidence": 0.8}]"#.into())
            } else {
                Ok(format!("## Executive Summary\n{}", "Cafes are growing [1]. ".repeat(n * 10)))
            }
        }
    }

    pub fn sources() -> Vec<Source> {
        vec![
            Source {
                title: "Cafe Report".into(),
                url: "https://a.com".into(),
                description: "cafe market".into(),
                ..Default::default()
            },
            Source {
                title: "Coffee Stats".into(),
                url: "https://b.com".into(),
                ..Default::default()
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    fn pipeline(search: FixedSearch) -> Pipeline<FixedSearch, EchoExtractor, ScriptedLlm> {
        Pipeline::new(
            search,
            EchoExtractor,
            ScriptedLlm::default(),
            Limits {
                max_sources: 5,
                min_non_empty: 1,
            },
            Tracer::disabled(),
        )
    }

    #[test]
    fn graph_order() {
        let names: Vec<_> = Step::GRAPH.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["researcher", "analyst", "writer", "reviewer"]);
    }

    #[tokio::test]
    async fn full_run_produces_a_brief() {
        let state = pipeline(FixedSearch(sources())).invoke("cafe market").await;

        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.facts[0].fact, "Cafes grew 8% in 2024");
        assert_eq!(state.tools_used, ["search"]);
        assert!(!state.tool_error);
        assert!(state.schema_ok);
        assert_eq!(state.failure_count, 0);

        let brief = state.brief.unwrap();
        assert_eq!(brief.topic, "cafe market");
        let markdown = brief.markdown.unwrap();
        assert!(markdown.contains("## References\n1. [Cafe Report](https://a.com)\n2. [Coffee Stats](https://b.com)"));
    }

    #[tokio::test]
    async fn moderation_failure_yields_partial_brief() {
        let state = pipeline(FixedSearch(sources())).invoke("hate campaigns").await;

        assert_eq!(state.failure_count, 1);
        assert!(state.tool_error);
        assert_eq!(state.violations, ["query failed moderation"]);
        let brief = state.brief.unwrap();
        assert!(brief.summary.starts_with("Partial brief due to upstream errors"));
        assert!(brief.markdown.unwrap().starts_with("# Market Brief: hate campaigns\n"));
    }

    #[tokio::test]
    async fn no_search_results_still_completes() {
        let state = pipeline(FixedSearch(vec![])).invoke("cafes").await;
        assert!(state.sources.is_empty());
        assert_eq!(state.facts.len(), 1);
        assert_eq!(
            state.brief.unwrap().markdown.as_deref(),
            Some("# Market Brief: cafes\n\n_No sources found._\n")
        );
    }

    #[tokio::test]
    async fn trace_file_gets_one_line_per_step() {
        let dir = std::env::temp_dir().join(format!("marketbrief-pipeline-{}", fastrand::u64(..)));
        let _ = std::fs::remove_dir_all(&dir);
        let tracer = Tracer::new(&dir, true);
        let p = Pipeline::new(
            FixedSearch(sources()),
            EchoExtractor,
            ScriptedLlm::default(),
            Limits {
                max_sources: 5,
                min_non_empty: 1,
            },
            tracer.clone(),
        );
        p.invoke("cafes").await;

        let lines = std::fs::read_to_string(tracer.file_path().unwrap()).unwrap();
        let spans: Vec<String> = lines
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["span"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(spans, ["researcher", "analyst", "writer", "reviewer"]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
