//! Post-run handling: one writer retry for thin briefs, terminal rendering, and
//! the two on-disk artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::agents::{render_markdown_brief, run_reviewer};
use crate::extract::PageExtractor;
use crate::llm::LlmClient;
use crate::markdown::table_cell;
use crate::pipeline::Pipeline;
use crate::retry::circuit_broken;
use crate::search::SearchClient;
use crate::state::{Brief, ResearchState};

pub const MARKDOWN_FILE: &str = "brief.md";
pub const JSON_FILE: &str = "sample_output.json";

/// Briefs shorter than this are re-written once.
const MIN_BODY_CHARS: usize = 400;
/// A failed writer step is not retried.
const WRITER_FAILURE_LIMIT: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not serialize brief: {0}")]
    Json(#[from] serde_json::Error),
}

fn body_chars(brief: Option<&Brief>) -> usize {
    brief
        .and_then(|b| b.markdown.as_deref())
        .map_or(0, |m| m.trim().chars().count())
}

/// Re-run the writer once when the brief looks too thin, keeping whichever
/// result is longer. Returns true when a longer brief replaced the original.
pub async fn ensure_substantive<S, E, L>(
    pipeline: &Pipeline<S, E, L>,
    state: &mut ResearchState,
) -> bool
where
    S: SearchClient,
    E: PageExtractor,
    L: LlmClient,
{
    let current = body_chars(state.brief.as_ref());
    if current >= MIN_BODY_CHARS
        || state.sources.is_empty()
        || circuit_broken(state.failure_count, WRITER_FAILURE_LIMIT)
    {
        return false;
    }

    info!(chars = current, "brief looks thin, re-running writer");
    let Some(candidate) = pipeline.write(state).await else {
        return false;
    };
    if body_chars(Some(&candidate)) <= current {
        return false;
    }
    state.brief = Some(candidate);
    run_reviewer(state);
    true
}

/// Markdown for the terminal: the brief, then Sources and Facts tables.
pub fn render(brief: &Brief) -> String {
    let mut out = brief
        .markdown
        .clone()
        .unwrap_or_else(|| render_markdown_brief(brief));
    if !out.ends_with('\n') {
        out.push('\n');
    }

    out.push_str("\n## Sources\n\n");
    if brief.sources.is_empty() {
        out.push_str("No sources found.\n");
    } else {
        out.push_str("| title | url | published_at |\n|---|---|---|\n");
        for s in &brief.sources {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                table_cell(&s.title),
                table_cell(&s.url),
                table_cell(s.published_at.as_deref().unwrap_or(""))
            ));
        }
    }

    out.push_str("\n## Facts\n\n");
    if brief.key_facts.is_empty() {
        out.push_str("No extracted facts available.\n");
    } else {
        out.push_str("| fact | evidence_url | confidence |\n|---|---|---|\n");
        for f in &brief.key_facts {
            out.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                table_cell(&f.fact),
                table_cell(f.evidence_url.as_deref().unwrap_or("")),
                f.confidence
            ));
        }
    }
    out
}

/// Write `brief.md` and `sample_output.json` under `dir`, creating it if needed.
pub fn write_artifacts(dir: &Path, brief: &Brief) -> Result<(PathBuf, PathBuf), ReportError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ReportError::Io { path, source }
    };

    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let md_path = dir.join(MARKDOWN_FILE);
    let markdown = brief
        .markdown
        .clone()
        .unwrap_or_else(|| render_markdown_brief(brief));
    fs::write(&md_path, markdown).map_err(io_err(&md_path))?;

    let json_path = dir.join(JSON_FILE);
    let json = serde_json::to_string_pretty(brief)?;
    fs::write(&json_path, json).map_err(io_err(&json_path))?;

    info!(markdown = %md_path.display(), json = %json_path.display(), "artifacts written");
    Ok((md_path, json_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Tracer;
    use crate::pipeline::Limits;
    use crate::pipeline::mocks::{EchoExtractor, FixedSearch, ScriptedLlm, sources};
    use crate::llm::LlmError;
    use crate::state::{Fact, Source};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline() -> Pipeline<FixedSearch, EchoExtractor, ScriptedLlm> {
        Pipeline::new(
            FixedSearch(sources()),
            EchoExtractor,
            ScriptedLlm::default(),
            Limits {
                max_sources: 5,
                min_non_empty: 1,
            },
            Tracer::disabled(),
        )
    }

    fn brief() -> Brief {
        Brief {
            topic: "cafes".into(),
            summary: "Growing.".into(),
            key_facts: vec![Fact {
                fact: "Cafes grew | 8%".into(),
                evidence_url: Some("https://a.com".into()),
                confidence: 0.8,
            }],
            sources: vec![Source {
                title: "Cafe Report".into(),
                url: "https://a.com".into(),
                published_at: Some("2025-01-02".into()),
                ..Default::default()
            }],
            markdown: Some("# Brief\n\nBody".into()),
        }
    }

    #[tokio::test]
    async fn thin_brief_is_rewritten() {
        let p = pipeline();
        let mut state = p.invoke("cafe market").await;
        let before = body_chars(state.brief.as_ref());
        assert!(before < MIN_BODY_CHARS, "first draft has {before} chars");

        assert!(ensure_substantive(&p, &mut state).await);
        assert!(body_chars(state.brief.as_ref()) > before);
        assert!(state.schema_ok);
    }

    #[tokio::test]
    async fn substantive_brief_is_left_alone() {
        let p = pipeline();
        let mut state = p.invoke("cafe market").await;
        let mut long = state.brief.clone().unwrap();
        long.markdown = Some("x".repeat(MIN_BODY_CHARS));
        state.brief = Some(long);
        let calls = p_calls(&p);

        assert!(!ensure_substantive(&p, &mut state).await);
        assert_eq!(p_calls(&p), calls);
    }

    #[tokio::test]
    async fn failed_writer_is_not_retried() {
        let p = pipeline();
        let mut state = p.invoke("hate mail").await;
        assert_eq!(state.failure_count, 1);
        assert!(!ensure_substantive(&p, &mut state).await);
    }

    /// Writer drafts shrink with every call.
    #[derive(Default)]
    struct ShrinkingLlm {
        drafts: AtomicUsize,
    }

    impl LlmClient for ShrinkingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            if prompt.contains("precise market analyst") {
                return Ok(r#"[{"fact": "Cafes grew 8%", "evidence_url": "https://a.com", "confidence": 0.8}]"#.into());
            }
            let n = self.drafts.fetch_add(1, Ordering::SeqCst);
            Ok("Cafes are growing [1]. ".repeat(5usize.saturating_sub(n * 4)))
        }
    }

    #[tokio::test]
    async fn shorter_rewrite_keeps_original() {
        let p = Pipeline::new(
            FixedSearch(sources()),
            EchoExtractor,
            ShrinkingLlm::default(),
            Limits {
                max_sources: 5,
                min_non_empty: 1,
            },
            Tracer::disabled(),
        );
        let mut state = p.invoke("cafe market").await;
        let original = state.brief.clone();
        assert!(body_chars(original.as_ref()) < MIN_BODY_CHARS);

        assert!(!ensure_substantive(&p, &mut state).await);
        assert_eq!(p.llm_for_tests().drafts.load(Ordering::SeqCst), 2);
        assert_eq!(state.brief, original);
    }

    fn p_calls(p: &Pipeline<FixedSearch, EchoExtractor, ScriptedLlm>) -> usize {
        p.llm_for_tests().calls.load(Ordering::SeqCst)
    }

    #[test]
    fn render_includes_tables() {
        let out = render(&brief());
        assert!(out.starts_with("# Brief\n\nBody\n\n## Sources\n"));
        assert!(out.contains("| Cafe Report | https://a.com | 2025-01-02 |"));
        assert!(out.contains(r"| Cafes grew \| 8% | https://a.com | 0.80 |"));
    }

    #[test]
    fn render_handles_empty_tables() {
        let empty = Brief {
            topic: "t".into(),
            ..Default::default()
        };
        let out = render(&empty);
        assert!(out.starts_with("# Market Brief: t\n"));
        assert!(out.contains("No sources found."));
        assert!(out.contains("No extracted facts available."));
    }

    #[test]
    fn artifacts_are_written() {
        let dir = std::env::temp_dir().join(format!("marketbrief-report-{}", fastrand::u64(..)));
        let (md, json) = write_artifacts(&dir, &brief()).unwrap();

        assert_eq!(fs::read_to_string(&md).unwrap(), "# Brief\n\nBody");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["topic"], "cafes");
        assert_eq!(value["_markdown"], "# Brief\n\nBody");
        assert_eq!(value["sources"][0]["published_at"], "2025-01-02");

        fs::remove_dir_all(dir).unwrap();
    }
}
