use tracing::{info, warn};

use crate::extract::PageExtractor;
use crate::llm::LlmClient;
use crate::markdown::{cap_lines, escape_md_link, sanitize_heading, truncate_chars};
use crate::moderation::basic_moderation;
use crate::state::{Brief, Fact, Source, validate_brief};

const MAX_SECTIONS: usize = 10;
const SECTION_LINES: usize = 220;
const SUMMARY_CHARS: usize = 1500;
const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const SUMMARY_UNAVAILABLE: &str = "Summary unavailable; see references below.";

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("query failed moderation")]
    Moderation,
}

fn writer_prompt(query: &str, source_sections: &str, facts_json: &str) -> String {
    format!(
        "Create a decision-ready market brief on **{query}** using ONLY the material in the sections below.\n\
         Structure:\n\
         - Executive Summary (≤ 6 sentences)\n\
         - Key Insights (bullets, include inline [#] citations)\n\
         - Competitive / Ecosystem Snapshot\n\
         - Outlook (near-term)\n\
         - References (numbered, provided; do not invent links)\n\
         \n\
         Use bracketed numeric citations [1], [2], etc. that map to the numbered References.\n\
         \n\
         ### Source Sections\n\
         {source_sections}\n\
         \n\
         ### Extracted Facts (JSON)\n\
         {facts_json}\n\
         \n\
         Return pure Markdown, no extra JSON.\n"
    )
}

fn section(idx: usize, title: &str, url: &str, markdown: &str) -> String {
    let body = if markdown.trim().is_empty() {
        format!("# Unavailable\n{url}\n")
    } else {
        markdown.to_string()
    };
    format!(
        "#### [{idx}] {}\n{}\n",
        sanitize_heading(title),
        cap_lines(&body, SECTION_LINES)
    )
}

fn references(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. [{}]({})", i + 1, escape_md_link(&s.title), s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract every source page, then ask the model to draft the brief around them.
/// Only moderation is fatal; extraction and completion failures degrade the output.
pub async fn run_writer(
    llm: &impl LlmClient,
    extractor: &impl PageExtractor,
    query: &str,
    facts: &[Fact],
    sources: &[Source],
) -> Result<Brief, WriterError> {
    if !basic_moderation(query) {
        return Err(WriterError::Moderation);
    }
    if sources.is_empty() {
        let markdown = format!("# Market Brief: {query}\n\n_No sources found._\n");
        return Ok(Brief {
            topic: query.to_string(),
            summary: markdown.clone(),
            key_facts: facts.to_vec(),
            sources: Vec::new(),
            markdown: Some(markdown),
        });
    }

    let mut sections = Vec::new();
    let mut live_sources = Vec::new();
    for (i, source) in sources.iter().take(MAX_SECTIONS).enumerate() {
        if source.url.is_empty() {
            continue;
        }
        let idx = i + 1;
        let title = if source.title.trim().is_empty() {
            source.url.clone()
        } else {
            source.title.clone()
        };
        let markdown = extractor.url_to_markdown(&source.url).await;
        sections.push(section(idx, &title, &source.url, &markdown));
        live_sources.push(Source {
            title,
            url: source.url.clone(),
            published_at: source.published_at.clone(),
            ..Default::default()
        });
    }

    let source_sections = if sections.is_empty() {
        format!("#### [1] {}\n(No content)\n", sanitize_heading(query))
    } else {
        sections.join(SECTION_SEPARATOR)
    };
    let facts_json = serde_json::to_string_pretty(facts).unwrap_or_else(|_| "[]".to_string());

    let draft = match llm
        .complete(&writer_prompt(query, &source_sections, &facts_json))
        .await
    {
        Ok(draft) => draft,
        Err(e) => {
            warn!(error = %e, "writer completion failed");
            SUMMARY_UNAVAILABLE.to_string()
        }
    };

    let markdown = format!("{draft}\n\n## References\n{}\n", references(&live_sources));
    let brief = Brief {
        topic: query.to_string(),
        summary: truncate_chars(&draft, SUMMARY_CHARS).to_string(),
        key_facts: facts.to_vec(),
        sources: live_sources,
        markdown: Some(markdown),
    };
    if let Err(e) = validate_brief(&brief) {
        warn!(error = %e, "brief failed schema check, keeping it anyway");
    }
    info!(sections = sections.len(), "brief written");
    Ok(brief)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLlm {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl LlmClient for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(LlmError::RateLimited)
            } else {
                Ok("## Executive Summary\nCafes are growing [1].".to_string())
            }
        }
    }

    struct MapExtractor;

    impl PageExtractor for MapExtractor {
        async fn url_to_markdown(&self, url: &str) -> String {
            match url {
                "https://a.com" => (1..=300).map(|i| format!("line {i}\n")).collect(),
                _ => String::new(),
            }
        }
    }

    fn source(title: &str, url: &str) -> Source {
        Source {
            title: title.into(),
            url: url.into(),
            content: "scratch".into(),
            ..Default::default()
        }
    }

    fn facts() -> Vec<Fact> {
        vec![Fact {
            fact: "Cafes grew 8%".into(),
            evidence_url: Some("https://a.com".into()),
            confidence: 0.8,
        }]
    }

    #[tokio::test]
    async fn moderation_blocks_the_brief() {
        let llm = RecordingLlm::default();
        let err = run_writer(&llm, &MapExtractor, "kill the competition", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, WriterError::Moderation));
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_sources_gives_placeholder_brief() {
        let brief = run_writer(&RecordingLlm::default(), &MapExtractor, "cafes", &facts(), &[])
            .await
            .unwrap();
        let expected = "# Market Brief: cafes\n\n_No sources found._\n";
        assert_eq!(brief.summary, expected);
        assert_eq!(brief.markdown.as_deref(), Some(expected));
        assert_eq!(brief.key_facts, facts());
    }

    #[tokio::test]
    async fn builds_sections_and_references() {
        let llm = RecordingLlm::default();
        let sources = vec![
            source("Cafe [Report]", "https://a.com"),
            source("", ""),
            source("", "https://b.com"),
        ];
        let brief = run_writer(&llm, &MapExtractor, "cafes", &facts(), &sources)
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("#### [1] Cafe [Report]\nline 1\n"));
        assert!(prompt.contains("line 220\n"));
        assert!(!prompt.contains("line 221"));
        assert!(prompt.contains("\n\n---\n\n#### [3] https://b.com\n# Unavailable\nhttps://b.com\n"));
        assert!(prompt.contains("\"evidence_url\": \"https://a.com\""));

        assert_eq!(
            brief.markdown.as_deref(),
            Some(
                "## Executive Summary\nCafes are growing [1].\n\n## References\n\
                 1. [Cafe \\[Report\\]](https://a.com)\n2. [https://b.com](https://b.com)\n"
            )
        );
        assert_eq!(brief.summary, "## Executive Summary\nCafes are growing [1].");
        assert_eq!(brief.sources.len(), 2);
        assert!(brief.sources.iter().all(|s| s.content.is_empty()));
    }

    #[tokio::test]
    async fn llm_failure_keeps_references() {
        let llm = RecordingLlm {
            fail: true,
            ..Default::default()
        };
        let brief = run_writer(&llm, &MapExtractor, "cafes", &facts(), &[source("A", "https://a.com")])
            .await
            .unwrap();
        assert_eq!(brief.summary, SUMMARY_UNAVAILABLE);
        assert!(brief.markdown.unwrap().ends_with("## References\n1. [A](https://a.com)\n"));
    }

    #[tokio::test]
    async fn long_drafts_are_capped_in_summary_only() {
        struct Verbose;
        impl LlmClient for Verbose {
            async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
                Ok("w".repeat(2000))
            }
        }
        let brief = run_writer(&Verbose, &MapExtractor, "cafes", &[], &[source("A", "https://a.com")])
            .await
            .unwrap();
        assert_eq!(brief.summary.len(), SUMMARY_CHARS);
        assert!(brief.markdown.unwrap().starts_with(&"w".repeat(2000)));
    }

    #[tokio::test]
    async fn only_the_first_ten_sources_get_sections() {
        let llm = RecordingLlm::default();
        let sources: Vec<Source> = (1..=12)
            .map(|i| source(&format!("S{i}"), &format!("https://s{i}.com")))
            .collect();
        let brief = run_writer(&llm, &MapExtractor, "cafes", &[], &sources)
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts[0].matches("#### [").count(), MAX_SECTIONS);
        assert!(prompts[0].contains("#### [10] S10\n"));
        assert!(!prompts[0].contains("#### [11]"));

        assert_eq!(brief.sources.len(), MAX_SECTIONS);
        let markdown = brief.markdown.unwrap();
        assert!(markdown.ends_with("10. [S10](https://s10.com)\n"));
        assert!(!markdown.contains("https://s11.com"));
    }

    #[test]
    fn blank_extraction_becomes_unavailable_section() {
        assert_eq!(section(2, "T", "https://x.com", "  "), "#### [2] T\n# Unavailable\nhttps://x.com\n");
    }
}
