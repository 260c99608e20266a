use tracing::info;

use crate::markdown::{escape_md_link, truncate_chars};
use crate::state::{Brief, ResearchState, Source, validate_brief};

const SUMMARY_CHARS: usize = 1180;
const PARTIAL_SUMMARY: &str =
    "Partial brief due to upstream errors. See sources and facts collected so far.";

/// Guarantee a brief exists, trim its summary, and fill in the Markdown if the
/// writer never produced any.
pub fn run_reviewer(state: &mut ResearchState) {
    let mut brief = state.brief.take().unwrap_or_else(|| {
        info!("no brief from writer, assembling a partial one");
        Brief {
            topic: state.query.clone(),
            summary: PARTIAL_SUMMARY.to_string(),
            key_facts: state.facts.clone(),
            sources: state
                .sources
                .iter()
                .map(|s| Source {
                    title: s.title.clone(),
                    url: s.url.clone(),
                    ..Default::default()
                })
                .collect(),
            markdown: None,
        }
    });

    brief.summary = truncate_chars(&brief.summary, SUMMARY_CHARS).to_string();
    if brief.markdown.as_deref().is_none_or(|m| m.trim().is_empty()) {
        brief.markdown = Some(render_markdown_brief(&brief));
    }
    state.schema_ok = validate_brief(&brief).is_ok();
    state.brief = Some(brief);
}

pub fn render_markdown_brief(brief: &Brief) -> String {
    let mut lines = vec![format!("# Market Brief: {}\n", brief.topic)];

    let summary = brief.summary.trim();
    if !summary.is_empty() {
        lines.push(format!("**Summary:** {summary}\n"));
    }

    if !brief.key_facts.is_empty() {
        lines.push("## Key Facts".to_string());
        for fact in &brief.key_facts {
            match fact.evidence_url.as_deref().filter(|u| !u.is_empty()) {
                Some(url) => lines.push(format!("- {} ([source]({url}))", fact.fact)),
                None => lines.push(format!("- {}", fact.fact)),
            }
        }
        lines.push(String::new());
    }

    if !brief.sources.is_empty() {
        lines.push("## References".to_string());
        for (i, source) in brief.sources.iter().enumerate() {
            lines.push(format!(
                "{}. [{}]({})",
                i + 1,
                escape_md_link(source.display_title()),
                source.url
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Fact;

    fn state_with_research() -> ResearchState {
        let mut state = ResearchState::new("cafes");
        state.sources = vec![Source {
            title: "Cafe Report".into(),
            url: "https://a.com".into(),
            content: "long scraped text".into(),
            ..Default::default()
        }];
        state.facts = vec![Fact {
            fact: "Cafes grew 8%".into(),
            evidence_url: Some("https://a.com".into()),
            confidence: 0.8,
        }];
        state
    }

    #[test]
    fn missing_brief_becomes_partial() {
        let mut state = state_with_research();
        run_reviewer(&mut state);

        let brief = state.brief.as_ref().unwrap();
        assert_eq!(brief.summary, PARTIAL_SUMMARY);
        assert_eq!(brief.key_facts.len(), 1);
        assert!(brief.sources[0].content.is_empty());
        assert!(state.schema_ok);
        assert_eq!(
            brief.markdown.as_deref(),
            Some(
                "# Market Brief: cafes\n\n\
                 **Summary:** Partial brief due to upstream errors. See sources and facts collected so far.\n\n\
                 ## Key Facts\n\
                 - Cafes grew 8% ([source](https://a.com))\n\n\
                 ## References\n\
                 1. [Cafe Report](https://a.com)\n"
            )
        );
    }

    #[test]
    fn existing_markdown_is_kept_and_summary_capped() {
        let mut state = state_with_research();
        state.brief = Some(Brief {
            topic: "cafes".into(),
            summary: "s".repeat(2000),
            markdown: Some("# Written".into()),
            ..Default::default()
        });
        run_reviewer(&mut state);

        let brief = state.brief.unwrap();
        assert_eq!(brief.summary.len(), SUMMARY_CHARS);
        assert_eq!(brief.markdown.as_deref(), Some("# Written"));
    }

    #[test]
    fn invalid_brief_is_flagged() {
        let mut state = ResearchState::new("cafes");
        state.sources = vec![Source {
            url: "not-a-url".into(),
            ..Default::default()
        }];
        run_reviewer(&mut state);
        assert!(!state.schema_ok);
        assert!(state.brief.is_some());
    }

    #[test]
    fn render_skips_empty_sections() {
        let brief = Brief {
            topic: "t".into(),
            key_facts: vec![Fact {
                fact: "No link".into(),
                evidence_url: None,
                confidence: 0.5,
            }],
            ..Default::default()
        };
        assert_eq!(render_markdown_brief(&brief), "# Market Brief: t\n\n## Key Facts\n- No link\n");
    }
}
