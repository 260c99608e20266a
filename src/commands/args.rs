use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::llm::LlmMode;

/// Market-research briefs from web search, page extraction and an LLM.
#[derive(Parser, Debug)]
#[command(name = "marketbrief", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a topic and write brief.md and sample_output.json
    Run(RunArgs),
    /// Print aggregated search results for a query
    Search(SearchArgs),
    /// Convert a URL to Markdown through the extraction chain
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Topic to research (falls back to $QUERY, then a prompt on stdin)
    pub topic: Option<String>,

    /// Maximum number of sources kept after ranking
    #[arg(long, value_parser = clap::value_parser!(u16).range(3..=30))]
    pub max_sources: Option<u16>,

    /// Sources with inline content below which a warning is logged
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=20))]
    pub min_non_empty: Option<u16>,

    /// Completion backend
    #[arg(long, value_enum)]
    pub llm: Option<LlmMode>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(5..=60))]
    pub http_timeout: Option<u64>,

    /// Directory for brief.md and sample_output.json
    #[arg(long, default_value = "artifacts")]
    pub out_dir: PathBuf,

    /// Append step timings to trace.jsonl
    #[arg(long)]
    pub trace: bool,
}

impl RunArgs {
    /// Flags override whatever the environment configured.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(n) = self.max_sources {
            settings.max_sources = n.into();
        }
        if let Some(n) = self.min_non_empty {
            settings.min_non_empty = n.into();
        }
        if let Some(mode) = self.llm {
            settings.llm_mode = mode;
        }
        if let Some(secs) = self.http_timeout {
            settings.http_timeout = Duration::from_secs(secs);
        }
        if self.trace {
            settings.trace_enabled = true;
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum number of results
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..=50))]
    pub max_results: u16,

    /// Also attach encyclopedia summaries to results
    #[arg(long)]
    pub enrich: bool,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// URL to convert (must be HTTP or HTTPS)
    pub url: String,

    /// Skip the hosted providers and convert locally
    #[arg(long)]
    pub local: bool,

    /// With --local: skip Readability and convert the entire page
    #[arg(long, requires = "local")]
    pub raw: bool,

    /// With --local: prepend title, author and date as YAML frontmatter
    #[arg(long, requires = "local")]
    pub meta: bool,
}
