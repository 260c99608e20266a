mod args;

pub use args::Cli;

use args::{Command, FetchArgs, RunArgs, SearchArgs};

use std::io::{self, BufRead, Write};
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::{ConfigError, Settings};
use crate::extract::{self, UrlExtractor};
use crate::fetch::{self, FetchError, FetchOptions, TokioDnsResolver};
use crate::llm::Llm;
use crate::markdown::{escape_md_link, truncate_chars};
use crate::observability::Tracer;
use crate::pipeline::{Limits, Pipeline};
use crate::report::{self, ReportError};
use crate::search::{SearchClient, WebSearch};
use crate::state::Source;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;
const MAX_FETCH_OUTPUT_CHARS: usize = 100_000;
const TOPIC_PROMPT: &str = "Enter the topic for market research: ";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Please enter a topic to research.")]
    EmptyTopic,

    #[error("URL must use http or https scheme")]
    InvalidScheme,

    #[error("fetch timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("could not read topic: {0}")]
    Io(#[from] io::Error),
}

/// Run one subcommand and return what should be printed on stdout.
pub async fn execute(cli: Cli) -> Result<String, CommandError> {
    let mut settings = Settings::from_env()?;
    match cli.command {
        Command::Run(args) => {
            args.apply_to(&mut settings);
            run(args, settings).await
        }
        Command::Search(args) => search(args, settings).await,
        Command::Fetch(args) => fetch(args, settings).await,
    }
}

fn http_client(settings: &Settings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(settings.http_timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

/// Argument first, then `QUERY`, then an interactive prompt.
fn resolve_topic(
    arg: Option<String>,
    default: Option<String>,
    prompt: impl FnOnce() -> io::Result<String>,
) -> Result<String, CommandError> {
    let topic = match arg.or(default) {
        Some(topic) => topic,
        None => prompt()?,
    };
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(CommandError::EmptyTopic);
    }
    Ok(topic.to_string())
}

fn prompt_stdin() -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(TOPIC_PROMPT.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

async fn run(args: RunArgs, settings: Settings) -> Result<String, CommandError> {
    let topic = resolve_topic(args.topic, settings.default_query.clone(), prompt_stdin)?;
    info!(topic = %topic, "command:run");

    let http = http_client(&settings)?;
    let tracer = Tracer::new(settings.trace_dir.clone(), settings.trace_enabled);
    if let Some(path) = tracer.file_path() {
        info!(path = %path.display(), "writing step trace");
    }
    let llm = Llm::from_settings(http.clone(), &settings);
    info!(
        llm = llm.name(),
        max_sources = settings.max_sources,
        min_non_empty = settings.min_non_empty,
        "pipeline configured"
    );
    let pipeline = Pipeline::new(
        WebSearch::new(http.clone(), &settings),
        UrlExtractor::new(http, &settings),
        llm,
        Limits::from(&settings),
        tracer,
    );

    let mut state = pipeline.invoke(&topic).await;
    if report::ensure_substantive(&pipeline, &mut state).await {
        info!("kept the longer rewritten brief");
    }
    for violation in &state.violations {
        warn!(%violation, "run finished with a violation");
    }

    let brief = state.brief.unwrap_or_default();
    let (md_path, json_path) = report::write_artifacts(&args.out_dir, &brief)?;
    let mut output = report::render(&brief);
    output.push_str(&format!(
        "\n[ok] wrote {} and {}\n",
        md_path.display(),
        json_path.display()
    ));
    Ok(output)
}

fn format_results(results: &[Source]) -> String {
    if results.is_empty() {
        return "(No results.)\n".to_string();
    }
    let mut output = String::new();
    for (i, s) in results.iter().enumerate() {
        output.push_str(&format!(
            "{}. [{}]({})\n",
            i + 1,
            escape_md_link(s.display_title()),
            escape_md_link(&s.url)
        ));
        if !s.description.is_empty() && s.description != s.title {
            output.push_str(&format!("   {}\n", s.description));
        }
        if !s.content.is_empty() {
            output.push_str(&format!("   > {}\n", truncate_chars(&s.content, 300)));
        }
    }
    output
}

async fn search(args: SearchArgs, settings: Settings) -> Result<String, CommandError> {
    info!(query = %args.query, "command:search");
    let web = WebSearch::new(http_client(&settings)?, &settings);
    let mut results = web
        .aggregate_search(&args.query, args.max_results.into())
        .await;
    if args.enrich {
        results = web.enrich_with_content(results).await;
    }
    Ok(format_results(&results))
}

fn cap_output(mut output: String) -> String {
    if output.chars().count() > MAX_FETCH_OUTPUT_CHARS {
        output = truncate_chars(&output, MAX_FETCH_OUTPUT_CHARS).to_string();
        output.push_str("\n\n(truncated)");
    }
    output
}

async fn fetch(args: FetchArgs, settings: Settings) -> Result<String, CommandError> {
    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        return Err(CommandError::InvalidScheme);
    }
    info!(url = %args.url, local = args.local, "command:fetch");
    let http = http_client(&settings)?;

    if !args.local {
        let extractor = UrlExtractor::new(http, &settings);
        let markdown = match extractor.extract(&args.url).await {
            Ok(extraction) => {
                info!(provider = %extraction.provider, "fetch complete");
                extraction.markdown
            }
            Err(e) => {
                warn!(url = %args.url, error = %e, "all extraction providers failed");
                extract::unable_to_convert(&args.url)
            }
        };
        return Ok(cap_output(markdown));
    }

    let options = FetchOptions {
        raw: args.raw,
        meta: args.meta,
    };
    let page = tokio::time::timeout(
        settings.http_timeout,
        fetch::fetch_page(&http, &args.url, options, &TokioDnsResolver),
    )
    .await
    .map_err(|_| CommandError::Timeout(settings.http_timeout.as_secs()))??;
    if page.url != args.url {
        info!(final_url = %page.url, "followed redirects");
    }

    let output = if page.used_raw_fallback {
        warn!(url = %args.url, "readability extraction failed, using raw fallback");
        format!(
            "> Note: Readability extraction failed. Showing raw page conversion.\n\n{}",
            page.markdown
        )
    } else {
        page.markdown
    };
    Ok(cap_output(output))
}
