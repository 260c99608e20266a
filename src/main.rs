mod agents;
mod commands;
mod config;
mod extract;
mod fetch;
mod llm;
mod markdown;
mod moderation;
mod observability;
mod pipeline;
mod report;
mod retry;
mod search;
mod state;

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; marketbrief/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

use clap::Parser;
use commands::Cli;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marketbrief=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("starting marketbrief");

    let output = commands::execute(cli)
        .await
        .inspect_err(|e| tracing::error!("{e}"))?;
    print!("{output}");
    Ok(())
}
