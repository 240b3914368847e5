use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use newsbrief::{run_once, Config, RunSummary, SourceRegistry};

/// Fetch configured sources, enrich new articles, and deliver a digest.
#[derive(Parser, Debug)]
#[command(name = "newsbrief", version, about)]
struct Cli {
    /// SQLite database URL (e.g. sqlite:newsbrief.db)
    #[arg(long)]
    database_url: Option<String>,

    /// JSON file with the source list; defaults to the built-in registry
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Steady-state recency window in hours
    #[arg(long)]
    lookback_hours: Option<i64>,

    /// Items created for a source with no history
    #[arg(long)]
    bootstrap_count: Option<usize>,

    /// Cap on digest entries
    #[arg(long)]
    max_digest_items: Option<usize>,

    /// Print the digest instead of emailing it
    #[arg(long)]
    stdout: bool,
}

async fn execute(cli: Cli) -> anyhow::Result<RunSummary> {
    let mut config = Config::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(hours) = cli.lookback_hours {
        config.lookback_hours = hours;
    }
    if let Some(count) = cli.bootstrap_count {
        config.bootstrap_count = count;
    }
    if let Some(max) = cli.max_digest_items {
        config.max_digest_items = max;
    }

    let registry = match &cli.sources {
        Some(path) => SourceRegistry::from_json_file(path)
            .with_context(|| format!("loading sources from {}", path.display()))?,
        None => SourceRegistry::builtin(),
    };

    run_once(&config, &registry, cli.stdout)
        .await
        .context("pass failed")
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(summary) => {
            info!(%summary, "done");
            if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                // Partial failure: some sources or items did not make it.
                ExitCode::from(2)
            }
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "run aborted");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_sources(path: &str) -> Cli {
        Cli {
            database_url: Some("sqlite::memory:".into()),
            sources: Some(PathBuf::from(path)),
            lookback_hours: None,
            bootstrap_count: None,
            max_digest_items: None,
            stdout: true,
        }
    }

    #[tokio::test]
    async fn unreadable_sources_file_names_the_path_in_the_error() {
        let err = execute(cli_with_sources("/nonexistent/sources.json"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/sources.json"));
    }
}
