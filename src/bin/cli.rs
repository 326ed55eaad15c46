//! Organization census CLI.
//!
//! Local execution entry point: crawls the configured search space and
//! maintains the checkpoint file it can always resume from.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use orgcensus::{
    error::{AppError, Result},
    models::Config,
    pipeline::OrgCrawler,
    services::{Dispatcher, GithubClient, TokenPool},
    storage::{CheckpointStore, JsonCheckpointStore},
    utils::http,
};
use tokio_util::sync::CancellationToken;

/// Environment variable holding whitespace-separated API tokens.
const TOKENS_ENV: &str = "GITHUB_TOKENS";

#[derive(Parser, Debug)]
#[command(
    name = "orgcensus",
    version,
    about = "GitHub organization census crawler"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "orgcensus.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the census, resuming from the checkpoint when present
    Crawl {
        /// Discard an existing checkpoint and start over
        #[arg(long)]
        fresh: bool,
    },

    /// Validate the configuration file and token environment
    Validate,

    /// Show checkpoint status
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Read API tokens from the environment, whitespace separated.
fn tokens_from_env() -> Result<Vec<String>> {
    let raw = std::env::var(TOKENS_ENV)
        .map_err(|_| AppError::config(format!("{TOKENS_ENV} is not set")))?;
    let tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if tokens.is_empty() {
        return Err(AppError::config(format!(
            "{TOKENS_ENV} contains no tokens"
        )));
    }
    Ok(tokens)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    let config = Arc::new(config);

    match cli.command {
        Command::Crawl { fresh } => {
            config.validate()?;
            let tokens = tokens_from_env()?;
            log::info!("using {} API token(s)", tokens.len());

            let checkpoint_path = config.output.checkpoint_path.clone();
            if fresh && checkpoint_path.exists() {
                std::fs::remove_file(&checkpoint_path)?;
                log::warn!(
                    "discarded existing checkpoint {}",
                    checkpoint_path.display()
                );
            }

            let pool = TokenPool::new(tokens)?;
            let dispatcher = Dispatcher::new(pool, config.crawler.max_transient_retries);
            let client = http::create_async_client(&config.crawler)?;
            let api = Arc::new(GithubClient::new(client));
            let store = Arc::new(JsonCheckpointStore::new(&checkpoint_path));

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("interrupt received, stopping after the entity in flight");
                    signal_cancel.cancel();
                }
            });

            let crawler = OrgCrawler::new(Arc::clone(&config), api, store, dispatcher, cancel);
            let summary = crawler.run().await?;

            log::info!(
                "{} organizations collected (+{} this run), {} pages across {} windows",
                summary.organizations,
                summary.added_this_run,
                summary.pages_fetched,
                summary.windows_scanned
            );
            if summary.interrupted {
                log::warn!(
                    "run interrupted; invoke crawl again to resume from {}",
                    checkpoint_path.display()
                );
            } else {
                log::info!("census written to {}", checkpoint_path.display());
            }
        }

        Command::Validate => {
            log::info!("validating configuration at {}", cli.config.display());

            if let Err(e) = config.validate() {
                log::error!("config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "config OK: query {:?}, {}-day windows, {} results per page",
                config.search.query,
                config.search.window_days,
                config.search.per_page
            );

            match tokens_from_env() {
                Ok(tokens) => log::info!("{TOKENS_ENV} provides {} token(s)", tokens.len()),
                Err(e) => log::warn!("{}", e),
            }

            log::info!("all validations passed");
        }

        Command::Info => {
            let path = &config.output.checkpoint_path;
            let store = JsonCheckpointStore::new(path);
            match store.load().await? {
                Some(checkpoint) => {
                    log::info!("checkpoint: {}", path.display());
                    log::info!("organizations collected: {}", checkpoint.len());
                    log::info!(
                        "window ending {} page {}",
                        checkpoint.window_end(),
                        checkpoint.page_cursor()
                    );
                }
                None => log::info!("no checkpoint at {} yet", path.display()),
            }
        }
    }

    Ok(())
}
