//! orzecznik CLI
//!
//! Local execution entry point for the judgment pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use orzecznik::{
    error::{AppError, Result},
    models::{Config, SearchConfiguration},
    pipeline::PipelineRunner,
    services::analysis::OpenAiGenerator,
};

/// orzecznik - administrative-court judgment pipeline
#[derive(Parser, Debug)]
#[command(name = "orzecznik", version, about = "CBOSA judgment scraping and analysis")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute runs for every search configuration
    Run {
        /// Path to the search configurations JSON file
        #[arg(long, default_value = "data/searches.json")]
        searches: PathBuf,

        /// Write the run reports as JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration and search definitions
    Validate {
        #[arg(long, default_value = "data/searches.json")]
        searches: PathBuf,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("orzecznik starting...");

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Run { searches, output } => {
            let searches = SearchConfiguration::load_all(&searches)?;
            log::info!("Loaded {} search configurations", searches.len());

            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| AppError::config("OPENAI_API_KEY is not set"))?;
            let generator = Arc::new(OpenAiGenerator::new(&config.analysis, api_key)?);

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Shutdown requested, finishing in-flight work...");
                    shutdown.cancel();
                }
            });

            let runner = PipelineRunner::new(config, generator, cancel);
            let reports = runner.run_all(&searches).await;

            for report in &reports {
                log::info!(
                    "[{}] {:?}: fetched {}, filtered {}, extracted {}, analyzed {}, failed {}, lost pages {}",
                    report.run.config_id,
                    report.run.status,
                    report.run.counts.fetched,
                    report.run.counts.filtered_out,
                    report.run.counts.extracted,
                    report.run.counts.analyzed,
                    report.run.counts.failed,
                    report.run.lost_pages
                );
            }

            let json = serde_json::to_string_pretty(&reports)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    log::info!("Reports written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }

        Command::Validate { searches } => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK");

            let searches = SearchConfiguration::load_all(&searches)?;
            for search in &searches {
                search.validate()?;
            }
            log::info!("✓ {} search configurations OK", searches.len());

            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
