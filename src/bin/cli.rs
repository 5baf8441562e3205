//! bid-crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::time::Duration;

use bid_crawler::{
    error::Result,
    models::{Collection, Config},
    pipeline,
    storage::{CheckpointStore, CsvRepository},
};
use clap::{Args, Parser, Subcommand};

/// bid-crawler - procurement bid notice crawler
#[derive(Parser, Debug)]
#[command(name = "bid-crawler", version, about = "Procurement bid notice crawler")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl once, from the checkpoint up to the page limit
    Run {
        /// Stop after this page (capped by crawler.max_pages)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Ignore the saved checkpoint and start at page 1
        #[arg(long)]
        reset_checkpoint: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Crawl repeatedly on a fixed interval
    Interval {
        /// Seconds between the start of one run and the next
        #[arg(long, default_value_t = 3600)]
        interval_sec: u64,

        #[arg(long)]
        max_pages: Option<u32>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Delete the checkpoint so the next run starts at page 1
    Reset,

    /// Validate the configuration file
    Validate,

    /// Show checkpoint and stored row counts
    Info,
}

/// Command-line overrides for `[filters]`.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Keep only notices of this kind code
    #[arg(long)]
    pbanc_knd_cd: Option<String>,

    /// Keep only notices with this status code
    #[arg(long)]
    pbanc_stts_cd: Option<String>,

    /// Keep only notices with this progress code
    #[arg(long)]
    bid_pbanc_pgst_cd: Option<String>,
}

impl FilterArgs {
    fn apply(self, config: &mut Config) {
        if let Some(code) = self.pbanc_knd_cd {
            config.filters.pbanc_knd_cd = Some(code);
        }
        if let Some(code) = self.pbanc_stts_cd {
            config.filters.pbanc_stts_cd = Some(code);
        }
        if let Some(code) = self.bid_pbanc_pgst_cd {
            config.filters.bid_pbanc_pgst_cd = Some(code);
        }
    }
}

/// Initialize logging from the config level, or debug when verbose.
fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    init_logging(&config.log_level, cli.verbose);

    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run {
            max_pages,
            reset_checkpoint,
            filters,
        } => {
            filters.apply(&mut config);
            let stats = pipeline::run_crawler(&config, max_pages, reset_checkpoint).await?;
            for (collection, outcome) in &stats.saved {
                log::info!(
                    "{}: {} saved, {} duplicates",
                    collection.label(),
                    outcome.saved,
                    outcome.skipped
                );
            }
        }

        Command::Interval {
            interval_sec,
            max_pages,
            filters,
        } => {
            filters.apply(&mut config);
            config.validate()?;
            pipeline::run_interval(&config, Duration::from_secs(interval_sec), max_pages).await?;
        }

        Command::Reset => {
            let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
            checkpoint.clear().await?;
            log::info!("Checkpoint {} cleared", checkpoint.path().display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            let source = if config.api.list.is_configured() {
                "list API"
            } else {
                "listing page"
            };
            log::info!("Config OK, crawling through the {source}");
        }

        Command::Info => {
            let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
            match checkpoint.load().await? {
                Some(page) => log::info!("Next page: {page}"),
                None => log::info!("No checkpoint; next run starts at page 1"),
            }

            let repo = CsvRepository::new(&config.paths.output_dir);
            log::info!("Output directory: {}", config.paths.output_dir.display());
            for collection in Collection::ALL {
                let rows = repo.row_count(collection).await?;
                log::info!("  {:<16} {rows:>8} rows", collection.label());
            }
        }
    }

    Ok(())
}
