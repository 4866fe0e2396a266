//! Sumi-Harvest main entry point
//!
//! This is the command-line trigger for the crawl and harvest pipeline.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_harvest::config::{load_config_with_hash, Config};
use sumi_harvest::output::{load_statistics, print_statistics, write_markdown_report};
use sumi_harvest::storage::{open_storage, shared};
use sumi_harvest::{LockOutcome, LockRegistry, Pipeline};
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a polite dataset harvester
///
/// Discovers dataset collections on data-provider servers, crawls their
/// dated directories for new files and harvests metadata for every file
/// found.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A polite dataset harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover collections by crawling providers from their root URL
    Seed {
        /// Only this provider (default: all)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Crawl known collections for new links
    Crawl {
        /// Only this provider (default: all)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Harvest metadata for every queued link
    Harvest,

    /// Delete links older than the configured retention
    Purge {
        /// Only this provider (default: all)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show queue, record and run statistics
    Stats {
        /// Also write a markdown report to this path
        #[arg(long, value_name = "PATH")]
        markdown: Option<PathBuf>,
    },

    /// Validate the configuration and show the crawl jobs that would run
    DryRun {
        /// Only this provider (default: all)
        #[arg(long)]
        provider: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let storage = shared(storage);

    if let Command::Stats { markdown } = &cli.command {
        return handle_stats(&config, &storage, markdown.as_deref());
    }

    let providers = selected_providers(&config, cli.command.provider())?;
    let pipeline = Pipeline::new(config, config_hash, storage, Arc::new(LockRegistry::new()))?;

    match cli.command {
        Command::Seed { .. } => {
            let mut outcomes = Vec::new();
            for provider in &providers {
                outcomes.push(pipeline.run_seed(provider).await);
            }
            report(&providers, &outcomes, "seed")
        }
        Command::Crawl { .. } => {
            let mut outcomes = Vec::new();
            for provider in &providers {
                outcomes.push(pipeline.run_main_sequence(provider).await);
            }
            report(&providers, &outcomes, "crawl")
        }
        Command::Harvest => report(&["all".to_string()], &[pipeline.run_harvest().await], "harvest"),
        Command::Purge { .. } => {
            for provider in &providers {
                let purged = pipeline.purge(provider)?;
                println!("{}: {} link(s) purged", provider, purged);
            }
            Ok(())
        }
        Command::DryRun { .. } => handle_dry_run(&pipeline, &providers),
        Command::Stats { .. } => Ok(()),
    }
}

impl Command {
    fn provider(&self) -> Option<&str> {
        match self {
            Self::Seed { provider }
            | Self::Crawl { provider }
            | Self::Purge { provider }
            | Self::DryRun { provider } => provider.as_deref(),
            Self::Harvest | Self::Stats { .. } => None,
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn selected_providers(config: &Config, only: Option<&str>) -> anyhow::Result<Vec<String>> {
    match only {
        Some(name) => {
            if config.provider(name).is_none() {
                bail!("Unknown provider '{}'", name);
            }
            Ok(vec![name.to_string()])
        }
        None => Ok(config.providers.iter().map(|p| p.name.clone()).collect()),
    }
}

/// Prints one line per invocation; fails if any invocation failed
fn report(names: &[String], outcomes: &[LockOutcome], what: &str) -> anyhow::Result<()> {
    let mut failed = 0;
    for (name, outcome) in names.iter().zip(outcomes) {
        let label = match outcome {
            LockOutcome::Completed => "completed",
            LockOutcome::Busy => "skipped (already running)",
            LockOutcome::Failed => {
                failed += 1;
                "failed"
            }
        };
        println!("{} {}: {}", name, what, label);
    }
    if failed > 0 {
        bail!("{} {} invocation(s) failed", failed, what);
    }
    Ok(())
}

/// Handles `stats`: prints statistics and optionally writes a markdown report
fn handle_stats(
    config: &Config,
    storage: &sumi_harvest::storage::SharedStorage,
    markdown: Option<&Path>,
) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let providers: Vec<String> = config.providers.iter().map(|p| p.name.clone()).collect();
    let stats = {
        let store = sumi_harvest::storage::lock(storage)?;
        load_statistics(&*store, &providers)?
    };
    print_statistics(&stats);

    if let Some(path) = markdown {
        write_markdown_report(&stats, path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("\n✓ Report written to: {}", path.display());
    }
    Ok(())
}

/// Handles `dry-run`: shows the configuration and planned jobs
fn handle_dry_run(pipeline: &Pipeline, providers: &[String]) -> anyhow::Result<()> {
    let config = pipeline.config();
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages per pass: {}", config.crawler.max_pages);
    println!("  Seed politeness delay: {}ms", config.crawler.seed_politeness_delay);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!("  Working directory: {}", config.crawler.working_directory);

    println!("\nUser Agent: {}", config.user_agent.header_value());
    println!("Database: {}", config.storage.database_path);

    let mut total = 0;
    for name in providers {
        let jobs = pipeline.plan(name)?;
        println!("\nProvider {} ({} job(s)):", name, jobs.len());
        for job in &jobs {
            let collection = if job.collection_name.is_empty() {
                "<seed>"
            } else {
                job.collection_name.as_str()
            };
            println!(
                "  - {} {} (delay {}ms)",
                collection,
                job.target_url,
                job.politeness_delay.as_millis()
            );
        }
        total += jobs.len();
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would run {} crawl job(s)", total);
    Ok(())
}
