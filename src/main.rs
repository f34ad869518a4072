//! Fundwatch main entry point
//!
//! This is the command-line interface for the Fundwatch manifest crawler.

use anyhow::Context;
use clap::Parser;
use fundwatch::config::{load_config_with_hash, load_lookup_tables, Config};
use fundwatch::crawler::Coordinator;
use fundwatch::output::{load_statistics, print_statistics, NullIndex, SearchIndex};
use fundwatch::storage::{get_schema_version, open_storage, SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Fundwatch: a funding manifest crawler
///
/// Fundwatch periodically re-crawls registered funding.json manifests,
/// validates them against the v1 schema, and tracks each manifest's
/// lifecycle status in a local registry.
#[derive(Parser, Debug)]
#[command(name = "fundwatch")]
#[command(version = "1.0.0")]
#[command(about = "A funding manifest crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single crawl cycle and exit
    #[arg(long)]
    once: bool,

    /// Create the database schema and record its version, then exit
    #[arg(long, conflicts_with_all = ["submit", "stats", "dry_run", "once"])]
    install: bool,

    /// Fetch, validate, and register a manifest URL as pending, then exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["stats", "dry_run", "once"])]
    submit: Option<String>,

    /// Show registry statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "once"])]
    stats: bool,

    /// Validate config and lookup tables without crawling
    #[arg(long, conflicts_with = "once")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.install {
        handle_install(&config)
    } else if let Some(url) = &cli.submit {
        handle_submit(&config, url).await
    } else {
        handle_crawl(&config, cli.once).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fundwatch=info,warn"),
            1 => EnvFilter::new("fundwatch=debug,info"),
            2 => EnvFilter::new("fundwatch=trace,debug"),
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

fn open_registry(config: &Config) -> anyhow::Result<SqliteStorage> {
    open_storage(Path::new(&config.database.path))
        .with_context(|| format!("failed to open database {}", config.database.path))
}

fn build_coordinator(config: &Config) -> anyhow::Result<Coordinator> {
    let storage = open_registry(config)?;
    let tables = load_lookup_tables(&config.schema).context("failed to load lookup tables")?;
    let coordinator = Coordinator::new(config, storage, tables, Arc::new(NullIndex))?;
    Ok(coordinator)
}

/// Handles the --dry-run mode: validates config and lookup tables
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Fundwatch Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Workers: {}", config.crawl.workers);
    println!("  Batch size: {}", config.crawl.batch_size);
    println!("  Max connections per host: {}", config.crawl.max_host_conns);
    println!("  Request timeout: {}ms", config.crawl.request_timeout_ms);
    println!(
        "  Attempts: {} ({}ms apart)",
        config.crawl.attempts, config.crawl.retry_backoff_ms
    );
    println!("  Max manifest size: {} bytes", config.crawl.max_bytes);
    println!("  Re-crawl age: {}s", config.crawl.recrawl_age_secs);
    println!("  Cycle interval: {}s", config.crawl.interval_secs);
    println!("  Claim lease: {}s", config.crawl.claim_lease_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nLifecycle:");
    println!(
        "  Expire after: {} consecutive errors",
        config.lifecycle.expire_after_errors
    );
    println!(
        "  Disable after: {} consecutive errors",
        config.lifecycle.disable_after_errors
    );

    println!("\nSchema:");
    println!("  Well-known path: {}", config.schema.well_known_path);
    let tables = load_lookup_tables(&config.schema).context("failed to load lookup tables")?;
    println!(
        "  Licenses: {} ({})",
        tables.licenses.len(),
        config.schema.licenses_path
    );
    println!(
        "  Languages: {} ({})",
        tables.languages.len(),
        config.schema.languages_path
    );
    println!(
        "  Currencies: {} ({})",
        tables.currencies.len(),
        config.schema.currencies_path
    );

    println!("\nDatabase: {}", config.database.path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path);

    let storage = open_registry(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --install mode: creates tables and records the schema version
fn handle_install(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_registry(config)?;
    let version = get_schema_version();

    storage
        .record_migration_version(version)
        .context("failed to record schema version")?;
    NullIndex
        .init_schema()
        .context("failed to set up search index")?;

    let applied = storage.get_migration_versions()?;
    println!("✓ Database installed at {}", config.database.path);
    println!("  Applied schema versions: {}", applied.join(", "));

    Ok(())
}

/// Handles the --submit mode: registers one manifest
async fn handle_submit(config: &Config, url: &str) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config)?;
    let record = coordinator.submit(url).await?;

    println!("✓ Registered {} ({})", record.url, record.guid);
    println!("  Status: {}", record.status);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, once: bool) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config)?;

    let stop = coordinator.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing in-flight requests");
            stop.stop();
        }
    });

    if once {
        let stats = coordinator.run_cycle().await?;
        println!("{}", stats);
    } else {
        tracing::info!(
            "Starting crawl loop every {}s with {} workers",
            config.crawl.interval_secs,
            config.crawl.workers
        );
        coordinator.run(config.crawl.interval()).await;
    }

    Ok(())
}
