//! Warden - distributed session directory tool
//!
//! Main entry point for the Warden CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use warden_config::{ConfigSource, LoggingConfig, WardenConfig};

mod commands;

use commands::{claim, config, get, list, ping, take};

const VERBOSE_FILTER: &str = "warden=debug,warden_session=debug,warden_config=debug,info";
const FILE_FILTER: &str = "warden=trace,warden_session=trace,warden_config=trace,info";

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Warden - inspect and manage a distributed session directory
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backing store URL (default: redis://127.0.0.1:6379)
    #[arg(long, global = true, env = "WARDEN_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Key namespace prefix
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List sessions recorded under the prefix
    List(list::ListArgs),

    /// Look up the session for a client key
    Get(get::GetArgs),

    /// Record a session for a client key unless one exists
    Claim(claim::ClaimArgs),

    /// Remove the session for a client key and print it
    Take(take::TakeArgs),

    /// Check that the backing store is reachable
    Ping(ping::PingArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources, warnings) = match cli.config {
        Some(ref path) => {
            let config = warden_config::load_config_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let source = ConfigSource {
                path: path.clone(),
                loaded: true,
            };
            (config, vec![source], Vec::new())
        }
        None => {
            let loaded = warden_config::load_config(None)?;
            (loaded.config, loaded.sources, loaded.warnings)
        }
    };

    warden_config::apply_env(&mut config);
    apply_overrides(&mut config, &cli);

    // Held until exit so buffered file logs are flushed.
    let _guard = init_tracing(&config.logging(), cli.verbose);

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    config.validate().context("invalid configuration")?;

    let ctx = commands::Context {
        config,
        sources,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Get(args) => get::run(args, &ctx).await,
        Commands::Claim(args) => claim::run(args, &ctx).await,
        Commands::Take(args) => take::run(args, &ctx).await,
        Commands::Ping(args) => ping::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Apply command-line flags on top of file and environment settings.
fn apply_overrides(config: &mut WardenConfig, cli: &Cli) {
    if let Some(ref url) = cli.redis_url {
        config.redis.get_or_insert_with(Default::default).url = url.clone();
    }
    if let Some(ref prefix) = cli.prefix {
        config.directory.get_or_insert_with(Default::default).prefix = prefix.clone();
    }
}

/// Console logs go to stderr so stdout stays clean for command output.
fn init_tracing(logging: &LoggingConfig, verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    let filter = if verbose {
        VERBOSE_FILTER
    } else {
        logging.filter.as_str()
    };

    let console = if logging.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::new(filter))
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::new(filter))
            .boxed()
    };

    let (file, guard) = match logging.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "warden.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}
