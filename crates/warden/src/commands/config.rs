//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::style;
use warden_config::{DirectoryConfig, LoggingConfig, RedisConfig, WardenConfig};

use super::{Context, redact_url};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./warden.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let resolved = redacted(&ctx.config);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let loaded: Vec<_> = ctx.sources.iter().filter(|s| s.loaded).collect();
    if loaded.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in loaded {
            println!("# from {}", source.path.display());
        }
    }
    println!();
    print!("{}", resolved.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    println!("Config file search order (later overrides earlier):\n");

    for source in &ctx.sources {
        let status = if source.loaded {
            style("✓ loaded").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    println!("Environment overrides: WARDEN_REDIS_URL, WARDEN_REDIS_PASSWORD, WARDEN_PREFIX");
    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("warden.toml")
    } else {
        warden_config::xdg_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    warden_config::save_config(&default_config(), &path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Created config file: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  warden config show    # verify configuration");
    println!("  warden ping           # check the backing store");

    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = warden_config::xdg_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}

/// Every section filled in, so a fresh file documents the available keys.
fn default_config() -> WardenConfig {
    WardenConfig {
        redis: Some(RedisConfig::default()),
        directory: Some(DirectoryConfig::default()),
        logging: Some(LoggingConfig::default()),
    }
}

fn redacted(config: &WardenConfig) -> WardenConfig {
    let mut resolved = WardenConfig {
        redis: Some(config.redis()),
        directory: Some(config.directory()),
        logging: Some(config.logging()),
    };
    if let Some(ref mut redis) = resolved.redis {
        redis.url = redact_url(&redis.url);
        if redis.password.is_some() {
            redis.password = Some("****".to_string());
        }
    }
    resolved
}
