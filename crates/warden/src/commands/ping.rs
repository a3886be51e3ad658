//! Ping command - checks the backing store is reachable.

use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::{Context, redact_url};

/// Arguments for the ping command.
#[derive(Args, Debug)]
pub struct PingArgs {}

#[derive(Debug, Serialize)]
struct PingOutput {
    reachable: bool,
    url: String,
    latency_ms: Option<f64>,
    error: Option<String>,
}

/// Run the ping command.
pub async fn run(_args: PingArgs, ctx: &Context) -> Result<()> {
    let url = redact_url(&ctx.config.redis().url);
    let timeout = ctx.config.directory().op_timeout();

    let started = Instant::now();
    let result = async {
        let backend = ctx.backend().await?;
        tokio::time::timeout(timeout, backend.ping())
            .await
            .context("ping timed out")?
            .context("ping failed")
    }
    .await;
    let latency = started.elapsed();

    let output = PingOutput {
        reachable: result.is_ok(),
        url,
        latency_ms: result.is_ok().then(|| latency.as_secs_f64() * 1000.0),
        error: result.as_ref().err().map(|e| format!("{:#}", e)),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Backing Store").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {} {}", dim.apply_to("URL:"), output.url);
        match output.latency_ms {
            Some(ms) => {
                let green = Style::new().green();
                println!(
                    "  {} {} ({:.1} ms)",
                    dim.apply_to("Status:"),
                    green.apply_to("● reachable"),
                    ms
                );
            }
            None => {
                let red = Style::new().red();
                println!(
                    "  {} {}",
                    dim.apply_to("Status:"),
                    red.apply_to("● unreachable")
                );
                if ctx.verbose
                    && let Some(ref error) = output.error
                {
                    println!("  {} {}", dim.apply_to("Error:"), error);
                }
            }
        }
        println!();
    }

    result
}
