//! List command - walks every session recorded under the prefix.

use std::ops::ControlFlow;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use warden_session::{SessionHandle, SessionStore};

use super::{CliSession, Context};

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Stop after this many sessions
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SessionEntry {
    key: String,
    session_id: String,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    prefix: String,
    count: usize,
    truncated: bool,
    sessions: Vec<SessionEntry>,
}

/// Run the list command.
pub async fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let directory = ctx.directory().await?;
    let limit = args.limit.unwrap_or(usize::MAX);

    let mut sessions = Vec::new();
    let mut truncated = false;
    directory
        .range(&mut |key: &str, handle: &SessionHandle<CliSession>| {
            if sessions.len() >= limit {
                truncated = true;
                return ControlFlow::Break(());
            }
            sessions.push(SessionEntry {
                key: key.to_string(),
                session_id: handle.session_id().to_string(),
            });
            ControlFlow::Continue(())
        })
        .await;

    let output = ListOutput {
        prefix: directory.config().prefix.clone(),
        count: sessions.len(),
        truncated,
        sessions,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if output.sessions.is_empty() {
        println!("No sessions under {}", style(&output.prefix).cyan());
        return Ok(());
    }

    println!(
        "{} {}",
        style("Sessions under").bold(),
        style(&output.prefix).cyan()
    );
    println!("{}", dim.apply_to("─".repeat(60)));
    let width = output
        .sessions
        .iter()
        .map(|s| s.key.len())
        .max()
        .unwrap_or(0)
        .max(10);
    for entry in &output.sessions {
        println!("  {:<width$}  {}", entry.key, dim.apply_to(&entry.session_id));
    }
    println!();
    if output.truncated {
        println!(
            "{}",
            dim.apply_to(format!("Showing first {} (use --limit to change)", output.count))
        );
    } else {
        println!("{}", dim.apply_to(format!("{} session(s)", output.count)));
    }

    Ok(())
}
