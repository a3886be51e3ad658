//! Claim command - records a session unless the key already has one.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use warden_session::{SessionHandle, SessionStore};

use super::{CliSession, Context};

/// Arguments for the claim command.
#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Client key to claim
    pub key: String,

    /// Session identifier to record (default: random UUID)
    #[arg(long)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClaimOutput {
    key: String,
    session_id: String,
    existed: bool,
}

/// Run the claim command.
pub async fn run(args: ClaimArgs, ctx: &Context) -> Result<()> {
    let directory = ctx.directory().await?;

    let session_id = args
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let handle = SessionHandle::new(CliSession::new(session_id));

    let (canonical, existed) = directory.load_or_store(&args.key, handle).await?;

    let output = ClaimOutput {
        key: args.key,
        session_id: canonical.session_id().to_string(),
        existed,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        if output.existed {
            let yellow = Style::new().yellow();
            println!(
                "{} '{}' is already held",
                yellow.apply_to("●"),
                output.key
            );
        } else {
            let green = Style::new().green();
            println!("{} Claimed '{}'", green.apply_to("✓"), output.key);
        }
        println!("  {} {}", dim.apply_to("Session:"), output.session_id);
    }

    Ok(())
}
