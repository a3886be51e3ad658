//! Take command - atomically removes a session and prints what was removed.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use warden_session::SessionStore;

use super::Context;

/// Arguments for the take command.
#[derive(Args, Debug)]
pub struct TakeArgs {
    /// Client key to remove
    pub key: String,
}

#[derive(Debug, Serialize)]
struct TakeOutput {
    key: String,
    session_id: String,
}

/// Run the take command.
pub async fn run(args: TakeArgs, ctx: &Context) -> Result<()> {
    let directory = ctx.directory().await?;

    let Some(handle) = directory.load_and_delete(&args.key).await else {
        anyhow::bail!("no session for '{}'", args.key);
    };

    let output = TakeOutput {
        key: args.key,
        session_id: handle.session_id().to_string(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        let dim = Style::new().dim();
        println!("{} Removed '{}'", green.apply_to("✓"), output.key);
        println!("  {} {}", dim.apply_to("Session:"), output.session_id);
    }

    Ok(())
}
