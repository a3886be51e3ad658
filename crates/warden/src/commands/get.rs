//! Get command - looks up the session for a client key.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;
use warden_session::SessionStore;

use super::Context;

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Client key to look up
    pub key: String,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    key: String,
    session_id: String,
}

/// Run the get command.
pub async fn run(args: GetArgs, ctx: &Context) -> Result<()> {
    let directory = ctx.directory().await?;

    let Some(handle) = directory.load(&args.key).await else {
        anyhow::bail!("no session for '{}'", args.key);
    };

    let output = GetOutput {
        key: args.key,
        session_id: handle.session_id().to_string(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let dim = Style::new().dim();
        println!("  {} {}", dim.apply_to("Key:"), output.key);
        println!("  {} {}", dim.apply_to("Session:"), output.session_id);
    }

    Ok(())
}
