//! Inspecting and deleting stored sessions: `sqlpilot show`, `sessions`, `discard`.

use anyhow::{Result, bail};
use sqlpilot::checkpoint::validate_thread_id;
use sqlpilot::config::Config;
use sqlpilot::ui::{print_checkpoint, print_sessions};

use super::open_checkpoints;

pub fn cmd_show(config: &Config, thread_id: &str) -> Result<()> {
    validate_thread_id(thread_id)?;
    let store = open_checkpoints(config)?;
    match store.load(thread_id)? {
        Some(checkpoint) => {
            println!();
            print_checkpoint(&checkpoint);
            println!();
            Ok(())
        }
        None => bail!("Session '{}' not found", thread_id),
    }
}

pub fn cmd_sessions(config: &Config) -> Result<()> {
    let store = open_checkpoints(config)?;
    let sessions = store.list()?;
    println!();
    print_sessions(&sessions);
    println!();
    Ok(())
}

pub fn cmd_discard(config: &Config, thread_id: &str, force: bool) -> Result<()> {
    use dialoguer::Confirm;

    validate_thread_id(thread_id)?;
    let store = open_checkpoints(config)?;
    if store.load(thread_id)?.is_none() {
        bail!("Session '{}' not found", thread_id);
    }

    if !force {
        let confirm = Confirm::new()
            .with_prompt(format!("Discard session {}?", thread_id))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Discard cancelled");
            return Ok(());
        }
    }

    store.delete(thread_id)?;
    println!("Session {} discarded", thread_id);
    Ok(())
}
