//! Running questions through the pipeline: `sqlpilot ask`, `resume` and `chat`.

use anyhow::{Context, Result};
use console::style;
use sqlpilot::checkpoint::{CheckpointStore, MemoryStore, new_thread_id};
use sqlpilot::collaborators::{ChatClient, Collaborators, SqliteDatabase};
use sqlpilot::config::Config;
use sqlpilot::gates::ApprovalGate;
use sqlpilot::pipeline::{PipelineRunner, StageSet};
use sqlpilot::session::{SessionOutcome, run_ephemeral, run_session};
use sqlpilot::ui::{SessionUI, print_outcome, print_record};
use std::sync::Arc;
use tracing::warn;

use super::open_checkpoints;

/// Wire the database, the LLM client and `store` into a runner.
fn build_runner(config: &Config, store: Arc<dyn CheckpointStore>) -> Result<PipelineRunner> {
    let db_path = config.require_database()?;
    let database = SqliteDatabase::open(
        &db_path,
        config.toml.database.read_only,
        config.toml.database.sample_rows,
    )
    .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let api_key = config.toml.api_key();
    if api_key.is_none() {
        warn!(
            env = %config.toml.llm.api_key_env,
            "No API key set; requests are sent without authorization"
        );
    }
    let chat = ChatClient::new(
        config.toml.base_url(),
        config.toml.model(),
        api_key,
        config.llm_timeout(),
    )
    .context("Failed to create LLM client")?
    .with_temperature(config.toml.llm.temperature)
    .with_json_mode(config.toml.llm.json_mode);

    let collaborators = Collaborators::from_parts(
        Arc::new(chat),
        Arc::new(database),
        config.toml.database.top_k,
    );

    Ok(PipelineRunner::new(store, StageSet::sql(&collaborators))
        .with_options(config.runner_options())
        .with_observer(Arc::new(SessionUI::new(config.verbose))))
}

pub async fn cmd_ask(config: &Config, question: &str, thread: Option<String>) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question must not be empty");
    }

    let runner = build_runner(config, open_checkpoints(config)?)?;
    let thread_id = thread.unwrap_or_else(new_thread_id);
    let mut gate = ApprovalGate::new(config.yes);

    println!("{} {}", style("Thread").dim(), style(&thread_id).cyan());
    let outcome = run_session(&runner, &mut gate, &thread_id, Some(question.to_string())).await?;
    print_outcome(&thread_id, &outcome);
    Ok(())
}

pub async fn cmd_resume(config: &Config, thread_id: &str) -> Result<()> {
    let runner = build_runner(config, open_checkpoints(config)?)?;
    let mut gate = ApprovalGate::new(config.yes);

    println!("{} {}", style("Resuming").dim(), style(thread_id).cyan());
    let outcome = run_session(&runner, &mut gate, thread_id, None).await?;
    print_outcome(thread_id, &outcome);
    Ok(())
}

/// Interactive loop; every question is its own in-memory session.
pub async fn cmd_chat(config: &Config) -> Result<()> {
    use dialoguer::Input;

    let runner = build_runner(config, Arc::new(MemoryStore::new()))?;
    let mut gate = ApprovalGate::new(config.yes);

    println!();
    println!("{}", style("SQL chat").bold());
    println!(
        "{}",
        style("Ask a question about your database. Empty line or 'exit' to quit.").dim()
    );

    loop {
        println!();
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();
        if question.is_empty() || matches!(question, "exit" | "quit") {
            break;
        }

        match run_ephemeral(&runner, &mut gate, question).await {
            Ok((_, SessionOutcome::Paused(record))) => {
                print_record(&record);
                println!("{}", style("Skipped: query not executed").yellow());
            }
            Ok((thread_id, outcome)) => print_outcome(&thread_id, &outcome),
            Err(e) => println!("{} {:#}", style("Error:").red().bold(), e),
        }
    }

    Ok(())
}
