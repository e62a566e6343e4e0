//! Drives one session through the approval gate until it completes, is left
//! paused, or is discarded.

use crate::checkpoint::new_thread_id;
use crate::errors::PipelineError;
use crate::gates::{ApprovalGate, GateDecision};
use crate::pipeline::{PipelineRunner, PipelineStatus, StateRecord};
use anyhow::Result;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(StateRecord),
    /// Waiting at the gate; resume later with the same thread id.
    Paused(StateRecord),
    /// The checkpoint was deleted at the gate.
    Aborted,
}

/// Start (`Some(question)`) or resume (`None`) a session and keep advancing it
/// for as long as the gate approves.
pub async fn run_session(
    runner: &PipelineRunner,
    gate: &mut ApprovalGate,
    thread_id: &str,
    question: Option<String>,
) -> Result<SessionOutcome> {
    // Resuming a session that is already waiting at the gate: `advance(None)`
    // would execute immediately, so ask first.
    if question.is_none() {
        let checkpoint = runner.checkpoint(thread_id)?;
        if checkpoint.awaiting_approval
            && let Some(outcome) = consult(runner, gate, thread_id, checkpoint.record)?
        {
            return Ok(outcome);
        }
    }

    let mut next = question;
    loop {
        let advance = runner.advance(thread_id, next.take()).await?;
        match advance.status {
            PipelineStatus::Completed => return Ok(SessionOutcome::Completed(advance.record)),
            PipelineStatus::PausedForApproval => {
                if let Some(outcome) = consult(runner, gate, thread_id, advance.record)? {
                    return Ok(outcome);
                }
            }
        }
    }
}

/// Run `question` under a fresh thread id and delete its checkpoint
/// afterwards, whatever the outcome. Returns the thread id used.
pub async fn run_ephemeral(
    runner: &PipelineRunner,
    gate: &mut ApprovalGate,
    question: &str,
) -> Result<(String, SessionOutcome)> {
    let thread_id = new_thread_id();
    let outcome = run_session(runner, gate, &thread_id, Some(question.to_string())).await;

    // Discarded sessions are already gone.
    let cleanup = match runner.discard(&thread_id) {
        Ok(()) | Err(PipelineError::SessionNotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    };
    let outcome = outcome?;
    cleanup?;
    Ok((thread_id, outcome))
}

/// `None` means approved: the caller should resume.
fn consult(
    runner: &PipelineRunner,
    gate: &mut ApprovalGate,
    thread_id: &str,
    record: StateRecord,
) -> Result<Option<SessionOutcome>> {
    match gate.check(thread_id, &record)? {
        GateDecision::Approved | GateDecision::ApprovedAll => Ok(None),
        GateDecision::Deferred => {
            info!(thread_id, "Left paused at approval gate");
            Ok(Some(SessionOutcome::Paused(record)))
        }
        GateDecision::Discarded => {
            runner.discard(thread_id)?;
            Ok(Some(SessionOutcome::Aborted))
        }
    }
}
