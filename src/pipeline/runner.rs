use super::observer::{NoopObserver, PipelineObserver};
use super::stages::StageSet;
use super::state::{PipelineStatus, Slot, StageKind, StateRecord};
use crate::checkpoint::{Checkpoint, CheckpointStore, validate_thread_id};
use crate::errors::PipelineError;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-runner settings. Not persisted with sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Pause before the query executes until the caller resumes the session.
    pub require_approval: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            require_approval: true,
        }
    }
}

/// What one `advance` call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub thread_id: String,
    pub record: StateRecord,
    pub status: PipelineStatus,
    pub cursor: usize,
}

impl Advance {
    fn from_checkpoint(checkpoint: Checkpoint, status: PipelineStatus) -> Self {
        Self {
            thread_id: checkpoint.thread_id,
            record: checkpoint.record,
            status,
            cursor: checkpoint.cursor,
        }
    }
}

/// Drives the three-stage pipeline for any number of sessions.
///
/// The runner holds no per-session state: everything it needs to continue a
/// session lives in the checkpoint store, so distinct thread ids may be
/// advanced concurrently from the same runner.
pub struct PipelineRunner {
    store: Arc<dyn CheckpointStore>,
    stages: StageSet,
    options: RunnerOptions,
    observer: Arc<dyn PipelineObserver>,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn CheckpointStore>, stages: StageSet) -> Self {
        Self {
            store,
            stages,
            options: RunnerOptions::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> RunnerOptions {
        self.options
    }

    /// Run a session as far as it can go.
    ///
    /// `Some(question)` starts a fresh run. `None` resumes the stored session
    /// and counts as approval to execute the query.
    pub async fn advance(
        &self,
        thread_id: &str,
        question: Option<String>,
    ) -> Result<Advance, PipelineError> {
        validate_thread_id(thread_id)?;
        let approved = question.is_none();

        let mut checkpoint = match question {
            Some(question) => {
                if let Some(existing) = self.store.load(thread_id)?
                    && !existing.is_complete()
                {
                    return Err(PipelineError::InvalidResume {
                        thread_id: thread_id.to_string(),
                        reason: format!(
                            "session is {}; resume or discard it before asking a new question",
                            existing.phase()
                        ),
                    });
                }
                info!(thread_id, "Starting run");
                let mut checkpoint = Checkpoint::fresh(thread_id, question);
                self.persist(&mut checkpoint)?;
                checkpoint
            }
            None => {
                let checkpoint =
                    self.store
                        .load(thread_id)?
                        .ok_or_else(|| PipelineError::SessionNotFound {
                            thread_id: thread_id.to_string(),
                        })?;
                if checkpoint.is_complete() {
                    return Err(PipelineError::InvalidResume {
                        thread_id: thread_id.to_string(),
                        reason: "session already completed".to_string(),
                    });
                }
                info!(thread_id, cursor = checkpoint.cursor, "Resuming run");
                checkpoint
            }
        };

        while let Some(stage) = checkpoint.next_stage() {
            if stage == StageKind::INTERRUPT_POINT {
                if checkpoint.awaiting_approval && !approved {
                    self.persist(&mut checkpoint)?;
                    return Ok(self.pause(checkpoint));
                }
                if self.options.require_approval && !checkpoint.awaiting_approval {
                    checkpoint.awaiting_approval = true;
                    self.persist(&mut checkpoint)?;
                    return Ok(self.pause(checkpoint));
                }
            }

            self.observer.stage_started(thread_id, stage);
            let output = match checkpoint.record.input_for(stage) {
                Some(_) => self.stages.get(stage).run(&checkpoint.record).await,
                None => {
                    debug!(thread_id, %stage, "Upstream output missing, skipping stage");
                    Slot::Failed
                }
            };
            checkpoint.record.apply(stage, output);
            checkpoint.cursor += 1;
            checkpoint.awaiting_approval = false;
            self.persist(&mut checkpoint)?;
            self.observer
                .stage_finished(thread_id, stage, &checkpoint.record);
        }

        info!(thread_id, "Run completed");
        self.observer.completed(thread_id, &checkpoint.record);
        Ok(Advance::from_checkpoint(checkpoint, PipelineStatus::Completed))
    }

    /// The stored checkpoint of a session.
    pub fn checkpoint(&self, thread_id: &str) -> Result<Checkpoint, PipelineError> {
        validate_thread_id(thread_id)?;
        self.store
            .load(thread_id)?
            .ok_or_else(|| PipelineError::SessionNotFound {
                thread_id: thread_id.to_string(),
            })
    }

    /// Delete a session without resuming it.
    pub fn discard(&self, thread_id: &str) -> Result<(), PipelineError> {
        validate_thread_id(thread_id)?;
        if !self.store.delete(thread_id)? {
            return Err(PipelineError::SessionNotFound {
                thread_id: thread_id.to_string(),
            });
        }
        info!(thread_id, "Session discarded");
        Ok(())
    }

    fn persist(&self, checkpoint: &mut Checkpoint) -> Result<(), PipelineError> {
        checkpoint.touch();
        self.store.save(checkpoint)?;
        debug!(
            thread_id = %checkpoint.thread_id,
            cursor = checkpoint.cursor,
            awaiting_approval = checkpoint.awaiting_approval,
            "Checkpoint saved"
        );
        Ok(())
    }

    fn pause(&self, checkpoint: Checkpoint) -> Advance {
        info!(thread_id = %checkpoint.thread_id, "Paused for approval");
        self.observer.paused(&checkpoint.thread_id, &checkpoint.record);
        Advance::from_checkpoint(checkpoint, PipelineStatus::PausedForApproval)
    }
}
