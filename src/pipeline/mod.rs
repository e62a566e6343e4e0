//! Checkpointed three-stage pipeline: generate query, execute query
//! (behind the approval gate), generate answer.

mod observer;
mod runner;
mod stages;
mod state;

pub use observer::{NoopObserver, PipelineObserver};
pub use runner::{Advance, PipelineRunner, RunnerOptions};
pub use stages::{ExecuteQueryStage, GenerateAnswerStage, GenerateQueryStage, Stage, StageSet};
pub use state::{PipelineStatus, STAGE_COUNT, Slot, StageKind, StateRecord};

#[cfg(test)]
pub(crate) mod testing;
