use super::state::{StageKind, StateRecord};

/// Receives progress notifications from the runner.
///
/// All methods default to no-ops. Observers cannot influence control flow.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _thread_id: &str, _stage: StageKind) {}

    fn stage_finished(&self, _thread_id: &str, _stage: StageKind, _record: &StateRecord) {}

    fn paused(&self, _thread_id: &str, _record: &StateRecord) {}

    fn completed(&self, _thread_id: &str, _record: &StateRecord) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
