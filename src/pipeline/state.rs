use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of stages in the pipeline. A cursor equal to this value means the run is complete.
pub const STAGE_COUNT: usize = 3;

/// One stage of the fixed question → SQL → result → answer pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    GenerateQuery,
    ExecuteQuery,
    GenerateAnswer,
}

impl StageKind {
    pub const ALL: [StageKind; STAGE_COUNT] = [
        StageKind::GenerateQuery,
        StageKind::ExecuteQuery,
        StageKind::GenerateAnswer,
    ];

    /// The stage guarded by the approval gate: it has side effects on the database.
    pub const INTERRUPT_POINT: StageKind = StageKind::ExecuteQuery;

    /// Position of this stage in the pipeline (its cursor value).
    pub fn index(self) -> usize {
        match self {
            StageKind::GenerateQuery => 0,
            StageKind::ExecuteQuery => 1,
            StageKind::GenerateAnswer => 2,
        }
    }

    /// Stage that runs when the pipeline cursor is at `cursor`, if any.
    pub fn at(cursor: usize) -> Option<StageKind> {
        Self::ALL.get(cursor).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            StageKind::GenerateQuery => "generate_query",
            StageKind::ExecuteQuery => "execute_query",
            StageKind::GenerateAnswer => "generate_answer",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Output slot of a single stage.
///
/// `Pending` and `Failed` must stay distinguishable after a checkpoint
/// round-trip, so in JSON a pending slot is an omitted key (see the
/// `skip_serializing_if` on [`StateRecord`]), a failed slot is `null`,
/// and a value is a plain string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot {
    /// The stage has not run yet.
    #[default]
    Pending,
    /// The stage ran and its collaborator failed (or its input was missing).
    Failed,
    /// The stage ran and produced this output.
    Value(String),
}

impl Slot {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Slot::Failed)
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Slot::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Option<String>> for Slot {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Slot::Value(v),
            None => Slot::Failed,
        }
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::Value(v) => serializer.serialize_str(v),
            Slot::Pending | Slot::Failed => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.into())
    }
}

/// The payload threaded through all three stages of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub question: String,
    #[serde(default, skip_serializing_if = "Slot::is_pending")]
    pub query: Slot,
    #[serde(default, skip_serializing_if = "Slot::is_pending")]
    pub result: Slot,
    #[serde(default, skip_serializing_if = "Slot::is_pending")]
    pub answer: Slot,
}

impl StateRecord {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query: Slot::Pending,
            result: Slot::Pending,
            answer: Slot::Pending,
        }
    }

    /// The output slot owned by `stage`.
    pub fn slot(&self, stage: StageKind) -> &Slot {
        match stage {
            StageKind::GenerateQuery => &self.query,
            StageKind::ExecuteQuery => &self.result,
            StageKind::GenerateAnswer => &self.answer,
        }
    }

    /// Write a stage's output into its slot. The question is never touched.
    pub fn apply(&mut self, stage: StageKind, output: Slot) {
        match stage {
            StageKind::GenerateQuery => self.query = output,
            StageKind::ExecuteQuery => self.result = output,
            StageKind::GenerateAnswer => self.answer = output,
        }
    }

    /// The upstream value `stage` consumes, or `None` if the upstream stage failed
    /// or has not run.
    pub fn input_for(&self, stage: StageKind) -> Option<&str> {
        match stage {
            StageKind::GenerateQuery => Some(&self.question),
            StageKind::ExecuteQuery => self.query.value(),
            StageKind::GenerateAnswer => self.result.value(),
        }
    }

    /// Check the stage-order invariant: a slot is only populated once its
    /// predecessor is, and a failed slot is never followed by a value.
    pub fn is_consistent(&self) -> bool {
        let slots = [&self.query, &self.result, &self.answer];
        slots.windows(2).all(|pair| {
            let (upstream, downstream) = (pair[0], pair[1]);
            match upstream {
                Slot::Pending => downstream.is_pending(),
                Slot::Failed => !matches!(downstream, Slot::Value(_)),
                Slot::Value(_) => true,
            }
        })
    }
}

/// Outcome of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    PausedForApproval,
    Completed,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::PausedForApproval => write!(f, "PAUSED_FOR_APPROVAL"),
            PipelineStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}
