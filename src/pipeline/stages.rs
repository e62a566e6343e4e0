//! The three concrete stages and the fixed set that the runner drives.

use super::state::{Slot, StageKind, StateRecord};
use crate::collaborators::{
    AnswerSynthesizer, Collaborators, QueryExecutor, QueryGenerator, QueryOutcome, SchemaProvider,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// One step of the pipeline.
///
/// A stage reads the record and returns the value for its own output slot.
/// It never fails: collaborator errors are logged and reported as
/// [`Slot::Failed`]. The runner writes the returned slot into the record.
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, record: &StateRecord) -> Slot;
}

/// Stage 0: question + schema -> SQL.
pub struct GenerateQueryStage {
    generator: Arc<dyn QueryGenerator>,
    schema: Arc<dyn SchemaProvider>,
}

impl GenerateQueryStage {
    pub fn new(generator: Arc<dyn QueryGenerator>, schema: Arc<dyn SchemaProvider>) -> Self {
        Self { generator, schema }
    }
}

#[async_trait]
impl Stage for GenerateQueryStage {
    async fn run(&self, record: &StateRecord) -> Slot {
        let schema = match self.schema.table_info().await {
            Ok(schema) => schema,
            Err(e) => {
                warn!(stage = %StageKind::GenerateQuery, error = %e, "Schema lookup failed");
                return Slot::Failed;
            }
        };
        let dialect = self.schema.dialect();

        match self.generator.generate(&record.question, &schema, &dialect).await {
            QueryOutcome::Query(sql) => {
                debug!(stage = %StageKind::GenerateQuery, %sql, "Query generated");
                Slot::Value(sql)
            }
            QueryOutcome::Failure(reason) => {
                warn!(stage = %StageKind::GenerateQuery, %reason, "Query generation failed");
                Slot::Failed
            }
        }
    }
}

/// Stage 1: SQL -> result text. This is the stage behind the approval gate.
pub struct ExecuteQueryStage {
    executor: Arc<dyn QueryExecutor>,
}

impl ExecuteQueryStage {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Stage for ExecuteQueryStage {
    async fn run(&self, record: &StateRecord) -> Slot {
        let Some(sql) = record.query.value() else {
            return Slot::Failed;
        };
        match self.executor.execute(sql).await {
            Ok(result) => Slot::Value(result),
            Err(e) => {
                warn!(stage = %StageKind::ExecuteQuery, error = %e, "Query execution failed");
                Slot::Failed
            }
        }
    }
}

/// Stage 2: question + SQL + result -> natural-language answer.
pub struct GenerateAnswerStage {
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl GenerateAnswerStage {
    pub fn new(synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        Self { synthesizer }
    }
}

#[async_trait]
impl Stage for GenerateAnswerStage {
    async fn run(&self, record: &StateRecord) -> Slot {
        let (Some(sql), Some(result)) = (record.query.value(), record.result.value()) else {
            return Slot::Failed;
        };
        match self.synthesizer.synthesize(&record.question, sql, result).await {
            Ok(answer) => Slot::Value(answer),
            Err(e) => {
                warn!(stage = %StageKind::GenerateAnswer, error = %e, "Answer synthesis failed");
                Slot::Failed
            }
        }
    }
}

/// Exactly one stage per [`StageKind`], in pipeline order.
#[derive(Clone)]
pub struct StageSet {
    generate_query: Arc<dyn Stage>,
    execute_query: Arc<dyn Stage>,
    generate_answer: Arc<dyn Stage>,
}

impl StageSet {
    pub fn new(
        generate_query: Arc<dyn Stage>,
        execute_query: Arc<dyn Stage>,
        generate_answer: Arc<dyn Stage>,
    ) -> Self {
        Self {
            generate_query,
            execute_query,
            generate_answer,
        }
    }

    /// The standard NL-to-SQL stages wired to `collaborators`.
    pub fn sql(collaborators: &Collaborators) -> Self {
        Self::new(
            Arc::new(GenerateQueryStage::new(
                collaborators.generator.clone(),
                collaborators.schema.clone(),
            )),
            Arc::new(ExecuteQueryStage::new(collaborators.executor.clone())),
            Arc::new(GenerateAnswerStage::new(collaborators.synthesizer.clone())),
        )
    }

    pub fn get(&self, kind: StageKind) -> &dyn Stage {
        match kind {
            StageKind::GenerateQuery => self.generate_query.as_ref(),
            StageKind::ExecuteQuery => self.execute_query.as_ref(),
            StageKind::GenerateAnswer => self.generate_answer.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;

    struct FixedSchema;

    #[async_trait]
    impl SchemaProvider for FixedSchema {
        async fn table_info(&self) -> Result<String, CollaboratorError> {
            Ok("CREATE TABLE t (x INTEGER)".into())
        }
        fn dialect(&self) -> String {
            "sqlite".into()
        }
    }

    struct BrokenSchema;

    #[async_trait]
    impl SchemaProvider for BrokenSchema {
        async fn table_info(&self) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Task("no connection".into()))
        }
        fn dialect(&self) -> String {
            "sqlite".into()
        }
    }

    /// Echoes the inputs it was given so tests can check the plumbing.
    struct EchoGenerator;

    #[async_trait]
    impl QueryGenerator for EchoGenerator {
        async fn generate(&self, question: &str, schema: &str, dialect: &str) -> QueryOutcome {
            QueryOutcome::Query(format!("{dialect}|{schema}|{question}"))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl QueryExecutor for FailingExecutor {
        async fn execute(&self, _sql: &str) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Task("syntax error".into()))
        }
    }

    struct JoinSynthesizer;

    #[async_trait]
    impl AnswerSynthesizer for JoinSynthesizer {
        async fn synthesize(
            &self,
            question: &str,
            sql: &str,
            result: &str,
        ) -> Result<String, CollaboratorError> {
            Ok(format!("{question} / {sql} / {result}"))
        }
    }

    #[tokio::test]
    async fn test_generate_query_passes_schema_and_dialect() {
        let stage = GenerateQueryStage::new(Arc::new(EchoGenerator), Arc::new(FixedSchema));
        let slot = stage.run(&StateRecord::new("Q")).await;
        assert_eq!(slot, Slot::Value("sqlite|CREATE TABLE t (x INTEGER)|Q".into()));
    }

    #[tokio::test]
    async fn test_generate_query_schema_failure_is_failed_slot() {
        let stage = GenerateQueryStage::new(Arc::new(EchoGenerator), Arc::new(BrokenSchema));
        assert_eq!(stage.run(&StateRecord::new("Q")).await, Slot::Failed);
    }

    #[tokio::test]
    async fn test_execute_failure_is_failed_slot() {
        let stage = ExecuteQueryStage::new(Arc::new(FailingExecutor));
        let mut record = StateRecord::new("Q");
        record.apply(StageKind::GenerateQuery, Slot::Value("SELECT 1".into()));
        assert_eq!(stage.run(&record).await, Slot::Failed);
    }

    #[tokio::test]
    async fn test_generate_answer_uses_all_upstream_fields() {
        let stage = GenerateAnswerStage::new(Arc::new(JoinSynthesizer));
        let mut record = StateRecord::new("Q");
        record.apply(StageKind::GenerateQuery, Slot::Value("SELECT 1".into()));
        record.apply(StageKind::ExecuteQuery, Slot::Value("[(1,)]".into()));
        assert_eq!(
            stage.run(&record).await,
            Slot::Value("Q / SELECT 1 / [(1,)]".into())
        );
    }

    #[tokio::test]
    async fn test_generate_answer_without_result_is_failed() {
        let stage = GenerateAnswerStage::new(Arc::new(JoinSynthesizer));
        let mut record = StateRecord::new("Q");
        record.apply(StageKind::GenerateQuery, Slot::Value("SELECT 1".into()));
        record.apply(StageKind::ExecuteQuery, Slot::Failed);
        assert_eq!(stage.run(&record).await, Slot::Failed);
    }
}
