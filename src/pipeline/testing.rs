//! In-process collaborators for pipeline tests.

use crate::collaborators::{
    AnswerSynthesizer, Collaborators, QueryExecutor, QueryGenerator, QueryOutcome, SchemaProvider,
};
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FakeSchema;

#[async_trait]
impl SchemaProvider for FakeSchema {
    async fn table_info(&self) -> Result<String, CollaboratorError> {
        Ok("CREATE TABLE customers (id INTEGER)".into())
    }

    fn dialect(&self) -> String {
        "sqlite".into()
    }
}

/// Produces `SELECT '<question>'`, or a failure.
pub struct FakeGenerator {
    pub fail: bool,
}

#[async_trait]
impl QueryGenerator for FakeGenerator {
    async fn generate(&self, question: &str, _schema: &str, _dialect: &str) -> QueryOutcome {
        if self.fail {
            QueryOutcome::failure("model unavailable")
        } else {
            QueryOutcome::Query(format!("SELECT '{}'", question))
        }
    }
}

/// Returns `rows for <sql>` and counts calls.
#[derive(Default)]
pub struct CountingExecutor {
    calls: AtomicUsize,
}

impl CountingExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for CountingExecutor {
    async fn execute(&self, sql: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(format!("rows for {}", sql))
    }
}

pub struct FakeSynthesizer;

#[async_trait]
impl AnswerSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        _sql: &str,
        result: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("answer to {} from {}", question, result))
    }
}

/// Fake collaborators plus a handle on the executor's call counter.
pub fn fake_collaborators(generator_fails: bool) -> (Collaborators, Arc<CountingExecutor>) {
    let executor = Arc::new(CountingExecutor::default());
    let collaborators = Collaborators {
        generator: Arc::new(FakeGenerator {
            fail: generator_fails,
        }),
        schema: Arc::new(FakeSchema),
        executor: executor.clone(),
        synthesizer: Arc::new(FakeSynthesizer),
    };
    (collaborators, executor)
}
