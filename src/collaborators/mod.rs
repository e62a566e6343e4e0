//! External collaborators invoked by pipeline stages.
//!
//! The pipeline only sees the traits defined here. Concrete adapters:
//! - [`ChatClient`] with [`LlmQueryGenerator`] and [`LlmAnswerSynthesizer`]:
//!   an OpenAI-compatible chat completions endpoint
//! - [`SqliteDatabase`]: schema introspection and query execution on SQLite

mod llm;
pub mod prompts;
mod sqlite_db;

pub use llm::{ChatClient, ChatMessage, LlmAnswerSynthesizer, LlmQueryGenerator, parse_query_reply};
pub use sqlite_db::SqliteDatabase;

use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of asking for a SQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Query(String),
    Failure(String),
}

impl QueryOutcome {
    pub fn failure(reason: impl std::fmt::Display) -> Self {
        QueryOutcome::Failure(reason.to_string())
    }
}

/// Turns a natural-language question into SQL. Never fails: errors are
/// reported as [`QueryOutcome::Failure`].
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, question: &str, schema: &str, dialect: &str) -> QueryOutcome;
}

/// Read-only database metadata.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Human/LLM-readable description of the tables.
    async fn table_info(&self) -> Result<String, CollaboratorError>;

    /// SQL dialect name, e.g. `sqlite`.
    fn dialect(&self) -> String;
}

/// Runs generated SQL and renders the result as text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<String, CollaboratorError>;
}

/// Answers the question in natural language from the query and its result.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        sql: &str,
        result: &str,
    ) -> Result<String, CollaboratorError>;
}

/// The full set of collaborators the three stages need, built once and shared.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn QueryGenerator>,
    pub schema: Arc<dyn SchemaProvider>,
    pub executor: Arc<dyn QueryExecutor>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl Collaborators {
    /// Wire the LLM client and a SQLite database into the four roles.
    pub fn from_parts(chat: Arc<ChatClient>, database: Arc<SqliteDatabase>, top_k: usize) -> Self {
        Self {
            generator: Arc::new(LlmQueryGenerator::new(chat.clone(), top_k)),
            schema: database.clone(),
            executor: database,
            synthesizer: Arc::new(LlmAnswerSynthesizer::new(chat)),
        }
    }
}
