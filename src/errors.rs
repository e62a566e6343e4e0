//! Typed error hierarchy for sqlpilot.
//!
//! Three top-level enums cover the three failure domains:
//! - `PipelineError`: what a caller of `PipelineRunner::advance` can see
//! - `StorageError`: checkpoint persistence failures
//! - `CollaboratorError`: LLM and database calls made from inside a stage.
//!   These never escape a stage; they become a failed slot on the record.

use thiserror::Error;

/// Errors surfaced by the pipeline runner to its caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session '{thread_id}' not found")]
    SessionNotFound { thread_id: String },

    #[error("Cannot advance session '{thread_id}': {reason}")]
    InvalidResume { thread_id: String, reason: String },

    #[error("Invalid thread id '{thread_id}': {reason}")]
    InvalidThreadId { thread_id: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from a checkpoint store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Checkpoint I/O failed while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint serialization failed while {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checkpoint database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Checkpoint store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }
}

/// Errors from an external collaborator (LLM endpoint, SQL database).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database task failed: {0}")]
    Task(String),

    #[error("Collaborator misconfigured: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_carries_thread_id() {
        let err = PipelineError::SessionNotFound {
            thread_id: "abc-123".to_string(),
        };
        match &err {
            PipelineError::SessionNotFound { thread_id } => assert_eq!(thread_id, "abc-123"),
            _ => panic!("Expected SessionNotFound"),
        }
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn pipeline_error_converts_from_storage_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let err: PipelineError = StorageError::io("writing checkpoint", io_err).into();
        match &err {
            PipelineError::Storage(StorageError::Io { context, source }) => {
                assert_eq!(context, "writing checkpoint");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected PipelineError::Storage(Io {{ .. }})"),
        }
    }

    #[test]
    fn invalid_resume_message_includes_reason() {
        let err = PipelineError::InvalidResume {
            thread_id: "t1".to_string(),
            reason: "session already completed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("t1"));
        assert!(msg.contains("already completed"));
    }

    #[test]
    fn collaborator_api_error_carries_status() {
        let err = CollaboratorError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));
        assert!(matches!(err, CollaboratorError::Api { status: 429, .. }));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&PipelineError::SessionNotFound {
            thread_id: "x".into(),
        });
        assert_std_error(&StorageError::LockPoisoned);
        assert_std_error(&CollaboratorError::EmptyResponse);
    }
}
