//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                  |
//! |-----------|-----------------------------------|
//! | `ask`     | `Ask`, `Resume`, `Chat`           |
//! | `session` | `Show`, `Sessions`, `Discard`     |
//! | `schema`  | `Schema`                          |
//! | `project` | `Init`                            |
//! | `config`  | `Config`                          |

pub mod ask;
pub mod config;
pub mod project;
pub mod schema;
pub mod session;

pub use ask::{cmd_ask, cmd_chat, cmd_resume};
pub use config::cmd_config;
pub use project::cmd_init;
pub use schema::cmd_schema;
pub use session::{cmd_discard, cmd_sessions, cmd_show};

use anyhow::{Context, Result};
use sqlpilot::checkpoint::{CheckpointStore, open_store};
use sqlpilot::config::Config;
use std::sync::Arc;

/// Open the configured checkpoint backend.
pub fn open_checkpoints(config: &Config) -> Result<Arc<dyn CheckpointStore>> {
    let backend = config.checkpoint_backend()?;
    open_store(backend, &config.sessions_dir, &config.checkpoint_db)
        .with_context(|| format!("Failed to open {} checkpoint store", backend))
}
