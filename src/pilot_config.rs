//! Configuration file for sqlpilot.
//!
//! Settings are read from `.sqlpilot/sqlpilot.toml` and layered
//! (file → environment → CLI). A missing file means all defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//! temperature = 0.0
//! timeout_secs = 60
//! json_mode = true
//!
//! [database]
//! path = "data/shop.db"
//! top_k = 10
//! sample_rows = 3
//! read_only = false
//!
//! [checkpoint]
//! backend = "file"
//!
//! [pipeline]
//! require_approval = true
//!
//! [logging]
//! level = "info"
//! file = true
//! ```
//!
//! # Environment overrides
//!
//! | Variable                      | Overrides             |
//! |-------------------------------|-----------------------|
//! | `SQLPILOT_DATABASE`, `DB_PATH`| `database.path`       |
//! | `SQLPILOT_MODEL`              | `llm.model`           |
//! | `SQLPILOT_BASE_URL`           | `llm.base_url`        |
//! | `SQLPILOT_CHECKPOINT_BACKEND` | `checkpoint.backend`  |

use crate::checkpoint::CheckpointBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "sqlpilot.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Chat-completions endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f64,
    /// Request timeout for every LLM call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ask the endpoint for a JSON-object response when generating SQL
    #[serde(default = "default_true")]
    pub json_mode: bool,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            json_mode: true,
        }
    }
}

/// Target database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file, relative to the project directory unless absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Row limit suggested to the query generator
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Sample rows per table included in the schema description
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(default)]
    pub read_only: bool,
}

fn default_top_k() -> usize {
    10
}

fn default_sample_rows() -> usize {
    3
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: None,
            top_k: default_top_k(),
            sample_rows: default_sample_rows(),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSection {
    #[serde(default)]
    pub backend: CheckpointBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Pause before executing generated SQL
    #[serde(default = "default_true")]
    pub require_approval: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            require_approval: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write a daily log file under `.sqlpilot/logs`
    #[serde(default = "default_true")]
    pub file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
        }
    }
}

/// The complete sqlpilot.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PilotToml {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub checkpoint: CheckpointSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl PilotToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse sqlpilot.toml")
    }

    /// Load configuration from `<dir>/sqlpilot.toml`.
    /// Returns default configuration if file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize sqlpilot.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Database path (env → file).
    pub fn database_path(&self) -> Option<PathBuf> {
        env_var("SQLPILOT_DATABASE")
            .or_else(|| env_var("DB_PATH"))
            .map(PathBuf::from)
            .or_else(|| self.database.path.clone())
    }

    /// Model name (env → file).
    pub fn model(&self) -> String {
        env_var("SQLPILOT_MODEL").unwrap_or_else(|| self.llm.model.clone())
    }

    /// API base URL (env → file).
    pub fn base_url(&self) -> String {
        env_var("SQLPILOT_BASE_URL").unwrap_or_else(|| self.llm.base_url.clone())
    }

    /// API key read from the variable named by `llm.api_key_env`.
    pub fn api_key(&self) -> Option<String> {
        env_var(&self.llm.api_key_env)
    }

    /// Checkpoint backend (env → file). An invalid env value is an error.
    pub fn checkpoint_backend(&self) -> Result<CheckpointBackend> {
        match env_var("SQLPILOT_CHECKPOINT_BACKEND") {
            Some(value) => value
                .parse()
                .context("Invalid SQLPILOT_CHECKPOINT_BACKEND"),
            None => Ok(self.checkpoint.backend),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.llm.model.trim().is_empty() {
            warnings.push("llm.model is empty".to_string());
        }
        if self.llm.timeout_secs == 0 {
            warnings.push("llm.timeout_secs is 0: every LLM call would time out".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            warnings.push(format!(
                "llm.temperature {} is outside the usual 0.0-2.0 range",
                self.llm.temperature
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            warnings.push(format!(
                "Invalid logging.level '{}'. Valid values: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
        if self.database_path().is_none() {
            warnings.push(
                "No database configured: set database.path, SQLPILOT_DATABASE or pass --database"
                    .to_string(),
            );
        }

        warnings
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Serializes tests that read or write process environment variables.
    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 5] = [
        "SQLPILOT_DATABASE",
        "DB_PATH",
        "SQLPILOT_MODEL",
        "SQLPILOT_BASE_URL",
        "SQLPILOT_CHECKPOINT_BACKEND",
    ];

    /// Clears the override variables for the duration of a test and
    /// restores them afterwards.
    pub(crate) struct CleanEnv {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl CleanEnv {
        pub(crate) fn new() -> Self {
            let saved = OVERRIDE_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect();
            for name in OVERRIDE_VARS {
                unsafe { std::env::remove_var(name) };
            }
            Self { saved }
        }
    }

    impl Drop for CleanEnv {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => unsafe { std::env::set_var(name, v) },
                    None => unsafe { std::env::remove_var(name) },
                }
            }
        }
    }

    #[test]
    fn test_parse_empty_gives_defaults() {
        let toml = PilotToml::parse("").unwrap();
        assert_eq!(toml.llm.model, "gpt-4o-mini");
        assert_eq!(toml.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(toml.llm.timeout_secs, 60);
        assert!(toml.llm.json_mode);
        assert_eq!(toml.database.top_k, 10);
        assert_eq!(toml.database.sample_rows, 3);
        assert!(toml.database.path.is_none());
        assert_eq!(toml.checkpoint.backend, CheckpointBackend::File);
        assert!(toml.pipeline.require_approval);
        assert_eq!(toml.logging.level, "info");
        assert!(toml.logging.file);
    }

    #[test]
    fn test_parse_all_sections() {
        let content = r#"
[llm]
base_url = "http://localhost:11434/v1"
model = "llama3"
temperature = 0.2
timeout_secs = 30
json_mode = false

[database]
path = "data/shop.db"
top_k = 5
sample_rows = 0
read_only = true

[checkpoint]
backend = "sqlite"

[pipeline]
require_approval = false

[logging]
level = "debug"
file = false
"#;
        let toml = PilotToml::parse(content).unwrap();
        assert_eq!(toml.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(toml.llm.model, "llama3");
        assert_eq!(toml.llm.timeout_secs, 30);
        assert!(!toml.llm.json_mode);
        assert_eq!(toml.database.path, Some(PathBuf::from("data/shop.db")));
        assert_eq!(toml.database.top_k, 5);
        assert_eq!(toml.database.sample_rows, 0);
        assert!(toml.database.read_only);
        assert_eq!(toml.checkpoint.backend, CheckpointBackend::Sqlite);
        assert!(!toml.pipeline.require_approval);
        assert_eq!(toml.logging.level, "debug");
        assert!(!toml.logging.file);
    }

    #[test]
    fn test_parse_invalid_backend_fails() {
        let content = r#"
[checkpoint]
backend = "redis"
"#;
        assert!(PilotToml::parse(content).is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut toml = PilotToml::default();
        toml.database.path = Some(PathBuf::from("shop.db"));
        toml.pipeline.require_approval = false;

        let path = dir.path().join(CONFIG_FILE_NAME);
        toml.save(&path).unwrap();

        let loaded = PilotToml::load_or_default(dir.path()).unwrap();
        assert_eq!(loaded.database.path, Some(PathBuf::from("shop.db")));
        assert!(!loaded.pipeline.require_approval);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let toml = PilotToml::load_or_default(dir.path()).unwrap();
        assert_eq!(toml.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let _env = CleanEnv::new();

        let toml = PilotToml::parse(
            r#"
[llm]
model = "file-model"

[database]
path = "file.db"
"#,
        )
        .unwrap();
        assert_eq!(toml.model(), "file-model");
        assert_eq!(toml.database_path(), Some(PathBuf::from("file.db")));
        assert_eq!(toml.checkpoint_backend().unwrap(), CheckpointBackend::File);

        unsafe {
            std::env::set_var("SQLPILOT_MODEL", "env-model");
            std::env::set_var("DB_PATH", "legacy.db");
            std::env::set_var("SQLPILOT_CHECKPOINT_BACKEND", "memory");
        }
        assert_eq!(toml.model(), "env-model");
        assert_eq!(toml.database_path(), Some(PathBuf::from("legacy.db")));
        assert_eq!(toml.checkpoint_backend().unwrap(), CheckpointBackend::Memory);

        unsafe { std::env::set_var("SQLPILOT_DATABASE", "primary.db") };
        assert_eq!(toml.database_path(), Some(PathBuf::from("primary.db")));

        unsafe { std::env::set_var("SQLPILOT_CHECKPOINT_BACKEND", "bogus") };
        assert!(toml.checkpoint_backend().is_err());
    }

    #[test]
    fn test_validate_defaults_warns_about_missing_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let _env = CleanEnv::new();

        let warnings = PilotToml::default().validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("No database configured"));
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let _env = CleanEnv::new();

        let content = r#"
[llm]
model = ""
timeout_secs = 0

[database]
path = "shop.db"

[logging]
level = "loud"
"#;
        let warnings = PilotToml::parse(content).unwrap().validate();
        assert_eq!(warnings.len(), 3, "{:?}", warnings);
        assert!(warnings.iter().any(|w| w.contains("llm.model")));
        assert!(warnings.iter().any(|w| w.contains("timeout_secs")));
        assert!(warnings.iter().any(|w| w.contains("loud")));
    }
}
