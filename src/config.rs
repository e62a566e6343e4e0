use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checkpoint::CheckpointBackend;
use crate::pilot_config::{CONFIG_FILE_NAME, PilotToml};
use crate::pipeline::RunnerOptions;

/// Overrides taken from global CLI flags.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub verbose: bool,
    pub yes: bool,
    pub database: Option<PathBuf>,
    pub no_approval: bool,
}

/// Runtime configuration for sqlpilot.
///
/// Resolves the project layout under `.sqlpilot/` and merges the parsed
/// `sqlpilot.toml` (with its environment overrides) with CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub pilot_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub checkpoint_db: PathBuf,
    pub log_dir: PathBuf,
    pub config_file: PathBuf,
    pub verbose: bool,
    pub yes: bool,
    /// The underlying file configuration
    pub toml: PilotToml,
    cli_database: Option<PathBuf>,
    no_approval: bool,
}

impl Config {
    pub fn new(project_dir: PathBuf, overrides: CliOverrides) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let pilot_dir = project_dir.join(".sqlpilot");
        let toml = PilotToml::load_or_default(&pilot_dir)?;

        Ok(Self {
            sessions_dir: pilot_dir.join("sessions"),
            checkpoint_db: pilot_dir.join("checkpoints.db"),
            log_dir: pilot_dir.join("logs"),
            config_file: pilot_dir.join(CONFIG_FILE_NAME),
            project_dir,
            pilot_dir,
            verbose: overrides.verbose,
            yes: overrides.yes,
            toml,
            cli_database: overrides.database,
            no_approval: overrides.no_approval,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.sessions_dir)
            .context("Failed to create sessions directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Database file (CLI → env → file), resolved against the project directory.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.cli_database
            .clone()
            .or_else(|| self.toml.database_path())
            .map(|path| self.resolve(&path))
    }

    /// Database file, or an error explaining how to configure one.
    pub fn require_database(&self) -> Result<PathBuf> {
        self.database_path().context(
            "No database configured. Pass --database, set SQLPILOT_DATABASE, \
             or set [database].path in .sqlpilot/sqlpilot.toml",
        )
    }

    pub fn checkpoint_backend(&self) -> Result<CheckpointBackend> {
        self.toml.checkpoint_backend()
    }

    /// `--no-approval` wins over the file setting.
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            require_approval: self.toml.pipeline.require_approval && !self.no_approval,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.toml.llm.timeout_secs)
    }

    /// Effective log level: `debug` with `--verbose`, else the configured one.
    pub fn log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.toml.logging.level
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if self.cli_database.is_some() {
            warnings.retain(|w| !w.starts_with("No database configured"));
        }
        if let Some(path) = self.database_path()
            && !path.exists()
        {
            warnings.push(format!("Database file does not exist: {}", path.display()));
        }
        if let Ok(CheckpointBackend::Memory) = self.checkpoint_backend() {
            warnings.push(
                "checkpoint.backend = \"memory\": paused sessions cannot be resumed by a later command"
                    .to_string(),
            );
        }
        warnings
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}
