use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlpilot::config::{CliOverrides, Config};
use sqlpilot::logging::{LogConfig, init_logging};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "sqlpilot")]
#[command(version, about = "Ask questions about a SQL database in plain language")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Approve every query without prompting
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// SQLite database to query. Overrides sqlpilot.toml and SQLPILOT_DATABASE.
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Run the whole pipeline without pausing before query execution
    #[arg(long, global = true)]
    pub no_approval: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new sqlpilot project
    Init,
    /// Ask a question; pauses for approval before the query runs
    Ask {
        question: String,
        /// Session id to use (defaults to a new UUID)
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// Resume a paused session
    Resume { thread: String },
    /// Interactive question loop
    Chat,
    /// Show a stored session
    Show { thread: String },
    /// List stored sessions
    Sessions,
    /// Delete a stored session
    Discard {
        thread: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Print the database dialect and table info
    Schema,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default sqlpilot.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = Config::new(
        project_dir,
        CliOverrides {
            verbose: cli.verbose,
            yes: cli.yes,
            database: cli.database.clone(),
            no_approval: cli.no_approval,
        },
    )?;

    // Only write log files inside an initialized project.
    let file_dir = (config.toml.logging.file && config.pilot_dir.is_dir())
        .then(|| config.log_dir.clone());
    let _log_guard = init_logging(LogConfig {
        level: config.log_level().to_string(),
        verbose: config.verbose,
        file_dir,
    })?;

    match cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Ask { question, thread } => cmd::cmd_ask(&config, &question, thread).await?,
        Commands::Resume { thread } => cmd::cmd_resume(&config, &thread).await?,
        Commands::Chat => cmd::cmd_chat(&config).await?,
        Commands::Show { thread } => cmd::cmd_show(&config, &thread)?,
        Commands::Sessions => cmd::cmd_sessions(&config)?,
        Commands::Discard { thread, force } => cmd::cmd_discard(&config, &thread, force)?,
        Commands::Schema => cmd::cmd_schema(&config).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
