//! Configuration view and validation commands: `sqlpilot config`.

use anyhow::Result;
use sqlpilot::config::Config;
use sqlpilot::pilot_config::PilotToml;

use super::super::ConfigCommands;

fn print_sections(toml: &PilotToml) {
    println!("[llm]");
    println!("  base_url = \"{}\"", toml.llm.base_url);
    println!("  model = \"{}\"", toml.llm.model);
    println!("  api_key_env = \"{}\"", toml.llm.api_key_env);
    println!("  temperature = {}", toml.llm.temperature);
    println!("  timeout_secs = {}", toml.llm.timeout_secs);
    println!("  json_mode = {}", toml.llm.json_mode);
    println!();

    println!("[database]");
    if let Some(path) = &toml.database.path {
        println!("  path = \"{}\"", path.display());
    }
    println!("  top_k = {}", toml.database.top_k);
    println!("  sample_rows = {}", toml.database.sample_rows);
    println!("  read_only = {}", toml.database.read_only);
    println!();

    println!("[checkpoint]");
    println!("  backend = \"{}\"", toml.checkpoint.backend);
    println!();

    println!("[pipeline]");
    println!("  require_approval = {}", toml.pipeline.require_approval);
    println!();

    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  file = {}", toml.logging.file);
    println!();
}

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.config_file;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("sqlpilot Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No sqlpilot.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();
            print_sections(&config.toml);

            // Show effective values (including env overrides)
            println!("Effective values (with env/CLI overrides):");
            println!("  base_url = \"{}\"", config.toml.base_url());
            println!("  model = \"{}\"", config.toml.model());
            match config.database_path() {
                Some(path) => println!("  database = \"{}\"", path.display()),
                None => println!("  database = (not set)"),
            }
            match config.checkpoint_backend() {
                Ok(backend) => println!("  checkpoint_backend = \"{}\"", backend),
                Err(e) => println!("  checkpoint_backend = (invalid: {:#})", e),
            }
            println!(
                "  require_approval = {}",
                config.runner_options().require_approval
            );
            println!(
                "  api_key = {}",
                if config.toml.api_key().is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!();

            if !config_path.exists() {
                println!("Run 'sqlpilot config init' to create a sqlpilot.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("sqlpilot.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&config.pilot_dir)?;
            PilotToml::default().save(config_path)?;

            println!("Created sqlpilot.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [llm] base_url, model, api_key_env");
            println!("  - [database] path, top_k, sample_rows");
            println!("  - [checkpoint] backend (file, sqlite, memory)");
            println!("  - [pipeline] require_approval");
            println!();
        }
    }

    Ok(())
}
