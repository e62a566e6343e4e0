//! Project initialization: `sqlpilot init`.

use anyhow::{Context, Result};
use sqlpilot::config::Config;
use sqlpilot::pilot_config::PilotToml;

pub fn cmd_init(config: &Config) -> Result<()> {
    let was_initialized = config.config_file.exists();

    config.ensure_directories()?;

    if was_initialized {
        println!(
            "sqlpilot project already initialized at {}",
            config.pilot_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(());
    }

    PilotToml::default()
        .save(&config.config_file)
        .context("Failed to write default configuration")?;

    println!(
        "Initialized sqlpilot project at {}",
        config.pilot_dir.display()
    );
    println!();
    println!("Created directory structure:");
    println!("  .sqlpilot/");
    println!("  ├── sqlpilot.toml   # Configuration (use `sqlpilot config show`)");
    println!("  ├── sessions/       # Session checkpoints");
    println!("  └── logs/           # Daily log files");
    println!();
    println!("Next steps:");
    println!("  1. Set [database].path in .sqlpilot/sqlpilot.toml (or pass --database)");
    println!("  2. Export your API key (OPENAI_API_KEY by default)");
    println!("  3. Run `sqlpilot ask \"How many customers are there?\"`");

    Ok(())
}
