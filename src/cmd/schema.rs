//! Database introspection: `sqlpilot schema`.

use anyhow::{Context, Result};
use sqlpilot::collaborators::{SchemaProvider, SqliteDatabase};
use sqlpilot::config::Config;

pub async fn cmd_schema(config: &Config) -> Result<()> {
    let db_path = config.require_database()?;
    let database = SqliteDatabase::open(&db_path, true, config.toml.database.sample_rows)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let info = database
        .table_info()
        .await
        .context("Failed to read table info")?;

    println!();
    println!("Database: {}", db_path.display());
    println!("Dialect:  {}", database.dialect());
    println!();
    println!("{}", info);
    println!();
    Ok(())
}
