//! Configuration commands

use anyhow::{Context, Result};
use std::path::PathBuf;

use inventory_sync::SyncConfig;

use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

/// Print the effective configuration (file + environment)
pub fn show(path: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let config = SyncConfig::load(path.clone()).context("loading configuration")?;

    match format {
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Table => {
            if let Some(file) = path.or_else(SyncConfig::default_config_path) {
                print_info(&format!("Config file: {}", file.display()));
            }
            if let Some(db) = config.database_path() {
                print_info(&format!("Database:    {}", db.display()));
            }
            println!();
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

/// Write a default config with a fresh device id
pub fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let file = path
        .or_else(SyncConfig::default_config_path)
        .context("could not determine a config directory; pass --config")?;

    if file.exists() && !force {
        print_warning(&format!(
            "{} already exists. Use --force to overwrite it.",
            file.display()
        ));
        return Ok(());
    }

    let config = SyncConfig::new();
    config.save(Some(file.clone()))?;
    print_success(&format!(
        "Wrote {} (device id {})",
        file.display(),
        config.device_id()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("capture.toml");

        init(Some(file.clone()), false).unwrap();
        let first = std::fs::read_to_string(&file).unwrap();

        // Without --force the file is left alone.
        init(Some(file.clone()), false).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), first);

        let loaded: SyncConfig = toml::from_str(&first).unwrap();
        assert!(loaded.validate().is_ok());
    }
}
