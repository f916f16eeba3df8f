use anyhow::{Context, Result};
use geo_db::config::{Config, CONFIG_FILE_NAME};
use std::path::PathBuf;

pub fn init_config(path: PathBuf) -> Result<()> {
    let config_path = path.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            config_path.display()
        );
    }

    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    let content = Config::default().to_commented_toml()?;
    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!("Created configuration file: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set [source] path to a local dump, or keep the default URL");
    println!("  2. Run: geo-db import");
    Ok(())
}
