//! Configuration for geo-db

mod logging;
mod output;
mod source;
mod taxonomy;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use output::{ImportSettings, OutputConfig};
pub use source::{DecompressorConfig, SourceConfig, DEFAULT_DUMP_URL};
pub use taxonomy::TaxonomyConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default user agent for all HTTP requests (dump download, taxonomy queries)
pub const DEFAULT_USER_AGENT: &str = concat!("geo-db/", env!("CARGO_PKG_VERSION"));

/// Conventional config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "geo-db.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub decompressor: DecompressorConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to load config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Load from `path` if given, else from `geo-db.toml` if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize with a short header, as written by `geo-db init`
    pub fn to_commented_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!(
            "# geo-db configuration\n\
             #\n\
             # [import] reference_time = \"2024-01-01T00:00:00Z\" pins the instant that\n\
             # start/end time qualifiers are checked against (default: now).\n\
             # [source] path = \"latest-all.json.bz2\" reads a local dump instead of the URL.\n\n{}",
            body
        ))
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.source.path.is_none() {
            if let Err(e) = url::Url::parse(&self.source.url) {
                errors.push(format!("source url '{}' is invalid: {}", self.source.url, e));
            }
        }
        if let Err(e) = url::Url::parse(&self.source.entity_data_url) {
            errors.push(format!(
                "entity_data_url '{}' is invalid: {}",
                self.source.entity_data_url, e
            ));
        }
        if self.source.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be positive".to_string());
        }

        if self.decompressor.command.trim().is_empty() {
            errors.push("decompressor command must not be empty".to_string());
        }
        if self.decompressor.watermark_bytes == 0 {
            errors.push("watermark_bytes must be positive".to_string());
        }
        if self.decompressor.read_chunk_bytes == 0 {
            errors.push("read_chunk_bytes must be positive".to_string());
        }
        if self.decompressor.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be positive".to_string());
        }

        if let Err(e) = url::Url::parse(&self.taxonomy.endpoint) {
            errors.push(format!(
                "taxonomy endpoint '{}' is invalid: {}",
                self.taxonomy.endpoint, e
            ));
        }
        for (name, id) in [
            ("country_root", &self.taxonomy.country_root),
            ("territorial_entity_root", &self.taxonomy.territorial_entity_root),
            ("human_settlement_root", &self.taxonomy.human_settlement_root),
            ("language_class", &self.taxonomy.language_class),
        ] {
            if !is_item_id(id) {
                errors.push(format!("{} must be an item id like Q123, got '{}'", name, id));
            }
        }

        if self.output.path.as_os_str().is_empty() {
            errors.push("output path must not be empty".to_string());
        }
        if self.output.commit_every == 0 {
            errors.push("commit_every must be positive".to_string());
        }

        if self.import.progress_interval_secs == 0 {
            errors.push("progress_interval_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

fn is_item_id(id: &str) -> bool {
    id.strip_prefix('Q')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.decompressor.watermark_bytes, 2 * 1024 * 1024);
        assert_eq!(config.output.path, PathBuf::from("geo.db"));
        assert!(config.import.reference_time.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [decompressor]
            command = "lbzip2"

            [import]
            reference_time = "2024-01-01T00:00:00Z"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.decompressor.command, "lbzip2");
        assert_eq!(config.decompressor.args, vec!["-dc".to_string()]);
        assert_eq!(
            config.import.reference_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut cfg = Config::default();
        cfg.decompressor.watermark_bytes = 0;
        cfg.output.commit_every = 0;
        cfg.taxonomy.country_root = "country".to_string();

        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("watermark_bytes must be positive"), "{}", err);
        assert!(err.contains("commit_every must be positive"), "{}", err);
        assert!(err.contains("country_root must be an item id"), "{}", err);
    }

    #[test]
    fn validate_rejects_empty_command() {
        let mut cfg = Config::default();
        cfg.decompressor.command = "  ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("decompressor command must not be empty"));
    }

    #[test]
    fn local_path_skips_url_check() {
        let mut cfg = Config::default();
        cfg.source.url = "not a url".to_string();
        assert!(cfg.validate().is_err());

        cfg.source.path = Some(PathBuf::from("dump.json.bz2"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn commented_toml_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, Config::default().to_commented_toml().unwrap()).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.taxonomy.country_root, "Q6256");
        assert_eq!(loaded.source.url, DEFAULT_DUMP_URL);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
