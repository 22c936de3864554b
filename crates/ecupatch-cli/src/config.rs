//! Configuration file handling for ecupatch

use anyhow::{Context, Result};
use clap::ValueEnum;
use ecupatch_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// YAML file with region, stage and marker tables
    pub tables: Option<PathBuf>,
    /// Directory for backups of source images
    pub backup_dir: Option<PathBuf>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ecupatch");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        tables: Option<&Path>,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> Result<MergedConfig> {
        let output = match (output, &self.output) {
            (Some(format), _) => format,
            (None, Some(name)) => OutputFormat::from_str(name, true)
                .map_err(|e| anyhow::anyhow!("Invalid output format in config: {}", e))?,
            (None, None) => OutputFormat::default(),
        };

        Ok(MergedConfig {
            tables: tables.map(Path::to_path_buf).or_else(|| self.tables.clone()),
            backup_dir: self.backup_dir.clone(),
            output,
            no_color: no_color || self.no_color.unwrap_or(false),
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub tables: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub output: OutputFormat,
    pub no_color: bool,
}

impl MergedConfig {
    /// Build the engine configuration, falling back to the built-in tables
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match &self.tables {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read tables file: {}", path.display()))?;
                EngineConfig::from_yaml(&yaml)
                    .with_context(|| format!("Failed to load tables file: {}", path.display()))
            }
            None => Ok(EngineConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_load_and_merge() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "tables = \"/etc/ecupatch/tables.yaml\"\nbackup_dir = \"/var/backups\"\noutput = \"json\""
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        let merged = config.merge_with_args(None, None, false).unwrap();
        assert_eq!(merged.output, OutputFormat::Json);
        assert_eq!(
            merged.tables.as_deref(),
            Some(Path::new("/etc/ecupatch/tables.yaml"))
        );
        assert_eq!(merged.backup_dir.as_deref(), Some(Path::new("/var/backups")));

        // CLI arguments win
        let merged = config
            .merge_with_args(Some(Path::new("local.yaml")), Some(OutputFormat::Table), true)
            .unwrap();
        assert_eq!(merged.output, OutputFormat::Table);
        assert_eq!(merged.tables.as_deref(), Some(Path::new("local.yaml")));
        assert!(merged.no_color);
    }

    #[test]
    fn test_invalid_output_in_config() {
        let config = Config {
            output: Some("xml".to_string()),
            ..Config::default()
        };
        assert!(config.merge_with_args(None, None, false).is_err());
    }

    #[test]
    fn test_engine_config_from_tables_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "regions:\n  boost_map:\n    start: \"0x10\"\n    length: 8").unwrap();

        let merged = Config::default()
            .merge_with_args(Some(file.path()), None, false)
            .unwrap();
        let engine = merged.engine_config().unwrap();
        assert_eq!(engine.regions.len(), 1);

        let defaults = Config::default()
            .merge_with_args(None, None, false)
            .unwrap()
            .engine_config()
            .unwrap();
        assert_eq!(defaults, EngineConfig::default());
    }
}
