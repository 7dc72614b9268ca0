//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.whalewatch.toml` files.

use crate::analysis::DEFAULT_WHALE_QUANTILE;
use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".whalewatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Whale analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Adjusted-results cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of organizations analyzed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "whalewatch_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Whale analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Quantile of voting power at and above which voters are whales.
    #[serde(default = "default_quantile")]
    pub whale_quantile: f64,

    /// Organizations to leave out.
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Analyze only this organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            whale_quantile: default_quantile(),
            blacklist: Vec::new(),
            organization: None,
        }
    }
}

fn default_quantile() -> f64 {
    DEFAULT_WHALE_QUANTILE
}

/// Adjusted-results cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Write adjusted proposals to the cache after each run.
    #[serde(default)]
    pub enabled: bool,

    /// Cache file path.
    #[serde(default = "default_cache_path")]
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> String {
    "whalewatch_cache.json".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Maximum proposal rows per organization in Markdown reports.
    #[serde(default = "default_max_proposals")]
    pub max_proposals_per_organization: usize,

    /// List only proposals whose outcome changed.
    #[serde(default)]
    pub only_changed: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            max_proposals_per_organization: default_max_proposals(),
            only_changed: false,
        }
    }
}

fn default_max_proposals() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(quantile) = args.quantile {
            self.analysis.whale_quantile = quantile;
        }
        if let Some(ref blacklist) = args.blacklist {
            self.analysis.blacklist = blacklist.clone();
        }
        if let Some(ref organization) = args.organization {
            self.analysis.organization = Some(organization.clone());
        }

        // Naming a cache file on the CLI turns caching on
        if let Some(ref cache) = args.cache {
            self.cache.path = cache.display().to_string();
            self.cache.enabled = true;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.only_changed {
            self.report.only_changed = true;
        }
    }

    /// Output path as a `PathBuf`.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.general.output)
    }

    /// Cache path when caching is enabled.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache
            .enabled
            .then(|| PathBuf::from(&self.cache.path))
    }

    /// Whether `organization` should be analyzed under this configuration.
    pub fn includes_organization(&self, organization: &str) -> bool {
        if self.analysis.blacklist.iter().any(|b| b == organization) {
            return false;
        }
        match self.analysis.organization {
            Some(ref only) => only == organization,
            None => true,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.whale_quantile, 0.95);
        assert_eq!(config.general.concurrency, 4);
        assert!(!config.cache.enabled);
        assert_eq!(config.report.format, OutputFormat::Markdown);
        assert!(config.cache_path().is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.json"
verbose = true

[analysis]
whale_quantile = 0.9
blacklist = ["Hop"]

[cache]
enabled = true

[report]
format = "json"
only_changed = true
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.json");
        assert!(config.general.verbose);
        assert_eq!(config.analysis.whale_quantile, 0.9);
        assert_eq!(config.analysis.blacklist, vec!["Hop"]);
        assert_eq!(
            config.cache_path(),
            Some(PathBuf::from("whalewatch_cache.json"))
        );
        assert_eq!(config.report.format, OutputFormat::Json);
        assert!(config.report.only_changed);
        assert_eq!(config.report.max_proposals_per_organization, 20);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.analysis.blacklist = vec!["Hop".to_string()];

        let args = Args::try_parse_from([
            "whalewatch",
            "--input",
            "data.json",
            "--quantile",
            "0.8",
            "--cache",
            "adjusted.json",
            "--organization",
            "Uniswap",
        ])
        .unwrap();
        config.merge_with_args(&args);

        assert_eq!(config.analysis.whale_quantile, 0.8);
        assert_eq!(config.cache_path(), Some(PathBuf::from("adjusted.json")));
        assert_eq!(config.analysis.blacklist, vec!["Hop"]);
        assert!(config.includes_organization("Uniswap"));
        assert!(!config.includes_organization("Lido"));
    }

    #[test]
    fn test_blacklist_excludes() {
        let mut config = Config::default();
        config.analysis.blacklist = vec!["Hop".to_string()];
        assert!(!config.includes_organization("Hop"));
        assert!(config.includes_organization("ENS"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[analysis]\nwhale_quantile = 0.75\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.analysis.whale_quantile, 0.75);
        assert_eq!(config.general.output, "whalewatch_report.md");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("whale_quantile = 0.95"));
    }
}
