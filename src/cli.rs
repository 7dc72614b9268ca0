//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whalewatch - how much do whales decide DAO votes?
///
/// Finds the voters at or above a voting-power quantile on every proposal,
/// recomputes the tally without them and reports which outcomes flip.
///
/// Examples:
///   whalewatch --input dataset.json
///   whalewatch --input dataset.json --quantile 0.9 --format json -o report.json
///   whalewatch --input dataset.json --organization Uniswap --only-changed
///   whalewatch --input dataset.json --cache adjusted.json --from-cache
///   whalewatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Normalized proposal dataset (JSON)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Voting-power quantile at and above which voters are whales
    ///
    /// Must lie strictly between 0 and 1. Default: from config or 0.95.
    #[arg(short = 'Q', long, value_name = "Q", env = "WHALEWATCH_QUANTILE")]
    pub quantile: Option<f64>,

    /// Only analyze this organization
    #[arg(short = 'd', long, value_name = "NAME")]
    pub organization: Option<String>,

    /// Organizations to exclude (comma-separated)
    ///
    /// Example: --blacklist "Uniswap,Lido"
    #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
    pub blacklist: Option<Vec<String>>,

    /// Number of organizations analyzed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .whalewatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache file for whale-adjusted proposals
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Compare using cached adjusted proposals instead of recomputing them
    #[arg(long)]
    pub from_cache: bool,

    /// Only list proposals whose outcome changed in the report
    #[arg(long)]
    pub only_changed: bool,

    /// Fail if any organization's changed-outcome share reaches this value
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is reached.
    #[arg(long, value_name = "SHARE")]
    pub fail_on_change: Option<f64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .whalewatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(q) = self.quantile {
            if !(q > 0.0 && q < 1.0) {
                return Err(format!("Quantile must be between 0 and 1 (exclusive), got {}", q));
            }
        }

        if let Some(share) = self.fail_on_change {
            if !(0.0..=1.0).contains(&share) {
                return Err("--fail-on-change must be between 0.0 and 1.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.from_cache && self.cache.is_none() {
            return Err("--from-cache requires --cache".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args() -> Args {
        Args {
            input: None,
            output: None,
            format: None,
            quantile: None,
            organization: None,
            blacklist: None,
            concurrency: None,
            config: None,
            cache: None,
            from_cache: false,
            only_changed: false,
            fail_on_change: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "whalewatch",
            "--input",
            "data.json",
            "--quantile",
            "0.9",
            "--blacklist",
            "Uniswap,Lido",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.quantile, Some(0.9));
        assert_eq!(
            args.blacklist,
            Some(vec!["Uniswap".to_string(), "Lido".to_string()])
        );
        assert_eq!(args.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_input_required_unless_init_config() {
        assert!(Args::try_parse_from(["whalewatch"]).is_err());
        assert!(Args::try_parse_from(["whalewatch", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_quantile_bounds() {
        let mut args = make_args();
        for q in [0.0, 1.0, 1.2] {
            args.quantile = Some(q);
            assert!(args.validate().is_err());
        }
        args.quantile = Some(0.5);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());

        let file = NamedTempFile::new().unwrap();
        args.input = Some(file.path().to_path_buf());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.from_cache = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
