//! Whalewatch - governance whale decisiveness analyzer
//!
//! A CLI tool that removes the votes of large token holders from DAO
//! proposals, recomputes the tallies and reports which outcomes change.
//!
//! Exit codes:
//!   0 - Success (no organization at or above --fail-on-change, or flag unset)
//!   1 - Runtime error (unreadable dataset, bad config, etc.)
//!   2 - An organization's changed-outcome share reached --fail-on-change

mod analysis;
mod cache;
mod cli;
mod config;
mod error;
mod models;
mod report;

use analysis::{proposal_totals, run_all, Driver, OrganizationJob};
use anyhow::{bail, Context, Result};
use cache::AdjustedCache;
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Dataset, OrganizationFailure, Report, ReportMetadata};
use report::{generate_json_report, generate_markdown_report};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Whalewatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .whalewatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the whale quantile, blacklist, cache and report.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let driver = Driver::new(config.analysis.whale_quantile)
        .context("Invalid whale quantile in configuration")?;

    // Step 1: Load the dataset
    let input = args
        .input
        .clone()
        .context("No input dataset given (use --input)")?;
    println!("📥 Loading dataset: {}", input.display());
    let dataset = load_dataset(&input)?;

    let total = dataset.organizations.len();
    let organizations: Vec<_> = dataset
        .organizations
        .into_iter()
        .filter(|o| {
            let keep = config.includes_organization(&o.name);
            if !keep {
                debug!("Excluding organization {}", o.name);
            }
            keep
        })
        .collect();

    if organizations.is_empty() {
        match config.analysis.organization {
            Some(ref name) => bail!("Organization '{}' not found in dataset", name),
            None => bail!("No organizations left to analyze"),
        }
    }
    info!(
        "Analyzing {} of {} organizations",
        organizations.len(),
        total
    );

    // Step 2: Attach cached adjusted proposals when requested
    let cache_path = config.cache_path();
    let cached = match cache_path {
        Some(ref path) if args.from_cache => {
            let cache = AdjustedCache::load(path)?;
            if cache.is_empty() {
                warn!("Cache {} is empty, recomputing everything", path.display());
            }
            Some(cache)
        }
        _ => None,
    };

    let jobs: Vec<OrganizationJob> = organizations
        .into_iter()
        .map(|organization| {
            let entries = cached.as_ref().and_then(|c| c.organization(&organization.name));
            if cached.is_some() && entries.is_none() {
                warn!(
                    "No cached proposals for {}, recomputing",
                    organization.name
                );
            }
            OrganizationJob {
                organization,
                cached: entries,
            }
        })
        .collect();

    // Step 3: Run the analysis
    println!("🐋 Finding whales at the {} quantile...", driver.quantile());
    println!("   Organizations: {}", jobs.len());
    println!("   Concurrency: {}", config.general.concurrency);

    let progress = make_progress_bar(jobs.len() as u64, args.quiet);
    let outcomes = run_all(
        Arc::new(driver),
        jobs,
        config.general.concurrency,
        progress,
    )
    .await?;

    let mut organizations = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(report) => organizations.push(report),
            Err(e) => {
                error!("{}: analysis rejected: {}", outcome.organization, e);
                failures.push(OrganizationFailure {
                    organization: outcome.organization,
                    error: e.to_string(),
                });
            }
        }
    }

    // Step 4: Update the cache
    if let Some(ref path) = cache_path {
        let mut cache = match cached {
            Some(cache) => cache,
            None => AdjustedCache::load(path)?,
        };
        cache.extend(
            organizations
                .iter()
                .flat_map(|o| o.filtered.iter().cloned()),
        );
        cache.save(path)?;
        info!("Cached {} adjusted proposals at {}", cache.len(), path.display());
    }

    // Step 5: Build the report
    println!("\n📝 Generating report...");

    let (proposals_compared, proposals_skipped) = proposal_totals(&organizations);
    let duration = start_time.elapsed().as_secs_f64();

    let report = Report {
        metadata: ReportMetadata {
            input: input.display().to_string(),
            analysis_date: Utc::now(),
            whale_quantile: config.analysis.whale_quantile,
            organizations_analyzed: organizations.len(),
            organizations_failed: failures.len(),
            proposals_compared,
            proposals_skipped,
            duration_seconds: duration,
        },
        organizations,
        failures,
    };

    let output = match config.report.format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Markdown => generate_markdown_report(&report, &config.report),
    };

    let output_path = config.output_path();
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!("   Organizations: {}", report.organizations.len());
    if !report.failures.is_empty() {
        println!("   Rejected organizations: {}", report.failures.len());
    }
    println!(
        "   Proposals compared: {} | skipped: {}",
        proposals_compared, proposals_skipped
    );
    for organization in &report.organizations {
        let s = &organization.summary;
        println!(
            "   - {}: {:.2}% changed outcomes, {} of {} voters are whales",
            s.organization_name,
            s.changed_outcome_proportion * 100.0,
            s.whale_count_delta,
            s.total_voters
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    // Check --fail-on-change threshold
    if let Some(threshold) = args.fail_on_change {
        let over: Vec<_> = report
            .organizations
            .iter()
            .filter(|o| {
                o.summary.proposals_compared > 0
                    && o.summary.changed_outcome_proportion >= threshold
            })
            .map(|o| o.summary.organization_name.as_str())
            .collect();

        if !over.is_empty() {
            eprintln!(
                "\n⛔ Whales decide at least {:.2}% of outcomes in: {}. Failing (exit code 2).",
                threshold * 100.0,
                over.join(", ")
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Read and parse the normalized dataset.
fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    let dataset: Dataset = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;

    debug!(
        "Loaded {} organizations with {} proposals",
        dataset.organizations.len(),
        dataset
            .organizations
            .iter()
            .map(|o| o.proposals.len())
            .sum::<usize>()
    );

    Ok(dataset)
}

/// Progress bar over organizations; hidden in quiet mode.
fn make_progress_bar(len: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} organizations")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
