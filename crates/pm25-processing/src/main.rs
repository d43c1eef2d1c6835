//! CLI entry point for the PM2.5 cleaning pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use pm25_processing::{
    CleaningReport, DataLoader, Grouping, Pipeline, PipelineConfig, PipelineResult,
    QualityAnalyzer,
};
use std::env;
use std::path::Path;
use tracing::{error, info, warn};

/// Environment variable consulted when no `--input` is given.
const SOURCE_ENV_VAR: &str = "PM25_SOURCE_URL";

/// CLI-compatible grouping enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliGrouping {
    /// One group per country series
    Country,
    /// One group per year
    Year,
    /// A single group over all records
    Global,
}

impl From<CliGrouping> for Grouping {
    fn from(cli: CliGrouping) -> Self {
        match cli {
            CliGrouping::Country => Grouping::Country,
            CliGrouping::Year => Grouping::Year,
            CliGrouping::Global => Grouping::Global,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "PM2.5 Data Cleaning Pipeline",
    long_about = "Cleans urban PM2.5 tables: interpolates gaps, flags outliers and builds summaries.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  PM25_SOURCE_URL    Source path or URL used when --input is omitted\n\n\
                  EXAMPLES:\n  \
                  # Clean a local WHO export\n  \
                  pm25-processing -i data/raw/WHO_PM25_urban_2022.csv\n\n  \
                  # Group by year and write a JSON report\n  \
                  pm25-processing -i data.csv --group-by year -r\n\n  \
                  # Preview groups and missing values without writing anything\n  \
                  pm25-processing -i data.csv --dry-run"
)]
struct Args {
    /// Path or http(s) URL of the CSV/JSON source
    ///
    /// Falls back to the PM25_SOURCE_URL environment variable (a .env file
    /// is read first)
    #[arg(short, long)]
    input: Option<String>,

    /// Processing directory for stage artifacts
    #[arg(short, long, default_value = "data/processed")]
    output: String,

    /// Artifact base name (without extension)
    ///
    /// If not specified, uses the input file stem
    #[arg(long)]
    output_name: Option<String>,

    /// JSON file holding a full pipeline configuration
    ///
    /// Flags given on the command line override values from the file
    #[arg(long)]
    config: Option<String>,

    /// Grouping used for outlier detection and summaries
    #[arg(long, value_enum)]
    group_by: Option<CliGrouping>,

    /// IQR fence multiplier
    #[arg(long)]
    iqr_multiplier: Option<f64>,

    /// Absolute Z-score above which a value is flagged
    #[arg(long)]
    zscore_threshold: Option<f64>,

    /// Multiple of the residual standard deviation above which a value is flagged
    #[arg(long)]
    residual_multiplier: Option<f64>,

    /// Smallest group for Z-score and residual detection (at least 3)
    #[arg(long)]
    min_group_size: Option<usize>,

    /// Let interpolated values take part in outlier detection
    #[arg(long)]
    evaluate_imputed: bool,

    /// Keep only records from this year on
    #[arg(long)]
    year_from: Option<i32>,

    /// Keep only records up to this year
    #[arg(long)]
    year_to: Option<i32>,

    /// Keep only these regions (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Keep only these settlement types (repeatable)
    #[arg(long = "settlement")]
    settlements: Vec<String>,

    /// Preview groups and missing values without processing
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    /// Useful for piping to other tools: `... --json | jq .metrics`
    #[arg(long)]
    json: bool,

    /// Write the JSON report to the output directory
    ///
    /// The report will be saved as <output_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let input = resolve_input(&args)?;
    let config = build_config(&args, &input)?;

    if args.dry_run {
        return run_dry_run(&input, &config);
    }

    let pipeline = build_pipeline(&args, config)?;
    run_pipeline(&pipeline, &args, &input)
}

/// `--input`, or the source named by the environment.
fn resolve_input(args: &Args) -> Result<String> {
    if let Some(ref input) = args.input {
        return Ok(input.clone());
    }
    match env::var(SOURCE_ENV_VAR) {
        Ok(source) if !source.trim().is_empty() => {
            info!("Using source from {}", SOURCE_ENV_VAR);
            Ok(source.trim().to_string())
        }
        _ => Err(anyhow!(
            "No input given: pass --input or set {}",
            SOURCE_ENV_VAR
        )),
    }
}

/// Start from `--config` (or defaults) and apply command-line overrides.
fn build_config(args: &Args, input: &str) -> Result<PipelineConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Reading config file {}", path))?;
            serde_json::from_str::<PipelineConfig>(&content)
                .with_context(|| format!("Parsing config file {}", path))?
        }
        None => PipelineConfig {
            output_dir: args.output.clone().into(),
            ..Default::default()
        },
    };

    if args.config.is_some() && args.output != "data/processed" {
        config.output_dir = args.output.clone().into();
    }
    if let Some(grouping) = args.group_by {
        config.group_by = grouping.into();
    }
    if let Some(k) = args.iqr_multiplier {
        config.iqr_multiplier = k;
    }
    if let Some(threshold) = args.zscore_threshold {
        config.zscore_threshold = threshold;
    }
    if let Some(k) = args.residual_multiplier {
        config.residual_multiplier = k;
    }
    if let Some(n) = args.min_group_size {
        config.min_group_size = n;
    }
    if args.evaluate_imputed {
        config.evaluate_imputed = true;
    }
    if args.year_from.is_some() {
        config.filter.year_from = args.year_from;
    }
    if args.year_to.is_some() {
        config.filter.year_to = args.year_to;
    }
    if !args.regions.is_empty() {
        config.filter.regions = args.regions.clone();
    }
    if !args.settlements.is_empty() {
        config.filter.settlements = args.settlements.clone();
    }
    if args.emit_report {
        config.generate_report = true;
    }
    if let Some(ref name) = args.output_name {
        config.output_name = Some(name.clone());
    } else if config.output_name.is_none() {
        config.output_name = Some(extract_file_stem(input));
    }

    config.validate()?;
    Ok(config)
}

/// Run dry-run mode - show what would happen without processing
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
/// Unlike logging (`info!`, `debug!`), this output should always be visible
/// regardless of log level settings since it's the primary purpose of --dry-run.
fn run_dry_run(input: &str, config: &PipelineConfig) -> Result<()> {
    let loaded = DataLoader::load(input)?;
    let mut dataset = loaded.dataset.clone();
    let removed = config.filter.apply(&mut dataset);

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning actions");
    println!("{}\n", "=".repeat(80));

    // 1. Source overview
    println!("SOURCE OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  Source: {}", input);
    println!("  Format: {:?}", loaded.report.format);
    println!("  Rows: {}", loaded.report.rows_read);
    println!("  Columns: {}", loaded.report.columns.len());
    if let Some((first, last)) = dataset.year_range() {
        println!("  Years: {} - {}", first, last);
    }
    println!();

    // 2. Column mapping
    println!("COLUMN MAPPING");
    println!("{}", "-".repeat(40));
    let schema = &loaded.report.schema;
    println!("  country          <- {}", schema.country);
    println!("  year             <- {}", schema.year);
    println!("  urban_population <- {}", schema.urban_population);
    println!("  pm25             <- {}", schema.pm25);
    println!(
        "  region           <- {}",
        schema.region.as_deref().unwrap_or("(absent)")
    );
    println!(
        "  settlement       <- {}",
        schema.settlement.as_deref().unwrap_or("(absent)")
    );
    println!();

    // 3. Missing values
    println!("MISSING VALUES");
    println!("{}", "-".repeat(40));
    println!("{:<30} {:<10} {:<10}", "Column", "Missing", "Missing %");
    println!("{}", "-".repeat(52));
    for column in QualityAnalyzer::missing_by_column(&loaded.table) {
        println!(
            "{:<30} {:<10} {:<10.1}",
            truncate_str(&column.column, 29),
            column.missing,
            column.percentage
        );
    }
    println!();

    // 4. Cleaning preview
    println!("CLEANING PREVIEW");
    println!("{}", "-".repeat(40));
    if removed > 0 {
        println!("  Will filter out {} records", removed);
    }
    if loaded.report.duplicate_keys_dropped > 0 {
        println!(
            "  Will drop {} rows with a repeated (series, year) key",
            loaded.report.duplicate_keys_dropped
        );
    }
    if loaded.report.negative_pm25 > 0 {
        println!(
            "  Will treat {} negative pm25 readings as missing",
            loaded.report.negative_pm25
        );
    }
    println!(
        "  Will interpolate up to {} missing pm25 values",
        dataset.missing_pm25_count()
    );
    println!();

    // 5. Detection groups
    println!("DETECTION GROUPS ({})", config.group_by.as_str());
    println!("{}", "-".repeat(40));
    let groups = dataset.group_indices(config.group_by);
    let small: Vec<&String> = groups
        .iter()
        .filter(|(_, indices)| indices.len() < config.min_group_size)
        .map(|(group, _)| group)
        .collect();
    println!("  Groups: {}", groups.len());
    if small.is_empty() {
        println!(
            "  Every group has at least {} records",
            config.min_group_size
        );
    } else {
        println!(
            "  {} groups below {} records (IQR only): {:?}",
            small.len(),
            config.min_group_size,
            small.iter().take(10).collect::<Vec<_>>()
        );
    }
    println!(
        "  Thresholds: iqr k={}, |z|>{}, residual {}σ",
        config.iqr_multiplier, config.zscore_threshold, config.residual_multiplier
    );
    println!();

    println!("{}", "=".repeat(80));
    println!("Run without --dry-run to process the data.");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Run pipeline and print results
fn run_pipeline(pipeline: &Pipeline, args: &Args, input: &str) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting PM2.5 cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let result = match pipeline.run(input) {
        Ok(result) => result,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(anyhow!("Pipeline failed [{}]: {}", e.error_code(), e));
        }
    };

    if args.json {
        let report = CleaningReport::new(pipeline.config(), &result);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for annotation in result.dataset.annotations.iter().take(5) {
        warn!("[{}] {}", annotation.code, annotation.message);
    }

    print_human_readable_summary(&result);
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pm25")
        .to_string()
}

/// Print a human-readable summary of the run.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(result: &PipelineResult) {
    let summary = &result.summary;
    let metrics = &result.metrics;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input: {} ({} rows x {} columns)",
        result.load.source,
        result.load.rows_read,
        result.load.columns.len()
    );
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Records: {} loaded, {} after filtering",
        summary.rows_loaded, summary.rows_after_filter
    );
    println!(
        "  Missing PM2.5: {} ({} interpolated, {} unresolved)",
        summary.missing_pm25, summary.interpolated, summary.unresolved
    );
    println!(
        "  Outliers: {} iqr, {} zscore, {} residual across {} groups",
        summary.iqr_outliers, summary.zscore_outliers, summary.residual_outliers, summary.groups
    );
    println!("  Annotations: {}", summary.annotations);
    println!();

    println!("Headline Metrics:");
    println!("  Samples: {}", metrics.total_samples);
    println!("  Countries: {}", metrics.countries);
    if let (Some(first), Some(last)) = (metrics.first_year, metrics.last_year) {
        println!("  Years: {} - {}", first, last);
    }
    if let Some(avg) = metrics.average_pm25 {
        println!("  Average PM2.5: {:.2}", avg);
    }
    if let (Some(min), Some(max)) = (metrics.min_pm25, metrics.max_pm25) {
        println!("  Range: {:.2} - {:.2}", min, max);
    }
    println!();

    if !result.processing_steps.is_empty() {
        println!("Actions Taken:");
        for step in result.processing_steps.iter().take(8) {
            println!("  - {}", step);
        }
        if result.processing_steps.len() > 8 {
            println!("  ... and {} more", result.processing_steps.len() - 8);
        }
        println!();
    }

    if !result.artifacts.is_empty() {
        println!("Artifacts:");
        for path in &result.artifacts {
            println!("  {}", path.display());
        }
        println!();
    }

    println!("{}", "=".repeat(80));
}
