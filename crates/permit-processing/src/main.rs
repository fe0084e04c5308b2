//! CLI entry point for the permit cleaning pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args as ClapArgs, Parser, Subcommand};
use dotenv::dotenv;
use permit_processing::config::ConfigValidationError;
use permit_processing::{
    DataProfiler, DatasetLoader, DatasetProfile, Pipeline, PipelineConfig, PipelineResult,
    ReportGenerator, RunReport, schema,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Building permit profiling and cleaning",
    long_about = "Profiles and cleans a building-permit CSV export.\n\n\
                  EXAMPLES:\n  \
                  # Column profile\n  \
                  permit-processing profile -i Building_Permits.csv\n\n  \
                  # Clean with defaults\n  \
                  permit-processing clean -i Building_Permits.csv -o out/cleaned.csv\n\n  \
                  # Preview without writing\n  \
                  permit-processing clean -i Building_Permits.csv -o out/cleaned.csv --dry-run\n\n  \
                  # Parquet output plus a JSON report\n  \
                  permit-processing clean -i Building_Permits.csv -o out/cleaned.parquet --emit-report"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the per-column profile of a permits file
    Profile {
        /// Path to the CSV or Parquet file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the profile as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Clean a permits file and write the result
    Clean(CleanArgs),
}

#[derive(ClapArgs, Debug)]
struct CleanArgs {
    /// Path to the CSV or Parquet file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; `.parquet` writes Parquet, anything else CSV
    #[arg(short, long)]
    output: PathBuf,

    /// JSON pipeline configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drop columns with a missing fraction above this (0.0 - 1.0)
    #[arg(long)]
    drop_threshold: Option<f64>,

    /// IQR fence multiplier for outlier removal
    #[arg(long)]
    iqr_multiplier: Option<f64>,

    /// Neighbours used by KNN imputation
    #[arg(long)]
    knn_neighbors: Option<usize>,

    /// Fill value for missing categorical cells
    #[arg(long)]
    sentinel: Option<String>,

    /// Column to filter for outliers (repeatable, replaces the defaults)
    #[arg(long = "outlier-column")]
    outlier_columns: Vec<String>,

    /// Column to parse as a date (repeatable, replaces the defaults)
    #[arg(long = "date-column")]
    date_columns: Vec<String>,

    /// Skip the processing-time column
    #[arg(long)]
    no_derive: bool,

    /// Show the profile and planned actions without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON to stdout (disables logging)
    #[arg(long)]
    json: bool,

    /// Write <output>_report.json next to the output file
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber. JSON output keeps stdout clean, so no
/// subscriber is installed in that case.
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
    let cli = Cli::parse();

    let json = match &cli.command {
        Command::Profile { json, .. } => *json,
        Command::Clean(args) => args.json,
    };
    init_logging(&cli.log_level, cli.quiet, json);

    dotenv().ok();

    match cli.command {
        Command::Profile { input, json } => run_profile(&input, json),
        Command::Clean(args) => run_clean(&args, cli.quiet),
    }
}

fn run_profile(input: &Path, json: bool) -> Result<()> {
    let loaded = DatasetLoader::default()
        .load_dataset(input)
        .with_context(|| format!("Loading {}", input.display()))?;
    let profile = DataProfiler::default().profile_dataset(&loaded.df)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("PROFILE - {}", input.display());
    println!("{}\n", "=".repeat(80));
    print_profile(&profile);

    if !loaded.warnings.is_empty() {
        println!("TYPE WARNINGS");
        println!("{}", "-".repeat(40));
        for warning in &loaded.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }
    Ok(())
}

/// Config file first, then flag overrides.
fn build_config(args: &CleanArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let cleaning = &mut config.cleaning;
    if let Some(t) = args.drop_threshold {
        cleaning.drop_threshold = t;
    }
    if let Some(k) = args.iqr_multiplier {
        cleaning.iqr_multiplier = k;
    }
    if let Some(n) = args.knn_neighbors {
        cleaning.knn_neighbors = n;
    }
    if let Some(s) = &args.sentinel {
        cleaning.categorical_sentinel = s.clone();
    }
    if !args.outlier_columns.is_empty() {
        cleaning.outlier_columns = args.outlier_columns.clone();
    }
    if !args.date_columns.is_empty() {
        cleaning.date_columns = args.date_columns.clone();
    }
    if args.no_derive {
        config.processing_time = None;
    }
    if args.emit_report {
        config.emit_report = true;
    }

    config
        .validate()
        .map_err(|e: ConfigValidationError| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn run_clean(args: &CleanArgs, quiet: bool) -> Result<()> {
    let config = build_config(args)?;

    if args.dry_run {
        return run_dry_run(args, &config);
    }

    let mut builder = Pipeline::builder().config(config);
    if !quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    info!("{}", "=".repeat(80));
    info!("Starting permit cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run(&args.input, Some(args.output.as_path())).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed [{}]: {}", e.error_code(), e)
    })?;

    let report = ReportGenerator::build(&args.input, Some(args.output.as_path()), &result);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report, &result, args);
    Ok(())
}

/// Profile plus a preview of what cleaning would do. Prints with `println!`
/// so it shows regardless of log level.
fn run_dry_run(args: &CleanArgs, config: &PipelineConfig) -> Result<()> {
    let loaded = DatasetLoader::new(config.load.clone())
        .load_dataset(&args.input)
        .with_context(|| format!("Loading {}", args.input.display()))?;
    let df = &loaded.df;
    let profile = DataProfiler::from_config(&config.cleaning).profile_dataset(df)?;
    let cleaning = &config.cleaning;

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning actions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input.display());
    println!("  Rows: {}", df.height());
    println!("  Columns: {}", df.width());
    println!();

    print_profile(&profile);

    println!("CLEANING PREVIEW");
    println!("{}", "-".repeat(40));

    let dates: Vec<&String> = cleaning
        .date_columns
        .iter()
        .filter(|c| df.column(c).is_ok())
        .collect();
    println!("  Parse as dates: {:?}", dates);

    let sparse: Vec<&str> = profile
        .columns_above_missing(cleaning.drop_threshold)
        .into_iter()
        .filter(|name| {
            let kept = cleaning.keep_columns.iter().any(|k| k.as_str() == *name);
            let date = cleaning.date_columns.iter().any(|d| d.as_str() == *name);
            !kept || date
        })
        .collect();
    if sparse.is_empty() {
        println!(
            "  No columns exceed {:.0}% missing",
            cleaning.drop_threshold * 100.0
        );
    } else {
        println!(
            "  Will drop columns with >{:.0}% missing: {:?}",
            cleaning.drop_threshold * 100.0,
            sparse
        );
    }

    let outliers: Vec<&String> = cleaning
        .outlier_columns
        .iter()
        .filter(|c| df.column(c).is_ok())
        .collect();
    println!(
        "  Remove rows outside {}x IQR of: {:?}",
        cleaning.iqr_multiplier, outliers
    );

    if cleaning.remove_duplicates && profile.duplicate_count > 0 {
        println!("  Will remove {} duplicate rows", profile.duplicate_count);
    } else {
        println!("  Duplicate rows found: {}", profile.duplicate_count);
    }

    match &config.processing_time {
        Some(spec) => println!(
            "  Derive '{}' = '{}' - '{}'",
            spec.name, spec.end, spec.start
        ),
        None => println!("  Feature derivation disabled"),
    }
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}", args.output.display());
    if config.emit_report {
        println!(
            "  - {}",
            ReportGenerator::report_path_for(&args.output).display()
        );
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute, run without --dry-run");
    println!("{}", "=".repeat(80));
    Ok(())
}

fn print_profile(profile: &DatasetProfile) {
    println!("COLUMN PROFILES");
    println!("{}", "-".repeat(40));
    println!(
        "{:<36} {:<12} {:<12} {:<10} {:<10}",
        "Column", "Dtype", "Kind", "Missing %", "Distinct"
    );
    println!("{}", "-".repeat(84));

    for col in &profile.column_profiles {
        println!(
            "{:<36} {:<12} {:<12} {:<10.1} {:<10}",
            truncate_str(&col.name, 35),
            truncate_str(&col.dtype, 11),
            col.semantic_type.as_str(),
            col.missing_percentage(),
            col.distinct_count
        );
    }
    println!();

    println!(
        "  Duplicate rows: {} ({:.1}%)",
        profile.duplicate_count, profile.duplicate_percentage
    );
    for key in &profile.key_duplicates {
        println!(
            "  Duplicate '{}' values: {} ({:.1}%)",
            key.column, key.duplicate_rows, key.duplicate_percentage
        );
    }
    let unknown: Vec<&str> = profile
        .column_profiles
        .iter()
        .filter(|c| schema::lookup(&c.name).is_none())
        .map(|c| c.name.as_str())
        .collect();
    if !unknown.is_empty() {
        println!("  Columns outside the permit schema: {:?}", unknown);
    }
    println!();
}

/// Truncate a string to `max_len` characters with an ellipsis.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn print_human_readable_summary(report: &RunReport, result: &PipelineResult, args: &CleanArgs) {
    let summary = &report.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        report.input_file, summary.rows_before, summary.columns_before
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        args.output.display(),
        summary.rows_after,
        summary.columns_after
    );
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed as outliers, {} duplicates)",
        summary.rows_before,
        summary.rows_after,
        report.cleaning.outlier_rows_removed,
        report.cleaning.duplicates_removed
    );
    println!(
        "  Columns: {} -> {} ({} dropped)",
        summary.columns_before,
        summary.columns_after,
        report.cleaning.dropped_columns.len()
    );
    println!(
        "  Completeness: {:.1}% -> {:.1}%",
        summary.completeness_before * 100.0,
        summary.completeness_after * 100.0
    );
    if let Some(features) = &result.features
        && features.skipped_reason.is_none()
    {
        println!(
            "  {}: {} derived, {} missing, {} negative",
            features.column, features.derived, features.missing, features.negative
        );
    }
    println!();

    if !report.cleaning.actions.is_empty() {
        println!("Actions Taken:");
        for action in report.cleaning.actions.iter().take(10) {
            println!(
                "  - [{}] {}: {}",
                action.action_type.display_name(),
                action.target,
                action.description
            );
        }
        if report.cleaning.actions.len() > 10 {
            println!("  ... and {} more actions", report.cleaning.actions.len() - 10);
        }
        println!();
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }

    if args.emit_report {
        println!(
            "Report: {}",
            ReportGenerator::report_path_for(&args.output).display()
        );
    } else {
        println!("Use --emit-report to save a detailed JSON report");
    }
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
