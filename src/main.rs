use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use covdelta::config::{Config, CONFIG_FILE};
use covdelta::coverage::{
    detect_format, parse_coverage_file, parse_format_hint, CoverageFormat, MetricKind,
    NormalizedCoverage,
};
use covdelta::git;
use covdelta::report::{CommitIds, CoverageReport};

#[derive(Parser)]
#[command(name = "covdelta")]
#[command(about = "Normalize coverage reports and compare them against a baseline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: covdelta.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected format of a coverage file
    Detect {
        /// Coverage file (path or glob pattern)
        file: String,
    },

    /// Parse a coverage file and print the normalized JSON
    Parse {
        /// Coverage file (path or glob pattern)
        file: String,

        /// lcov, istanbul, cobertura, clover, jacoco or auto
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Compare current coverage against a baseline and write a report
    Compare {
        /// Current coverage file (path or glob pattern)
        #[arg(long)]
        current: String,

        /// Baseline coverage file (path or glob pattern)
        #[arg(long)]
        baseline: Option<String>,

        /// lcov, istanbul, cobertura, clover, jacoco or auto
        #[arg(short, long)]
        format: Option<String>,

        /// Percentage points a metric may drop before it is regressed
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Output path for the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Git revision the baseline was produced from
        #[arg(long)]
        baseline_ref: Option<String>,

        /// Commit id of the current run (default: HEAD)
        #[arg(long)]
        current_commit: Option<String>,

        /// Exit 0 even when coverage regressed
        #[arg(long)]
        no_fail: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    match cli.command {
        Commands::Detect { file } => cmd_detect(&file),
        Commands::Parse { file, format } => cmd_parse(&config, &file, format.as_deref()),
        Commands::Compare {
            current,
            baseline,
            format,
            threshold,
            output,
            baseline_ref,
            current_commit,
            no_fail,
        } => {
            let options = CompareOptions {
                current,
                baseline,
                format,
                threshold,
                output,
                baseline_ref,
                current_commit,
                no_fail,
            };
            cmd_compare(&config, options)
        }
    }
}

/// Accept a literal path or a glob pattern; patterns take the first match in sorted order.
fn resolve_input(pattern: &str) -> Result<PathBuf> {
    let path = PathBuf::from(pattern);
    if path.is_file() {
        return Ok(path);
    }

    let mut matches: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("Invalid file pattern: {}", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();

    if matches.len() > 1 {
        debug!("{} files match {}, using the first", matches.len(), pattern);
    }

    matches
        .into_iter()
        .next()
        .with_context(|| format!("No coverage file matches '{}'", pattern))
}

fn format_option(config: &Config, flag: Option<&str>) -> Result<Option<CoverageFormat>> {
    match flag {
        Some(name) => Ok(parse_format_hint(name)?),
        None => config.format(),
    }
}

fn cmd_detect(file: &str) -> Result<()> {
    let path = resolve_input(file)?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let format = detect_format(&content, &filename)?;
    println!("{}", format);
    Ok(())
}

fn cmd_parse(config: &Config, file: &str, format: Option<&str>) -> Result<()> {
    let format = format_option(config, format)?;
    let path = resolve_input(file)?;
    let coverage = parse_coverage_file(&path, format)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&coverage)?);
    Ok(())
}

struct CompareOptions {
    current: String,
    baseline: Option<String>,
    format: Option<String>,
    threshold: Option<f64>,
    output: Option<PathBuf>,
    baseline_ref: Option<String>,
    current_commit: Option<String>,
    no_fail: bool,
}

fn cmd_compare(config: &Config, options: CompareOptions) -> Result<()> {
    let format = format_option(config, options.format.as_deref())?;

    let threshold = options.threshold.unwrap_or(config.compare.threshold);
    if !(0.0..=100.0).contains(&threshold) {
        anyhow::bail!("Threshold must be between 0 and 100, got {}", threshold);
    }

    let current_path = resolve_input(&options.current)?;
    let current = parse_coverage_file(&current_path, format)
        .with_context(|| format!("Failed to parse {}", current_path.display()))?;

    // An unusable baseline degrades to a report without comparison
    let baseline = match options.baseline.as_deref() {
        Some(pattern) => match load_baseline(pattern, format) {
            Ok(baseline) => Some(baseline),
            Err(e) => {
                warn!("Skipping baseline: {:#}", e);
                println!("{} Baseline unavailable: {:#}", "⚠".yellow(), e);
                None
            }
        },
        None => None,
    };

    let commits = CommitIds {
        baseline: options
            .baseline_ref
            .as_deref()
            .and_then(|rev| commit_or_warn(git::resolve_commit(Path::new("."), rev))),
        current: options
            .current_commit
            .or_else(|| commit_or_warn(git::head_commit(Path::new(".")))),
    };

    let report = CoverageReport::build(&current, baseline.as_ref(), threshold, commits);

    print_coverage(&current);
    if let Some(comparison) = &report.comparison {
        println!();
        comparison.print_summary();
    }

    let output = options
        .output
        .unwrap_or_else(|| PathBuf::from(&config.compare.output));
    report.save(&output)?;
    println!(
        "\n{} Report written: {}",
        "📊".cyan(),
        output.display().to_string().green()
    );

    if report.is_regressed() && config.compare.fail_on_regression && !options.no_fail {
        std::process::exit(1);
    }

    Ok(())
}

fn load_baseline(pattern: &str, format: Option<CoverageFormat>) -> Result<NormalizedCoverage> {
    let path = resolve_input(pattern)?;
    let baseline = parse_coverage_file(&path, format)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(baseline)
}

fn commit_or_warn(result: Result<String>) -> Option<String> {
    match result {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Commit id unavailable: {:#}", e);
            None
        }
    }
}

fn print_coverage(coverage: &NormalizedCoverage) {
    println!(
        "{} {} ({} files)",
        "Coverage:".bold(),
        coverage.format.to_string().cyan(),
        coverage.files.len()
    );

    for kind in MetricKind::ALL {
        let metric = coverage.summary.metric(kind);
        println!(
            "  {:<10} {:>7.2}% {}",
            kind.as_str(),
            metric.percentage,
            format!("({}/{})", metric.covered, metric.total).dimmed()
        );
    }
}
