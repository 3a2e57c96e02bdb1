//! moodle2pretext - Convert a Moodle course backup into a PreTeXt project
//!
//! Usage:
//!   moodle2pretext backup.mbz ./book
//!   moodle2pretext ./backup-dir ./book --overwrite --on-reference-error fail
//!   moodle2pretext backup.mbz ./book --no-examples --report report.json

use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use moodle2pretext::config::load_config;
use moodle2pretext::{BuildOptions, Converter, ReferenceErrorPolicy};

#[derive(ValueEnum, Clone, Debug)]
enum PolicyArg {
    /// Abort the build when a reference solution fails
    Fail,
    /// Show `error` as the example output and keep going
    Placeholder,
}

#[derive(ValueEnum, Clone, Debug)]
enum ReportFormat {
    /// JSON format
    Json,
    /// Human-readable text
    Text,
}

#[derive(Parser)]
#[command(
    version,
    about = "Convert a Moodle course backup into a PreTeXt project",
    long_about = "Reads an extracted Moodle backup directory or a zip-format .mbz file and \
                  writes a PreTeXt book with one section per quiz.\n\n\
                  Reference solutions of Python code-runner questions are executed to \
                  produce worked examples."
)]
struct Cli {
    /// Extracted backup directory or .mbz file
    #[arg(value_name = "BACKUP")]
    backup: PathBuf,

    /// Directory that receives the PreTeXt project
    #[arg(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/moodle2pretext/moodle2pretext.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write into a non-empty output directory
    #[arg(long)]
    overwrite: bool,

    /// What to do when a reference solution fails
    #[arg(long, value_enum)]
    on_reference_error: Option<PolicyArg>,

    /// Do not run reference solutions for worked examples
    #[arg(long)]
    no_examples: bool,

    /// Python interpreter for reference solutions
    #[arg(long, value_name = "CMD")]
    python: Option<String>,

    /// Time limit for one reference run, in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write a build report
    #[arg(long, value_name = "REPORT_FILE")]
    report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value = "json")]
    report_format: ReportFormat,

    /// debug log file
    #[arg(short, long, value_name = "FILE")]
    debuglogfile: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn init_logger(filter_level: log::LevelFilter, logfile: Option<&PathBuf>) -> anyhow::Result<()> {
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = Vec::new();
    loggers.push(simplelog::TermLogger::new(
        filter_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ));
    if let Some(filename) = logfile {
        let file = File::create(filename)
            .with_context(|| format!("cannot create log file {}", filename.display()))?;
        loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            file,
        ));
    }
    simplelog::CombinedLogger::init(loggers)?;
    Ok(())
}

fn build_options(args: &Cli) -> anyhow::Result<BuildOptions> {
    let mut options = BuildOptions::new();
    if let Some(loaded) = load_config(args.config.as_deref())? {
        log::info!("Using configuration from {}", loaded.path.display());
        options = loaded.config.apply(options);
    }

    if args.overwrite {
        options = options.with_overwrite(true);
    }
    if let Some(policy) = &args.on_reference_error {
        options = options.with_reference_error_policy(match policy {
            PolicyArg::Fail => ReferenceErrorPolicy::Fail,
            PolicyArg::Placeholder => ReferenceErrorPolicy::Placeholder,
        });
    }
    if args.no_examples {
        options = options.with_examples(false);
    }
    if let Some(python) = &args.python {
        options = options.with_interpreter(python);
    }
    if let Some(secs) = args.timeout {
        options = options.with_timeout(Duration::from_secs(secs));
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logger(args.verbose.log_level_filter(), args.debuglogfile.as_ref())?;

    let options = build_options(&args)?;
    let report = Converter::new(options)
        .convert_path(&args.backup, &args.output)
        .with_context(|| format!("failed to convert {}", args.backup.display()))?;

    for warning in &report.warnings {
        eprintln!("⚠ {}", warning);
    }
    eprintln!(
        "✓ Converted {} to {} ({} assignments, {} questions, {} warning(s))",
        args.backup.display(),
        args.output.display(),
        report.statistics.assignments,
        report.statistics.questions,
        report.warnings.len()
    );

    if let Some(report_path) = &args.report {
        let contents = match args.report_format {
            ReportFormat::Json => report.to_json()?,
            ReportFormat::Text => report.to_text(),
        };
        fs::write(report_path, contents)
            .with_context(|| format!("cannot write report {}", report_path.display()))?;
        eprintln!("✓ Report written to {}", report_path.display());
    }

    Ok(())
}
