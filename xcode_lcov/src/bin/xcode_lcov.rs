//! xcode-lcov
//!
//! Generates an lcov HTML coverage report for an Xcode project/scheme.
//!
//! ```bash
//! # Flags
//! xcode-lcov --project-name MyApp --scheme MyAppTests --output-dir coverage_reports
//!
//! # Or the environment, as a build script would set it
//! PROJECT_NAME=MyApp SCHEME=MyAppTests xcode-lcov
//!
//! # Print the commands without running them
//! xcode-lcov --project-name MyApp --scheme MyAppTests --dry-run
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use xcode_lcov::derived_data::FsLister;
use xcode_lcov::pipeline::DEFAULT_TRACEFILE;
use xcode_lcov::process::{DryRunRunner, SystemRunner};
use xcode_lcov::request::DEFAULT_OUTPUT_DIR;
use xcode_lcov::toolchain::LcovToolchain;
use xcode_lcov::{
    generate, BuildTarget, CoverageRequest, DerivedDataLocator, FailurePolicy, GenerateOptions,
    MatchPolicy, PipelineReport,
};

/// Generates coverage data using lcov
#[derive(Parser)]
#[command(name = "xcode-lcov")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Name of the project
    #[arg(long, env = "PROJECT_NAME")]
    project_name: Option<String>,

    /// Scheme of the project
    #[arg(long, env = "SCHEME")]
    scheme: Option<String>,

    /// The output directory that coverage data will be stored
    #[arg(long, env = "OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Build configuration segment of the intermediates path
    #[arg(long, default_value = "Debug")]
    configuration: String,

    /// Platform segment of the intermediates path
    #[arg(long, default_value = "iphonesimulator")]
    platform: String,

    /// Architecture segment of the intermediates path
    #[arg(long, default_value = "i386")]
    arch: String,

    /// Derived data root (defaults to ~/Library/Developer/Xcode/DerivedData/)
    #[arg(long, env = "DERIVED_DATA_ROOT")]
    derived_data_root: Option<PathBuf>,

    /// Scratch tracefile shared by the capture, filter and render steps
    #[arg(long, env = "LCOV_TRACEFILE", default_value = DEFAULT_TRACEFILE)]
    tracefile: PathBuf,

    /// Fail when no derived data directory matches the project name
    #[arg(long)]
    require_derived_data: bool,

    /// Stop at the first lcov/genhtml step that exits non-zero
    #[arg(long)]
    abort_on_failure: bool,

    /// Log the commands instead of running them; skips the lcov check
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let toolchain = LcovToolchain::for_run(cli.dry_run)?;

    let request = CoverageRequest {
        project_name: cli.project_name.clone(),
        scheme: cli.scheme.clone(),
        output_dir: cli.output_dir.clone(),
    };
    // HOME is only consulted once the request is known to be usable.
    request.validate()?;

    let locator = match &cli.derived_data_root {
        Some(root) => DerivedDataLocator::new(root.clone(), FsLister),
        None => DerivedDataLocator::from_home()?,
    };

    let options = GenerateOptions {
        toolchain,
        target: BuildTarget {
            configuration: cli.configuration.clone(),
            platform: cli.platform.clone(),
            arch: cli.arch.clone(),
        },
        tracefile: cli.tracefile.clone(),
        match_policy: if cli.require_derived_data {
            MatchPolicy::Strict
        } else {
            MatchPolicy::Lenient
        },
        failure_policy: if cli.abort_on_failure {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        },
    };

    let report = if cli.dry_run {
        generate(&request, &locator, &mut DryRunRunner::default(), &options)?
    } else {
        generate(&request, &locator, &mut SystemRunner, &options)?
    };

    match saved_report_dir(&report, cli.dry_run) {
        Some(dir) => info!("HTML report saved to: {}", dir.display()),
        None => log_failures(&report),
    }

    Ok(())
}

/// Where the HTML report was written, if this run actually wrote one.
fn saved_report_dir(report: &PipelineReport, dry_run: bool) -> Option<&Path> {
    (!dry_run && report.all_succeeded()).then_some(report.output_dir.as_path())
}

fn log_failures(report: &PipelineReport) {
    for record in report.failed_steps() {
        warn!(
            "{} step did not succeed; the report in {} may be empty or stale",
            record.step,
            report.output_dir.display()
        );
    }
}
