//! Capture, filter and render steps.
//!
//! Each step is one external invocation, run strictly in order:
//!
//! 1. `lcov --capture --directory <derived data> --output-file <tracefile>`
//! 2. `lcov --remove <tracefile> "<pattern>" ... --output <tracefile>`
//! 3. `genhtml <tracefile> --output-directory <output dir>`
//!
//! With [`FailurePolicy::Continue`] a failing step is logged and the next one
//! still runs, matching how the action has always behaved.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::derived_data::{DerivedDataLocator, DerivedDataPath, DirLister, MatchPolicy};
use crate::error::{LcovError, Result};
use crate::process::{Invocation, ProcessOutcome, ProcessRunner};
use crate::request::{BuildTarget, CoverageRequest};
use crate::toolchain::LcovToolchain;

/// Paths dropped from every tracefile before rendering.
pub const EXCLUDE_PATTERNS: [&str; 2] = ["/Applications/*", "/Frameworks/*"];

/// Shared scratch tracefile. Concurrent runs should pass their own.
pub const DEFAULT_TRACEFILE: &str = "/tmp/coverage.info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log a warning and keep going.
    #[default]
    Continue,
    /// Stop at the first failing step.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Capture,
    Filter,
    Render,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Filter => "filter",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn capture_invocation(
    toolchain: &LcovToolchain,
    derived_data: &DerivedDataPath,
    tracefile: &Path,
) -> Invocation {
    Invocation::new(&toolchain.lcov)
        .arg("--capture")
        .arg("--directory")
        .arg(derived_data.as_str())
        .arg("--output-file")
        .arg_path(tracefile)
}

/// One `--remove <tracefile> <pattern>` clause per exclusion, then a single
/// trailing `--output <tracefile>`.
pub fn filter_invocation(toolchain: &LcovToolchain, tracefile: &Path) -> Invocation {
    let mut invocation = Invocation::new(&toolchain.lcov);
    for pattern in EXCLUDE_PATTERNS {
        invocation = invocation
            .arg("--remove")
            .arg_path(tracefile)
            .arg(pattern);
    }
    invocation.arg("--output").arg_path(tracefile)
}

pub fn render_invocation(
    toolchain: &LcovToolchain,
    tracefile: &Path,
    output_dir: &Path,
) -> Invocation {
    Invocation::new(&toolchain.genhtml)
        .arg_path(tracefile)
        .arg("--output-directory")
        .arg_path(output_dir)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub invocation: Invocation,
    pub outcome: ProcessOutcome,
}

/// Everything that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub steps: Vec<StepRecord>,
    pub tracefile: PathBuf,
    pub output_dir: PathBuf,
}

impl PipelineReport {
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|record| record.outcome.is_success())
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| !record.outcome.is_success())
    }
}

#[derive(Debug, Clone)]
pub struct CoveragePipeline {
    pub toolchain: LcovToolchain,
    pub tracefile: PathBuf,
    pub output_dir: PathBuf,
    pub policy: FailurePolicy,
}

impl CoveragePipeline {
    pub fn new(toolchain: LcovToolchain, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            tracefile: PathBuf::from(DEFAULT_TRACEFILE),
            output_dir: output_dir.into(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_tracefile(mut self, tracefile: impl Into<PathBuf>) -> Self {
        self.tracefile = tracefile.into();
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn invocations(&self, derived_data: &DerivedDataPath) -> [(Step, Invocation); 3] {
        [
            (
                Step::Capture,
                capture_invocation(&self.toolchain, derived_data, &self.tracefile),
            ),
            (
                Step::Filter,
                filter_invocation(&self.toolchain, &self.tracefile),
            ),
            (
                Step::Render,
                render_invocation(&self.toolchain, &self.tracefile, &self.output_dir),
            ),
        ]
    }

    pub fn run<R: ProcessRunner>(
        &self,
        runner: &mut R,
        derived_data: &DerivedDataPath,
    ) -> Result<PipelineReport> {
        let mut report = PipelineReport {
            steps: Vec::with_capacity(3),
            tracefile: self.tracefile.clone(),
            output_dir: self.output_dir.clone(),
        };

        for (step, invocation) in self.invocations(derived_data) {
            info!("Running {step} step");
            let outcome = runner.run(&invocation);

            if !outcome.is_success() {
                match self.policy {
                    FailurePolicy::Abort => {
                        return Err(LcovError::ToolFailed {
                            step: step.name(),
                            program: invocation.program_name(),
                            status: outcome.status,
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            "{step} step: `{}` did not succeed (status {:?}); continuing",
                            invocation.program_name(),
                            outcome.status
                        );
                    }
                }
            }

            report.steps.push(StepRecord {
                step,
                invocation,
                outcome,
            });
        }

        Ok(report)
    }
}

/// Knobs for [`generate`]; the defaults reproduce the historical behaviour.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub toolchain: LcovToolchain,
    pub target: BuildTarget,
    pub tracefile: PathBuf,
    pub match_policy: MatchPolicy,
    pub failure_policy: FailurePolicy,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            toolchain: LcovToolchain::by_name(),
            target: BuildTarget::default(),
            tracefile: PathBuf::from(DEFAULT_TRACEFILE),
            match_policy: MatchPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Validate, locate derived data, then run the three steps.
///
/// Nothing is listed or spawned unless validation passes.
pub fn generate<L: DirLister, R: ProcessRunner>(
    request: &CoverageRequest,
    locator: &DerivedDataLocator<L>,
    runner: &mut R,
    options: &GenerateOptions,
) -> Result<PipelineReport> {
    let request = request.validate()?;

    let derived_data = locator.resolve(&request, &options.target, options.match_policy)?;
    info!("Derived data path: {derived_data}");

    CoveragePipeline::new(options.toolchain.clone(), &request.output_dir)
        .with_tracefile(&options.tracefile)
        .with_policy(options.failure_policy)
        .run(runner, &derived_data)
}
