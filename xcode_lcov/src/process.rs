//! External process invocation.
//!
//! The pipeline only ever talks to [`ProcessRunner`], so tests can swap in a
//! recorder and assert on the exact argument lists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Program name without any leading directories.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

/// Renders a shell-style command line; glob patterns and arguments containing
/// whitespace are double-quoted.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if needs_quoting(arg) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || matches!(c, '*' | '?' | '['))
}

/// Result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when the process could not be started or was killed.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success() -> Self {
        Self {
            status: Some(0),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait ProcessRunner {
    /// Run to completion. Start-up failures are reported as an outcome with
    /// no status rather than an error.
    fn run(&mut self, invocation: &Invocation) -> ProcessOutcome;
}

/// Runs commands for real, relaying their output through `tracing`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> ProcessOutcome {
        info!("$ {invocation}");

        let output = match Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to run {}: {}", invocation.program_name(), e);
                return ProcessOutcome {
                    status: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                };
            }
        };

        let outcome = ProcessOutcome {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in outcome.stdout.lines() {
            debug!("{}: {}", invocation.program_name(), line);
        }
        if outcome.is_success() {
            for line in outcome.stderr.lines() {
                debug!("{}: {}", invocation.program_name(), line);
            }
        } else {
            for line in outcome.stderr.lines() {
                warn!("{}: {}", invocation.program_name(), line);
            }
        }

        outcome
    }
}

/// Logs each command line without executing anything.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    pub executed: Vec<Invocation>,
}

impl ProcessRunner for DryRunRunner {
    fn run(&mut self, invocation: &Invocation) -> ProcessOutcome {
        info!("[dry-run] $ {invocation}");
        self.executed.push(invocation.clone());
        ProcessOutcome::success()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use serial_test::serial;

    use super::*;

    #[test]
    fn invocation_display__glob_argument__then_double_quoted() {
        let invocation = Invocation::new("lcov")
            .arg("--remove")
            .arg("/tmp/coverage.info")
            .arg("/Applications/*");

        assert_eq!(
            invocation.to_string(),
            "lcov --remove /tmp/coverage.info \"/Applications/*\""
        );
    }

    #[test]
    fn invocation_display__whitespace_argument__then_double_quoted() {
        let invocation = Invocation::new("genhtml").arg("My Reports");
        assert_eq!(invocation.to_string(), "genhtml \"My Reports\"");
    }

    #[test]
    fn program_name__absolute_program__then_file_name_only() {
        let invocation = Invocation::new("/opt/homebrew/bin/lcov");
        assert_eq!(invocation.program_name(), "lcov");
    }

    // Spawning resolves through PATH, which the toolchain tests swap out.
    #[test]
    #[serial]
    fn system_runner__missing_program__then_outcome_without_status() {
        let mut runner = SystemRunner;
        let invocation = Invocation::new("xcode-lcov-definitely-not-a-real-program");

        let outcome = runner.run(&invocation);

        assert_eq!(outcome.status, None);
        assert!(!outcome.is_success());
        assert!(!outcome.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn system_runner__nonzero_exit__then_status_captured() {
        let mut runner = SystemRunner;
        let invocation = Invocation::new("sh").arg("-c").arg("echo oops >&2; exit 3");

        let outcome = runner.run(&invocation);

        assert_eq!(outcome.status, Some(3));
        assert!(outcome.stderr.contains("oops"));
    }

    #[test]
    fn dry_run_runner__any_invocation__then_recorded_and_successful() {
        let mut runner = DryRunRunner::default();

        let outcome = runner.run(&Invocation::new("genhtml").arg("/tmp/coverage.info"));

        assert!(outcome.is_success());
        assert_eq!(runner.executed.len(), 1);
        assert_eq!(runner.executed[0].program_name(), "genhtml");
    }
}
