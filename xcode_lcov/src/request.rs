//! Coverage request input and validation.
//!
//! A [`CoverageRequest`] is what the caller hands over (flags or environment).
//! Nothing touches the filesystem or spawns a process until it has been turned
//! into a [`ValidatedRequest`].

use std::path::PathBuf;

use tracing::error;

use crate::error::{LcovError, Result};

/// Output directory used when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "coverage_reports";

/// Raw, unvalidated input for a single report generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRequest {
    pub project_name: Option<String>,
    pub scheme: Option<String>,
    pub output_dir: PathBuf,
}

impl CoverageRequest {
    pub fn new(project_name: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            project_name: Some(project_name.into()),
            scheme: Some(scheme.into()),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Check that project name and scheme are both present and non-blank.
    ///
    /// The remediation text is logged before the error is returned, since the
    /// failure is read by a human in build output.
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let Some(project_name) = non_blank(&self.project_name) else {
            return Err(report(LcovError::MissingProjectName));
        };
        let Some(scheme) = non_blank(&self.scheme) else {
            return Err(report(LcovError::MissingScheme));
        };

        Ok(ValidatedRequest {
            project_name: project_name.to_string(),
            scheme: scheme.to_string(),
            output_dir: self.output_dir.clone(),
        })
    }
}

impl Default for CoverageRequest {
    fn default() -> Self {
        Self {
            project_name: None,
            scheme: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// A request whose required fields are known to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub project_name: String,
    pub scheme: String,
    pub output_dir: PathBuf,
}

/// Build configuration segments of the intermediates path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub configuration: String,
    pub platform: String,
    pub arch: String,
}

impl Default for BuildTarget {
    fn default() -> Self {
        Self {
            configuration: "Debug".to_string(),
            platform: "iphonesimulator".to_string(),
            arch: "i386".to_string(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn report(err: LcovError) -> LcovError {
    if let Some(remediation) = err.remediation() {
        error!("{remediation}");
    }
    err
}
