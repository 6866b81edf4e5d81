use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LcovError {
    #[error("{tool} not installed, please install using `{remediation}`")]
    ToolMissing {
        tool: &'static str,
        remediation: &'static str,
    },
    #[error("No PROJECT_NAME given.")]
    MissingProjectName,
    #[error("No SCHEME given.")]
    MissingScheme,
    #[error("HOME is not set; cannot locate Xcode derived data")]
    HomeNotFound,
    #[error("no derived data directory matching {project_name:?} under {root:?}")]
    UnresolvedDerivedData { root: PathBuf, project_name: String },
    #[error("{step} step failed: `{program}` exited with {}", describe_status(.status))]
    ToolFailed {
        step: &'static str,
        program: String,
        status: Option<i32>,
    },
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LcovError>;

impl LcovError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Operator-facing instruction for errors a human is expected to fix.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::ToolMissing { remediation, .. } => Some(format!("Run `{remediation}`")),
            Self::MissingProjectName => Some(
                "Please add 'ENV[\"PROJECT_NAME\"] = \"a_valid_project_name\"' to your \
                 environment or pass --project-name."
                    .to_string(),
            ),
            Self::MissingScheme => Some(
                "Please add 'ENV[\"SCHEME\"] = \"a_valid_scheme\"' to your environment \
                 or pass --scheme."
                    .to_string(),
            ),
            Self::HomeNotFound => {
                Some("Set HOME or pass --derived-data-root explicitly.".to_string())
            }
            _ => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match *status {
        Some(code) => format!("status {code}"),
        None => "no status (failed to start or killed by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn lcov_error__tool_missing__then_message_names_install_command() {
        let err = LcovError::ToolMissing {
            tool: "lcov",
            remediation: "brew install lcov",
        };
        assert_eq!(
            err.to_string(),
            "lcov not installed, please install using `brew install lcov`"
        );
        assert_eq!(err.remediation().as_deref(), Some("Run `brew install lcov`"));
    }

    #[test]
    fn lcov_error__missing_config__then_remediation_names_env_var() {
        let project = LcovError::MissingProjectName;
        let scheme = LcovError::MissingScheme;

        assert_eq!(project.to_string(), "No PROJECT_NAME given.");
        assert!(project.remediation().unwrap().contains("PROJECT_NAME"));
        assert_eq!(scheme.to_string(), "No SCHEME given.");
        assert!(scheme.remediation().unwrap().contains("SCHEME"));
    }

    #[test]
    fn lcov_error__tool_failed__then_formats_status() {
        let exited = LcovError::ToolFailed {
            step: "capture",
            program: "lcov".to_string(),
            status: Some(2),
        };
        assert_eq!(
            exited.to_string(),
            "capture step failed: `lcov` exited with status 2"
        );

        let unstarted = LcovError::ToolFailed {
            step: "render",
            program: "genhtml".to_string(),
            status: None,
        };
        assert!(unstarted.to_string().contains("failed to start"));
        assert!(unstarted.remediation().is_none());
    }

    #[test]
    fn lcov_error__io_constructor__then_preserves_path_and_source() {
        let err = LcovError::io(
            "/tmp/DerivedData",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );

        match &err {
            LcovError::Io { path, source } => {
                assert!(path.ends_with("DerivedData"));
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("denied"));
    }
}
