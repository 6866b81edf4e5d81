//! Toolchain detection for lcov and genhtml.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::{LcovError, Result};

const LCOV_INSTALL: &str = "brew install lcov";

/// Resolved lcov programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcovToolchain {
    pub lcov: PathBuf,
    pub genhtml: PathBuf,
    pub source: ToolchainSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainSource {
    /// Found on PATH
    Path,
    /// Bare program names, left for the shell to resolve
    Unresolved,
}

impl std::fmt::Display for ToolchainSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "PATH"),
            Self::Unresolved => write!(f, "unresolved program names"),
        }
    }
}

impl LcovToolchain {
    /// Programs referenced by name only. No lookup happens.
    pub fn by_name() -> Self {
        Self {
            lcov: PathBuf::from("lcov"),
            genhtml: PathBuf::from("genhtml"),
            source: ToolchainSource::Unresolved,
        }
    }

    /// Dry runs never execute anything, so they skip the lookup.
    pub fn for_run(dry_run: bool) -> Result<Self> {
        if dry_run {
            Ok(Self::by_name())
        } else {
            Self::detect()
        }
    }

    /// Locate lcov on PATH, failing with install instructions when absent.
    pub fn detect() -> Result<Self> {
        let lcov = which::which("lcov").map_err(|_| {
            let err = LcovError::ToolMissing {
                tool: "lcov",
                remediation: LCOV_INSTALL,
            };
            error!("{err}");
            err
        })?;
        debug!("Found lcov at: {}", lcov.display());

        let genhtml = resolve_genhtml(&lcov)?;
        debug!("Found genhtml at: {}", genhtml.display());

        let toolchain = Self {
            lcov,
            genhtml,
            source: ToolchainSource::Path,
        };
        debug!("Using lcov toolchain from {}", toolchain.source);
        Ok(toolchain)
    }
}

/// genhtml ships alongside lcov; look beside it when PATH does not have it.
fn resolve_genhtml(lcov: &Path) -> Result<PathBuf> {
    if let Ok(path) = which::which("genhtml") {
        return Ok(path);
    }

    if let Some(sibling) = lcov.parent().map(|dir| dir.join("genhtml")) {
        if sibling.exists() {
            return Ok(sibling);
        }
    }

    let err = LcovError::ToolMissing {
        tool: "genhtml",
        remediation: LCOV_INSTALL,
    };
    error!("{err}");
    Err(err)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use std::ffi::OsString;

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    /// Points PATH at `dir` for the duration of `f`.
    fn with_path<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let saved: Option<OsString> = std::env::var_os("PATH");
        std::env::set_var("PATH", dir);
        let result = f();
        match saved {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }
        result
    }

    #[cfg(unix)]
    fn write_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;

        std::fs::write(path, b"#!/bin/sh\nexit 0\n").expect("stub");
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub");
    }

    #[test]
    fn by_name__then_bare_program_names() {
        let toolchain = LcovToolchain::by_name();
        assert_eq!(toolchain.lcov, PathBuf::from("lcov"));
        assert_eq!(toolchain.genhtml, PathBuf::from("genhtml"));
        assert_eq!(toolchain.source, ToolchainSource::Unresolved);
    }

    #[test]
    #[serial]
    fn detect__lcov_not_on_path__then_tool_missing_with_brew_hint() {
        let empty = TempDir::new().expect("temp dir");

        let err = with_path(empty.path(), LcovToolchain::detect).unwrap_err();

        match &err {
            LcovError::ToolMissing { tool, remediation } => {
                assert_eq!(*tool, "lcov");
                assert_eq!(*remediation, "brew install lcov");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(
            err.remediation().as_deref(),
            Some("Run `brew install lcov`")
        );
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn detect__lcov_without_genhtml__then_genhtml_missing() {
        let bin = TempDir::new().expect("temp dir");
        write_executable(&bin.path().join("lcov"));

        let err = with_path(bin.path(), LcovToolchain::detect).unwrap_err();

        assert!(matches!(
            err,
            LcovError::ToolMissing {
                tool: "genhtml",
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn detect__both_tools_on_path__then_resolved_from_path() {
        let bin = TempDir::new().expect("temp dir");
        write_executable(&bin.path().join("lcov"));
        write_executable(&bin.path().join("genhtml"));

        let toolchain = with_path(bin.path(), LcovToolchain::detect).expect("toolchain");

        assert_eq!(toolchain.source, ToolchainSource::Path);
        assert!(toolchain.lcov.starts_with(bin.path()));
        assert!(toolchain.genhtml.starts_with(bin.path()));
    }

    #[test]
    #[serial]
    fn for_run__dry_run_without_lcov__then_bare_names() {
        let empty = TempDir::new().expect("temp dir");

        let toolchain = with_path(empty.path(), || LcovToolchain::for_run(true)).expect("dry run");

        assert_eq!(toolchain, LcovToolchain::by_name());
    }

    #[test]
    #[serial]
    fn for_run__real_run_without_lcov__then_tool_missing() {
        let empty = TempDir::new().expect("temp dir");

        let err = with_path(empty.path(), || LcovToolchain::for_run(false)).unwrap_err();

        assert!(matches!(err, LcovError::ToolMissing { tool: "lcov", .. }));
    }

    #[test]
    #[serial]
    fn resolve_genhtml__sibling_of_lcov__then_found() {
        let temp = TempDir::new().expect("temp dir");
        let lcov = temp.path().join("lcov");
        let genhtml = temp.path().join("genhtml");
        std::fs::write(&lcov, b"").expect("lcov stub");
        std::fs::write(&genhtml, b"").expect("genhtml stub");
        let empty = TempDir::new().expect("empty PATH dir");

        let resolved = with_path(empty.path(), || resolve_genhtml(&lcov)).expect("genhtml");

        assert_eq!(resolved, genhtml);
        assert!(resolved.exists());
    }

    #[test]
    fn toolchain_source__display__then_human_readable() {
        assert_eq!(ToolchainSource::Path.to_string(), "PATH");
    }
}
