//! Derived-data directory resolution.
//!
//! Xcode names each project's derived-data directory `<Project>-<hash>`, and
//! several of them can coexist for one project. The most recently modified
//! directory whose name contains the project name is taken to hold the current
//! coverage instrumentation.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{LcovError, Result};
use crate::request::{BuildTarget, ValidatedRequest};

/// Location of derived data relative to the user's home directory.
pub const DERIVED_DATA_SUBPATH: &str = "Library/Developer/Xcode/DerivedData/";

/// Lists the immediate children of a directory, newest first.
pub trait DirLister {
    fn list_by_mtime(&self, dir: &Path) -> Result<Vec<String>>;
}

/// [`DirLister`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLister;

impl DirLister for FsLister {
    fn list_by_mtime(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("derived data root {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(LcovError::io(dir, e)),
        };

        let mut children: Vec<(SystemTime, String)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LcovError::io(dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            children.push((modified, name));
        }

        // Newest first; equal mtimes fall back to name order like `ls -t`.
        children.sort_by(|(a_time, a_name), (b_time, b_name)| {
            b_time.cmp(a_time).then_with(|| a_name.cmp(b_name))
        });

        Ok(children.into_iter().map(|(_, name)| name).collect())
    }
}

/// Outcome of searching the derived-data root for a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedDataMatch {
    Found(String),
    NoMatch,
}

impl DerivedDataMatch {
    /// Path segment used when composing; empty for [`DerivedDataMatch::NoMatch`].
    pub fn segment(&self) -> &str {
        match self {
            Self::Found(name) => name,
            Self::NoMatch => "",
        }
    }
}

/// What to do when no derived-data directory matches the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Warn and continue with a path containing an empty segment.
    #[default]
    Lenient,
    /// Fail with [`LcovError::UnresolvedDerivedData`].
    Strict,
}

/// Fully composed intermediates directory handed to the capture step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedDataPath(String);

impl DerivedDataPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DerivedDataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct DerivedDataLocator<L = FsLister> {
    root: String,
    lister: L,
}

impl DerivedDataLocator<FsLister> {
    /// Locator rooted at `$HOME/Library/Developer/Xcode/DerivedData/`.
    pub fn from_home() -> Result<Self> {
        Ok(Self::new(default_root()?, FsLister))
    }
}

impl<L: DirLister> DerivedDataLocator<L> {
    /// The root is kept as a string because the composed path is handed to
    /// lcov as an argument. A root that is not valid UTF-8 is converted
    /// lossily, so its invalid bytes become U+FFFD and it no longer names the
    /// original directory. A trailing `/` is appended when missing.
    pub fn new(root: impl Into<PathBuf>, lister: L) -> Self {
        let mut root = root.into().to_string_lossy().into_owned();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { root, lister }
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    /// Root directory, always with a trailing separator.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Most recently modified child whose name contains `project_name`.
    ///
    /// The match is a case-sensitive substring test.
    pub fn find_project_dir(&self, project_name: &str) -> Result<DerivedDataMatch> {
        let children = self.lister.list_by_mtime(Path::new(&self.root))?;
        Ok(children
            .into_iter()
            .find(|name| name.contains(project_name))
            .map_or(DerivedDataMatch::NoMatch, DerivedDataMatch::Found))
    }

    pub fn compose(
        &self,
        matched: &DerivedDataMatch,
        request: &ValidatedRequest,
        target: &BuildTarget,
    ) -> DerivedDataPath {
        compose_path(&self.root, matched.segment(), request, target)
    }

    /// Find and compose in one go, applying `policy` to a missing match.
    pub fn resolve(
        &self,
        request: &ValidatedRequest,
        target: &BuildTarget,
        policy: MatchPolicy,
    ) -> Result<DerivedDataPath> {
        let matched = self.find_project_dir(&request.project_name)?;
        match (&matched, policy) {
            (DerivedDataMatch::Found(name), _) => {
                info!("Using derived data directory {name}");
            }
            (DerivedDataMatch::NoMatch, MatchPolicy::Strict) => {
                return Err(LcovError::UnresolvedDerivedData {
                    root: PathBuf::from(&self.root),
                    project_name: request.project_name.clone(),
                });
            }
            (DerivedDataMatch::NoMatch, MatchPolicy::Lenient) => {
                warn!(
                    "No derived data directory matching '{}' under {}; continuing anyway",
                    request.project_name, self.root
                );
            }
        }
        Ok(self.compose(&matched, request, target))
    }
}

/// `$HOME/Library/Developer/Xcode/DerivedData/`
pub fn default_root() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| LcovError::HomeNotFound)?;
    if home.is_empty() {
        return Err(LcovError::HomeNotFound);
    }
    Ok(PathBuf::from(format!(
        "{}/{}",
        home.trim_end_matches('/'),
        DERIVED_DATA_SUBPATH
    )))
}

/// Plain concatenation, so an empty `matched` leaves a `//` in the result.
pub fn compose_path(
    root: &str,
    matched: &str,
    request: &ValidatedRequest,
    target: &BuildTarget,
) -> DerivedDataPath {
    DerivedDataPath(format!(
        "{root}{matched}/Build/Intermediates/{project}.build/{configuration}-{platform}/{scheme}.build/Objects-normal/{arch}/",
        project = request.project_name,
        configuration = target.configuration,
        platform = target.platform,
        scheme = request.scheme,
        arch = target.arch,
    ))
}
