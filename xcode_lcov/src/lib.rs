//! Generate lcov HTML coverage reports from Xcode derived data.
//!
//! The flow is validate → locate → run:
//!
//! - [`request`] checks the project name and scheme are present
//! - [`derived_data`] finds the newest derived-data directory for the project
//!   and composes the intermediates path holding the coverage counters
//! - [`pipeline`] captures, filters and renders through lcov and genhtml
//!
//! External programs are only reached through [`process::ProcessRunner`].

pub mod derived_data;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod request;
pub mod toolchain;

pub use derived_data::{DerivedDataLocator, DerivedDataMatch, DerivedDataPath, MatchPolicy};
pub use error::{LcovError, Result};
pub use pipeline::{generate, CoveragePipeline, FailurePolicy, GenerateOptions, PipelineReport};
pub use request::{BuildTarget, CoverageRequest};
