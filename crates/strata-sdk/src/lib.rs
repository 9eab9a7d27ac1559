//! High-level API for the Strata build substrate.
//!
//! [`Strata`] wires one store, the source-root resolver, the format
//! registry and the store GC service together from a single
//! [`StrataConfig`], usually loaded from `strata.toml`. Each goal runs in
//! its own [`Session`].

pub mod config;
pub mod error;
pub mod strata;

pub use config::StrataConfig;
pub use error::{ConfigError, SdkError, SdkResult};
pub use strata::Strata;

pub use strata_coverage::{CoverageData, CoverageReport, CoverageReportType, CoverageTool};
pub use strata_engine::{Process, ProcessRunner, Session};
pub use strata_fmt::{FmtOutcome, FmtRegistry, LintOutcome, Target};
pub use strata_gc::LiveSessions;
pub use strata_source::{SourceFiles, SourceRoot, StrippedSourceFiles};
pub use strata_store::{DigestAlgebra, FileContent, Snapshot};
pub use strata_types::{Address, Digest, RelPath};
