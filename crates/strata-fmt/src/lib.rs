//! Format goal orchestration for Strata.
//!
//! Targets are partitioned by language. Each language runs its formatters
//! strictly in sequence, piping one formatter's output into the next, while
//! different languages run concurrently. Changed outputs are merged and
//! written back to the workspace in a single step; a merge conflict fails
//! the goal before anything is written.

pub mod config;
pub mod error;
pub mod goal;
pub mod language;
pub mod presence;
pub mod registry;
pub mod result;
pub mod target;

pub use config::{FmtConfig, FormatterSettings};
pub use error::{FmtError, Result};
pub use goal::{run_fmt, run_lint, FmtOutcome, LintOutcome};
pub use language::{FmtRequest, Formatter, FormatterPipeline, LanguageFormatter, ProcessFormatter};
pub use presence::{SourcePresence, WorkspaceSourcePresence};
pub use registry::FmtRegistry;
pub use result::{FmtResult, LanguageFmtResults, LintResult};
pub use target::Target;
