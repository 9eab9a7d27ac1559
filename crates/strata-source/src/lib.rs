//! Source-root stripping for Strata snapshots.
//!
//! Rewrites `src/python/pkg/mod.py` into `pkg/mod.py` given a resolver that
//! knows `src/python` is a source root. Files marked as unrooted are passed
//! through byte-for-byte.

pub mod error;
pub mod root;
pub mod strip;

pub use error::{ResolutionError, SourceRootError, SourceRootResult};
pub use root::{SourceRoot, SourceRootResolver, StaticSourceRoots};
pub use strip::{strip_source_roots, SourceFiles, StrippedSourceFiles};
