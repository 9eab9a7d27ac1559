//! Build session and external process interface for Strata.
//!
//! A [`Session`] is constructed once per logical build run and passed by
//! reference (as `Arc<Session>`) to every goal. It fronts the store's
//! [`DigestAlgebra`] with a memo cache keyed by operation and inputs, and
//! records every digest produced during the run so that lease renewal can
//! keep the run's content alive.
//!
//! External tools are reached through the [`ProcessRunner`] trait; this crate
//! only defines the request/response types, never an execution backend.
//!
//! [`DigestAlgebra`]: strata_store::DigestAlgebra

pub mod process;
pub mod session;

pub use process::{
    FallibleProcessResult, Process, ProcessError, ProcessFailure, ProcessResult, ProcessRunner,
};
pub use session::{MemoStats, Session};
