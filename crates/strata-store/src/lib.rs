//! Content-addressed file-tree store for Strata.
//!
//! Every file and directory a build touches is stored as an immutable object
//! identified by its [`Digest`] (BLAKE3 fingerprint plus size, domain-separated
//! by object kind). Higher layers never mutate trees: they compose and
//! decompose them with the [`DigestAlgebra`] operations, each of which
//! materializes a new digest.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing mapping names to digests
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store with a lease table
//!
//! # Liveness
//!
//! Content survives garbage collection only while it is reachable from an
//! unexpired lease. Writes receive an initial lease; long-lived sessions
//! renew leases periodically (see `strata-gc`).
//!
//! [`Digest`]: strata_types::Digest

pub mod algebra;
pub mod clock;
pub mod config;
pub mod error;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod snapshot;
pub mod traits;
pub mod workspace;

pub use algebra::DigestAlgebra;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use memory::{GcSummary, InMemoryObjectStore};
pub use object::{empty_digest, Blob, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use snapshot::{FileContent, Snapshot};
pub use traits::ObjectStore;
pub use workspace::{DiskWorkspace, Workspace};
