//! Foundation types for Strata.
//!
//! This crate provides the value types shared by every other Strata crate.
//! None of them own storage; they are plain, comparable, hashable values
//! that can be copied or cloned freely across tasks and threads.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content fingerprint plus byte size of a blob or tree
//! - [`Fingerprint`] -- The 32-byte BLAKE3 hash inside a digest
//! - [`RelPath`] -- Normalized relative path used as a tree key
//! - [`Address`] -- Build target address (`path/to/dir:name`)

pub mod address;
pub mod digest;
pub mod error;
pub mod path;

pub use address::Address;
pub use digest::{Digest, Fingerprint};
pub use error::TypeError;
pub use path::RelPath;
