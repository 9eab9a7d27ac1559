use strata_types::{Digest, RelPath, TypeError};

/// Errors from object store and digest algebra operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(Digest),

    /// Two inputs define different content for the same path.
    #[error("conflicting content at path {path}")]
    Conflict { path: RelPath },

    /// A requested subset path is absent from the digest.
    #[error("path not found in digest {digest}: {path}")]
    PathNotFound { digest: Digest, path: RelPath },

    /// A path does not live under the prefix being removed.
    #[error("path {path} does not start with prefix {prefix}")]
    PrefixMismatch { path: RelPath, prefix: RelPath },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend or workspace.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {digest}: {reason}")]
    CorruptObject { digest: Digest, reason: String },

    /// A path read from disk or from a tree entry is not a valid relative path.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
