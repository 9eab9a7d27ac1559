use strata_store::StoreError;
use strata_types::RelPath;
use thiserror::Error;

/// A resolver could not map a file to its source root.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no source root found for {0}")]
    NoSourceRoot(RelPath),

    #[error("source root resolution failed for {path}: {reason}")]
    Failed { path: RelPath, reason: String },
}

#[derive(Debug, Error)]
pub enum SourceRootError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SourceRootResult<T> = Result<T, SourceRootError>;
