use strata_engine::ProcessError;
use strata_store::StoreError;
use strata_types::RelPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FmtError {
    /// Two languages produced different content for the same path.
    #[error("conflicting formatter output at {path}")]
    Conflict { path: RelPath },

    #[error("language '{0}' is already registered")]
    DuplicateLanguage(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("format task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, FmtError>;
