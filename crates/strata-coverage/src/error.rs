use strata_engine::ProcessError;
use strata_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverageError {
    /// The user's coverage config cannot be used. Raised before any
    /// process is started.
    #[error("invalid coverage config (config file: {}): {reason}", .path.as_deref().unwrap_or("<none>"))]
    Configuration {
        path: Option<String>,
        reason: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("coverage report task failed: {0}")]
    Join(String),
}

pub type CoverageResult<T> = Result<T, CoverageError>;
