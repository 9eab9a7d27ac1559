use strata_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to spawn gc worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("gc worker panicked")]
    WorkerPanicked,
}

pub type GcResult<T> = Result<T, GcError>;
