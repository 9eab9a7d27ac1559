use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error("source root error: {0}")]
    SourceRoot(#[from] strata_source::SourceRootError),

    #[error("fmt error: {0}")]
    Fmt(#[from] strata_fmt::FmtError),

    #[error("coverage error: {0}")]
    Coverage(#[from] strata_coverage::CoverageError),

    #[error("gc error: {0}")]
    Gc(#[from] strata_gc::GcError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
