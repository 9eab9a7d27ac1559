use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strata_types::{Digest, RelPath};

/// A request to run an external tool in a sandbox populated from
/// `input_digest`. Files named in `output_files` and `output_directories`
/// are captured into the result's output digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub argv: Vec<String>,
    pub input_digest: Digest,
    pub output_files: Vec<RelPath>,
    pub output_directories: Vec<RelPath>,
    pub env: BTreeMap<String, String>,
    pub description: String,
}

impl Process {
    pub fn new(argv: Vec<String>, input_digest: Digest, description: impl Into<String>) -> Self {
        Self {
            argv,
            input_digest,
            output_files: Vec::new(),
            output_directories: Vec::new(),
            env: BTreeMap::new(),
            description: description.into(),
        }
    }

    pub fn with_output_files(mut self, files: Vec<RelPath>) -> Self {
        self.output_files = files;
        self
    }

    pub fn with_output_directories(mut self, dirs: Vec<RelPath>) -> Self {
        self.output_directories = dirs;
        self
    }
}

/// Output of a process that exited successfully.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub output_digest: Digest,
}

/// Output of a process whose exit code is reported rather than enforced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallibleProcessResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub output_digest: Digest,
}

/// A tool exited nonzero where success was required.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("process '{description}' failed with exit code {exit_code}: {}", String::from_utf8_lossy(.stderr))]
pub struct ProcessFailure {
    pub description: String,
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Errors from running external tools.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The tool ran and exited nonzero.
    #[error(transparent)]
    Failure(#[from] ProcessFailure),

    /// The backend could not run the tool at all.
    #[error("could not execute '{description}': {message}")]
    Execution { description: String, message: String },
}

/// Out-of-scope execution backend for external tools.
///
/// Call sites pick the contract they need: [`run`](Self::run) turns a
/// nonzero exit into [`ProcessFailure`], [`run_fallible`](Self::run_fallible)
/// hands the exit code back as data.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run_fallible(&self, process: Process) -> Result<FallibleProcessResult, ProcessError>;

    async fn run(&self, process: Process) -> Result<ProcessResult, ProcessError> {
        let description = process.description.clone();
        let result = self.run_fallible(process).await?;
        if result.exit_code != 0 {
            return Err(ProcessFailure {
                description,
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            }
            .into());
        }
        Ok(ProcessResult {
            stdout: result.stdout,
            stderr: result.stderr,
            output_digest: result.output_digest,
        })
    }
}
