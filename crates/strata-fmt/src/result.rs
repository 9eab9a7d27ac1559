use strata_engine::{FallibleProcessResult, ProcessResult};
use strata_store::empty_digest;
use strata_types::Digest;

/// What a single formatter did to its input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmtResult {
    pub input: Digest,
    pub output: Digest,
    pub stdout: String,
    pub stderr: String,
    pub formatter_name: String,
}

impl FmtResult {
    /// The result of a formatter that did not run.
    pub fn noop() -> Self {
        Self {
            input: empty_digest(),
            output: empty_digest(),
            stdout: String::new(),
            stderr: String::new(),
            formatter_name: String::new(),
        }
    }

    pub fn from_process_result(
        result: ProcessResult,
        original_digest: Digest,
        formatter_name: impl Into<String>,
    ) -> Self {
        Self {
            input: original_digest,
            output: result.output_digest,
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            formatter_name: formatter_name.into(),
        }
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::noop()
    }

    pub fn did_change(&self) -> bool {
        self.input != self.output
    }
}

/// The results of every formatter in one language, in the order they ran.
///
/// `input` and `output` cover all of the language's files, including the
/// ones no formatter touched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageFmtResults {
    pub results: Vec<FmtResult>,
    pub input: Digest,
    pub output: Digest,
}

impl LanguageFmtResults {
    pub fn did_change(&self) -> bool {
        self.input != self.output
    }
}

/// A check-only run of a formatter. A nonzero exit code is data, not an
/// error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LintResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub linter_name: String,
}

impl LintResult {
    pub fn from_fallible_process_result(
        result: FallibleProcessResult,
        linter_name: impl Into<String>,
    ) -> Self {
        Self {
            exit_code: result.exit_code,
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            linter_name: linter_name.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
