use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_types::{Digest, RelPath};

pub const DEFAULT_OUTPUT_DIR: &str = "dist/coverage/python";

/// Which coverage report to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageReportType {
    /// The merged `.coverage` data file itself.
    Raw,
    Console,
    Html,
    Xml,
}

impl CoverageReportType {
    /// The coverage tool subcommand that produces this report.
    pub fn report_name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Console => "report",
            Self::Html => "html",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for CoverageReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.report_name())
    }
}

/// Options for coverage collection and reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageSettings {
    pub reports: Vec<CoverageReportType>,
    /// Relative to the build root.
    pub output_dir: RelPath,
    /// Path to a user `.coveragerc`.
    pub config: Option<PathBuf>,
    /// Modules to restrict the report to. Empty means everything the tests
    /// reached.
    pub filter: Vec<String>,
}

impl Default for CoverageSettings {
    fn default() -> Self {
        Self {
            reports: vec![CoverageReportType::Console],
            output_dir: RelPath::new(DEFAULT_OUTPUT_DIR).unwrap_or_default(),
            config: None,
            filter: Vec::new(),
        }
    }
}

impl CoverageSettings {
    /// The `--include` option that limits reports to the filtered modules,
    /// or `None` without a filter. A module covers its submodules too.
    pub fn include_arg(&self) -> Option<String> {
        if self.filter.is_empty() {
            return None;
        }
        let patterns: Vec<String> = self
            .filter
            .iter()
            .flat_map(|module| {
                let path = module.replace('.', "/");
                [format!("{path}.py"), format!("{path}/*")]
            })
            .collect();
        Some(format!("--include={}", patterns.join(",")))
    }
}

/// The coverage tool: its files and the command that runs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverageTool {
    pub digest: Digest,
    pub entry_point: Vec<String>,
}

impl CoverageTool {
    pub fn new(digest: Digest, entry_point: Vec<String>) -> Self {
        Self {
            digest,
            entry_point,
        }
    }

    pub(crate) fn argv<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry_point
            .iter()
            .cloned()
            .chain(args.into_iter().map(Into::into))
            .collect()
    }
}
