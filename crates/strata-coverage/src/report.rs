use std::sync::Arc;

use strata_engine::{Process, ProcessRunner};
use strata_store::{DigestAlgebra, StoreError, Workspace};
use strata_types::{Digest, RelPath};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::aggregate::{MergedCoverageData, DATA_FILE};
use crate::config::CoverageConfig;
use crate::error::{CoverageError, CoverageResult};
use crate::settings::{CoverageReportType, CoverageSettings, CoverageTool};

/// A report whose files are written under the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilesystemCoverageReport {
    pub report_type: CoverageReportType,
    pub result_digest: Digest,
    pub directory_to_materialize_to: RelPath,
    /// The file a user should open, relative to the build root.
    pub report_file: RelPath,
}

impl FilesystemCoverageReport {
    /// Write the report's files under its output directory.
    pub fn materialize(
        &self,
        algebra: &dyn DigestAlgebra,
        workspace: &dyn Workspace,
    ) -> CoverageResult<&RelPath> {
        let placed = algebra.add_prefix(&self.result_digest, &self.directory_to_materialize_to)?;
        workspace.write_digest(&placed)?;
        info!(report = %self.report_type, file = %self.report_file, "coverage report written");
        Ok(&self.report_file)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoverageReport {
    /// Text meant for the console.
    Console(String),
    Filesystem(FilesystemCoverageReport),
}

impl CoverageReport {
    pub fn report_type(&self) -> CoverageReportType {
        match self {
            Self::Console(_) => CoverageReportType::Console,
            Self::Filesystem(report) => report.report_type,
        }
    }
}

/// Produce every configured report from the merged data.
///
/// Raw reports are the merged data file itself and come first. The other
/// reports each run the tool concurrently against the merged data, the
/// config, the tool and `sources`, and follow in configured order.
pub async fn generate_coverage_reports(
    algebra: &dyn DigestAlgebra,
    runner: Arc<dyn ProcessRunner>,
    tool: &CoverageTool,
    config: &CoverageConfig,
    merged: &MergedCoverageData,
    sources: Digest,
    settings: &CoverageSettings,
) -> CoverageResult<Vec<CoverageReport>> {
    let output_dir = &settings.output_dir;
    let input_digest = algebra.merge(&[merged.digest, config.digest, tool.digest, sources])?;

    let mut reports = Vec::with_capacity(settings.reports.len());
    let mut join_set = JoinSet::new();
    let mut pending = 0;
    for report_type in &settings.reports {
        if *report_type == CoverageReportType::Raw {
            reports.push(CoverageReport::Filesystem(FilesystemCoverageReport {
                report_type: CoverageReportType::Raw,
                result_digest: merged.digest,
                directory_to_materialize_to: output_dir.clone(),
                report_file: output_dir.join(&rel(DATA_FILE)?),
            }));
            continue;
        }

        let mut args = vec![report_type.report_name().to_string(), "--ignore-errors".into()];
        args.extend(settings.include_arg());
        let mut process = Process::new(
            tool.argv(args),
            input_digest,
            format!("Generate {} coverage report.", report_type.report_name()),
        );
        match report_type {
            CoverageReportType::Html => {
                process = process.with_output_directories(vec![rel("htmlcov")?]);
            }
            CoverageReportType::Xml => {
                process = process.with_output_files(vec![rel("coverage.xml")?]);
            }
            _ => {}
        }

        let idx = pending;
        pending += 1;
        let runner = Arc::clone(&runner);
        let report_type = *report_type;
        join_set.spawn(async move {
            runner
                .run(process)
                .await
                .map(|result| (idx, report_type, result))
        });
    }

    let mut ordered = vec![None; pending];
    while let Some(joined) = join_set.join_next().await {
        let (idx, report_type, result) =
            joined.map_err(|e| CoverageError::Join(e.to_string()))??;
        let report = match report_type {
            CoverageReportType::Console => {
                CoverageReport::Console(String::from_utf8_lossy(&result.stdout).into_owned())
            }
            _ => CoverageReport::Filesystem(FilesystemCoverageReport {
                report_type,
                result_digest: result.output_digest,
                directory_to_materialize_to: output_dir.clone(),
                report_file: output_dir.join(&report_file(report_type)?),
            }),
        };
        debug!(report = %report_type, "coverage report generated");
        ordered[idx] = Some(report);
    }
    reports.extend(ordered.into_iter().flatten());
    Ok(reports)
}

fn report_file(report_type: CoverageReportType) -> CoverageResult<RelPath> {
    match report_type {
        CoverageReportType::Html => rel("htmlcov/index.html"),
        CoverageReportType::Xml => rel("coverage.xml"),
        CoverageReportType::Raw => rel(DATA_FILE),
        CoverageReportType::Console => Ok(RelPath::root()),
    }
}

fn rel(path: &str) -> CoverageResult<RelPath> {
    Ok(RelPath::new(path).map_err(StoreError::from)?)
}
