use serde::{Deserialize, Serialize};
use strata_engine::{Process, ProcessRunner};
use strata_store::{empty_digest, DigestAlgebra, StoreError};
use strata_types::{Address, Digest, RelPath};
use tracing::info;

use crate::error::CoverageResult;
use crate::settings::CoverageTool;

pub const DATA_FILE: &str = ".coverage";

/// The `.coverage` file produced by one test run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageData {
    pub address: Address,
    pub digest: Digest,
}

/// A single `.coverage` file covering every test run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergedCoverageData {
    pub digest: Digest,
}

/// Combine per-test coverage data into one data file.
///
/// A single datum is returned as is. Otherwise every datum is nested under
/// its address's path-safe spec and the tool's `combine` runs over all of
/// them.
pub async fn merge_coverage_data(
    algebra: &dyn DigestAlgebra,
    runner: &dyn ProcessRunner,
    tool: &CoverageTool,
    data: &[CoverageData],
) -> CoverageResult<MergedCoverageData> {
    match data {
        [] => {
            return Ok(MergedCoverageData {
                digest: empty_digest(),
            })
        }
        [only] => return Ok(MergedCoverageData { digest: only.digest }),
        _ => {}
    }

    let mut inputs = Vec::with_capacity(data.len() + 1);
    let mut data_files = Vec::with_capacity(data.len());
    for datum in data {
        let prefix = RelPath::new(datum.address.path_safe_spec()).map_err(StoreError::from)?;
        inputs.push(algebra.add_prefix(&datum.digest, &prefix)?);
        data_files.push(format!("{prefix}/{DATA_FILE}"));
    }
    inputs.push(tool.digest);
    data_files.sort();
    let input_digest = algebra.merge(&inputs)?;

    let process = Process::new(
        tool.argv(std::iter::once("combine".to_string()).chain(data_files)),
        input_digest,
        format!("Merge {} coverage reports.", data.len()),
    )
    .with_output_files(vec![RelPath::new(DATA_FILE).map_err(StoreError::from)?]);
    let result = runner.run(process).await?;

    info!(reports = data.len(), digest = %result.output_digest, "coverage data merged");
    Ok(MergedCoverageData {
        digest: result.output_digest,
    })
}
