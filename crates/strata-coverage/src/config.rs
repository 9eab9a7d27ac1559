use strata_store::{DigestAlgebra, FileContent, StoreError};
use strata_types::{Digest, RelPath};
use tracing::debug;

use crate::error::{CoverageError, CoverageResult};
use crate::ini::IniDocument;

pub const CONFIG_FILE: &str = ".coveragerc";
const TEST_RUNNER_OMIT: &str = "test_runner.pex/*";

/// A digest holding a single validated `.coveragerc`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageConfig {
    pub digest: Digest,
}

/// Build the `.coveragerc` used for every coverage run.
///
/// `user_config` is the path and contents of the user's config file, if
/// any. The `[run]` section must keep `relative_files` true (it defaults to
/// true) and always omits the test runner itself.
pub fn create_coverage_config(
    algebra: &dyn DigestAlgebra,
    user_config: Option<(&str, &str)>,
) -> CoverageResult<CoverageConfig> {
    let path = user_config.map(|(path, _)| path.to_string());
    let mut doc = match user_config {
        Some((_, contents)) => {
            IniDocument::parse(contents).map_err(|e| CoverageError::Configuration {
                path: path.clone(),
                reason: e.to_string(),
            })?
        }
        None => IniDocument::default(),
    };
    validate_and_update(&mut doc, path)?;

    let path = RelPath::new(CONFIG_FILE).map_err(StoreError::from)?;
    let file = FileContent::new(path, doc.to_string());
    let digest = algebra.create_digest(vec![file])?;
    debug!(digest = %digest, "coverage config created");
    Ok(CoverageConfig { digest })
}

fn validate_and_update(doc: &mut IniDocument, path: Option<String>) -> CoverageResult<()> {
    let run = doc.section_mut("run");
    let relative_files = run.get("relative_files").unwrap_or("True");
    if relative_files.to_lowercase() != "true" {
        return Err(CoverageError::Configuration {
            path,
            reason: "relative_files under the 'run' section must be set to True".into(),
        });
    }
    run.set("relative_files", "True");

    let mut omit: Vec<String> = run
        .get("omit")
        .unwrap_or("")
        .split('\n')
        .map(str::to_string)
        .collect();
    if !omit.iter().any(|entry| entry == TEST_RUNNER_OMIT) {
        omit.push(TEST_RUNNER_OMIT.to_string());
    }
    run.set("omit", omit.join("\n"));
    Ok(())
}
