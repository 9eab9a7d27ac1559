use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_coverage::CoverageSettings;
use strata_fmt::FmtConfig;
use strata_gc::GcConfig;
use strata_source::SourceRoot;
use strata_store::StoreConfig;

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "strata.toml";

/// Source-root layout of the repository.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Registered roots; `"."` marks the repository root itself.
    pub roots: Vec<SourceRoot>,
}

/// Everything a [`Strata`](crate::Strata) instance is configured with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub store: StoreConfig,
    pub source: SourceConfig,
    pub fmt: FmtConfig,
    pub coverage: CoverageSettings,
    pub gc: GcConfig,
}

impl StrataConfig {
    /// Load `<root>/strata.toml`.
    pub fn from_dir(root: &Path) -> Result<Self, ConfigError> {
        Self::from_file(&root.join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("gc.period_secs", self.gc.period_secs),
            ("gc.lease_extension_interval_secs", self.gc.lease_extension_interval_secs),
            ("gc.gc_interval_secs", self.gc.gc_interval_secs),
            ("store.initial_lease_secs", self.store.initial_lease_secs),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        // Leases must outlive the gap between two extension passes.
        if self.store.initial_lease_secs <= self.gc.lease_extension_interval_secs {
            return Err(ConfigError::Invalid {
                field: "store.initial_lease_secs",
                reason: format!(
                    "must exceed gc.lease_extension_interval_secs ({})",
                    self.gc.lease_extension_interval_secs
                ),
            });
        }
        if self.coverage.output_dir.is_root() {
            return Err(ConfigError::Invalid {
                field: "coverage.output_dir",
                reason: "must not be the build root".into(),
            });
        }
        Ok(())
    }
}
