use serde::{Deserialize, Serialize};

/// Options for the format goal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FmtConfig {
    /// Run every target as its own batch instead of one batch per language.
    /// More cache hits, more tool start-up overhead.
    pub per_target_caching: bool,
}

/// Per-tool options for a process-backed formatter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterSettings {
    /// Do not run the tool at all.
    pub skip: bool,
    /// Extra arguments passed before the file list.
    pub args: Vec<String>,
}
