use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_types::{Address, RelPath};

/// A buildable unit: an address, the set of field names it declares and
/// the source files it owns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    pub address: Address,
    pub fields: BTreeSet<String>,
    pub sources: Vec<RelPath>,
}

impl Target {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            fields: BTreeSet::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into());
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = RelPath>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn has_fields<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        fields.iter().all(|f| self.has_field(f.as_ref()))
    }
}
