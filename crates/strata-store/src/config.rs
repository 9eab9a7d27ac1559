use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for an object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Lease granted to every object at write time, in seconds.
    pub initial_lease_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_lease_secs: 2 * 60 * 60,
        }
    }
}

impl StoreConfig {
    pub fn initial_lease(&self) -> Duration {
        Duration::from_secs(self.initial_lease_secs)
    }
}
