use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing of the store GC service, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// How often the worker wakes to check its deadlines.
    pub period_secs: u64,
    pub lease_extension_interval_secs: u64,
    pub gc_interval_secs: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            period_secs: 10,
            lease_extension_interval_secs: 30 * 60,
            gc_interval_secs: 4 * 60 * 60,
        }
    }
}

impl GcConfig {
    pub fn intervals(&self) -> GcIntervals {
        GcIntervals {
            period: Duration::from_secs(self.period_secs),
            lease_extension: Duration::from_secs(self.lease_extension_interval_secs),
            gc: Duration::from_secs(self.gc_interval_secs),
        }
    }
}

/// Resolved service timings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcIntervals {
    pub period: Duration,
    pub lease_extension: Duration,
    pub gc: Duration,
}

impl Default for GcIntervals {
    fn default() -> Self {
        GcConfig::default().intervals()
    }
}
