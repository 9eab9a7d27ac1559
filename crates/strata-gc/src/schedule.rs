use std::time::Instant;

use tracing::{error, info};

use crate::config::GcIntervals;
use crate::maintenance::StoreMaintenance;

/// Which passes a tick ran. A pass that ran and failed still counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub collected: bool,
    pub leases_extended: bool,
    pub failures: u32,
}

/// Absolute deadlines for the next GC and lease-extension passes.
#[derive(Clone, Debug)]
pub struct GcSchedule {
    intervals: GcIntervals,
    next_gc: Instant,
    next_lease_extension: Instant,
}

impl GcSchedule {
    /// Both deadlines start one interval after `start`.
    pub fn new(start: Instant, intervals: GcIntervals) -> Self {
        Self {
            intervals,
            next_gc: start + intervals.gc,
            next_lease_extension: start + intervals.lease_extension,
        }
    }

    pub fn intervals(&self) -> &GcIntervals {
        &self.intervals
    }

    pub fn next_gc(&self) -> Instant {
        self.next_gc
    }

    pub fn next_lease_extension(&self) -> Instant {
        self.next_lease_extension
    }

    /// Run whichever passes are due at `now`: garbage collection first,
    /// then lease extension. A failed pass is logged and its deadline moves
    /// on as if it had succeeded.
    pub fn tick(&mut self, now: Instant, target: &dyn StoreMaintenance) -> TickReport {
        let mut report = TickReport::default();

        if now >= self.next_gc {
            info!("garbage collecting store");
            match target.collect_garbage() {
                Ok(()) => info!("done garbage collecting store"),
                Err(e) => {
                    error!(error = %e, "store garbage collection failed");
                    report.failures += 1;
                }
            }
            self.next_gc = now + self.intervals.gc;
            report.collected = true;
        }

        if now >= self.next_lease_extension {
            info!("extending leases");
            match target.extend_leases() {
                Ok(()) => info!("done extending leases"),
                Err(e) => {
                    error!(error = %e, "lease extension failed");
                    report.failures += 1;
                }
            }
            self.next_lease_extension = now + self.intervals.lease_extension;
            report.leases_extended = true;
        }

        report
    }
}
