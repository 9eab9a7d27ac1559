use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use strata_store::Clock;
use tracing::{debug, info};

use crate::config::GcIntervals;
use crate::error::{GcError, GcResult};
use crate::maintenance::StoreMaintenance;
use crate::schedule::GcSchedule;

const THREAD_NAME: &str = "strata-store-gc";

/// Lifecycle of the GC worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    /// A pause was requested; the worker has not parked yet.
    Pausing,
    Paused,
    Terminating,
}

/// Counters for passes the worker has run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub ticks: u64,
    pub gc_passes: u64,
    pub lease_passes: u64,
    pub failures: u64,
}

struct Shared {
    state: Mutex<ServiceState>,
    changed: Condvar,
    stats: Mutex<GcStats>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().expect("lock poisoned")
    }

    fn set_state(&self, state: ServiceState) {
        *self.lock_state() = state;
        self.changed.notify_all();
    }
}

/// Marks the service as terminating when the worker exits, including by
/// panic, so that callers blocked in [`StoreGcService::pause`] wake up.
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.state.lock() {
            *state = ServiceState::Terminating;
        }
        self.0.changed.notify_all();
    }
}

/// Keeps the live graph leased and periodically collects garbage on a
/// dedicated thread.
pub struct StoreGcService {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl StoreGcService {
    /// Spawn the worker. Both deadlines start one interval from now.
    pub fn start(
        intervals: GcIntervals,
        target: Arc<dyn StoreMaintenance>,
        clock: Arc<dyn Clock>,
    ) -> GcResult<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(ServiceState::Running),
            changed: Condvar::new(),
            stats: Mutex::new(GcStats::default()),
        });
        let schedule = GcSchedule::new(clock.now(), intervals);

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run(worker, schedule, target, clock))
            .map_err(GcError::Spawn)?;

        info!(
            period_ms = saturating_millis(intervals.period),
            lease_extension_secs = intervals.lease_extension.as_secs(),
            gc_secs = intervals.gc.as_secs(),
            "store gc service started"
        );
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> ServiceState {
        *self.shared.lock_state()
    }

    pub fn stats(&self) -> GcStats {
        *self.shared.stats.lock().expect("lock poisoned")
    }

    /// Ask the worker to park at its next idle wait, and block until it has.
    pub fn pause(&self) {
        let mut state = self.shared.lock_state();
        if *state == ServiceState::Running {
            *state = ServiceState::Pausing;
            self.shared.changed.notify_all();
        }
        while *state == ServiceState::Pausing {
            state = self.shared.changed.wait(state).expect("lock poisoned");
        }
    }

    pub fn resume(&self) {
        let mut state = self.shared.lock_state();
        if matches!(*state, ServiceState::Paused | ServiceState::Pausing) {
            *state = ServiceState::Running;
            self.shared.changed.notify_all();
        }
    }

    /// Ask the worker to exit. It notices at its next idle wait.
    pub fn terminate(&self) {
        self.shared.set_state(ServiceState::Terminating);
    }

    /// Wait for the worker to exit. Call [`terminate`](Self::terminate)
    /// first or this blocks forever.
    pub fn join(mut self) -> GcResult<()> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> GcResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| GcError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for StoreGcService {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.terminate();
            let _ = self.join_worker();
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn run(
    shared: Arc<Shared>,
    mut schedule: GcSchedule,
    target: Arc<dyn StoreMaintenance>,
    clock: Arc<dyn Clock>,
) {
    let _guard = ExitGuard(Arc::clone(&shared));
    let period = schedule.intervals().period;

    loop {
        let report = schedule.tick(clock.now(), target.as_ref());
        {
            let mut stats = shared.stats.lock().expect("lock poisoned");
            stats.ticks += 1;
            stats.gc_passes += u64::from(report.collected);
            stats.lease_passes += u64::from(report.leases_extended);
            stats.failures += u64::from(report.failures);
        }

        let mut state = shared.lock_state();
        if *state == ServiceState::Running {
            state = shared
                .changed
                .wait_timeout(state, period)
                .expect("lock poisoned")
                .0;
        }
        loop {
            match *state {
                ServiceState::Running => break,
                ServiceState::Pausing => {
                    debug!("store gc service paused");
                    *state = ServiceState::Paused;
                    shared.changed.notify_all();
                }
                ServiceState::Paused => {
                    state = shared.changed.wait(state).expect("lock poisoned");
                }
                ServiceState::Terminating => {
                    info!("store gc service terminating");
                    return;
                }
            }
        }
    }
}
