use std::sync::{Arc, Mutex, Weak};

use strata_engine::Session;
use strata_store::{Clock, InMemoryObjectStore};
use tracing::{debug, info};

use crate::error::GcResult;

/// The two store operations the GC service drives.
pub trait StoreMaintenance: Send + Sync {
    /// Keep everything the live graph references alive until at least the
    /// next extension.
    fn extend_leases(&self) -> GcResult<()>;

    /// Reclaim content that is no longer leased.
    fn collect_garbage(&self) -> GcResult<()>;
}

impl StoreMaintenance for Session {
    fn extend_leases(&self) -> GcResult<()> {
        let store = self.store();
        let until = store.clock().now() + store.config().initial_lease();
        Session::extend_leases(self, until)?;
        Ok(())
    }

    fn collect_garbage(&self) -> GcResult<()> {
        let summary = self.store().garbage_collect()?;
        info!(
            session_id = %self.id(),
            reclaimed = summary.reclaimed,
            reclaimed_bytes = summary.reclaimed_bytes,
            "store garbage collected"
        );
        Ok(())
    }
}

/// The sessions of runs still in progress.
///
/// Each run gets its own [`Session`] from [`begin`](Self::begin). Leases are
/// extended only for what live sessions produced; once a run drops its
/// session, that output ages out like any other unleased content.
pub struct LiveSessions {
    store: Arc<InMemoryObjectStore>,
    sessions: Mutex<Vec<Weak<Session>>>,
}

impl LiveSessions {
    pub fn new(store: Arc<InMemoryObjectStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryObjectStore> {
        &self.store
    }

    /// Start a run.
    pub fn begin(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(Arc::clone(&self.store)));
        let mut sessions = self.sessions.lock().expect("lock poisoned");
        sessions.retain(|s| s.strong_count() > 0);
        sessions.push(Arc::downgrade(&session));
        session
    }

    /// Sessions still held by a run.
    pub fn active(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.lock().expect("lock poisoned");
        sessions.retain(|s| s.strong_count() > 0);
        sessions.iter().filter_map(Weak::upgrade).collect()
    }
}

impl StoreMaintenance for LiveSessions {
    fn extend_leases(&self) -> GcResult<()> {
        let until = self.store.clock().now() + self.store.config().initial_lease();
        let active = self.active();
        for session in &active {
            session.extend_leases(until)?;
        }
        debug!(sessions = active.len(), "live sessions leased");
        Ok(())
    }

    fn collect_garbage(&self) -> GcResult<()> {
        let summary = self.store.garbage_collect()?;
        info!(
            sessions = self.active().len(),
            reclaimed = summary.reclaimed,
            reclaimed_bytes = summary.reclaimed_bytes,
            "store garbage collected"
        );
        Ok(())
    }
}

impl std::fmt::Debug for LiveSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSessions")
            .field("active", &self.active().len())
            .finish_non_exhaustive()
    }
}
