use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use strata_store::{
    empty_digest, DigestAlgebra, FileContent, InMemoryObjectStore, ObjectStore, Snapshot,
    StoreResult,
};
use strata_types::{Digest, RelPath};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum MemoKey {
    Merge(Vec<Digest>),
    Subset(Digest, Vec<RelPath>),
    AddPrefix(Digest, RelPath),
    RemovePrefix(Digest, RelPath),
}

/// Cache hit/miss counters for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
}

/// The state of one build run.
///
/// Algebra calls made through a session are memoized by operation and
/// inputs, and every digest the session hands out joins its live set.
/// Failed operations are never cached.
pub struct Session {
    id: Uuid,
    store: Arc<InMemoryObjectStore>,
    memo: Mutex<HashMap<MemoKey, Digest>>,
    live: Mutex<BTreeSet<Digest>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Session {
    pub fn new(store: Arc<InMemoryObjectStore>) -> Self {
        let id = Uuid::now_v7();
        debug!(session_id = %id, "session created");
        Self {
            id,
            store,
            memo: Mutex::new(HashMap::new()),
            live: Mutex::new(BTreeSet::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Arc<InMemoryObjectStore> {
        &self.store
    }

    /// Digests produced during this session, sorted.
    pub fn live_digests(&self) -> Vec<Digest> {
        self.live
            .lock()
            .expect("lock poisoned")
            .iter()
            .copied()
            .collect()
    }

    pub fn memo_stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Lease the live graph until `until`. Returns the number of objects
    /// whose lease was touched.
    pub fn extend_leases(&self, until: Instant) -> StoreResult<usize> {
        let roots = self.live_digests();
        let leased = self.store.lease(&roots, until)?;
        debug!(session_id = %self.id, roots = roots.len(), leased, "session leases extended");
        Ok(leased)
    }

    fn record(&self, digest: Digest) -> Digest {
        if digest != empty_digest() {
            self.live.lock().expect("lock poisoned").insert(digest);
        }
        digest
    }

    fn memoized(
        &self,
        key: MemoKey,
        compute: impl FnOnce() -> StoreResult<Digest>,
    ) -> StoreResult<Digest> {
        let cached = self.memo.lock().expect("lock poisoned").get(&key).copied();
        // An entry is only reusable while its tree is still in the store. A
        // failed lookup counts as a miss.
        if let Some(digest) = cached.filter(|d| matches!(self.store.exists(d), Ok(true))) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(digest);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let digest = compute()?;
        self.memo.lock().expect("lock poisoned").insert(key, digest);
        Ok(self.record(digest))
    }
}

impl DigestAlgebra for Session {
    fn create_digest(&self, files: Vec<FileContent>) -> StoreResult<Digest> {
        let digest = self.store.create_digest(files)?;
        Ok(self.record(digest))
    }

    fn merge(&self, digests: &[Digest]) -> StoreResult<Digest> {
        // Merge is commutative, so order and duplicates do not change the key.
        let mut key: Vec<Digest> = digests.to_vec();
        key.sort();
        key.dedup();
        self.memoized(MemoKey::Merge(key), || self.store.merge(digests))
    }

    fn subset(&self, digest: &Digest, paths: &[RelPath]) -> StoreResult<Digest> {
        let mut key: Vec<RelPath> = paths.to_vec();
        key.sort();
        key.dedup();
        self.memoized(MemoKey::Subset(*digest, key), || {
            self.store.subset(digest, paths)
        })
    }

    fn add_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
        self.memoized(MemoKey::AddPrefix(*digest, prefix.clone()), || {
            self.store.add_prefix(digest, prefix)
        })
    }

    fn remove_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
        self.memoized(MemoKey::RemovePrefix(*digest, prefix.clone()), || {
            self.store.remove_prefix(digest, prefix)
        })
    }

    fn snapshot(&self, digest: &Digest) -> StoreResult<Snapshot> {
        self.store.snapshot(digest)
    }

    fn contents(&self, digest: &Digest) -> StoreResult<Vec<FileContent>> {
        self.store.contents(digest)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("live", &self.live.lock().expect("lock poisoned").len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strata_store::{Clock, ManualClock, StoreConfig, StoreError};

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    fn session_with_clock() -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryObjectStore::with_clock(
            StoreConfig::default(),
            clock.clone(),
        ));
        (Session::new(store), clock)
    }

    fn tree(session: &Session, files: &[(&str, &str)]) -> Digest {
        session
            .create_digest(
                files
                    .iter()
                    .map(|(path, body)| FileContent::new(p(path), body.as_bytes()))
                    .collect(),
            )
            .unwrap()
    }

    #[test]
    fn repeated_operations_hit_the_memo() {
        let (session, _) = session_with_clock();
        let a = tree(&session, &[("src/a.py", "a")]);
        let first = session.remove_prefix(&a, &p("src")).unwrap();
        let second = session.remove_prefix(&a, &p("src")).unwrap();
        assert_eq!(first, second);
        assert_eq!(session.memo_stats(), MemoStats { hits: 1, misses: 1 });
    }

    #[test]
    fn merge_memo_ignores_input_order() {
        let (session, _) = session_with_clock();
        let a = tree(&session, &[("a.txt", "a")]);
        let b = tree(&session, &[("b.txt", "b")]);
        let ab = session.merge(&[a, b]).unwrap();
        let ba = session.merge(&[b, a, a]).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(session.memo_stats().hits, 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let (session, _) = session_with_clock();
        let a = tree(&session, &[("a.txt", "a")]);
        for _ in 0..2 {
            let err = session.subset(&a, &[p("missing")]).unwrap_err();
            assert!(matches!(err, StoreError::PathNotFound { .. }));
        }
        assert_eq!(session.memo_stats(), MemoStats { hits: 0, misses: 2 });
    }

    #[test]
    fn produced_digests_join_the_live_set() {
        let (session, _) = session_with_clock();
        let a = tree(&session, &[("src/a.py", "a")]);
        let stripped = session.remove_prefix(&a, &p("src")).unwrap();
        let live = session.live_digests();
        assert!(live.contains(&a));
        assert!(live.contains(&stripped));
        assert!(!live.contains(&empty_digest()));
    }

    #[test]
    fn extended_leases_keep_live_content_through_gc() {
        let (session, clock) = session_with_clock();
        let a = tree(&session, &[("keep.txt", "keep")]);
        // Written directly to the store, outside the session.
        let orphan = session
            .store()
            .create_digest(vec![FileContent::new(p("drop.txt"), "drop")])
            .unwrap();

        clock.advance(Duration::from_secs(3600));
        session
            .extend_leases(clock.now() + Duration::from_secs(4 * 3600))
            .unwrap();
        clock.advance(Duration::from_secs(3 * 3600));
        session.store().garbage_collect().unwrap();

        assert!(session.store().exists(&a).unwrap());
        assert!(!session.store().exists(&orphan).unwrap());
    }

    #[test]
    fn memo_entry_for_collected_tree_is_recomputed() {
        let (session, clock) = session_with_clock();
        let a = tree(&session, &[("x.txt", "x")]);
        let nested = session.add_prefix(&a, &p("dir")).unwrap();

        clock.advance(Duration::from_secs(3 * 3600));
        session.store().garbage_collect().unwrap();
        assert!(!session.store().exists(&nested).unwrap());

        let a = tree(&session, &[("x.txt", "x")]);
        let again = session.add_prefix(&a, &p("dir")).unwrap();
        assert_eq!(again, nested);
        assert!(session.store().exists(&again).unwrap());
        assert_eq!(session.memo_stats(), MemoStats { hits: 0, misses: 2 });
    }
}
