use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use strata_types::Digest;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::{empty_digest, ObjectKind, StoredObject, Tree};
use crate::traits::ObjectStore;

/// Outcome of one garbage-collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcSummary {
    pub scanned: usize,
    pub reclaimed: usize,
    pub reclaimed_bytes: u64,
    pub expired_leases: usize,
}

/// In-memory, HashMap-based object store with a lease table.
///
/// Objects live behind a `RwLock` for safe concurrent access. Every write
/// leases the object for [`StoreConfig::initial_lease`]; [`lease`] extends
/// leases over whole trees, and [`garbage_collect`] removes everything not
/// reachable from an unexpired lease.
///
/// Lock order is always `leases` before `objects`.
///
/// [`lease`]: InMemoryObjectStore::lease
/// [`garbage_collect`]: InMemoryObjectStore::garbage_collect
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Digest, StoredObject>>,
    leases: RwLock<HashMap<Digest, Instant>>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl InMemoryObjectStore {
    /// Create a new empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(StoreConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            leases: RwLock::new(HashMap::new()),
            clock,
            config,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(StoredObject::size)
            .sum()
    }

    /// Number of leases currently recorded, expired or not.
    pub fn lease_count(&self) -> usize {
        self.leases.read().expect("lock poisoned").len()
    }

    /// The expiry of the lease on `digest`, if any.
    pub fn lease_expiry(&self, digest: &Digest) -> Option<Instant> {
        self.leases
            .read()
            .expect("lock poisoned")
            .get(digest)
            .copied()
    }

    /// Lease every root and everything reachable from it until `until`.
    ///
    /// Leases are only ever extended, never shortened. Roots that are no
    /// longer in the store are skipped. Returns the number of objects leased.
    pub fn lease(&self, roots: &[Digest], until: Instant) -> StoreResult<usize> {
        let mut leases = self.leases.write().expect("lock poisoned");
        let objects = self.objects.read().expect("lock poisoned");

        let mut reachable = HashSet::new();
        for root in roots {
            if *root == empty_digest() {
                continue;
            }
            if !objects.contains_key(root) {
                warn!(digest = %root, "skipping lease for missing object");
                continue;
            }
            mark_reachable(&objects, *root, &mut reachable)?;
        }

        for digest in &reachable {
            leases
                .entry(*digest)
                .and_modify(|expiry| *expiry = (*expiry).max(until))
                .or_insert(until);
        }
        debug!(roots = roots.len(), leased = reachable.len(), "extended leases");
        Ok(reachable.len())
    }

    /// Mark-and-sweep collection of everything not reachable from an
    /// unexpired lease. Expired leases are dropped first.
    pub fn garbage_collect(&self) -> StoreResult<GcSummary> {
        let now = self.clock.now();
        let mut leases = self.leases.write().expect("lock poisoned");
        let mut objects = self.objects.write().expect("lock poisoned");

        let before = leases.len();
        leases.retain(|_, expiry| *expiry > now);
        let expired_leases = before - leases.len();

        let mut live = HashSet::new();
        for root in leases.keys() {
            if objects.contains_key(root) {
                mark_reachable(&objects, *root, &mut live)?;
            }
        }

        let mut summary = GcSummary {
            scanned: objects.len(),
            expired_leases,
            ..GcSummary::default()
        };
        objects.retain(|digest, obj| {
            if live.contains(digest) {
                return true;
            }
            summary.reclaimed += 1;
            summary.reclaimed_bytes += obj.size();
            false
        });

        debug!(
            scanned = summary.scanned,
            reclaimed = summary.reclaimed,
            reclaimed_bytes = summary.reclaimed_bytes,
            expired_leases = summary.expired_leases,
            "store gc sweep complete"
        );
        Ok(summary)
    }

    /// Return a sorted list of all digests in the store.
    pub fn all_digests(&self) -> Vec<Digest> {
        let map = self.objects.read().expect("lock poisoned");
        let mut digests: Vec<Digest> = map.keys().copied().collect();
        digests.sort();
        digests
    }
}

/// Collect `root` and every object reachable from it into `seen`.
fn mark_reachable(
    objects: &HashMap<Digest, StoredObject>,
    root: Digest,
    seen: &mut HashSet<Digest>,
) -> StoreResult<()> {
    let mut stack = vec![root];
    while let Some(digest) = stack.pop() {
        if !seen.insert(digest) {
            continue;
        }
        let Some(obj) = objects.get(&digest) else {
            continue;
        };
        if obj.kind == ObjectKind::Tree {
            let tree = Tree::from_stored_object(obj)?;
            stack.extend(tree.entries.iter().map(|e| e.digest));
        }
    }
    Ok(())
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, digest: &Digest) -> StoreResult<Option<StoredObject>> {
        if *digest == empty_digest() {
            return Ok(Some(Tree::empty().to_stored_object()?));
        }
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(digest).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<Digest> {
        let digest = object.compute_digest();
        let until = self.clock.now() + self.config.initial_lease();
        let mut leases = self.leases.write().expect("lock poisoned");
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(digest).or_insert_with(|| object.clone());
        leases
            .entry(digest)
            .and_modify(|expiry| *expiry = (*expiry).max(until))
            .or_insert(until);
        Ok(digest)
    }

    fn exists(&self, digest: &Digest) -> StoreResult<bool> {
        if *digest == empty_digest() {
            return Ok(true);
        }
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(digest))
    }

    fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        let mut leases = self.leases.write().expect("lock poisoned");
        let mut map = self.objects.write().expect("lock poisoned");
        leases.remove(digest);
        Ok(map.remove(digest).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("lease_count", &self.lease_count())
            .finish()
    }
}

/// Read and decode a tree, treating a missing object as an error.
pub(crate) fn load_tree(store: &dyn ObjectStore, digest: &Digest) -> StoreResult<Tree> {
    let stored = store
        .read(digest)?
        .ok_or(StoreError::ObjectNotFound(*digest))?;
    Tree::from_stored_object(&stored)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::object::{Blob, EntryMode, TreeEntry};
    use crate::ManualClock;

    fn make_blob(content: &[u8]) -> StoredObject {
        Blob::new(content.to_vec()).to_stored_object()
    }

    fn store_with_clock(lease_secs: u64) -> (InMemoryObjectStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = InMemoryObjectStore::with_clock(
            StoreConfig {
                initial_lease_secs: lease_secs,
            },
            clock.clone(),
        );
        (store, clock)
    }

    #[test]
    fn write_and_read_blob() {
        let store = InMemoryObjectStore::new();
        let obj = make_blob(b"hello world");
        let digest = store.write(&obj).unwrap();
        assert_eq!(digest.size_bytes, 11);
        assert_eq!(store.read(&digest).unwrap(), Some(obj));
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let obj = make_blob(b"idempotent");
        assert_eq!(store.write(&obj).unwrap(), store.write(&obj).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_tree_always_resolves() {
        let store = InMemoryObjectStore::new();
        assert!(store.exists(&empty_digest()).unwrap());
        let obj = store.read(&empty_digest()).unwrap().unwrap();
        assert!(Tree::from_stored_object(&obj).unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn delete_present_object() {
        let store = InMemoryObjectStore::new();
        let digest = store.write(&make_blob(b"to-delete")).unwrap();
        assert!(store.delete(&digest).unwrap());
        assert!(!store.exists(&digest).unwrap());
        assert!(!store.delete(&digest).unwrap());
    }

    #[test]
    fn gc_keeps_freshly_written_content() {
        let (store, _clock) = store_with_clock(60);
        store.write(&make_blob(b"fresh")).unwrap();
        let summary = store.garbage_collect().unwrap();
        assert_eq!(summary.reclaimed, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn gc_reclaims_content_after_lease_expiry() {
        let (store, clock) = store_with_clock(60);
        store.write(&make_blob(b"12345")).unwrap();
        clock.advance(Duration::from_secs(61));
        let summary = store.garbage_collect().unwrap();
        assert_eq!(summary.reclaimed, 1);
        assert_eq!(summary.reclaimed_bytes, 5);
        assert_eq!(summary.expired_leases, 1);
        assert!(store.is_empty());
        assert_eq!(store.lease_count(), 0);
    }

    #[test]
    fn lease_on_tree_protects_children() {
        let (store, clock) = store_with_clock(60);
        let blob = store.write(&make_blob(b"child")).unwrap();
        let tree = Tree::new(vec![TreeEntry::new(EntryMode::Regular, "f", blob)]);
        let tree_digest = store.write(&tree.to_stored_object().unwrap()).unwrap();

        let leased = store
            .lease(&[tree_digest], clock.now() + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(leased, 2);

        clock.advance(Duration::from_secs(120));
        let summary = store.garbage_collect().unwrap();
        assert_eq!(summary.reclaimed, 0);
        assert!(store.exists(&blob).unwrap());
    }

    #[test]
    fn leased_tree_keeps_child_whose_own_lease_expired() {
        let (store, clock) = store_with_clock(60);
        let blob = store.write(&make_blob(b"old child")).unwrap();
        clock.advance(Duration::from_secs(50));
        // Written later: the tree's own initial lease outlives the blob's.
        let tree = Tree::new(vec![TreeEntry::new(EntryMode::Regular, "f", blob)]);
        let tree_digest = store.write(&tree.to_stored_object().unwrap()).unwrap();
        clock.advance(Duration::from_secs(20));

        let summary = store.garbage_collect().unwrap();
        assert_eq!(summary.expired_leases, 1);
        assert_eq!(summary.reclaimed, 0);
        assert!(store.exists(&blob).unwrap());
        assert!(store.exists(&tree_digest).unwrap());
    }

    #[test]
    fn lease_never_shortens() {
        let (store, clock) = store_with_clock(600);
        let digest = store.write(&make_blob(b"x")).unwrap();
        let original = store.lease_expiry(&digest).unwrap();
        store.lease(&[digest], clock.now()).unwrap();
        assert_eq!(store.lease_expiry(&digest), Some(original));
    }

    #[test]
    fn lease_skips_missing_roots() {
        let store = InMemoryObjectStore::new();
        let missing = make_blob(b"never written").compute_digest();
        assert_eq!(store.lease(&[missing], Instant::now()).unwrap(), 0);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let digest = store.write(&make_blob(b"shared data")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let obj = store.read(&digest).unwrap().unwrap();
                    assert_eq!(obj.compute_digest(), digest);
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        store.write(&make_blob(b"x")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("object_count"));
        assert!(debug.contains("lease_count"));
    }
}
