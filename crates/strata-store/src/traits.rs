use strata_types::Digest;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same data always produces the
///   same digest.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by digest. Returns `Ok(None)` if it does not exist.
    fn read(&self, digest: &Digest) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its digest. Idempotent.
    fn write(&self, object: &StoredObject) -> StoreResult<Digest>;

    fn exists(&self, digest: &Digest) -> StoreResult<bool>;

    /// Delete an object. Returns `true` if the object existed.
    ///
    /// Intended for garbage collection only.
    fn delete(&self, digest: &Digest) -> StoreResult<bool>;

    fn read_batch(&self, digests: &[Digest]) -> StoreResult<Vec<Option<StoredObject>>> {
        digests.iter().map(|d| self.read(d)).collect()
    }

    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<Digest>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }
}
