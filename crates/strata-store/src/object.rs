use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use strata_types::Digest;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw file content.
    Blob,
    /// Directory listing: ordered entries mapping names to digests.
    Tree,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// Kind tag plus raw bytes. Only trees are ever decoded, to follow their
/// entries during collection and tree walks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Compute the content-addressed digest for this object.
    pub fn compute_digest(&self) -> Digest {
        let hasher = match self.kind {
            ObjectKind::Blob => &ContentHasher::BLOB,
            ObjectKind::Tree => &ContentHasher::TREE,
        };
        hasher.digest(&self.data)
    }

    fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind == kind {
            return Ok(());
        }
        Err(StoreError::CorruptObject {
            digest: self.compute_digest(),
            reason: format!("stored {} where a {kind} was expected", self.kind),
        })
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Raw file content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self::new(obj.data.clone()))
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// What a tree entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    Regular,
    Executable,
    Directory,
}

impl EntryMode {
    pub fn for_file(is_executable: bool) -> Self {
        if is_executable {
            Self::Executable
        } else {
            Self::Regular
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: EntryMode,
    /// Single path component.
    pub name: String,
    pub digest: Digest,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<String>, digest: Digest) -> Self {
        Self {
            mode,
            name: name.into(),
            digest,
        }
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

/// Directory listing object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Entries sorted by name.
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a new tree; entries are sorted by name for deterministic hashing.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Must match `serde_json::to_vec(&Tree::empty())`.
const EMPTY_TREE_BYTES: &[u8] = br#"{"entries":[]}"#;

static EMPTY_DIGEST: LazyLock<Digest> =
    LazyLock::new(|| ContentHasher::TREE.digest(EMPTY_TREE_BYTES));

/// Digest of the empty tree. Resolvable in every store, written or not.
pub fn empty_digest() -> Digest {
    *EMPTY_DIGEST
}
