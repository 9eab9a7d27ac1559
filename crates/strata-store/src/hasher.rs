use strata_types::{Digest, Fingerprint};

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a blob and a tree with identical bytes never share a
/// fingerprint.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file content.
    pub const BLOB: Self = Self {
        domain: "strata-blob-v1",
    };
    /// Hasher for directory trees.
    pub const TREE: Self = Self {
        domain: "strata-tree-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn fingerprint(&self, data: &[u8]) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Fingerprint::from_hash(*hasher.finalize().as_bytes())
    }

    /// Fingerprint plus size of `data`.
    pub fn digest(&self, data: &[u8]) -> Digest {
        Digest::new(self.fingerprint(data), data.len() as u64)
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
