use serde::{Deserialize, Serialize};
use strata_types::{Digest, RelPath};

/// A digest materialized as its sorted, deduplicated file and directory
/// paths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub digest: Digest,
    pub files: Vec<RelPath>,
    pub dirs: Vec<RelPath>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains_file(&self, path: &RelPath) -> bool {
        self.files.binary_search(path).is_ok()
    }
}

/// A single file's path and bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileContent {
    pub path: RelPath,
    pub content: Vec<u8>,
    pub is_executable: bool,
}

impl FileContent {
    pub fn new(path: RelPath, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            content: content.into(),
            is_executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.is_executable = true;
        self
    }
}
