//! Digest algebra: merge, subset, and prefix rewriting over stored trees.
//!
//! Every operation reads existing trees and materializes a new digest. No
//! operation mutates an input, so results can be shared freely between
//! concurrent callers.

use std::collections::BTreeMap;
use std::ops::Bound;

use strata_types::{Digest, RelPath, TypeError};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::memory::{load_tree, InMemoryObjectStore};
use crate::object::{empty_digest, Blob, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
use crate::snapshot::{FileContent, Snapshot};
use crate::traits::ObjectStore;

/// Pure operations over content-addressed trees.
pub trait DigestAlgebra: Send + Sync {
    /// Store `files` and return the digest of the tree holding them.
    ///
    /// The same path listed twice with different content is a conflict.
    fn create_digest(&self, files: Vec<FileContent>) -> StoreResult<Digest>;

    /// Union of the given trees.
    ///
    /// Fails with [`StoreError::Conflict`] if two inputs define different
    /// content for the same path, or one uses a path as a file and another
    /// as a directory. Never picks a winner.
    fn merge(&self, digests: &[Digest]) -> StoreResult<Digest>;

    /// Keep only `paths`. A path naming a directory keeps its whole subtree.
    ///
    /// Fails with [`StoreError::PathNotFound`] if any path is absent.
    fn subset(&self, digest: &Digest, paths: &[RelPath]) -> StoreResult<Digest>;

    /// Move every path under `prefix`.
    fn add_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest>;

    /// Strip `prefix` from every path.
    ///
    /// Fails with [`StoreError::PrefixMismatch`] if any path is not under it.
    fn remove_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest>;

    /// List the files and directories of a tree.
    fn snapshot(&self, digest: &Digest) -> StoreResult<Snapshot>;

    /// Read every file of a tree, sorted by path.
    fn contents(&self, digest: &Digest) -> StoreResult<Vec<FileContent>>;
}

// ---------------------------------------------------------------------------
// Tree walking and building
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileLeaf {
    digest: Digest,
    executable: bool,
}

impl FileLeaf {
    fn mode(&self) -> EntryMode {
        EntryMode::for_file(self.executable)
    }
}

#[derive(Default)]
struct Listing {
    files: BTreeMap<RelPath, FileLeaf>,
    dirs: Vec<RelPath>,
}

fn walk(store: &dyn ObjectStore, digest: &Digest) -> StoreResult<Listing> {
    let mut listing = Listing::default();
    walk_into(store, digest, &RelPath::root(), &mut listing)?;
    listing.dirs.sort();
    Ok(listing)
}

fn walk_into(
    store: &dyn ObjectStore,
    digest: &Digest,
    prefix: &RelPath,
    listing: &mut Listing,
) -> StoreResult<()> {
    let tree = load_tree(store, digest)?;
    for entry in tree.entries {
        let path = prefix.join(&RelPath::new(&entry.name)?);
        match entry.mode {
            EntryMode::Directory => {
                walk_into(store, &entry.digest, &path, listing)?;
                listing.dirs.push(path);
            }
            mode => {
                listing.files.insert(
                    path,
                    FileLeaf {
                        digest: entry.digest,
                        executable: mode == EntryMode::Executable,
                    },
                );
            }
        }
    }
    Ok(())
}

enum Node {
    File(FileLeaf),
    Dir(BTreeMap<String, Node>),
}

/// Accumulates files into a nested directory structure, detecting
/// conflicting definitions as they are inserted.
#[derive(Default)]
struct TreeBuilder {
    root: BTreeMap<String, Node>,
}

impl TreeBuilder {
    fn insert(&mut self, path: &RelPath, leaf: FileLeaf) -> StoreResult<()> {
        let components: Vec<&str> = path.components().collect();
        let Some((name, parents)) = components.split_last() else {
            return Err(TypeError::InvalidPath {
                path: String::new(),
                reason: "a file cannot live at the tree root",
            }
            .into());
        };

        let mut dir = &mut self.root;
        for (depth, component) in parents.iter().enumerate() {
            let node = dir
                .entry((*component).to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match node {
                Node::Dir(children) => children,
                Node::File(_) => {
                    return Err(StoreError::Conflict {
                        path: RelPath::new(components[..=depth].join("/"))?,
                    })
                }
            };
        }

        match dir.get(*name) {
            None => {
                dir.insert((*name).to_string(), Node::File(leaf));
                Ok(())
            }
            Some(Node::File(existing)) if *existing == leaf => Ok(()),
            Some(_) => Err(StoreError::Conflict { path: path.clone() }),
        }
    }

    fn write(&self, store: &dyn ObjectStore) -> StoreResult<Digest> {
        write_dir(store, &self.root)
    }
}

fn write_dir(store: &dyn ObjectStore, children: &BTreeMap<String, Node>) -> StoreResult<Digest> {
    if children.is_empty() {
        return Ok(empty_digest());
    }
    let mut entries = Vec::with_capacity(children.len());
    for (name, node) in children {
        let entry = match node {
            Node::File(leaf) => TreeEntry::new(leaf.mode(), name.clone(), leaf.digest),
            Node::Dir(grandchildren) => TreeEntry::new(
                EntryMode::Directory,
                name.clone(),
                write_dir(store, grandchildren)?,
            ),
        };
        entries.push(entry);
    }
    store.write(&Tree::new(entries).to_stored_object()?)
}

// ---------------------------------------------------------------------------
// InMemoryObjectStore
// ---------------------------------------------------------------------------

impl DigestAlgebra for InMemoryObjectStore {
    fn create_digest(&self, files: Vec<FileContent>) -> StoreResult<Digest> {
        let mut builder = TreeBuilder::default();
        for file in files {
            let digest = self.write(&StoredObject::new(ObjectKind::Blob, file.content))?;
            builder.insert(
                &file.path,
                FileLeaf {
                    digest,
                    executable: file.is_executable,
                },
            )?;
        }
        builder.write(self)
    }

    fn merge(&self, digests: &[Digest]) -> StoreResult<Digest> {
        let mut inputs: Vec<Digest> = digests
            .iter()
            .copied()
            .filter(|d| *d != empty_digest())
            .collect();
        inputs.sort();
        inputs.dedup();
        match inputs.as_slice() {
            [] => return Ok(empty_digest()),
            [only] => return Ok(*only),
            _ => {}
        }

        let mut builder = TreeBuilder::default();
        for digest in &inputs {
            for (path, leaf) in walk(self, digest)?.files {
                builder.insert(&path, leaf)?;
            }
        }
        let merged = builder.write(self)?;
        debug!(inputs = inputs.len(), merged = %merged, "merged digests");
        Ok(merged)
    }

    fn subset(&self, digest: &Digest, paths: &[RelPath]) -> StoreResult<Digest> {
        let listing = walk(self, digest)?;
        let mut builder = TreeBuilder::default();
        for requested in paths {
            if requested.is_root() {
                for (path, leaf) in &listing.files {
                    builder.insert(path, *leaf)?;
                }
                continue;
            }
            if let Some(leaf) = listing.files.get(requested) {
                builder.insert(requested, *leaf)?;
                continue;
            }
            let dir_prefix = format!("{requested}/");
            let mut matched = false;
            for (path, leaf) in listing
                .files
                .range::<str, _>((Bound::Included(dir_prefix.as_str()), Bound::Unbounded))
                .take_while(|(path, _)| path.as_str().starts_with(&dir_prefix))
            {
                builder.insert(path, *leaf)?;
                matched = true;
            }
            if !matched {
                return Err(StoreError::PathNotFound {
                    digest: *digest,
                    path: requested.clone(),
                });
            }
        }
        builder.write(self)
    }

    fn add_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
        if prefix.is_root() || *digest == empty_digest() {
            return Ok(*digest);
        }
        // Fail early on a digest that is not a tree in this store.
        load_tree(self, digest)?;

        let components: Vec<&str> = prefix.components().collect();
        let mut current = *digest;
        for component in components.into_iter().rev() {
            let wrapper = Tree::new(vec![TreeEntry::new(
                EntryMode::Directory,
                component,
                current,
            )]);
            current = self.write(&wrapper.to_stored_object()?)?;
        }
        Ok(current)
    }

    fn remove_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
        let mut current = *digest;
        let mut walked = RelPath::root();
        for component in prefix.components() {
            if current == empty_digest() {
                return Ok(current);
            }
            let tree = load_tree(self, &current)?;
            let mut next = None;
            for entry in &tree.entries {
                if entry.name == component && entry.mode.is_directory() {
                    next = Some(entry.digest);
                } else {
                    return Err(StoreError::PrefixMismatch {
                        path: walked.join(&RelPath::new(&entry.name)?),
                        prefix: prefix.clone(),
                    });
                }
            }
            walked = walked.join(&RelPath::new(component)?);
            current = next.unwrap_or_else(empty_digest);
        }
        Ok(current)
    }

    fn snapshot(&self, digest: &Digest) -> StoreResult<Snapshot> {
        let listing = walk(self, digest)?;
        Ok(Snapshot {
            digest: *digest,
            files: listing.files.into_keys().collect(),
            dirs: listing.dirs,
        })
    }

    fn contents(&self, digest: &Digest) -> StoreResult<Vec<FileContent>> {
        let listing = walk(self, digest)?;
        let mut contents = Vec::with_capacity(listing.files.len());
        for (path, leaf) in listing.files {
            let stored = self
                .read(&leaf.digest)?
                .ok_or(StoreError::ObjectNotFound(leaf.digest))?;
            contents.push(FileContent {
                path,
                content: Blob::from_stored_object(&stored)?.data,
                is_executable: leaf.executable,
            });
        }
        Ok(contents)
    }
}
