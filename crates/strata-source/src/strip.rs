use std::collections::{BTreeMap, BTreeSet};

use strata_store::{DigestAlgebra, Snapshot};
use strata_types::RelPath;
use tracing::debug;

use crate::error::SourceRootResult;
use crate::root::{SourceRoot, SourceRootResolver};

/// Files to strip, with the subset that must keep its full path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFiles {
    pub snapshot: Snapshot,
    pub unrooted_files: Vec<RelPath>,
}

impl SourceFiles {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            unrooted_files: Vec::new(),
        }
    }

    pub fn with_unrooted(mut self, files: Vec<RelPath>) -> Self {
        self.unrooted_files = files;
        self
    }
}

/// A snapshot whose rooted files have had their source root removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrippedSourceFiles {
    pub snapshot: Snapshot,
}

/// Remove source roots from every rooted file, e.g.
/// `src/python/pkg/util.py` becomes `pkg/util.py`.
///
/// With a single root the prefix is removed directly. With several, each
/// root's files are subset out, stripped and merged back together. Unrooted
/// files are merged back unchanged; any not in the snapshot are ignored.
pub fn strip_source_roots(
    algebra: &dyn DigestAlgebra,
    resolver: &dyn SourceRootResolver,
    source_files: &SourceFiles,
) -> SourceRootResult<StrippedSourceFiles> {
    let snapshot = &source_files.snapshot;
    if snapshot.is_empty() {
        return Ok(StrippedSourceFiles {
            snapshot: snapshot.clone(),
        });
    }

    let unrooted: BTreeSet<&RelPath> = source_files.unrooted_files.iter().collect();
    let rooted = if unrooted.is_empty() {
        snapshot.clone()
    } else {
        let files: Vec<RelPath> = snapshot
            .files
            .iter()
            .filter(|file| !unrooted.contains(file))
            .cloned()
            .collect();
        algebra.snapshot(&algebra.subset(&snapshot.digest, &files)?)?
    };

    let mut groups: BTreeMap<SourceRoot, Vec<RelPath>> = BTreeMap::new();
    for (file, root) in resolver.roots_for(&rooted.files)? {
        groups.entry(root).or_default().push(file);
    }

    let mut stripped = match groups.len() {
        1 => {
            let root = groups.keys().next().cloned().unwrap_or_else(SourceRoot::repo_root);
            if root.is_repo_root() {
                rooted.digest
            } else {
                algebra.remove_prefix(&rooted.digest, root.path())?
            }
        }
        _ => {
            let mut digests = Vec::with_capacity(groups.len());
            for (root, files) in &groups {
                let subset = algebra.subset(&rooted.digest, files)?;
                digests.push(algebra.remove_prefix(&subset, root.path())?);
            }
            algebra.merge(&digests)?
        }
    };

    // Unrooted files missing from the snapshot are skipped.
    let present: Vec<RelPath> = source_files
        .unrooted_files
        .iter()
        .filter(|file| snapshot.contains_file(file))
        .cloned()
        .collect();
    if !present.is_empty() {
        let passthrough = algebra.subset(&snapshot.digest, &present)?;
        stripped = algebra.merge(&[stripped, passthrough])?;
    }

    debug!(
        files = snapshot.files.len(),
        roots = groups.len(),
        unrooted = source_files.unrooted_files.len(),
        "stripped source roots"
    );
    Ok(StrippedSourceFiles {
        snapshot: algebra.snapshot(&stripped)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolutionError, SourceRootError};
    use crate::root::StaticSourceRoots;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use strata_engine::Session;
    use strata_store::{FileContent, InMemoryObjectStore, StoreError, StoreResult};
    use strata_types::Digest;

    /// Counts subset and remove_prefix calls on the way to a session.
    struct Counting {
        inner: Session,
        subsets: AtomicUsize,
        removals: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                inner: Session::new(Arc::new(InMemoryObjectStore::new())),
                subsets: AtomicUsize::new(0),
                removals: AtomicUsize::new(0),
            }
        }
    }

    impl DigestAlgebra for Counting {
        fn create_digest(&self, files: Vec<FileContent>) -> StoreResult<Digest> {
            self.inner.create_digest(files)
        }
        fn merge(&self, digests: &[Digest]) -> StoreResult<Digest> {
            self.inner.merge(digests)
        }
        fn subset(&self, digest: &Digest, paths: &[RelPath]) -> StoreResult<Digest> {
            self.subsets.fetch_add(1, Ordering::SeqCst);
            self.inner.subset(digest, paths)
        }
        fn add_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
            self.inner.add_prefix(digest, prefix)
        }
        fn remove_prefix(&self, digest: &Digest, prefix: &RelPath) -> StoreResult<Digest> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            self.inner.remove_prefix(digest, prefix)
        }
        fn snapshot(&self, digest: &Digest) -> StoreResult<Snapshot> {
            self.inner.snapshot(digest)
        }
        fn contents(&self, digest: &Digest) -> StoreResult<Vec<FileContent>> {
            self.inner.contents(digest)
        }
    }

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    fn roots(roots: &[&str]) -> StaticSourceRoots {
        StaticSourceRoots::new(roots.iter().map(|r| SourceRoot::new(r).unwrap()))
    }

    fn snapshot(algebra: &dyn DigestAlgebra, files: &[(&str, &str)]) -> Snapshot {
        let digest = algebra
            .create_digest(
                files
                    .iter()
                    .map(|(path, body)| FileContent::new(p(path), body.as_bytes()))
                    .collect(),
            )
            .unwrap();
        algebra.snapshot(&digest).unwrap()
    }

    fn names(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.files.iter().map(RelPath::as_str).collect()
    }

    #[test]
    fn empty_snapshot_is_returned_unchanged() {
        let algebra = Counting::new();
        let empty = snapshot(&algebra, &[]);
        let out = strip_source_roots(&algebra, &roots(&[]), &SourceFiles::new(empty.clone()))
            .unwrap();
        assert_eq!(out.snapshot, empty);
    }

    #[test]
    fn single_root_removes_prefix_without_subset() {
        let algebra = Counting::new();
        let snap = snapshot(
            &algebra,
            &[("src/python/pkg/a.py", "a"), ("src/python/pkg/b.py", "b")],
        );
        let out =
            strip_source_roots(&algebra, &roots(&["src/python"]), &SourceFiles::new(snap.clone()))
                .unwrap();
        assert_eq!(names(&out.snapshot), ["pkg/a.py", "pkg/b.py"]);
        assert_eq!(algebra.subsets.load(Ordering::SeqCst), 0);
        assert_eq!(algebra.removals.load(Ordering::SeqCst), 1);
        assert_eq!(
            out.snapshot.digest,
            algebra.remove_prefix(&snap.digest, &p("src/python")).unwrap()
        );
    }

    #[test]
    fn repo_root_leaves_snapshot_as_is() {
        let algebra = Counting::new();
        let snap = snapshot(&algebra, &[("pkg/a.py", "a")]);
        let out =
            strip_source_roots(&algebra, &roots(&["."]), &SourceFiles::new(snap.clone())).unwrap();
        assert_eq!(out.snapshot.digest, snap.digest);
        assert_eq!(algebra.removals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multiple_roots_are_stripped_and_merged() {
        let algebra = Counting::new();
        let snap = snapshot(
            &algebra,
            &[
                ("src/python/app/main.py", "main"),
                ("tests/python/app/test_main.py", "test"),
            ],
        );
        let out = strip_source_roots(
            &algebra,
            &roots(&["src/python", "tests/python"]),
            &SourceFiles::new(snap),
        )
        .unwrap();
        assert_eq!(names(&out.snapshot), ["app/main.py", "app/test_main.py"]);
        assert_eq!(algebra.subsets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn multiple_roots_colliding_on_a_path_conflict() {
        let algebra = Counting::new();
        let snap = snapshot(&algebra, &[("a/x.py", "one"), ("b/x.py", "two")]);
        let err = strip_source_roots(&algebra, &roots(&["a", "b"]), &SourceFiles::new(snap))
            .unwrap_err();
        assert!(matches!(
            err,
            SourceRootError::Store(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn unrooted_files_pass_through_unchanged() {
        let algebra = Counting::new();
        let snap = snapshot(
            &algebra,
            &[("src/python/pkg/a.py", "a"), ("BUILD", "build file")],
        );
        let files = SourceFiles::new(snap).with_unrooted(vec![p("BUILD")]);
        let out = strip_source_roots(&algebra, &roots(&["src/python"]), &files).unwrap();
        assert_eq!(names(&out.snapshot), ["BUILD", "pkg/a.py"]);

        let contents = algebra.contents(&out.snapshot.digest).unwrap();
        let build = contents.iter().find(|f| f.path == p("BUILD")).unwrap();
        assert_eq!(build.content, b"build file");
    }

    #[test]
    fn unrooted_files_absent_from_snapshot_are_ignored() {
        let algebra = Counting::new();
        let snap = snapshot(&algebra, &[("src/python/pkg/a.py", "a"), ("BUILD", "b")]);
        let files = SourceFiles::new(snap).with_unrooted(vec![p("BUILD"), p("gone/BUILD")]);
        let out = strip_source_roots(&algebra, &roots(&["src/python"]), &files).unwrap();
        assert_eq!(names(&out.snapshot), ["BUILD", "pkg/a.py"]);
    }

    #[test]
    fn only_absent_unrooted_files_leave_the_rooted_result() {
        let algebra = Counting::new();
        let snap = snapshot(&algebra, &[("src/python/pkg/a.py", "a")]);
        let files = SourceFiles::new(snap).with_unrooted(vec![p("gone.txt")]);
        let out = strip_source_roots(&algebra, &roots(&["src/python"]), &files).unwrap();
        assert_eq!(names(&out.snapshot), ["pkg/a.py"]);
    }

    #[test]
    fn resolution_errors_propagate() {
        let algebra = Counting::new();
        let snap = snapshot(&algebra, &[("orphan/a.py", "a")]);
        let err = strip_source_roots(&algebra, &roots(&["src"]), &SourceFiles::new(snap))
            .unwrap_err();
        assert!(matches!(
            err,
            SourceRootError::Resolution(ResolutionError::NoSourceRoot(_))
        ));
    }
}
