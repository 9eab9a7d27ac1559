use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{RelPath, TypeError};

use crate::error::ResolutionError;

/// A directory prefix under which paths are stripped to their canonical
/// form. The repository root (written `"."`) means files are already
/// canonical.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceRoot(RelPath);

impl SourceRoot {
    pub fn new(path: &str) -> Result<Self, TypeError> {
        if path == "." {
            return Ok(Self::repo_root());
        }
        Ok(Self(RelPath::new(path)?))
    }

    pub fn repo_root() -> Self {
        Self(RelPath::root())
    }

    pub fn is_repo_root(&self) -> bool {
        self.0.is_root()
    }

    pub fn path(&self) -> &RelPath {
        &self.0
    }

    /// Whether `file` lives under this root.
    pub fn contains(&self, file: &RelPath) -> bool {
        self.is_repo_root() || file.starts_with(&self.0)
    }
}

impl From<RelPath> for SourceRoot {
    fn from(path: RelPath) -> Self {
        Self(path)
    }
}

impl TryFrom<String> for SourceRoot {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<SourceRoot> for String {
    fn from(root: SourceRoot) -> Self {
        root.to_string()
    }
}

impl fmt::Display for SourceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_repo_root() {
            f.write_str(".")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Maps files to the source root that owns them.
pub trait SourceRootResolver: Send + Sync {
    fn roots_for(
        &self,
        files: &[RelPath],
    ) -> Result<BTreeMap<RelPath, SourceRoot>, ResolutionError>;
}

/// A resolver over a fixed set of roots. The longest matching root wins.
#[derive(Clone, Debug, Default)]
pub struct StaticSourceRoots {
    roots: Vec<SourceRoot>,
}

impl StaticSourceRoots {
    pub fn new(roots: impl IntoIterator<Item = SourceRoot>) -> Self {
        let mut roots: Vec<SourceRoot> = roots.into_iter().collect();
        roots.sort_by(|a, b| {
            let depth = |root: &SourceRoot| root.path().components().count();
            depth(b).cmp(&depth(a)).then_with(|| a.cmp(b))
        });
        roots.dedup();
        Self { roots }
    }

    pub fn roots(&self) -> &[SourceRoot] {
        &self.roots
    }

    fn find(&self, file: &RelPath) -> Option<&SourceRoot> {
        self.roots.iter().find(|root| root.contains(file))
    }
}

impl SourceRootResolver for StaticSourceRoots {
    fn roots_for(
        &self,
        files: &[RelPath],
    ) -> Result<BTreeMap<RelPath, SourceRoot>, ResolutionError> {
        files
            .iter()
            .map(|file| {
                self.find(file)
                    .map(|root| (file.clone(), root.clone()))
                    .ok_or_else(|| ResolutionError::NoSourceRoot(file.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    fn root(s: &str) -> SourceRoot {
        SourceRoot::new(s).unwrap()
    }

    #[test]
    fn dot_is_the_repo_root() {
        let r = root(".");
        assert!(r.is_repo_root());
        assert_eq!(r.to_string(), ".");
        assert!(r.contains(&p("anything/at/all.py")));
    }

    #[test]
    fn longest_root_wins() {
        let resolver = StaticSourceRoots::new([root("src"), root("src/python"), root(".")]);
        let roots = resolver
            .roots_for(&[p("src/python/a.py"), p("src/b.rs"), p("README.md")])
            .unwrap();
        assert_eq!(roots[&p("src/python/a.py")], root("src/python"));
        assert_eq!(roots[&p("src/b.rs")], root("src"));
        assert_eq!(roots[&p("README.md")], root("."));
    }

    #[test]
    fn roots_match_whole_components() {
        let resolver = StaticSourceRoots::new([root("src/py")]);
        let err = resolver.roots_for(&[p("src/python/x.py")]).unwrap_err();
        assert_eq!(err, ResolutionError::NoSourceRoot(p("src/python/x.py")));
    }

    #[test]
    fn string_form_uses_dot_for_repo_root() {
        assert_eq!(String::from(root(".")), ".");
        assert_eq!(SourceRoot::try_from(".".to_string()).unwrap(), SourceRoot::repo_root());
        assert_eq!(String::from(root("src/python")), "src/python");
    }
}
