use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A normalized relative path with `/` separators.
///
/// The empty path is the tree root. Every other path is a sequence of
/// non-empty components, none of which is `.` or `..`. Prefix checks are
/// component-aware: `src/py` is not a prefix of `src/python/x.py`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// Parse and validate a relative path. A single trailing `/` is dropped.
    pub fn new(path: impl AsRef<str>) -> Result<Self, TypeError> {
        let raw = path.as_ref();
        let trimmed = raw.strip_suffix('/').unwrap_or(raw);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let invalid = |reason| TypeError::InvalidPath {
            path: raw.to_string(),
            reason,
        };
        if trimmed.starts_with('/') {
            return Err(invalid("path must be relative"));
        }
        if trimmed.contains('\0') {
            return Err(invalid("path contains a NUL byte"));
        }
        for component in trimmed.split('/') {
            match component {
                "" => return Err(invalid("empty path component")),
                "." | ".." => return Err(invalid("path is not normalized")),
                _ => {}
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The root (empty) path.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path components. The root has none.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Append `other` below this path.
    pub fn join(&self, other: &RelPath) -> RelPath {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => RelPath(format!("{}/{}", self.0, other.0)),
        }
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &RelPath) -> bool {
        self.strip_prefix(prefix).is_some()
    }

    /// Remove `prefix` from the front of this path, component-wise.
    pub fn strip_prefix(&self, prefix: &RelPath) -> Option<RelPath> {
        if prefix.is_root() {
            return Some(self.clone());
        }
        if self.0 == prefix.0 {
            return Some(RelPath::root());
        }
        self.0
            .strip_prefix(prefix.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| RelPath(rest.to_string()))
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<RelPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => RelPath(parent.to_string()),
            None => RelPath::root(),
        })
    }

    /// The last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelPath({:?})", self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RelPath::new(value)
    }
}

impl TryFrom<&str> for RelPath {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        RelPath::new(value)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

// Hash/Eq/Ord all follow the inner string, so borrowing as `str` is sound.
impl Borrow<str> for RelPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn rejects_absolute_and_unnormalized_paths() {
        assert!(RelPath::new("/etc/passwd").is_err());
        assert!(RelPath::new("a//b").is_err());
        assert!(RelPath::new("a/./b").is_err());
        assert!(RelPath::new("../up").is_err());
    }

    #[test]
    fn trailing_slash_is_dropped() {
        assert_eq!(p("src/python/"), p("src/python"));
        assert!(p("").is_root());
    }

    #[test]
    fn strip_prefix_is_component_aware() {
        let file = p("src/python/app.py");
        assert_eq!(file.strip_prefix(&p("src/python")), Some(p("app.py")));
        assert_eq!(file.strip_prefix(&p("src/py")), None);
        assert_eq!(file.strip_prefix(&RelPath::root()), Some(file.clone()));
        assert_eq!(file.strip_prefix(&file), Some(RelPath::root()));
    }

    #[test]
    fn parent_and_file_name() {
        let file = p("a/b/c.txt");
        assert_eq!(file.parent(), Some(p("a/b")));
        assert_eq!(file.file_name(), Some("c.txt"));
        assert_eq!(p("top").parent(), Some(RelPath::root()));
        assert_eq!(RelPath::root().parent(), None);
    }

    #[test]
    fn serde_rejects_invalid_paths() {
        let err = serde_json::from_str::<RelPath>("\"/abs\"");
        assert!(err.is_err());
        let ok: RelPath = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(ok, p("a/b"));
    }

    proptest! {
        #[test]
        fn join_then_strip_recovers_suffix(
            prefix in "[a-z]{1,6}(/[a-z]{1,6}){0,3}",
            suffix in "[a-z]{1,6}(/[a-z]{1,6}){0,3}",
        ) {
            let prefix = p(&prefix);
            let suffix = p(&suffix);
            let joined = prefix.join(&suffix);
            prop_assert!(joined.starts_with(&prefix));
            prop_assert_eq!(joined.strip_prefix(&prefix), Some(suffix));
        }
    }
}
