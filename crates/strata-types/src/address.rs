use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The address of a build target: a directory plus a target name.
///
/// `src/python/app` addresses the target named `app` in `src/python/app`;
/// `src/python/app:tests` addresses the target `tests` in the same directory.
/// When the name is omitted it defaults to the directory's basename.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    spec_path: String,
    target_name: String,
}

impl Address {
    pub fn new(spec_path: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            spec_path: spec_path.into(),
            target_name: target_name.into(),
        }
    }

    /// Parse `dir`, `dir:name`, or `//:name`.
    pub fn parse(spec: &str) -> Result<Self, TypeError> {
        let spec = spec.strip_prefix("//").unwrap_or(spec);
        let (path, name) = match spec.split_once(':') {
            Some((path, name)) => (path, name.to_string()),
            None => {
                let name = spec.rsplit('/').next().unwrap_or_default();
                (spec, name.to_string())
            }
        };
        if name.is_empty() || name.contains('/') || path.starts_with('/') {
            return Err(TypeError::InvalidAddress(spec.to_string()));
        }
        Ok(Self::new(path.trim_end_matches('/'), name))
    }

    pub fn spec_path(&self) -> &str {
        &self.spec_path
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    fn has_default_name(&self) -> bool {
        !self.spec_path.is_empty()
            && self.spec_path.rsplit('/').next() == Some(self.target_name.as_str())
    }

    /// The canonical spec string, e.g. `src/app` or `src/app:tests`.
    pub fn spec(&self) -> String {
        if self.spec_path.is_empty() {
            format!("//:{}", self.target_name)
        } else if self.has_default_name() {
            self.spec_path.clone()
        } else {
            format!("{}:{}", self.spec_path, self.target_name)
        }
    }

    /// A single path component that uniquely names this address.
    ///
    /// `src/app:tests` becomes `src.app.tests`; `src/app` becomes `src.app`.
    pub fn path_safe_spec(&self) -> String {
        if self.spec_path.is_empty() {
            return self.target_name.clone();
        }
        let dotted = self.spec_path.replace('/', ".");
        if self.has_default_name() {
            dotted
        } else {
            format!("{dotted}.{}", self.target_name)
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.spec())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec())
    }
}
