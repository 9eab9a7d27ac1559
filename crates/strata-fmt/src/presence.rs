use strata_store::Snapshot;

use crate::target::Target;

/// Decides which targets actually have sources to format.
pub trait SourcePresence: Send + Sync {
    /// Return the targets that own at least one existing source file, with
    /// their `sources` narrowed to the files that exist.
    fn targets_with_sources(&self, targets: &[Target]) -> Vec<Target>;
}

/// Checks sources against a snapshot of the workspace.
#[derive(Clone, Debug)]
pub struct WorkspaceSourcePresence {
    snapshot: Snapshot,
}

impl WorkspaceSourcePresence {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl SourcePresence for WorkspaceSourcePresence {
    fn targets_with_sources(&self, targets: &[Target]) -> Vec<Target> {
        targets
            .iter()
            .filter_map(|target| {
                let sources: Vec<_> = target
                    .sources
                    .iter()
                    .filter(|path| self.snapshot.contains_file(path))
                    .cloned()
                    .collect();
                if sources.is_empty() {
                    return None;
                }
                Some(Target {
                    sources,
                    ..target.clone()
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::{DigestAlgebra, FileContent, InMemoryObjectStore};
    use strata_types::{Address, RelPath};

    fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn drops_targets_without_existing_sources() {
        let store = InMemoryObjectStore::new();
        let digest = store
            .create_digest(vec![FileContent::new(p("app/main.py"), "x")])
            .unwrap();
        let presence = WorkspaceSourcePresence::new(store.snapshot(&digest).unwrap());

        let app = Target::new(Address::parse("app").unwrap())
            .with_sources([p("app/main.py"), p("app/deleted.py")]);
        let gone = Target::new(Address::parse("gone").unwrap()).with_sources([p("gone/x.py")]);

        let kept = presence.targets_with_sources(&[app, gone]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].address.spec(), "app");
        assert_eq!(kept[0].sources, vec![p("app/main.py")]);
    }
}
