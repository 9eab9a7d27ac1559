use std::future::Future;
use std::sync::Arc;

use strata_engine::Session;
use strata_store::{DigestAlgebra, StoreError, Workspace};
use strata_types::Digest;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::FmtConfig;
use crate::error::{FmtError, Result};
use crate::language::LanguageFormatter;
use crate::presence::SourcePresence;
use crate::registry::FmtRegistry;
use crate::result::{FmtResult, LintResult};
use crate::target::Target;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// The result of the format goal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmtOutcome {
    /// Always 0: formatters run with hard-failure execution, so reaching an
    /// outcome means every one of them succeeded.
    pub exit_code: i32,
    /// Individual formatter results, sorted by formatter name.
    pub results: Vec<FmtResult>,
    /// The merged digest written to the workspace, if anything changed.
    pub written: Option<Digest>,
}

impl FmtOutcome {
    /// Console report: one status line per formatter followed by its
    /// captured output, with a blank line between formatters.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if result.did_change() {
                out.push_str(&format!("𐄂 {} made changes.\n", result.formatter_name));
            } else {
                out.push_str(&format!("✓ {} made no changes.\n", result.formatter_name));
            }
            push_output(&mut out, &result.stdout);
            push_output(&mut out, &result.stderr);
        }
        out
    }
}

/// The result of running every formatter in check-only mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LintOutcome {
    /// The first nonzero exit code among the sorted results, else 0.
    pub exit_code: i32,
    /// Individual lint results, sorted by linter name.
    pub results: Vec<LintResult>,
}

impl LintOutcome {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if result.is_success() {
                out.push_str(&format!("✓ {} succeeded.\n", result.linter_name));
            } else {
                out.push_str(&format!("𐄂 {} failed.\n", result.linter_name));
            }
            push_output(&mut out, &result.stdout);
            push_output(&mut out, &result.stderr);
        }
        out
    }
}

fn push_output(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// Format `targets` and write the changes back to `workspace`.
///
/// Every registered language claims the targets that carry its required
/// fields; targets without existing sources are dropped. Each language (or,
/// with `per_target_caching`, each language/target pair) runs as its own
/// task. Changed outputs are merged and written once. Conflicting outputs
/// fail the goal without touching the workspace.
pub async fn run_fmt(
    session: Arc<Session>,
    registry: &FmtRegistry,
    presence: &dyn SourcePresence,
    workspace: &dyn Workspace,
    workspace_digest: Digest,
    targets: &[Target],
    config: &FmtConfig,
) -> Result<FmtOutcome> {
    let batches = partition(registry, presence, targets, config);
    info!(
        session_id = %session.id(),
        targets = targets.len(),
        batches = batches.len(),
        "running fmt"
    );

    let per_language = fan_out(batches, |batch| {
        let session = Arc::clone(&session);
        async move {
            batch
                .language
                .format(session, batch.targets, workspace_digest)
                .await
        }
    })
    .await?;

    let changed: Vec<Digest> = per_language
        .iter()
        .filter(|r| r.did_change())
        .map(|r| r.output)
        .collect();
    let mut results: Vec<FmtResult> = per_language.into_iter().flat_map(|r| r.results).collect();
    if results.is_empty() {
        return Ok(FmtOutcome {
            exit_code: 0,
            results,
            written: None,
        });
    }

    let written = if changed.is_empty() {
        None
    } else {
        let merged = session.merge(&changed).map_err(|e| match e {
            StoreError::Conflict { path } => FmtError::Conflict { path },
            other => other.into(),
        })?;
        info!(digest = %merged, languages = changed.len(), "writing formatted sources");
        workspace.write_digest(&merged)?;
        Some(merged)
    };

    results.sort_by(|a, b| a.formatter_name.cmp(&b.formatter_name));
    Ok(FmtOutcome {
        exit_code: 0,
        results,
        written,
    })
}

/// Run every formatter in check-only mode over `targets`.
pub async fn run_lint(
    session: Arc<Session>,
    registry: &FmtRegistry,
    presence: &dyn SourcePresence,
    workspace_digest: Digest,
    targets: &[Target],
    config: &FmtConfig,
) -> Result<LintOutcome> {
    let batches = partition(registry, presence, targets, config);
    info!(
        session_id = %session.id(),
        targets = targets.len(),
        batches = batches.len(),
        "running lint"
    );

    let per_language = fan_out(batches, |batch| {
        let session = Arc::clone(&session);
        async move {
            batch
                .language
                .lint(session, batch.targets, workspace_digest)
                .await
        }
    })
    .await?;

    let mut results: Vec<LintResult> = per_language.into_iter().flatten().collect();
    results.sort_by(|a, b| a.linter_name.cmp(&b.linter_name));
    let exit_code = results
        .iter()
        .map(|r| r.exit_code)
        .find(|code| *code != 0)
        .unwrap_or(0);
    Ok(LintOutcome { exit_code, results })
}

// ---------------------------------------------------------------------------
// Partitioning and fan-out
// ---------------------------------------------------------------------------

struct Batch {
    language: Arc<dyn LanguageFormatter>,
    targets: Vec<Target>,
}

fn partition(
    registry: &FmtRegistry,
    presence: &dyn SourcePresence,
    targets: &[Target],
    config: &FmtConfig,
) -> Vec<Batch> {
    let mut batches = Vec::new();
    for language in registry.languages() {
        let claimed: Vec<Target> = targets
            .iter()
            .filter(|t| language.belongs_to_language(t))
            .cloned()
            .collect();
        let present = presence.targets_with_sources(&claimed);
        debug!(
            language = language.language(),
            claimed = claimed.len(),
            with_sources = present.len(),
            "partitioned targets"
        );
        if present.is_empty() {
            continue;
        }
        if config.per_target_caching {
            batches.extend(present.into_iter().map(|target| Batch {
                language: Arc::clone(language),
                targets: vec![target],
            }));
        } else {
            batches.push(Batch {
                language: Arc::clone(language),
                targets: present,
            });
        }
    }
    batches
}

/// Run one task per batch and return the outputs in batch order. The first
/// failure aborts the remaining tasks.
async fn fan_out<T, F, Fut>(batches: Vec<Batch>, run: F) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(Batch) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let count = batches.len();
    let mut join_set = JoinSet::new();
    for (idx, batch) in batches.into_iter().enumerate() {
        let task = run(batch);
        join_set.spawn(async move { task.await.map(|out| (idx, out)) });
    }

    let mut ordered: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (idx, out) = joined.map_err(|e| FmtError::Join(e.to_string()))??;
        ordered[idx] = Some(out);
    }
    Ok(ordered.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::tests::{p, upper, Rewrite};
    use crate::language::{FormatterPipeline, ProcessFormatter};
    use crate::presence::WorkspaceSourcePresence;
    use std::fs;
    use strata_engine::ProcessRunner;
    use strata_store::{empty_digest, DiskWorkspace, InMemoryObjectStore, Snapshot};
    use strata_types::{Address, RelPath};
    use tempfile::TempDir;

    fn exclaim(s: &str) -> String {
        if s.ends_with('!') {
            s.to_string()
        } else {
            format!("{s}!")
        }
    }

    struct Fixture {
        dir: TempDir,
        session: Arc<Session>,
        workspace: DiskWorkspace,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            for (path, body) in files {
                let full = dir.path().join(path);
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(full, body).unwrap();
            }
            let store = Arc::new(InMemoryObjectStore::new());
            let workspace = DiskWorkspace::new(dir.path(), store.clone());
            Self {
                dir,
                session: Arc::new(Session::new(store)),
                workspace,
            }
        }

        fn capture(&self) -> Snapshot {
            self.workspace.capture(&[RelPath::root()]).unwrap()
        }

        fn read(&self, path: &str) -> String {
            fs::read_to_string(self.dir.path().join(path)).unwrap()
        }

        fn language(
            &self,
            name: &str,
            field: &str,
            tool: &str,
            transform: fn(&str) -> String,
        ) -> Arc<dyn LanguageFormatter> {
            let runner: Arc<dyn ProcessRunner> = Rewrite::new(self.session.clone(), transform);
            let formatter =
                ProcessFormatter::new(tool, vec![tool.to_lowercase()], empty_digest(), runner);
            Arc::new(FormatterPipeline::new(name, [field]).with_formatter(Arc::new(formatter)))
        }

        async fn fmt(
            &self,
            registry: &FmtRegistry,
            targets: &[Target],
            config: &FmtConfig,
        ) -> Result<FmtOutcome> {
            let snapshot = self.capture();
            let presence = WorkspaceSourcePresence::new(snapshot.clone());
            run_fmt(
                self.session.clone(),
                registry,
                &presence,
                &self.workspace,
                snapshot.digest,
                targets,
                config,
            )
            .await
        }
    }

    fn target(spec: &str, field: &str, sources: &[&str]) -> Target {
        Target::new(Address::parse(spec).unwrap())
            .with_field(field)
            .with_sources(sources.iter().map(|s| p(s)))
    }

    #[tokio::test]
    async fn writes_changes_and_is_idempotent() {
        let fx = Fixture::new(&[("py/a.py", "a"), ("md/readme.md", "doc!")]);
        let registry = FmtRegistry::new()
            .register(fx.language("python", "python_sources", "Black", upper))
            .unwrap()
            .register(fx.language("markdown", "markdown_sources", "Mdfmt", exclaim))
            .unwrap();
        let targets = [
            target("py", "python_sources", &["py/a.py"]),
            target("md", "markdown_sources", &["md/readme.md"]),
        ];

        let first = fx.fmt(&registry, &targets, &FmtConfig::default()).await.unwrap();
        assert_eq!(first.exit_code, 0);
        assert!(first.written.is_some());
        assert_eq!(fx.read("py/a.py"), "A");
        assert_eq!(fx.read("md/readme.md"), "doc!");

        let second = fx.fmt(&registry, &targets, &FmtConfig::default()).await.unwrap();
        assert_eq!(second.written, None);
        assert!(second.results.iter().all(|r| !r.did_change()));
    }

    #[tokio::test]
    async fn conflicting_languages_write_nothing() {
        let fx = Fixture::new(&[("src/a.py", "a")]);
        let registry = FmtRegistry::new()
            .register(fx.language("upper", "sources", "Upper", upper))
            .unwrap()
            .register(fx.language("bang", "sources", "Bang", exclaim))
            .unwrap();
        let targets = [target("src", "sources", &["src/a.py"])];

        let err = fx
            .fmt(&registry, &targets, &FmtConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FmtError::Conflict { path } if path == p("src/a.py")));
        assert_eq!(fx.read("src/a.py"), "a");
    }

    #[tokio::test]
    async fn per_target_caching_matches_batched_output() {
        let files = [("a/x.py", "x"), ("b/y.py", "y")];
        let targets = [
            target("a", "python_sources", &["a/x.py"]),
            target("b", "python_sources", &["b/y.py"]),
        ];

        let batched = Fixture::new(&files);
        let registry = FmtRegistry::new()
            .register(batched.language("python", "python_sources", "Black", upper))
            .unwrap();
        let one = batched
            .fmt(&registry, &targets, &FmtConfig::default())
            .await
            .unwrap();

        let split = Fixture::new(&files);
        let registry = FmtRegistry::new()
            .register(split.language("python", "python_sources", "Black", upper))
            .unwrap();
        let many = split
            .fmt(
                &registry,
                &targets,
                &FmtConfig {
                    per_target_caching: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(one.written, many.written);
        assert_eq!(one.results.len(), 1);
        assert_eq!(many.results.len(), 2);
        assert_eq!(split.read("b/y.py"), "Y");
    }

    #[tokio::test]
    async fn nothing_to_format_exits_cleanly() {
        let fx = Fixture::new(&[("src/a.py", "a")]);
        let registry = FmtRegistry::new()
            .register(fx.language("python", "python_sources", "Black", upper))
            .unwrap();
        let targets = [
            target("go", "go_sources", &["src/a.py"]),
            target("gone", "python_sources", &["gone/missing.py"]),
        ];

        let outcome = fx.fmt(&registry, &targets, &FmtConfig::default()).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.written, None);
        assert_eq!(outcome.render(), "");
    }

    #[tokio::test]
    async fn results_are_sorted_and_rendered() {
        let fx = Fixture::new(&[("src/a.py", "A"), ("docs/b.md", "b")]);
        let registry = FmtRegistry::new()
            .register(fx.language("python", "python_sources", "Yapf", upper))
            .unwrap()
            .register(fx.language("markdown", "markdown_sources", "Autoformat", exclaim))
            .unwrap();
        let targets = [
            target("src", "python_sources", &["src/a.py"]),
            target("docs", "markdown_sources", &["docs/b.md"]),
        ];

        let outcome = fx.fmt(&registry, &targets, &FmtConfig::default()).await.unwrap();
        let names: Vec<&str> = outcome.results.iter().map(|r| r.formatter_name.as_str()).collect();
        assert_eq!(names, ["Autoformat", "Yapf"]);
        assert_eq!(
            outcome.render(),
            "𐄂 Autoformat made changes.\n\n✓ Yapf made no changes.\n"
        );
    }

    #[tokio::test]
    async fn lint_reports_first_failure() {
        let fx = Fixture::new(&[("src/a.py", "A"), ("docs/b.md", "b")]);
        let registry = FmtRegistry::new()
            .register(fx.language("python", "python_sources", "Yapf", upper))
            .unwrap()
            .register(fx.language("markdown", "markdown_sources", "Autoformat", exclaim))
            .unwrap();
        let targets = [
            target("src", "python_sources", &["src/a.py"]),
            target("docs", "markdown_sources", &["docs/b.md"]),
        ];
        let snapshot = fx.capture();
        let presence = WorkspaceSourcePresence::new(snapshot.clone());

        let outcome = run_lint(
            fx.session.clone(),
            &registry,
            &presence,
            snapshot.digest,
            &targets,
            &FmtConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.render(), "𐄂 Autoformat failed.\n\n✓ Yapf succeeded.\n");
        assert_eq!(fx.read("docs/b.md"), "b");
    }
}
