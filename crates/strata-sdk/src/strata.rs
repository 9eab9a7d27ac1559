use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_coverage::{
    create_coverage_config, generate_coverage_reports, merge_coverage_data, CoverageConfig,
    CoverageData, CoverageReport, CoverageTool,
};
use strata_engine::{ProcessRunner, Session};
use strata_fmt::{
    run_fmt, run_lint, FmtOutcome, FmtRegistry, LintOutcome, Target, WorkspaceSourcePresence,
};
use strata_gc::{LiveSessions, StoreGcService};
use strata_source::{strip_source_roots, SourceFiles, StaticSourceRoots, StrippedSourceFiles};
use strata_store::{Clock, DiskWorkspace, InMemoryObjectStore, Snapshot, SystemClock};
use strata_types::{Digest, RelPath};
use tracing::info;

use crate::config::StrataConfig;
use crate::error::SdkResult;

/// One build root with its store, the sessions of in-flight runs and
/// background services.
///
/// Every goal runs in a fresh [`Session`]. The GC service keeps leasing a
/// session's output only while that session is alive.
pub struct Strata {
    root: PathBuf,
    config: StrataConfig,
    sessions: Arc<LiveSessions>,
    workspace: DiskWorkspace,
    source_roots: StaticSourceRoots,
    registry: FmtRegistry,
    gc: Option<StoreGcService>,
}

impl Strata {
    /// Open `root` with the system clock.
    pub fn open(root: impl Into<PathBuf>, config: StrataConfig) -> SdkResult<Self> {
        Self::with_clock(root, config, Arc::new(SystemClock))
    }

    /// Open `root`, reading `strata.toml` from it.
    pub fn open_dir(root: impl Into<PathBuf>) -> SdkResult<Self> {
        let root = root.into();
        let config = StrataConfig::from_dir(&root)?;
        Self::open(root, config)
    }

    pub fn with_clock(
        root: impl Into<PathBuf>,
        config: StrataConfig,
        clock: Arc<dyn Clock>,
    ) -> SdkResult<Self> {
        config.validate()?;
        let root = root.into();
        let store = Arc::new(InMemoryObjectStore::with_clock(config.store.clone(), clock));
        let workspace = DiskWorkspace::new(&root, Arc::clone(&store));
        let sessions = Arc::new(LiveSessions::new(store));
        let source_roots = StaticSourceRoots::new(config.source.roots.iter().cloned());
        info!(root = %root.display(), "strata opened");
        Ok(Self {
            root,
            config,
            sessions,
            workspace,
            source_roots,
            registry: FmtRegistry::new(),
            gc: None,
        })
    }

    /// Install the format registry. Languages are fixed from here on.
    pub fn with_registry(mut self, registry: FmtRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryObjectStore> {
        self.sessions.store()
    }

    pub fn sessions(&self) -> &Arc<LiveSessions> {
        &self.sessions
    }

    /// Start a run. Its output stays leased while the session is held.
    pub fn begin_session(&self) -> Arc<Session> {
        self.sessions.begin()
    }

    pub fn registry(&self) -> &FmtRegistry {
        &self.registry
    }

    // ---- Workspace ----

    /// Snapshot files (or whole directories) from disk.
    pub fn capture(&self, paths: &[RelPath]) -> SdkResult<Snapshot> {
        Ok(self.workspace.capture(paths)?)
    }

    pub fn strip_source_roots(&self, files: &SourceFiles) -> SdkResult<StrippedSourceFiles> {
        let session = self.begin_session();
        Ok(strip_source_roots(
            session.as_ref(),
            &self.source_roots,
            files,
        )?)
    }

    // ---- Goals ----

    /// Format `targets` in place.
    pub async fn fmt(&self, targets: &[Target]) -> SdkResult<FmtOutcome> {
        let snapshot = self.capture_sources(targets)?;
        let presence = WorkspaceSourcePresence::new(snapshot.clone());
        Ok(run_fmt(
            self.begin_session(),
            &self.registry,
            &presence,
            &self.workspace,
            snapshot.digest,
            targets,
            &self.config.fmt,
        )
        .await?)
    }

    /// Check `targets` without rewriting them.
    pub async fn lint(&self, targets: &[Target]) -> SdkResult<LintOutcome> {
        let snapshot = self.capture_sources(targets)?;
        let presence = WorkspaceSourcePresence::new(snapshot.clone());
        Ok(run_lint(
            self.begin_session(),
            &self.registry,
            &presence,
            snapshot.digest,
            targets,
            &self.config.fmt,
        )
        .await?)
    }

    /// The validated `.coveragerc`, built from the configured user config
    /// file if there is one.
    pub fn coverage_config(&self) -> SdkResult<CoverageConfig> {
        self.coverage_config_in(&self.begin_session())
    }

    fn coverage_config_in(&self, session: &Session) -> SdkResult<CoverageConfig> {
        let config = match &self.config.coverage.config {
            Some(path) => {
                let contents = fs::read_to_string(self.root.join(path))?;
                let path = path.to_string_lossy();
                create_coverage_config(session, Some((path.as_ref(), contents.as_str())))?
            }
            None => create_coverage_config(session, None)?,
        };
        Ok(config)
    }

    /// Merge per-test coverage data, generate every configured report and
    /// write the file-based ones under the output directory.
    pub async fn coverage_reports(
        &self,
        runner: Arc<dyn ProcessRunner>,
        tool: &CoverageTool,
        data: &[CoverageData],
        sources: Digest,
    ) -> SdkResult<Vec<CoverageReport>> {
        let session = self.begin_session();
        let config = self.coverage_config_in(&session)?;
        let merged = merge_coverage_data(session.as_ref(), runner.as_ref(), tool, data).await?;
        let reports = generate_coverage_reports(
            session.as_ref(),
            runner,
            tool,
            &config,
            &merged,
            sources,
            &self.config.coverage,
        )
        .await?;
        for report in &reports {
            if let CoverageReport::Filesystem(report) = report {
                report.materialize(session.as_ref(), &self.workspace)?;
            }
        }
        Ok(reports)
    }

    // ---- Store maintenance ----

    /// Start the background GC service. Starting twice is a no-op.
    pub fn start_gc(&mut self) -> SdkResult<&StoreGcService> {
        let service = match self.gc.take() {
            Some(service) => service,
            None => StoreGcService::start(
                self.config.gc.intervals(),
                self.sessions.clone(),
                Arc::clone(self.store().clock()),
            )?,
        };
        Ok(&*self.gc.insert(service))
    }

    pub fn gc(&self) -> Option<&StoreGcService> {
        self.gc.as_ref()
    }

    /// Stop background services.
    pub fn shutdown(mut self) -> SdkResult<()> {
        if let Some(gc) = self.gc.take() {
            gc.terminate();
            gc.join()?;
        }
        info!(root = %self.root.display(), "strata shut down");
        Ok(())
    }

    fn capture_sources(&self, targets: &[Target]) -> SdkResult<Snapshot> {
        let existing: Vec<RelPath> = targets
            .iter()
            .flat_map(|t| t.sources.iter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|path| self.root.join(path.as_str()).is_file())
            .cloned()
            .collect();
        self.capture(&existing)
    }
}

impl std::fmt::Debug for Strata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strata")
            .field("root", &self.root)
            .field("sessions", &self.sessions)
            .field("registry", &self.registry)
            .field("gc_running", &self.gc.is_some())
            .finish()
    }
}
