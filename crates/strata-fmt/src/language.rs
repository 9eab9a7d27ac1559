use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use strata_engine::{Process, ProcessRunner, Session};
use strata_store::{DigestAlgebra, Snapshot};
use strata_types::{Digest, RelPath};
use tracing::debug;

use crate::config::FormatterSettings;
use crate::error::Result;
use crate::result::{FmtResult, LanguageFmtResults, LintResult};
use crate::target::Target;

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Input to one formatter run: the targets being formatted and the current
/// state of their sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FmtRequest {
    pub targets: Vec<Target>,
    pub snapshot: Snapshot,
}

/// A single formatting tool.
#[async_trait]
pub trait Formatter: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite the request's sources. A formatter that is switched off
    /// returns [`FmtResult::noop`].
    async fn fmt(&self, session: &Session, request: &FmtRequest) -> Result<FmtResult>;

    /// Check the request's sources without rewriting them. `None` when the
    /// formatter is switched off.
    async fn lint(&self, session: &Session, request: &FmtRequest) -> Result<Option<LintResult>>;
}

// ---------------------------------------------------------------------------
// LanguageFormatter
// ---------------------------------------------------------------------------

/// All the formatters for one language.
///
/// Formatters within a language must run one at a time so they do not
/// overwrite each other; different languages are safe to run in parallel.
#[async_trait]
pub trait LanguageFormatter: Send + Sync {
    fn language(&self) -> &str;

    fn required_fields(&self) -> &[String];

    fn belongs_to_language(&self, target: &Target) -> bool {
        target.has_fields(self.required_fields())
    }

    /// Format `targets`, whose sources are read from `workspace`.
    async fn format(
        &self,
        session: Arc<Session>,
        targets: Vec<Target>,
        workspace: Digest,
    ) -> Result<LanguageFmtResults>;

    async fn lint(
        &self,
        _session: Arc<Session>,
        _targets: Vec<Target>,
        _workspace: Digest,
    ) -> Result<Vec<LintResult>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// FormatterPipeline
// ---------------------------------------------------------------------------

/// A language implemented as an ordered chain of formatters, each one
/// taking the previous one's output as its input.
pub struct FormatterPipeline {
    language: String,
    required_fields: Vec<String>,
    formatters: Vec<Arc<dyn Formatter>>,
}

impl FormatterPipeline {
    pub fn new<I, S>(language: impl Into<String>, required_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            language: language.into(),
            required_fields: required_fields.into_iter().map(Into::into).collect(),
            formatters: Vec::new(),
        }
    }

    /// Append a formatter to the end of the chain.
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn formatter_count(&self) -> usize {
        self.formatters.len()
    }

    fn sources_of(
        session: &Session,
        targets: &[Target],
        workspace: &Digest,
    ) -> Result<Snapshot> {
        let sources: Vec<RelPath> = targets
            .iter()
            .flat_map(|t| t.sources.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let digest = session.subset(workspace, &sources)?;
        Ok(session.snapshot(&digest)?)
    }
}

#[async_trait]
impl LanguageFormatter for FormatterPipeline {
    fn language(&self) -> &str {
        &self.language
    }

    fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    async fn format(
        &self,
        session: Arc<Session>,
        targets: Vec<Target>,
        workspace: Digest,
    ) -> Result<LanguageFmtResults> {
        let original = Self::sources_of(&session, &targets, &workspace)?;
        let input = original.digest;
        let mut current = original;
        let mut results = Vec::with_capacity(self.formatters.len());

        for formatter in &self.formatters {
            let request = FmtRequest {
                targets: targets.clone(),
                snapshot: current.clone(),
            };
            let result = formatter.fmt(&session, &request).await?;
            if result.is_noop() {
                continue;
            }
            if result.output != current.digest {
                current = session.snapshot(&result.output)?;
            }
            results.push(result);
        }

        debug!(
            language = %self.language,
            targets = targets.len(),
            formatters = results.len(),
            changed = input != current.digest,
            "language formatted"
        );
        Ok(LanguageFmtResults {
            results,
            input,
            output: current.digest,
        })
    }

    async fn lint(
        &self,
        session: Arc<Session>,
        targets: Vec<Target>,
        workspace: Digest,
    ) -> Result<Vec<LintResult>> {
        let request = FmtRequest {
            snapshot: Self::sources_of(&session, &targets, &workspace)?,
            targets,
        };
        let mut results = Vec::new();
        for formatter in &self.formatters {
            if let Some(result) = formatter.lint(&session, &request).await? {
                results.push(result);
            }
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// ProcessFormatter
// ---------------------------------------------------------------------------

/// A formatter backed by an external tool.
///
/// The tool is run over the request's files with `fmt_flag` to rewrite
/// them in place, or with `check_flag` to only report.
pub struct ProcessFormatter {
    name: String,
    argv: Vec<String>,
    fmt_flag: String,
    check_flag: String,
    settings: FormatterSettings,
    tool: Digest,
    runner: Arc<dyn ProcessRunner>,
}

impl ProcessFormatter {
    /// `argv` is the tool's command line up to its mode flag; `tool` is the
    /// digest of the tool itself, merged into the sandbox.
    pub fn new(
        name: impl Into<String>,
        argv: Vec<String>,
        tool: Digest,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            name: name.into(),
            argv,
            fmt_flag: "--in-place".into(),
            check_flag: "--check".into(),
            settings: FormatterSettings::default(),
            tool,
            runner,
        }
    }

    pub fn with_flags(mut self, fmt_flag: impl Into<String>, check_flag: impl Into<String>) -> Self {
        self.fmt_flag = fmt_flag.into();
        self.check_flag = check_flag.into();
        self
    }

    pub fn with_settings(mut self, settings: FormatterSettings) -> Self {
        self.settings = settings;
        self
    }

    fn process(&self, session: &Session, request: &FmtRequest, check_only: bool) -> Result<Process> {
        let input = session.merge(&[request.snapshot.digest, self.tool])?;

        let mut argv = self.argv.clone();
        let flag = if check_only {
            &self.check_flag
        } else {
            &self.fmt_flag
        };
        argv.push(flag.clone());
        argv.extend(self.settings.args.iter().cloned());
        argv.extend(request.snapshot.files.iter().map(|f| f.to_string()));

        let mut addresses: Vec<String> = request.targets.iter().map(|t| t.address.spec()).collect();
        addresses.sort();
        let description = format!(
            "Run {} on {}: {}.",
            self.name,
            pluralize(request.targets.len(), "target"),
            addresses.join(", ")
        );

        Ok(Process::new(argv, input, description).with_output_files(request.snapshot.files.clone()))
    }
}

#[async_trait]
impl Formatter for ProcessFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fmt(&self, session: &Session, request: &FmtRequest) -> Result<FmtResult> {
        if self.settings.skip {
            return Ok(FmtResult::noop());
        }
        let process = self.process(session, request, false)?;
        let result = self.runner.run(process).await?;
        Ok(FmtResult::from_process_result(
            result,
            request.snapshot.digest,
            &self.name,
        ))
    }

    async fn lint(&self, session: &Session, request: &FmtRequest) -> Result<Option<LintResult>> {
        if self.settings.skip {
            return Ok(None);
        }
        let process = self.process(session, request, true)?;
        let result = self.runner.run_fallible(process).await?;
        Ok(Some(LintResult::from_fallible_process_result(result, &self.name)))
    }
}

fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use strata_engine::{FallibleProcessResult, ProcessError};
    use strata_store::{FileContent, InMemoryObjectStore};
    use strata_types::Address;

    /// Rewrites every output file with `transform`; exits nonzero in check
    /// mode when any file would change.
    pub(crate) struct Rewrite {
        pub session: Arc<Session>,
        pub transform: fn(&str) -> String,
        pub seen: Mutex<Vec<Process>>,
    }

    impl Rewrite {
        pub(crate) fn new(session: Arc<Session>, transform: fn(&str) -> String) -> Arc<Self> {
            Arc::new(Self {
                session,
                transform,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcessRunner for Rewrite {
        async fn run_fallible(
            &self,
            process: Process,
        ) -> std::result::Result<FallibleProcessResult, ProcessError> {
            self.seen.lock().unwrap().push(process.clone());
            let err = |e: strata_store::StoreError| ProcessError::Execution {
                description: process.description.clone(),
                message: e.to_string(),
            };
            let mut changed = false;
            let mut outputs = Vec::new();
            for file in self.session.contents(&process.input_digest).map_err(err)? {
                if !process.output_files.contains(&file.path) {
                    continue;
                }
                let before = String::from_utf8_lossy(&file.content).into_owned();
                let after = (self.transform)(&before);
                changed |= before != after;
                outputs.push(FileContent::new(file.path, after));
            }
            let check_only = process.argv.iter().any(|a| a == "--check");
            let output_digest = self.session.create_digest(outputs).map_err(err)?;
            Ok(FallibleProcessResult {
                exit_code: i32::from(check_only && changed),
                stdout: Vec::new(),
                stderr: Vec::new(),
                output_digest,
            })
        }
    }

    pub(crate) fn p(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    pub(crate) fn upper(s: &str) -> String {
        s.to_uppercase()
    }

    fn trim(s: &str) -> String {
        s.trim_end().to_string()
    }

    fn setup(files: &[(&str, &str)]) -> (Arc<Session>, Digest) {
        let session = Arc::new(Session::new(Arc::new(InMemoryObjectStore::new())));
        let digest = session
            .create_digest(
                files
                    .iter()
                    .map(|(path, body)| FileContent::new(p(path), body.as_bytes()))
                    .collect(),
            )
            .unwrap();
        (session, digest)
    }

    fn target(spec: &str, sources: &[&str]) -> Target {
        Target::new(Address::parse(spec).unwrap())
            .with_field("python_sources")
            .with_sources(sources.iter().map(|s| p(s)))
    }

    fn tool(name: &str, runner: Arc<dyn ProcessRunner>) -> Arc<dyn Formatter> {
        Arc::new(ProcessFormatter::new(
            name,
            vec![name.to_lowercase()],
            strata_store::empty_digest(),
            runner,
        ))
    }

    #[tokio::test]
    async fn pipeline_chains_formatter_outputs() {
        let (session, workspace) = setup(&[("app/a.py", "x = 1   ")]);
        let pipeline = FormatterPipeline::new("python", ["python_sources"])
            .with_formatter(tool("Trim", Rewrite::new(session.clone(), trim)))
            .with_formatter(tool("Upper", Rewrite::new(session.clone(), upper)));

        let results = pipeline
            .format(session.clone(), vec![target("app", &["app/a.py"])], workspace)
            .await
            .unwrap();

        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[1].input, results.results[0].output);
        assert_eq!(results.output, results.results[1].output);
        assert!(results.did_change());
        let contents = session.contents(&results.output).unwrap();
        assert_eq!(contents[0].content, b"X = 1");
    }

    #[tokio::test]
    async fn skipped_formatter_is_left_out() {
        let (session, workspace) = setup(&[("app/a.py", "x")]);
        let skipped = ProcessFormatter::new(
            "Skipped",
            vec!["skipped".into()],
            strata_store::empty_digest(),
            Rewrite::new(session.clone(), upper),
        )
        .with_settings(FormatterSettings {
            skip: true,
            args: Vec::new(),
        });
        let pipeline =
            FormatterPipeline::new("python", ["python_sources"]).with_formatter(Arc::new(skipped));

        let results = pipeline
            .format(session, vec![target("app", &["app/a.py"])], workspace)
            .await
            .unwrap();
        assert!(results.results.is_empty());
        assert!(!results.did_change());
    }

    #[tokio::test]
    async fn process_carries_flags_args_and_description() {
        let (session, workspace) = setup(&[("a/x.py", "x"), ("b/y.py", "y")]);
        let runner = Rewrite::new(session.clone(), upper);
        let formatter = ProcessFormatter::new(
            "Docformatter",
            vec!["docformatter".into()],
            strata_store::empty_digest(),
            runner.clone(),
        )
        .with_settings(FormatterSettings {
            skip: false,
            args: vec!["--wrap-summaries=100".into()],
        });
        let pipeline =
            FormatterPipeline::new("python", ["python_sources"]).with_formatter(Arc::new(formatter));

        pipeline
            .format(
                session,
                vec![target("b", &["b/y.py"]), target("a", &["a/x.py"])],
                workspace,
            )
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(
            seen[0].argv,
            ["docformatter", "--in-place", "--wrap-summaries=100", "a/x.py", "b/y.py"]
        );
        assert_eq!(seen[0].description, "Run Docformatter on 2 targets: a, b.");
        assert_eq!(seen[0].output_files, vec![p("a/x.py"), p("b/y.py")]);
    }

    #[tokio::test]
    async fn lint_reports_nonzero_exit_as_data() {
        let (session, workspace) = setup(&[("app/a.py", "lower")]);
        let runner = Rewrite::new(session.clone(), upper);
        let pipeline = FormatterPipeline::new("python", ["python_sources"])
            .with_formatter(tool("Upper", runner.clone()));

        let results = pipeline
            .lint(session, vec![target("app", &["app/a.py"])], workspace)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].exit_code, 1);
        assert_eq!(results[0].linter_name, "Upper");
        assert!(runner.seen.lock().unwrap()[0].argv.contains(&"--check".to_string()));
    }

    #[test]
    fn pluralizes_targets() {
        assert_eq!(pluralize(1, "target"), "1 target");
        assert_eq!(pluralize(3, "target"), "3 targets");
    }
}
