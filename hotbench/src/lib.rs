#![warn(missing_docs)]
//! # Hotbench
//!
//! Run benchmarks for a set of benchmark classes from inside a program,
//! without a separate build step. One call walks the whole pipeline:
//!
//! 1. create an isolated workspace directory,
//! 2. generate harness sources, the benchmark registry and compiler hints,
//! 3. compile the harness with `rustc`,
//! 4. patch the search path and the measurement engine to point at the
//!    workspace,
//! 5. run the engine,
//! 6. restore the search path and delete the workspace, whatever happened.
//!
//! ```ignore
//! use hotbench::{BenchmarkClass, Options};
//!
//! let class = BenchmarkClass::new("sorting", r#"
//!     #![warmup(iterations = 2, time = "100ms")]
//!
//!     #[benchmark]
//!     fn sort_small() -> Vec<u32> {
//!         let mut v = vec![5, 3, 1, 4, 2];
//!         v.sort();
//!         v
//!     }
//! "#);
//!
//! let results = hotbench::start(Options::default(), &[class])?;
//! for result in &results {
//!     println!("{}: {:.3} ns/op", result.benchmark, result.score());
//! }
//! ```
//!
//! The search path and the engine's defaults are process-wide, so
//! invocations are serialized by a process-wide lock: a second caller blocks
//! until the first one has cleaned up.

mod compiler;
mod error;
mod execution;
mod patch;
mod synthesizer;
mod workspace;

pub use compiler::{CompileReport, Compiler, Diagnostic, RUSTC_ENV, ToolchainConfig};
pub use error::{Error, ErrorKind};
pub use patch::{PatchError, SEARCH_PATH_VAR, SearchPath, bind_runner, patch_compiler_hints};
pub use synthesizer::GenerationReport;
pub use workspace::Workspace;

pub use hotbench_engine::{
    CompilerHints, HintDirective, IterationResult, Options, OptionsBuilder, OutputFormat,
    ProtocolError, RunResult, RunnerError, SummaryStatistics, TextFormat, VerboseMode,
    create_format_instance,
};
pub use hotbench_gen::{BenchmarkClass, GenerationError};

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

static INVOCATION_LOCK: Mutex<()> = Mutex::new(());

/// Driver settings that are not run options
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Compiler selection and flags
    pub toolchain: ToolchainConfig,
    /// Directory that receives workspaces; the system temporary directory
    /// when unset
    pub workspace_root: Option<PathBuf>,
}

/// Runs the generate, compile, patch, execute and cleanup pipeline
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: DriverConfig,
}

impl Driver {
    /// Driver with the given settings
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Settings
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Benchmark `classes`, reporting through the default output format
    /// for `options`
    pub fn start(
        &self,
        options: Options,
        classes: &[BenchmarkClass],
    ) -> Result<Vec<RunResult>, Error> {
        let format = default_output_format(&options)?;
        self.start_with_format(options, format, classes)
    }

    /// Benchmark `classes`, reporting through `format`
    pub fn start_with_format(
        &self,
        options: Options,
        format: Box<dyn OutputFormat>,
        classes: &[BenchmarkClass],
    ) -> Result<Vec<RunResult>, Error> {
        let _guard = INVOCATION_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut search_path = SearchPath::capture();
        let workspace = Workspace::create(self.config.workspace_root.as_deref())?;
        tracing::info!(
            workspace = %workspace.path().display(),
            classes = classes.len(),
            "starting benchmark invocation"
        );

        let outcome = self.run_pipeline(&workspace, &mut search_path, options, format, classes);

        tracing::debug!(phase = "unpatching", workspace = %workspace.path().display());
        search_path.restore();
        let cleanup = workspace.destroy();

        finish(outcome, cleanup)
    }

    fn run_pipeline(
        &self,
        workspace: &Workspace,
        search_path: &mut SearchPath,
        options: Options,
        format: Box<dyn OutputFormat>,
        classes: &[BenchmarkClass],
    ) -> Result<Vec<RunResult>, Error> {
        let compiler = Compiler::locate(&self.config.toolchain)?;

        tracing::debug!(phase = "generating", workspace = %workspace.path().display());
        let generated = synthesizer::generate(classes, workspace)?;

        tracing::debug!(
            phase = "compiling",
            workspace = %workspace.path().display(),
            sources = generated.sources.len()
        );
        let report = compiler.compile(workspace.path(), &generated.harness)?;
        if !report.success {
            return Err(ErrorKind::Compilation {
                log: report.log.trim().to_string(),
                diagnostics: report.diagnostics,
            }
            .into());
        }

        search_path.append(workspace.path())?;
        patch::patch_compiler_hints(workspace.path())?;
        let mut runner = patch::bind_runner(options, format, workspace.path())?;
        tracing::debug!(
            phase = "patched",
            workspace = %workspace.path().display(),
            benchmarks = generated.benchmarks
        );

        tracing::debug!(phase = "executing", workspace = %workspace.path().display());
        execution::run(&mut runner)
    }
}

/// Combine the pipeline outcome with the cleanup outcome. A cleanup failure
/// never replaces an earlier failure; it is attached to it as suppressed.
fn finish(
    outcome: Result<Vec<RunResult>, Error>,
    cleanup: Result<(), Error>,
) -> Result<Vec<RunResult>, Error> {
    match (outcome, cleanup) {
        (Ok(results), Ok(())) => {
            tracing::info!(results = results.len(), "benchmark invocation finished");
            Ok(results)
        }
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(primary), Ok(())) => Err(primary),
        (Err(mut primary), Err(cleanup)) => {
            tracing::warn!(error = %cleanup, "cleanup failed after an earlier failure");
            primary.add_suppressed(cleanup);
            Err(primary)
        }
    }
}

/// Benchmark `classes` with the default driver settings
pub fn start(options: Options, classes: &[BenchmarkClass]) -> Result<Vec<RunResult>, Error> {
    Driver::default().start(options, classes)
}

/// Benchmark `classes` with the default driver settings, reporting through
/// `format`
pub fn start_with_format(
    options: Options,
    format: Box<dyn OutputFormat>,
    classes: &[BenchmarkClass],
) -> Result<Vec<RunResult>, Error> {
    Driver::default().start_with_format(options, format, classes)
}

/// The output format used when none is given: the options' output file if
/// set, otherwise stdout, at the options' verbosity
pub fn default_output_format(options: &Options) -> Result<Box<dyn OutputFormat>, Error> {
    let out: Box<dyn Write + Send> = match options.output() {
        Some(path) => Box::new(std::fs::File::create(path).map_err(|e| {
            Error::io(format!("cannot open output file {}", path.display()), e)
        })?),
        None => Box::new(std::io::stdout()),
    };
    Ok(create_format_instance(out, options.verbosity()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleanup_failure() -> Error {
        Error::io(
            "cannot delete workspace /tmp/hotbench1",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        )
    }

    fn primary_failure() -> Error {
        ErrorKind::ToolchainUnavailable {
            reason: "rustc is missing".to_string(),
        }
        .into()
    }

    #[test]
    fn test_finish_success() {
        let results = finish(Ok(Vec::new()), Ok(())).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_finish_cleanup_failure_after_success() {
        let err = finish(Ok(Vec::new()), Err(cleanup_failure())).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { .. }));
        assert!(err.suppressed().is_empty());
    }

    #[test]
    fn test_finish_primary_failure() {
        let err = finish(Err(primary_failure()), Ok(())).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ToolchainUnavailable { .. }));
        assert!(err.suppressed().is_empty());
    }

    #[test]
    fn test_finish_keeps_primary_and_suppresses_cleanup() {
        let err = finish(Err(primary_failure()), Err(cleanup_failure())).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ToolchainUnavailable { .. }));
        assert_eq!(err.suppressed().len(), 1);
        assert!(matches!(err.suppressed()[0].kind(), ErrorKind::Io { .. }));
        assert!(err.to_string().contains("suppressed"));
    }
}
