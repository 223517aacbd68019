//! Environment Patcher
//!
//! Points the process and the measurement engine at a workspace:
//!
//! 1. the original search path (`PATH`) is captured,
//! 2. the workspace is appended to it so the engine can resolve the harness,
//! 3. the engine's default compiler-hint list is replaced with the
//!    workspace's hint file,
//! 4. a runner is bound to the workspace's registry file.
//!
//! Only the search path is restored afterwards. The engine's default hint
//! list keeps the hints of the last invocation until the next one replaces it.

use hotbench_engine::{
    BENCHMARK_LIST, BenchmarkList, COMPILER_HINTS, CompilerHints, Options, OutputFormat,
    RegistryError, Runner,
};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the process search path
pub const SEARCH_PATH_VAR: &str = "PATH";

/// Errors raised while patching
#[derive(Debug, Error)]
pub enum PatchError {
    /// The workspace cannot be represented in the search path
    #[error("cannot add {path} to the search path: {source}")]
    SearchPath {
        /// Directory being added
        path: PathBuf,
        /// Why joining failed
        #[source]
        source: std::env::JoinPathsError,
    },

    /// The workspace hint list is missing or malformed
    #[error("cannot load compiler hints: {0}")]
    Hints(#[source] RegistryError),

    /// The workspace registry is missing or malformed
    #[error("cannot load benchmark registry: {0}")]
    Registry(#[source] RegistryError),
}

/// The process search path, captured once and restored to that exact value
#[derive(Debug)]
pub struct SearchPath {
    original: Option<OsString>,
    restored: bool,
}

impl SearchPath {
    /// Save the current search path
    pub fn capture() -> Self {
        Self {
            original: std::env::var_os(SEARCH_PATH_VAR),
            restored: false,
        }
    }

    /// The saved value; `None` when the variable was unset
    pub fn original(&self) -> Option<&OsStr> {
        self.original.as_deref()
    }

    /// Append `dir` to the current search path
    pub fn append(&mut self, dir: &Path) -> Result<(), PatchError> {
        let mut paths: Vec<PathBuf> = std::env::var_os(SEARCH_PATH_VAR)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        paths.push(dir.to_path_buf());

        let joined = std::env::join_paths(paths).map_err(|source| PatchError::SearchPath {
            path: dir.to_path_buf(),
            source,
        })?;
        set_search_path(Some(&joined));
        self.restored = false;
        tracing::debug!(dir = %dir.display(), "appended workspace to the search path");
        Ok(())
    }

    /// Put the saved value back
    pub fn restore(&mut self) {
        set_search_path(self.original.as_deref());
        self.restored = true;
        tracing::debug!("restored the search path");
    }
}

impl Drop for SearchPath {
    fn drop(&mut self) {
        if !self.restored {
            self.restore();
        }
    }
}

fn set_search_path(value: Option<&OsStr>) {
    // SAFETY: callers hold the invocation lock, which serializes every
    // environment mutation made by this crate.
    unsafe {
        match value {
            Some(value) => std::env::set_var(SEARCH_PATH_VAR, value),
            None => std::env::remove_var(SEARCH_PATH_VAR),
        }
    }
}

/// Replace the engine's default compiler-hint list with the workspace's.
///
/// Returns the number of hints installed.
pub fn patch_compiler_hints(workspace: &Path) -> Result<usize, PatchError> {
    let hints = CompilerHints::from_file(workspace.join(COMPILER_HINTS)).map_err(PatchError::Hints)?;
    let count = hints.len();
    CompilerHints::replace_default_list(hints);
    tracing::debug!(hints = count, "installed compiler hints");
    Ok(count)
}

/// Build a runner reading the workspace's registry.
///
/// The engine's validating constructors load the registry bundled beside
/// the current executable, which does not exist for generated harnesses.
/// This is the one place that uses the engine's unchecked construction and
/// registry replacement instead; a change in that engine contract only
/// affects this function.
pub fn bind_runner(
    options: Options,
    format: Box<dyn OutputFormat>,
    workspace: &Path,
) -> Result<Runner, PatchError> {
    let registry =
        BenchmarkList::from_file(workspace.join(BENCHMARK_LIST)).map_err(PatchError::Registry)?;
    tracing::debug!(benchmarks = registry.len(), "bound runner to workspace registry");

    let mut runner = Runner::unchecked(options, format);
    runner.replace_registry(registry);
    Ok(runner)
}
