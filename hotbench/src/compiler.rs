//! Toolchain Compiler Adapter
//!
//! One `rustc` invocation per run: the generated crate root is compiled into
//! the harness executable, with the output directory and the library search
//! path both pointing at the workspace. Diagnostics are requested as JSON and
//! folded into a structured list plus one combined log.

use crate::error::{Error, ErrorKind};
use hotbench_gen::HARNESS_ROOT;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

/// Environment variable naming the compiler, as honoured by cargo
pub const RUSTC_ENV: &str = "RUSTC";

/// How the harness is compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// Explicit compiler; otherwise `$RUSTC`, then `rustc` on the search path
    pub rustc: Option<PathBuf>,
    /// Rust edition of the generated crate
    pub edition: String,
    /// `-C opt-level`
    pub opt_level: String,
    /// Extra arguments appended to the compiler command line
    pub extra_args: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            rustc: None,
            edition: "2021".to_string(),
            opt_level: "3".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// One compiler diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `error`, `warning`, `note`, ...
    pub level: String,
    /// Primary message
    pub message: String,
    /// Human-readable rendering, when the compiler supplied one
    pub rendered: Option<String>,
}

impl Diagnostic {
    /// Whether this diagnostic is an error
    pub fn is_error(&self) -> bool {
        self.level.starts_with("error")
    }
}

#[derive(Deserialize)]
struct RawDiagnostic {
    #[serde(rename = "$message_type", default)]
    message_type: Option<String>,
    level: String,
    message: String,
    #[serde(default)]
    rendered: Option<String>,
}

/// Outcome of a compiler run
#[derive(Debug, Clone)]
pub struct CompileReport {
    /// Whether the compiler exited successfully
    pub success: bool,
    /// Source files found in the workspace
    pub sources: Vec<PathBuf>,
    /// Structured diagnostics
    pub diagnostics: Vec<Diagnostic>,
    /// Combined diagnostic output
    pub log: String,
    /// The compiled harness executable
    pub artifact: PathBuf,
}

/// A located compiler
#[derive(Debug, Clone)]
pub struct Compiler {
    rustc: PathBuf,
    config: ToolchainConfig,
}

impl Compiler {
    /// Find the compiler described by `config`.
    ///
    /// Fails with [`ErrorKind::ToolchainUnavailable`] when none is present.
    pub fn locate(config: &ToolchainConfig) -> Result<Self, Error> {
        let rustc = match &config.rustc {
            Some(path) => resolve(path.as_os_str())
                .ok_or_else(|| Error::toolchain(format!("{} does not exist", path.display())))?,
            None => match std::env::var_os(RUSTC_ENV).filter(|v| !v.is_empty()) {
                Some(value) => resolve(&value).ok_or_else(|| {
                    Error::toolchain(format!(
                        "${RUSTC_ENV} names {}, which cannot be found",
                        PathBuf::from(&value).display()
                    ))
                })?,
                None => which::which("rustc")
                    .map_err(|e| Error::toolchain(format!("rustc is not on the search path: {e}")))?,
            },
        };

        tracing::debug!(rustc = %rustc.display(), "located compiler");
        Ok(Self {
            rustc,
            config: config.clone(),
        })
    }

    /// Path of the compiler executable
    pub fn rustc(&self) -> &Path {
        &self.rustc
    }

    /// Every `.rs` file below `workspace`, sorted
    pub fn discover_sources(workspace: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut sources = Vec::new();
        for entry in WalkDir::new(workspace) {
            let entry = entry.map_err(|e| {
                Error::io(
                    format!("cannot scan {} for generated sources", workspace.display()),
                    e.into(),
                )
            })?;
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "rs")
            {
                sources.push(entry.into_path());
            }
        }
        sources.sort();
        Ok(sources)
    }

    /// Compile the harness crate in `workspace` into an executable named
    /// `harness`
    pub fn compile(&self, workspace: &Path, harness: &str) -> Result<CompileReport, Error> {
        let sources = Self::discover_sources(workspace)?;
        let root = workspace.join(HARNESS_ROOT);
        if !sources.contains(&root) {
            return Err(ErrorKind::Compilation {
                log: format!("generated crate root {} is missing", root.display()),
                diagnostics: Vec::new(),
            }
            .into());
        }

        let mut command = Command::new(&self.rustc);
        command
            .current_dir(workspace)
            .arg("--edition")
            .arg(&self.config.edition)
            .args(["--crate-type", "bin", "--crate-name", harness])
            .arg("-C")
            .arg(format!("opt-level={}", self.config.opt_level))
            .arg("--error-format=json")
            .arg("--out-dir")
            .arg(workspace)
            .arg("-L")
            .arg(workspace)
            .args(&self.config.extra_args)
            .arg(&root);

        tracing::debug!(sources = sources.len(), ?command, "invoking compiler");
        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::toolchain(format!("cannot execute {}: {e}", self.rustc.display()))
            } else {
                Error::io(format!("cannot run {}", self.rustc.display()), e)
            }
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let (diagnostics, mut log) = parse_diagnostics(&stderr);
        if !stdout.trim().is_empty() {
            log.push_str(&stdout);
        }
        let success = output.status.success();
        if !success && log.trim().is_empty() {
            log = format!("{} exited with {}", self.rustc.display(), output.status);
        }

        let artifact = workspace.join(format!("{harness}{}", std::env::consts::EXE_SUFFIX));
        if success && !artifact.is_file() {
            return Err(ErrorKind::Compilation {
                log: format!("compiler succeeded but {} was not produced", artifact.display()),
                diagnostics,
            }
            .into());
        }

        tracing::debug!(
            success,
            diagnostics = diagnostics.len(),
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            "compiler finished"
        );
        Ok(CompileReport {
            success,
            sources,
            diagnostics,
            log,
            artifact,
        })
    }
}

/// Resolve an explicit compiler: an existing path, or a bare name looked up
/// on the search path
fn resolve(value: &std::ffi::OsStr) -> Option<PathBuf> {
    let path = PathBuf::from(value);
    if path.is_file() {
        return Some(path);
    }
    if path.components().count() == 1 {
        return which::which(OsString::from(value)).ok();
    }
    None
}

/// Split compiler stderr into structured diagnostics and a combined log.
///
/// Lines that are not JSON diagnostics are kept in the log verbatim.
pub(crate) fn parse_diagnostics(stderr: &str) -> (Vec<Diagnostic>, String) {
    let mut diagnostics = Vec::new();
    let mut log = String::new();

    for line in stderr.lines() {
        let raw = line
            .trim_start()
            .starts_with('{')
            .then(|| serde_json::from_str::<RawDiagnostic>(line).ok())
            .flatten()
            .filter(|raw| raw.message_type.as_deref().is_none_or(|t| t == "diagnostic"));

        match raw {
            Some(raw) => {
                match &raw.rendered {
                    Some(rendered) => log.push_str(rendered),
                    None => {
                        log.push_str(&format!("{}: {}", raw.level, raw.message));
                        log.push('\n');
                    }
                }
                diagnostics.push(Diagnostic {
                    level: raw.level,
                    message: raw.message,
                    rendered: raw.rendered,
                });
            }
            None => {
                log.push_str(line);
                log.push('\n');
            }
        }
    }

    (diagnostics, log)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STDERR: &str = concat!(
        r#"{"$message_type":"diagnostic","message":"mismatched types","code":{"code":"E0308","explanation":null},"level":"error","spans":[],"children":[],"rendered":"error[E0308]: mismatched types\n --> sorting.rs:3:20\n"}"#,
        "\n",
        r#"{"$message_type":"diagnostic","message":"aborting due to 1 previous error","code":null,"level":"error","spans":[],"children":[],"rendered":"error: aborting due to 1 previous error\n"}"#,
        "\n",
        "note: plain text line\n",
    );

    #[test]
    fn test_parse_json_diagnostics() {
        let (diagnostics, log) = parse_diagnostics(STDERR);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].message, "mismatched types");
        assert!(log.starts_with("error[E0308]: mismatched types\n --> sorting.rs:3:20\n"));
        assert!(log.contains("aborting due to 1 previous error"));
        assert!(log.ends_with("note: plain text line\n"));
    }

    #[test]
    fn test_explicit_missing_compiler_is_unavailable() {
        let config = ToolchainConfig {
            rustc: Some(PathBuf::from("/definitely/not/here/rustc")),
            ..ToolchainConfig::default()
        };
        let err = Compiler::locate(&config).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ToolchainUnavailable { .. }));
    }

    #[test]
    fn test_discover_sources_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("harness.rs"), "").unwrap();
        std::fs::write(dir.path().join("nested/inner.rs"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let sources = Compiler::discover_sources(dir.path()).unwrap();
        assert_eq!(
            sources,
            [dir.path().join("harness.rs"), dir.path().join("nested/inner.rs")]
        );
    }

    #[test]
    fn test_missing_crate_root_fails_compilation() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Compiler {
            rustc: PathBuf::from("rustc"),
            config: ToolchainConfig::default(),
        };
        let err = compiler.compile(dir.path(), "harness").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Compilation { .. }));
    }
}
