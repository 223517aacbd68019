//! Error taxonomy of one invocation

use crate::compiler::Diagnostic;
use crate::patch::PatchError;
use hotbench_engine::RunnerError;
use hotbench_gen::GenerationError;
use std::fmt;
use thiserror::Error;

/// What went wrong
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Workspace creation or removal, or another filesystem step, failed
    #[error("{context}: {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The synthesizer reported one or more errors
    #[error("benchmark generation failed: {}", join_messages(.errors))]
    Generation {
        /// Every problem reported, in class order
        errors: Vec<GenerationError>,
    },

    /// The compiler rejected the generated sources; displays as its log
    #[error("{log}")]
    Compilation {
        /// Trimmed combined compiler output
        log: String,
        /// Structured diagnostics
        diagnostics: Vec<Diagnostic>,
    },

    /// No compiler could be found
    #[error("compiler toolchain unavailable: {reason}")]
    ToolchainUnavailable {
        /// Why no compiler was usable
        reason: String,
    },

    /// Redirecting the process or the engine to the workspace failed
    #[error("failed to patch the environment: {0}")]
    Patch(#[source] PatchError),

    /// The measurement engine failed
    #[error("benchmark execution failed: {0}")]
    Execution(#[source] RunnerError),
}

fn join_messages(errors: &[GenerationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The single failure an invocation reports.
///
/// Cleanup failures that happen after the primary failure are kept as
/// [`suppressed`](Error::suppressed) errors instead of replacing it.
pub struct Error {
    kind: Box<ErrorKind>,
    suppressed: Vec<Error>,
}

impl Error {
    /// What went wrong
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Consume the error, returning its kind
    pub fn into_kind(self) -> ErrorKind {
        *self.kind
    }

    /// Errors raised while cleaning up after this one
    pub fn suppressed(&self) -> &[Error] {
        &self.suppressed
    }

    /// Record an error raised while cleaning up after this one
    pub fn add_suppressed(&mut self, error: Error) {
        self.suppressed.push(error);
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ErrorKind::Io {
            context: context.into(),
            source,
        }
        .into()
    }

    pub(crate) fn toolchain(reason: impl Into<String>) -> Self {
        ErrorKind::ToolchainUnavailable {
            reason: reason.into(),
        }
        .into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            suppressed: Vec::new(),
        }
    }
}

impl From<PatchError> for Error {
    fn from(e: PatchError) -> Self {
        ErrorKind::Patch(e).into()
    }
}

impl From<RunnerError> for Error {
    fn from(e: RunnerError) -> Self {
        ErrorKind::Execution(e).into()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Error");
        s.field("kind", &self.kind);
        if !self.suppressed.is_empty() {
            s.field("suppressed", &self.suppressed);
        }
        s.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)?;
        if !self.suppressed.is_empty() {
            write!(f, " (suppressed: ")?;
            for (i, e) in self.suppressed.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{e}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_compilation_displays_as_log() {
        let err: Error = ErrorKind::Compilation {
            log: "error[E0308]: mismatched types".to_string(),
            diagnostics: Vec::new(),
        }
        .into();
        assert_eq!(err.to_string(), "error[E0308]: mismatched types");
    }

    #[test]
    fn test_generation_lists_every_message() {
        let err: Error = ErrorKind::Generation {
            errors: vec![
                GenerationError::in_class("a", "first"),
                GenerationError::in_class("b", "second").at_line(3),
            ],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "benchmark generation failed: a: first; b:3: second"
        );
    }

    #[test]
    fn test_suppressed_errors_keep_primary() {
        let mut err = Error::toolchain("rustc not found");
        err.add_suppressed(Error::io(
            "failed to remove workspace",
            std::io::Error::other("busy"),
        ));
        assert!(matches!(err.kind(), ErrorKind::ToolchainUnavailable { .. }));
        assert_eq!(err.suppressed().len(), 1);
        assert_eq!(
            err.to_string(),
            "compiler toolchain unavailable: rustc not found (suppressed: failed to remove workspace: busy)"
        );
    }

    #[test]
    fn test_source_chain_preserved() {
        let err = Error::io("cannot create workspace", std::io::Error::other("disk full"));
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }
}
