//! Engine error types

use crate::protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or writing registry and hint resources
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed registry entry at line {line}: {source}")]
    MalformedEntry {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed compiler hint at line {line}: {reason}")]
    MalformedHint { line: usize, reason: String },

    #[error("could not serialize registry entry: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no resource directory next to the current executable: {0}")]
    NoResourceRoot(String),
}

/// Errors raised by [`Runner`](crate::Runner)
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("benchmark registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    #[error("harness `{harness}` not found on the search path: {source}")]
    HarnessNotFound {
        harness: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to spawn fork of `{harness}`: {source}")]
    Spawn {
        harness: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fork protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("fork crashed while running {benchmark}: {message}")]
    ForkCrashed { benchmark: String, message: String },

    #[error("fork running {benchmark} exceeded its timeout of {timeout:?}")]
    Timeout { benchmark: String, timeout: Duration },

    #[error("benchmark {benchmark} failed: {message}")]
    BenchmarkFailed { benchmark: String, message: String },
}
