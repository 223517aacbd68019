//! Fork Protocol
//!
//! Line-oriented messages exchanged with harness forks. Every protocol line
//! starts with [`PROTOCOL_PREFIX`]; anything else a fork prints on stdout is
//! ordinary benchmark output. Workers write a line break before each
//! message, so output a benchmark left without a trailing newline cannot
//! swallow the prefix; the resulting blank lines are not forwarded.
//!
//! ```text
//! worker:     @hotbench hello <version> <hint-count>
//! supervisor: @hotbench run <id> <warmup-its> <warmup-ns> <measure-its> <measure-ns>
//! worker:     @hotbench warmup <index> <ops> <nanos>
//! worker:     @hotbench measure <index> <ops> <nanos>
//! worker:     @hotbench complete <ops> <nanos>
//! worker:     @hotbench failure <escaped message>
//! supervisor: @hotbench shutdown
//! ```

use crate::PROTOCOL_PREFIX;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Protocol violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("line is not a protocol message: {0:?}")]
    MissingPrefix(String),

    #[error("unknown message `{0}`")]
    UnknownMessage(String),

    #[error("message `{message}` is missing field `{field}`")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    #[error("field `{field}` has invalid value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("message `{0}` has trailing fields")]
    TrailingFields(&'static str),

    #[error("protocol version mismatch: supervisor speaks {expected}, fork speaks {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("unexpected message: {0}")]
    Unexpected(String),

    #[error("fork closed its output before {0}")]
    UnexpectedEof(&'static str),

    #[error("fork reported {found} compiler hints, {expected} were sent")]
    HintCountMismatch { expected: usize, found: usize },

    #[error("fork completed after {found} measurement iterations, {expected} were requested")]
    IterationCount { expected: usize, found: usize },
}

/// Messages sent from the supervisor to a fork
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    /// Run one benchmark
    Run {
        /// Benchmark id
        benchmark: String,
        /// Warmup iteration count
        warmup_iterations: u32,
        /// Warmup iteration time
        warmup_time: Duration,
        /// Measurement iteration count
        measurement_iterations: u32,
        /// Measurement iteration time
        measurement_time: Duration,
    },
    /// Exit the fork
    Shutdown,
}

/// Messages sent from a fork to the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Sent once after startup
    Hello {
        /// Protocol version the fork speaks
        version: u32,
        /// Number of compiler hints the fork received
        hint_count: usize,
    },
    /// A finished warmup iteration
    Warmup {
        /// Zero-based iteration index
        index: u32,
        /// Operations executed
        operations: u64,
        /// Elapsed nanoseconds
        nanos: u64,
    },
    /// A finished measurement iteration
    Measure {
        /// Zero-based iteration index
        index: u32,
        /// Operations executed
        operations: u64,
        /// Elapsed nanoseconds
        nanos: u64,
    },
    /// The benchmark run finished
    Complete {
        /// Total measured operations
        operations: u64,
        /// Total measured nanoseconds
        nanos: u64,
    },
    /// The benchmark body panicked or the request could not be served
    Failure {
        /// Failure description
        message: String,
    },
}

/// Escape a message so it fits on one protocol line
pub fn escape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]
pub fn unescape(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Strip the protocol prefix, returning `None` for ordinary output
pub fn strip_prefix(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(PROTOCOL_PREFIX)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

struct Fields<'a> {
    message: &'static str,
    parts: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(message: &'static str, rest: &'a str) -> Self {
        Self {
            message,
            parts: rest.split_whitespace(),
        }
    }

    fn next<T: FromStr>(&mut self, field: &'static str) -> Result<T, ProtocolError> {
        let raw = self.parts.next().ok_or(ProtocolError::MissingField {
            message: self.message,
            field,
        })?;
        raw.parse().map_err(|_| ProtocolError::InvalidField {
            field,
            value: raw.to_string(),
        })
    }

    fn finish(mut self) -> Result<(), ProtocolError> {
        match self.parts.next() {
            Some(_) => Err(ProtocolError::TrailingFields(self.message)),
            None => Ok(()),
        }
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl fmt::Display for SupervisorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorCommand::Run {
                benchmark,
                warmup_iterations,
                warmup_time,
                measurement_iterations,
                measurement_time,
            } => write!(
                f,
                "{PROTOCOL_PREFIX} run {benchmark} {warmup_iterations} {} {measurement_iterations} {}",
                duration_nanos(*warmup_time),
                duration_nanos(*measurement_time),
            ),
            SupervisorCommand::Shutdown => write!(f, "{PROTOCOL_PREFIX} shutdown"),
        }
    }
}

impl FromStr for SupervisorCommand {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = strip_prefix(line).ok_or_else(|| ProtocolError::MissingPrefix(line.to_string()))?;
        let (kind, rest) = body.split_once(' ').unwrap_or((body, ""));
        match kind {
            "run" => {
                let mut fields = Fields::new("run", rest);
                let command = SupervisorCommand::Run {
                    benchmark: fields.next("benchmark")?,
                    warmup_iterations: fields.next("warmup_iterations")?,
                    warmup_time: Duration::from_nanos(fields.next("warmup_time")?),
                    measurement_iterations: fields.next("measurement_iterations")?,
                    measurement_time: Duration::from_nanos(fields.next("measurement_time")?),
                };
                fields.finish()?;
                Ok(command)
            }
            "shutdown" => {
                Fields::new("shutdown", rest).finish()?;
                Ok(SupervisorCommand::Shutdown)
            }
            other => Err(ProtocolError::UnknownMessage(other.to_string())),
        }
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMessage::Hello {
                version,
                hint_count,
            } => write!(f, "{PROTOCOL_PREFIX} hello {version} {hint_count}"),
            WorkerMessage::Warmup {
                index,
                operations,
                nanos,
            } => write!(f, "{PROTOCOL_PREFIX} warmup {index} {operations} {nanos}"),
            WorkerMessage::Measure {
                index,
                operations,
                nanos,
            } => write!(f, "{PROTOCOL_PREFIX} measure {index} {operations} {nanos}"),
            WorkerMessage::Complete { operations, nanos } => {
                write!(f, "{PROTOCOL_PREFIX} complete {operations} {nanos}")
            }
            WorkerMessage::Failure { message } => {
                write!(f, "{PROTOCOL_PREFIX} failure {}", escape(message))
            }
        }
    }
}

impl FromStr for WorkerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let body = strip_prefix(line).ok_or_else(|| ProtocolError::MissingPrefix(line.to_string()))?;
        let (kind, rest) = body.split_once(' ').unwrap_or((body, ""));
        let message = match kind {
            "hello" => {
                let mut fields = Fields::new("hello", rest);
                let message = WorkerMessage::Hello {
                    version: fields.next("version")?,
                    hint_count: fields.next("hint_count")?,
                };
                fields.finish()?;
                message
            }
            "warmup" | "measure" => {
                let name = if kind == "warmup" { "warmup" } else { "measure" };
                let mut fields = Fields::new(name, rest);
                let index = fields.next("index")?;
                let operations = fields.next("operations")?;
                let nanos = fields.next("nanos")?;
                fields.finish()?;
                if kind == "warmup" {
                    WorkerMessage::Warmup {
                        index,
                        operations,
                        nanos,
                    }
                } else {
                    WorkerMessage::Measure {
                        index,
                        operations,
                        nanos,
                    }
                }
            }
            "complete" => {
                let mut fields = Fields::new("complete", rest);
                let message = WorkerMessage::Complete {
                    operations: fields.next("operations")?,
                    nanos: fields.next("nanos")?,
                };
                fields.finish()?;
                message
            }
            // The message text may contain spaces; it runs to the end of the line.
            "failure" => WorkerMessage::Failure {
                message: unescape(rest),
            },
            other => return Err(ProtocolError::UnknownMessage(other.to_string())),
        };
        Ok(message)
    }
}

impl WorkerMessage {
    /// Parse one line of fork output. Returns `Ok(None)` for ordinary output.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ProtocolError> {
        if strip_prefix(line).is_none() {
            return Ok(None);
        }
        line.parse().map(Some)
    }
}
