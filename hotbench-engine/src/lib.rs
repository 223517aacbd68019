#![warn(missing_docs)]
//! Hotbench Engine
//!
//! Measurement engine that runs benchmarks listed in a file-backed registry.
//! Each benchmark is executed in one or more forked harness processes located
//! through the process search path; the supervisor drives every fork over a
//! line protocol and turns its iteration records into [`RunResult`]s.
//!
//! - [`BenchmarkList`]: the registry of runnable benchmarks
//! - [`CompilerHints`]: per-benchmark call directives exported to every fork
//! - [`Runner`]: the supervisor and execution entry point
//! - [`OutputFormat`]: progress and result reporting

mod error;
mod fork;
mod format;
mod hints;
mod options;
mod protocol;
mod registry;
mod result;
mod runner;
mod stats;

pub use error::{RegistryError, RunnerError};
pub use fork::{ForkOutcome, ForkHandle};
pub use format::{IterationPhase, OutputFormat, TextFormat, create_format_instance};
pub use hints::{CompilerHint, CompilerHints, HintDirective};
pub use options::{BenchmarkParams, Options, OptionsBuilder, VerboseMode, parse_duration};
pub use protocol::{ProtocolError, SupervisorCommand, WorkerMessage};
pub use registry::{BenchmarkEntry, BenchmarkList};
pub use result::{IterationResult, RunResult};
pub use runner::Runner;
pub use stats::{SummaryStatistics, compute_percentile, compute_summary};

/// Protocol version spoken between the supervisor and harness forks
pub const PROTOCOL_VERSION: u32 = 1;

/// Directory, relative to an artifact root, holding engine resources
pub const RESOURCE_DIR: &str = "hotbench";

/// Registry resource path, relative to an artifact root
pub const BENCHMARK_LIST: &str = "hotbench/BenchmarkList";

/// Compiler-hint resource path, relative to an artifact root
pub const COMPILER_HINTS: &str = "hotbench/CompilerHints";

/// Environment variable carrying the hint list into each fork
pub const HINTS_ENV: &str = "HOTBENCH_COMPILER_HINTS";

/// Marker that starts every protocol line on a fork's stdout
pub const PROTOCOL_PREFIX: &str = "@hotbench";
