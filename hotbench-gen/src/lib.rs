#![warn(missing_docs)]
//! Hotbench Generator
//!
//! Synthesizes benchmark harness sources from benchmark classes.
//!
//! A class is a Rust source unit. Class-wide execution settings are inner
//! attributes; benchmark methods are free functions marked `#[benchmark]`:
//!
//! ```text
//! #![fork(2)]
//! #![warmup(iterations = 3, time = "200ms")]
//!
//! #[benchmark]
//! #[measurement(iterations = 10)]
//! #[compiler_control(dont_inline)]
//! fn sort_small() -> Vec<u32> { ... }
//! ```
//!
//! [`BenchmarkGenerator`] turns classes into one module per class, a runtime
//! module and a harness crate root, plus the engine's registry and
//! compiler-hint resources, all written through a [`GeneratorDestination`].

mod destination;
mod error;
mod generate;
mod parse;
mod source;

pub use destination::{FileSystemDestination, GeneratorDestination};
pub use error::GenerationError;
pub use generate::BenchmarkGenerator;
pub use parse::{BenchmarkMethod, ExecutionAttrs, ParsedClass, parse_class};
pub use source::BenchmarkClass;

/// File name of the generated harness crate root
pub const HARNESS_ROOT: &str = "harness.rs";

/// Module name of the generated fork runtime
pub const RUNTIME_MODULE: &str = "hotbench_runtime";

/// Source of the fork runtime compiled into every harness
pub const RUNTIME_SOURCE: &str = include_str!("../templates/runtime.rs");
