//! Output Formats
//!
//! Progress and result reporting for a run. The runner calls the hooks of an
//! [`OutputFormat`] in execution order; [`TextFormat`] renders them as
//! human-readable lines.

use crate::options::{BenchmarkParams, VerboseMode};
use crate::registry::BenchmarkEntry;
use crate::result::{IterationResult, RunResult};
use std::fmt;
use std::io::Write;

/// Which phase an iteration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationPhase {
    /// Warmup; discarded from results
    Warmup,
    /// Measurement
    Measurement,
}

impl fmt::Display for IterationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationPhase::Warmup => f.write_str("Warmup"),
            IterationPhase::Measurement => f.write_str("Iteration"),
        }
    }
}

/// Receives run progress and results
pub trait OutputFormat: Send {
    /// The run is starting with `benchmarks` selected benchmarks
    fn start_run(&mut self, benchmarks: usize);

    /// A benchmark is starting
    fn start_benchmark(&mut self, entry: &BenchmarkEntry, params: &BenchmarkParams);

    /// Fork `fork` (1-based) of `forks` is starting
    fn start_fork(&mut self, fork: u32, forks: u32);

    /// An iteration finished
    fn iteration(&mut self, phase: IterationPhase, index: u32, result: &IterationResult);

    /// A fork printed a line that is not part of the protocol
    fn fork_output(&mut self, line: &str);

    /// A benchmark failed and produced no result
    fn benchmark_failed(&mut self, benchmark: &str, message: &str);

    /// A benchmark finished
    fn end_benchmark(&mut self, result: &RunResult);

    /// The run finished
    fn end_run(&mut self, results: &[RunResult]);
}

/// Plain-text format writing to any [`Write`]
pub struct TextFormat<W: Write + Send> {
    out: W,
    mode: VerboseMode,
}

impl<W: Write + Send> TextFormat<W> {
    /// Create a text format
    pub fn new(out: W, mode: VerboseMode) -> Self {
        Self { out, mode }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn verbose(&self) -> bool {
        self.mode != VerboseMode::Silent
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|_| self.out.write_all(b"\n")) {
            tracing::debug!(error = %e, "dropping benchmark output");
        }
    }
}

fn format_score(score: f64) -> String {
    if score.is_nan() {
        "≈ 0".to_string()
    } else {
        format!("{score:.3}")
    }
}

impl<W: Write + Send> OutputFormat for TextFormat<W> {
    fn start_run(&mut self, benchmarks: usize) {
        if self.verbose() {
            self.line(format_args!("# Running {benchmarks} benchmark(s)"));
        }
    }

    fn start_benchmark(&mut self, entry: &BenchmarkEntry, params: &BenchmarkParams) {
        if !self.verbose() {
            return;
        }
        self.line(format_args!(""));
        self.line(format_args!(
            "# Warmup: {} iterations, {:?} each",
            params.warmup_iterations, params.warmup_time
        ));
        self.line(format_args!(
            "# Measurement: {} iterations, {:?} each",
            params.measurement_iterations, params.measurement_time
        ));
        if self.mode == VerboseMode::Extra {
            self.line(format_args!("# Timeout: {:?} per fork", params.timeout));
            self.line(format_args!("# Harness: {}", entry.harness));
        }
        self.line(format_args!("# Benchmark: {}", entry.id));
    }

    fn start_fork(&mut self, fork: u32, forks: u32) {
        if self.verbose() {
            self.line(format_args!(""));
            self.line(format_args!("# Fork: {fork} of {forks}"));
        }
    }

    fn iteration(&mut self, phase: IterationPhase, index: u32, result: &IterationResult) {
        if self.verbose() {
            self.line(format_args!(
                "{phase} {:>3}: {} ns/op",
                index + 1,
                format_score(result.score())
            ));
        }
    }

    fn fork_output(&mut self, line: &str) {
        if self.mode == VerboseMode::Extra {
            self.line(format_args!("{line}"));
        }
    }

    fn benchmark_failed(&mut self, benchmark: &str, message: &str) {
        self.line(format_args!("<failure> {benchmark}: {message}"));
    }

    fn end_benchmark(&mut self, result: &RunResult) {
        if self.verbose() {
            self.line(format_args!(""));
            self.line(format_args!(
                "Result \"{}\": {} ± {} {}",
                result.benchmark,
                format_score(result.score()),
                format_score(result.score_error()),
                result.score_unit()
            ));
        }
    }

    fn end_run(&mut self, results: &[RunResult]) {
        self.line(format_args!(""));
        if results.is_empty() {
            self.line(format_args!("No benchmark results."));
            return;
        }

        let width = results
            .iter()
            .map(|r| r.benchmark.len())
            .max()
            .unwrap_or(0)
            .max("Benchmark".len());
        self.line(format_args!(
            "{:<width$}  {:>5}  {:>14}  {:>12}  Units",
            "Benchmark", "Cnt", "Score", "Error"
        ));
        for result in results {
            let error = result.score_error();
            let error = if error.is_nan() {
                String::new()
            } else {
                format!("± {}", format_score(error))
            };
            self.line(format_args!(
                "{:<width$}  {:>5}  {:>14}  {:>12}  {}",
                result.benchmark,
                result.iterations.len(),
                format_score(result.score()),
                error,
                result.score_unit()
            ));
        }
    }
}

/// Create the default text format for `out` at the given verbosity
pub fn create_format_instance(
    out: Box<dyn Write + Send>,
    mode: VerboseMode,
) -> Box<dyn OutputFormat> {
    Box::new(TextFormat::new(out, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::compute_summary;
    use std::time::Duration;

    fn params() -> BenchmarkParams {
        BenchmarkParams {
            forks: 1,
            warmup_iterations: 1,
            warmup_time: Duration::from_millis(10),
            measurement_iterations: 2,
            measurement_time: Duration::from_millis(10),
            timeout: Duration::from_secs(60),
        }
    }

    fn result() -> RunResult {
        let iterations = vec![
            IterationResult {
                operations: 10,
                duration_nanos: 1000,
            },
            IterationResult {
                operations: 10,
                duration_nanos: 3000,
            },
        ];
        let scores: Vec<f64> = iterations.iter().map(IterationResult::score).collect();
        RunResult {
            benchmark: "sort::small".to_string(),
            class: "sort".to_string(),
            method: "small".to_string(),
            params: params(),
            iterations,
            statistics: compute_summary(&scores),
        }
    }

    fn render(mode: VerboseMode, drive: impl FnOnce(&mut TextFormat<Vec<u8>>)) -> String {
        let mut format = TextFormat::new(Vec::new(), mode);
        drive(&mut format);
        String::from_utf8(format.into_inner()).unwrap()
    }

    #[test]
    fn test_normal_output_reports_progress_and_summary() {
        let entry = BenchmarkEntry::new("sort", "small", "h");
        let out = render(VerboseMode::Normal, |f| {
            f.start_run(1);
            f.start_benchmark(&entry, &params());
            f.start_fork(1, 1);
            f.iteration(
                IterationPhase::Measurement,
                0,
                &IterationResult {
                    operations: 4,
                    duration_nanos: 10,
                },
            );
            f.fork_output("stray println");
            f.end_benchmark(&result());
            f.end_run(&[result()]);
        });

        assert!(out.contains("# Benchmark: sort::small"));
        assert!(out.contains("# Fork: 1 of 1"));
        assert!(out.contains("Iteration   1: 2.500 ns/op"));
        assert!(out.contains("Result \"sort::small\": 200.000"));
        assert!(!out.contains("stray println"));
        assert!(out.contains("ns/op"));
    }

    #[test]
    fn test_silent_output_only_summarizes() {
        let entry = BenchmarkEntry::new("sort", "small", "h");
        let out = render(VerboseMode::Silent, |f| {
            f.start_run(1);
            f.start_benchmark(&entry, &params());
            f.end_run(&[result()]);
        });
        assert!(!out.contains("# Benchmark"));
        assert!(out.contains("sort::small"));
    }

    #[test]
    fn test_extra_output_forwards_fork_lines() {
        let out = render(VerboseMode::Extra, |f| f.fork_output("stray println"));
        assert_eq!(out, "stray println\n");
    }

    #[test]
    fn test_failures_always_reported() {
        let out = render(VerboseMode::Silent, |f| {
            f.benchmark_failed("sort::small", "boom");
            f.end_run(&[]);
        });
        assert!(out.contains("<failure> sort::small: boom"));
        assert!(out.contains("No benchmark results."));
    }
}
