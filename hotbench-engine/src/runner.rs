//! Runner
//!
//! Supervisor entry point: selects benchmarks from the registry, launches
//! their forks one after another and aggregates the measurement iterations.

use crate::error::RunnerError;
use crate::fork::{ForkHandle, ForkOutcome};
use crate::format::{OutputFormat, create_format_instance};
use crate::hints::CompilerHints;
use crate::options::{BenchmarkParams, Options};
use crate::protocol::SupervisorCommand;
use crate::registry::{BenchmarkEntry, BenchmarkList};
use crate::result::{IterationResult, RunResult};
use crate::stats::compute_summary;
use std::io::Write;

/// Runs the benchmarks of a registry
pub struct Runner {
    options: Options,
    format: Box<dyn OutputFormat>,
    registry: BenchmarkList,
}

impl Runner {
    /// Create a runner reporting to stdout, or to the options' output file
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        let out: Box<dyn Write + Send> = match options.output() {
            Some(path) => Box::new(std::fs::File::create(path).map_err(|e| {
                RunnerError::InvalidOptions(format!(
                    "cannot open output file {}: {e}",
                    path.display()
                ))
            })?),
            None => Box::new(std::io::stdout()),
        };
        let format = create_format_instance(out, options.verbosity());
        Self::with_format(options, format)
    }

    /// Create a runner with a caller-supplied output format.
    ///
    /// Loads the registry bundled next to the current executable.
    pub fn with_format(options: Options, format: Box<dyn OutputFormat>) -> Result<Self, RunnerError> {
        options.validate()?;
        let registry = BenchmarkList::default_list()?;
        Ok(Self {
            options,
            format,
            registry,
        })
    }

    /// Create a runner with an empty registry and no validation.
    ///
    /// For drivers that bind a registry produced at run time through
    /// [`replace_registry`](Self::replace_registry).
    #[doc(hidden)]
    pub fn unchecked(options: Options, format: Box<dyn OutputFormat>) -> Self {
        Self {
            options,
            format,
            registry: BenchmarkList::default(),
        }
    }

    /// Replace the registry this runner reads from
    #[doc(hidden)]
    pub fn replace_registry(&mut self, registry: BenchmarkList) {
        self.registry = registry;
    }

    /// The registry this runner reads from
    pub fn registry(&self) -> &BenchmarkList {
        &self.registry
    }

    /// Run options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Benchmarks selected by the include filters, in execution order
    pub fn list(&self) -> Vec<&BenchmarkEntry> {
        self.registry.select(self.options.includes())
    }

    /// Run every selected benchmark.
    ///
    /// A benchmark that fails inside its fork is reported to the output
    /// format and left out of the results, unless the options ask to fail
    /// on error. Infrastructure failures always abort the run.
    pub fn run(&mut self) -> Result<Vec<RunResult>, RunnerError> {
        let selected: Vec<BenchmarkEntry> = self.list().into_iter().cloned().collect();
        let hints = CompilerHints::default_list();
        tracing::info!(
            benchmarks = selected.len(),
            hints = hints.len(),
            "starting benchmark run"
        );

        self.format.start_run(selected.len());
        let mut results = Vec::with_capacity(selected.len());

        for entry in &selected {
            let params = self.options.resolve(entry);
            self.format.start_benchmark(entry, &params);

            match self.run_benchmark(entry, &params, &hints)? {
                Ok(iterations) => {
                    let scores: Vec<f64> = iterations.iter().map(IterationResult::score).collect();
                    let result = RunResult {
                        benchmark: entry.id.clone(),
                        class: entry.class.clone(),
                        method: entry.method.clone(),
                        params,
                        statistics: compute_summary(&scores),
                        iterations,
                    };
                    self.format.end_benchmark(&result);
                    results.push(result);
                }
                Err(message) => {
                    tracing::warn!(benchmark = %entry.id, %message, "benchmark failed");
                    if self.options.fail_on_error() {
                        return Err(RunnerError::BenchmarkFailed {
                            benchmark: entry.id.clone(),
                            message,
                        });
                    }
                    self.format.benchmark_failed(&entry.id, &message);
                }
            }
        }

        self.format.end_run(&results);
        tracing::info!(results = results.len(), "benchmark run finished");
        Ok(results)
    }

    /// Runs all forks of one benchmark. The inner `Err` is a benchmark failure.
    fn run_benchmark(
        &mut self,
        entry: &BenchmarkEntry,
        params: &BenchmarkParams,
        hints: &CompilerHints,
    ) -> Result<Result<Vec<IterationResult>, String>, RunnerError> {
        let command = SupervisorCommand::Run {
            benchmark: entry.id.clone(),
            warmup_iterations: params.warmup_iterations,
            warmup_time: params.warmup_time,
            measurement_iterations: params.measurement_iterations,
            measurement_time: params.measurement_time,
        };

        let mut iterations = Vec::new();
        for fork in 1..=params.forks {
            self.format.start_fork(fork, params.forks);
            let mut handle =
                ForkHandle::spawn(&entry.harness, hints, params.timeout, self.format.as_mut())?;
            let outcome = handle.run(&command, params.timeout, self.format.as_mut())?;
            handle.shutdown()?;

            match outcome {
                ForkOutcome::Completed(measured) => iterations.extend(measured),
                ForkOutcome::Failed(message) => return Ok(Err(message)),
            }
        }
        Ok(Ok(iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TextFormat;
    use crate::options::VerboseMode;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn runner(options: Options, out: &SharedBuffer) -> Runner {
        Runner::unchecked(
            options,
            Box::new(TextFormat::new(out.clone(), VerboseMode::Normal)),
        )
    }

    #[test]
    fn test_empty_registry_yields_no_results() {
        let out = SharedBuffer::default();
        let mut runner = runner(Options::default(), &out);
        let results = runner.run().unwrap();
        assert!(results.is_empty());
        assert!(out.contents().contains("No benchmark results."));
    }

    #[test]
    fn test_missing_harness_is_reported() {
        let out = SharedBuffer::default();
        let mut runner = runner(Options::default(), &out);
        runner.replace_registry(BenchmarkList::new(vec![BenchmarkEntry::new(
            "absent",
            "bench",
            "hotbench_harness_that_does_not_exist",
        )]));

        match runner.run() {
            Err(RunnerError::HarnessNotFound { harness, .. }) => {
                assert_eq!(harness, "hotbench_harness_that_does_not_exist");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(results) => panic!("unexpected results: {results:?}"),
        }
    }

    #[test]
    fn test_list_applies_include_filters() {
        let out = SharedBuffer::default();
        let options = Options::builder().include("^fast::").build().unwrap();
        let mut runner = runner(options, &out);
        runner.replace_registry(BenchmarkList::new(vec![
            BenchmarkEntry::new("slow", "a", "h"),
            BenchmarkEntry::new("fast", "b", "h"),
        ]));

        let ids: Vec<_> = runner.list().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, ["fast::b"]);
    }
}
