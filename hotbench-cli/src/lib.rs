#![warn(missing_docs)]
//! hotbench CLI Library
//!
//! Benchmarks Rust source files from the command line: the files are handed
//! to [`hotbench::Driver`], which generates, compiles and runs a harness for
//! them, and the results are optionally written to a result file.
//!
//! ```text
//! hotbench benches/sorting.rs -f 2 --warmup-time 200ms --result-format json --result-file out.json
//! ```

mod config;
mod metadata;
mod report;

pub use config::*;
pub use metadata::RunMetadata;
pub use report::{ResultDocument, render, write_results};

use anyhow::Context;
use clap::Parser;
use hotbench::{BenchmarkClass, Driver, DriverConfig, Options, VerboseMode};
use hotbench_engine::parse_duration;
use hotbench_gen::parse_class;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// hotbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "hotbench")]
#[command(author, version, about = "hotbench - run benchmarks from Rust source files")]
pub struct Cli {
    /// Benchmark source files; each file is one class named after its stem
    pub sources: Vec<PathBuf>,

    /// Only run benchmarks whose id matches this regex (repeatable)
    #[arg(short, long = "include")]
    pub include: Vec<String>,

    /// Forks per benchmark
    #[arg(short, long)]
    pub forks: Option<u32>,

    /// Warmup iterations
    #[arg(long)]
    pub warmup_iterations: Option<u32>,

    /// Measurement iterations
    #[arg(long = "iterations")]
    pub iterations: Option<u32>,

    /// Warmup iteration time (e.g., 500ms, 2s)
    #[arg(long, value_parser = parse_duration)]
    pub warmup_time: Option<Duration>,

    /// Measurement iteration time (e.g., 500ms, 2s)
    #[arg(long, value_parser = parse_duration)]
    pub measurement_time: Option<Duration>,

    /// Per-fork timeout (e.g., 10m)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Progress output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Progress verbosity: silent, normal or extra
    #[arg(long)]
    pub verbosity: Option<VerboseMode>,

    /// Abort on the first failing benchmark
    #[arg(long)]
    pub fail_on_error: bool,

    /// Result file format
    #[arg(long, value_enum)]
    pub result_format: Option<ResultFormat>,

    /// Write results to this file
    #[arg(long)]
    pub result_file: Option<PathBuf>,

    /// List benchmarks without compiling or running them
    #[arg(long)]
    pub list: bool,

    /// Configuration file (hotbench.toml is discovered otherwise)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the hotbench CLI with the process arguments
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the hotbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => HotbenchConfig::load(path)
            .with_context(|| format!("cannot load configuration {}", path.display()))?,
        None => HotbenchConfig::discover().unwrap_or_default(),
    };

    let classes = load_classes(&cli.sources)?;
    if cli.list {
        return list_benchmarks(&classes);
    }

    let options = build_options(&cli, &config)?;
    let driver = Driver::new(DriverConfig {
        toolchain: config.toolchain.to_toolchain_config(),
        workspace_root: config.workspace.root.clone(),
    });

    let results = driver.start(options, &classes)?;

    let result_format = cli
        .result_format
        .or(config.output.result_format)
        .unwrap_or_default();
    if let Some(path) = cli.result_file.as_ref().or(config.output.result_file.as_ref()) {
        write_results(&results, result_format, path)?;
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "hotbench=debug" } else { "hotbench=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_classes(sources: &[PathBuf]) -> anyhow::Result<Vec<BenchmarkClass>> {
    sources
        .iter()
        .map(|path| {
            BenchmarkClass::from_file(path)
                .with_context(|| format!("cannot read benchmark source {}", path.display()))
        })
        .collect()
}

/// Build run options by layering: hotbench.toml values, then CLI overrides.
pub fn build_options(cli: &Cli, config: &HotbenchConfig) -> anyhow::Result<Options> {
    let runner = &config.runner;
    let mut builder = Options::builder();

    for pattern in &cli.include {
        builder = builder.include(pattern.as_str());
    }
    if let Some(forks) = cli.forks.or(runner.forks) {
        builder = builder.forks(forks);
    }
    if let Some(n) = cli.warmup_iterations.or(runner.warmup_iterations) {
        builder = builder.warmup_iterations(n);
    }
    if let Some(n) = cli.iterations.or(runner.measurement_iterations) {
        builder = builder.measurement_iterations(n);
    }
    if let Some(time) = cli.warmup_time.or(runner.warmup_time()?) {
        builder = builder.warmup_time(time);
    }
    if let Some(time) = cli.measurement_time.or(runner.measurement_time()?) {
        builder = builder.measurement_time(time);
    }
    if let Some(timeout) = cli.timeout.or(runner.timeout()?) {
        builder = builder.timeout(timeout);
    }
    if let Some(mode) = cli.verbosity.or(config.output.verbosity) {
        builder = builder.verbosity(mode);
    }
    if let Some(path) = &cli.output {
        builder = builder.output(path.clone());
    }
    let fail_on_error = cli.fail_on_error || runner.fail_on_error.unwrap_or(false);

    Ok(builder.fail_on_error(fail_on_error).build()?)
}

fn list_benchmarks(classes: &[BenchmarkClass]) -> anyhow::Result<()> {
    println!("hotbench plan:");

    let mut total = 0;
    let mut failures = Vec::new();
    for class in classes {
        match parse_class(class) {
            Ok(parsed) => {
                println!("├── class: {}", parsed.name);
                for method in &parsed.methods {
                    println!("│   ├── {} (line {})", parsed.benchmark_id(method), method.line);
                    total += 1;
                }
            }
            Err(errors) => failures.extend(errors),
        }
    }

    println!("{} benchmarks found.", total);

    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("error: {failure}");
        }
        anyhow::bail!("{} problems found in benchmark sources", failures.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotbench_engine::BenchmarkEntry;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hotbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_arguments() {
        let cli = cli(&[
            "a.rs",
            "b.rs",
            "-i",
            "sort",
            "-f",
            "2",
            "--warmup-time",
            "250ms",
            "--verbosity",
            "silent",
            "--result-format",
            "json",
        ]);
        assert_eq!(cli.sources, [PathBuf::from("a.rs"), PathBuf::from("b.rs")]);
        assert_eq!(cli.include, ["sort"]);
        assert_eq!(cli.forks, Some(2));
        assert_eq!(cli.warmup_time, Some(Duration::from_millis(250)));
        assert_eq!(cli.verbosity, Some(VerboseMode::Silent));
        assert_eq!(cli.result_format, Some(ResultFormat::Json));
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let parsed =
            Cli::try_parse_from(["hotbench", "a.rs", "--timeout", "forever"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config: HotbenchConfig = toml::from_str(
            r#"
            [runner]
            forks = 3
            warmup_iterations = 7
            measurement_time = "2s"
            fail_on_error = true

            [output]
            verbosity = "extra"
            "#,
        )
        .unwrap();
        let options = build_options(&cli(&["-f", "1", "--verbosity", "silent"]), &config).unwrap();

        let params = options.resolve(&BenchmarkEntry::new("c", "m", "h"));
        assert_eq!(params.forks, 1);
        assert_eq!(params.warmup_iterations, 7);
        assert_eq!(params.measurement_time, Duration::from_secs(2));
        assert_eq!(options.verbosity(), VerboseMode::Silent);
        assert!(options.fail_on_error());
    }

    #[test]
    fn test_invalid_include_fails() {
        let err = build_options(&cli(&["-i", "("]), &HotbenchConfig::default()).unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_list_reports_problems() {
        let bad = BenchmarkClass::new("bad", "#[benchmark]\nfn takes(x: u8) {}\n");
        assert!(list_benchmarks(&[bad]).is_err());

        let good = BenchmarkClass::new("good", "#[benchmark]\nfn run() {}\n");
        assert!(list_benchmarks(&[good]).is_ok());
    }
}
