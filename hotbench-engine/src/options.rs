//! Run Options
//!
//! Execution settings are resolved per benchmark with the precedence
//! explicit option, then declared attribute, then engine default.

use crate::error::RunnerError;
use crate::registry::BenchmarkEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default fork count
pub const DEFAULT_FORKS: u32 = 1;
/// Default warmup iteration count
pub const DEFAULT_WARMUP_ITERATIONS: u32 = 3;
/// Default warmup iteration time
pub const DEFAULT_WARMUP_TIME: Duration = Duration::from_secs(1);
/// Default measurement iteration count
pub const DEFAULT_MEASUREMENT_ITERATIONS: u32 = 5;
/// Default measurement iteration time
pub const DEFAULT_MEASUREMENT_TIME: Duration = Duration::from_secs(1);
/// Default per-fork timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How much progress output the run produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerboseMode {
    /// Results only
    Silent,
    /// Per-benchmark progress and results
    #[default]
    Normal,
    /// Everything, including forwarded fork output
    Extra,
}

impl fmt::Display for VerboseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerboseMode::Silent => f.write_str("silent"),
            VerboseMode::Normal => f.write_str("normal"),
            VerboseMode::Extra => f.write_str("extra"),
        }
    }
}

impl FromStr for VerboseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(VerboseMode::Silent),
            "normal" => Ok(VerboseMode::Normal),
            "extra" => Ok(VerboseMode::Extra),
            other => Err(format!(
                "unknown verbosity `{other}` (expected silent, normal or extra)"
            )),
        }
    }
}

/// Parse a duration string such as `"500ms"`, `"1.5s"` or `"2m"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic() || *c == 'µ')
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "s"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration number: {num_part}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("duration must be a non-negative number: {s}"));
    }

    let multiplier: f64 = match unit_part.trim().to_lowercase().as_str() {
        "ns" => 1.0,
        "us" | "µs" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        "m" | "min" => 60_000_000_000.0,
        other => return Err(format!("unknown duration unit: {other}")),
    };

    Ok(Duration::from_nanos((value * multiplier) as u64))
}

/// Fully resolved execution settings of one benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkParams {
    /// Number of forks
    pub forks: u32,
    /// Warmup iterations per fork
    pub warmup_iterations: u32,
    /// Duration of each warmup iteration
    pub warmup_time: Duration,
    /// Measurement iterations per fork
    pub measurement_iterations: u32,
    /// Duration of each measurement iteration
    pub measurement_time: Duration,
    /// Per-fork timeout
    pub timeout: Duration,
}

/// Validated run options
#[derive(Debug, Clone)]
pub struct Options {
    includes: Vec<Regex>,
    forks: Option<u32>,
    warmup_iterations: Option<u32>,
    warmup_time: Option<Duration>,
    measurement_iterations: Option<u32>,
    measurement_time: Option<Duration>,
    timeout: Duration,
    verbosity: VerboseMode,
    output: Option<PathBuf>,
    fail_on_error: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            forks: None,
            warmup_iterations: None,
            warmup_time: None,
            measurement_iterations: None,
            measurement_time: None,
            timeout: DEFAULT_TIMEOUT,
            verbosity: VerboseMode::default(),
            output: None,
            fail_on_error: false,
        }
    }
}

impl Options {
    /// Start building options
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Include filters; an empty list selects every benchmark
    pub fn includes(&self) -> &[Regex] {
        &self.includes
    }

    /// Progress verbosity
    pub fn verbosity(&self) -> VerboseMode {
        self.verbosity
    }

    /// File that receives progress output instead of stdout
    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }

    /// Whether a failing benchmark aborts the run
    pub fn fail_on_error(&self) -> bool {
        self.fail_on_error
    }

    /// Per-fork timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check option values for consistency
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.measurement_iterations == Some(0) {
            return Err(RunnerError::InvalidOptions(
                "measurement iterations must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(RunnerError::InvalidOptions(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the execution settings of `entry`
    pub fn resolve(&self, entry: &BenchmarkEntry) -> BenchmarkParams {
        let mut forks = self.forks.or(entry.forks).unwrap_or(DEFAULT_FORKS);
        if forks == 0 {
            tracing::warn!(benchmark = %entry.id, "fork count of 0 is not supported, running 1 fork");
            forks = 1;
        }

        let mut measurement_iterations = self
            .measurement_iterations
            .or(entry.measurement_iterations)
            .unwrap_or(DEFAULT_MEASUREMENT_ITERATIONS);
        if measurement_iterations == 0 {
            tracing::warn!(benchmark = %entry.id, "declared 0 measurement iterations, running 1");
            measurement_iterations = 1;
        }

        BenchmarkParams {
            forks,
            warmup_iterations: self
                .warmup_iterations
                .or(entry.warmup_iterations)
                .unwrap_or(DEFAULT_WARMUP_ITERATIONS),
            warmup_time: self
                .warmup_time
                .or(entry.warmup_time_ns.map(Duration::from_nanos))
                .unwrap_or(DEFAULT_WARMUP_TIME),
            measurement_iterations,
            measurement_time: self
                .measurement_time
                .or(entry.measurement_time_ns.map(Duration::from_nanos))
                .unwrap_or(DEFAULT_MEASUREMENT_TIME),
            timeout: self.timeout,
        }
    }
}

/// Builder for [`Options`]
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    includes: Vec<String>,
    forks: Option<u32>,
    warmup_iterations: Option<u32>,
    warmup_time: Option<Duration>,
    measurement_iterations: Option<u32>,
    measurement_time: Option<Duration>,
    timeout: Option<Duration>,
    verbosity: Option<VerboseMode>,
    output: Option<PathBuf>,
    fail_on_error: bool,
}

impl OptionsBuilder {
    /// Add an include filter (regular expression matched against benchmark ids)
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    /// Override the fork count
    pub fn forks(mut self, forks: u32) -> Self {
        self.forks = Some(forks);
        self
    }

    /// Override the warmup iteration count
    pub fn warmup_iterations(mut self, iterations: u32) -> Self {
        self.warmup_iterations = Some(iterations);
        self
    }

    /// Override the warmup iteration time
    pub fn warmup_time(mut self, time: Duration) -> Self {
        self.warmup_time = Some(time);
        self
    }

    /// Override the measurement iteration count
    pub fn measurement_iterations(mut self, iterations: u32) -> Self {
        self.measurement_iterations = Some(iterations);
        self
    }

    /// Override the measurement iteration time
    pub fn measurement_time(mut self, time: Duration) -> Self {
        self.measurement_time = Some(time);
        self
    }

    /// Per-fork timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Progress verbosity
    pub fn verbosity(mut self, mode: VerboseMode) -> Self {
        self.verbosity = Some(mode);
        self
    }

    /// Write progress output to `path` instead of stdout
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Abort the run on the first failing benchmark
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Compile filters and validate
    pub fn build(self) -> Result<Options, RunnerError> {
        let includes = self
            .includes
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| RunnerError::InvalidOptions(format!("bad include `{p}`: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = Options {
            includes,
            forks: self.forks,
            warmup_iterations: self.warmup_iterations,
            warmup_time: self.warmup_time,
            measurement_iterations: self.measurement_iterations,
            measurement_time: self.measurement_time,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            verbosity: self.verbosity.unwrap_or_default(),
            output: self.output,
            fail_on_error: self.fail_on_error,
        };
        options.validate()?;
        Ok(options)
    }
}
