//! Run Results

use crate::options::BenchmarkParams;
use crate::stats::SummaryStatistics;
use serde::Serialize;

/// One measured iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IterationResult {
    /// Operations executed during the iteration
    pub operations: u64,
    /// Elapsed nanoseconds
    pub duration_nanos: u64,
}

impl IterationResult {
    /// Average time per operation, in nanoseconds
    pub fn score(&self) -> f64 {
        if self.operations == 0 {
            return f64::NAN;
        }
        self.duration_nanos as f64 / self.operations as f64
    }
}

/// Outcome of one benchmark across all of its forks
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Benchmark id
    pub benchmark: String,
    /// Declaring class
    pub class: String,
    /// Benchmark method
    pub method: String,
    /// Settings the benchmark ran with
    pub params: BenchmarkParams,
    /// Measurement iterations of every fork, in execution order
    pub iterations: Vec<IterationResult>,
    /// Statistics over the per-iteration scores
    pub statistics: SummaryStatistics,
}

impl RunResult {
    /// Primary score: mean time per operation, in nanoseconds
    pub fn score(&self) -> f64 {
        self.statistics.mean
    }

    /// Half-width of the 99.9% confidence interval of [`score`](Self::score)
    pub fn score_error(&self) -> f64 {
        self.statistics.error_999
    }

    /// Unit of [`score`](Self::score)
    pub fn score_unit(&self) -> &'static str {
        "ns/op"
    }

    /// Per-iteration scores
    pub fn scores(&self) -> Vec<f64> {
        self.iterations.iter().map(IterationResult::score).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_score() {
        let it = IterationResult {
            operations: 4,
            duration_nanos: 100,
        };
        assert!((it.score() - 25.0).abs() < 1e-9);

        let empty = IterationResult {
            operations: 0,
            duration_nanos: 100,
        };
        assert!(empty.score().is_nan());
    }
}
