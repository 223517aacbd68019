//! Summary Statistics
//!
//! Scores are nanoseconds per operation, one sample per measurement
//! iteration across all forks of a benchmark.

use serde::{Deserialize, Serialize};

/// z-value of the two-sided 99.9% confidence interval
const Z_999: f64 = 3.290_526_731_491_926;

/// Summary of the measurement samples of one benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Median (p50)
    pub median: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// 90th percentile
    pub p90: f64,
    /// 99th percentile
    pub p99: f64,
    /// Half-width of the 99.9% confidence interval around the mean, NaN with
    /// fewer than two samples
    pub error_999: f64,
    /// Number of samples
    pub sample_count: usize,
}

impl SummaryStatistics {
    /// Coefficient of variation (relative stddev), in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }
}

/// Compute a single percentile from samples
///
/// Uses linear interpolation between nearest ranks.
pub fn compute_percentile(samples: &[f64], percentile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    if samples.len() == 1 {
        return samples[0];
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let rank = (percentile / 100.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = (lower_idx + 1).min(n - 1);
    let fraction = rank - lower_idx as f64;

    sorted[lower_idx] + fraction * (sorted[upper_idx] - sorted[lower_idx])
}

/// Compute summary statistics for one set of samples
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics {
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            p90: 0.0,
            p99: 0.0,
            error_999: f64::NAN,
            sample_count: 0,
        };
    }

    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };
    let error_999 = if n < 2 {
        f64::NAN
    } else {
        Z_999 * std_dev / (n as f64).sqrt()
    };

    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    SummaryStatistics {
        mean,
        median: compute_percentile(samples, 50.0),
        std_dev,
        min,
        max,
        p90: compute_percentile(samples, 90.0),
        p99: compute_percentile(samples, 99.0),
        error_999,
        sample_count: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((compute_percentile(&samples, 50.0) - 3.0).abs() < 1e-9);
        assert!((compute_percentile(&samples, 25.0) - 2.0).abs() < 1e-9);
        assert!((compute_percentile(&[7.0], 99.0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_basic() {
        let stats = compute_summary(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.sample_count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.min - 2.0).abs() < 1e-9);
        assert!((stats.max - 9.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.138_089_935).abs() < 1e-6);
        assert!(stats.error_999 > 0.0);
    }

    #[test]
    fn test_single_sample_has_undefined_error() {
        let stats = compute_summary(&[42.0]);
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.std_dev, 0.0);
        assert!(stats.error_999.is_nan());
        assert!((stats.median - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let stats = compute_summary(&[]);
        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.coefficient_of_variation(), 0.0);
    }
}
