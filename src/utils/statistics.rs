//! Pure statistical functions over plain numeric samples.
//!
//! Conventions:
//! - percentiles use linear interpolation between closest ranks
//! - standard deviation is the sample (n - 1) estimator
//! - every function returns 0.0 (or an empty result) for empty input

use serde::{Deserialize, Serialize};

/// Tukey fences and the samples falling outside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub outliers: Vec<f64>,
}

impl OutlierReport {
    pub fn count(&self) -> usize {
        self.outliers.len()
    }
}

/// Descriptive statistics for one sample set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub std_dev: f64,
}

pub struct StatisticalCalculator;

impl StatisticalCalculator {
    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn median(samples: &[f64]) -> f64 {
        Self::percentile(samples, 50.0)
    }

    /// `p` is in percent (0..=100) and is clamped to that range.
    pub fn percentile(samples: &[f64], p: f64) -> f64 {
        let sorted = sorted(samples);
        percentile_sorted(&sorted, p)
    }

    /// Sample standard deviation. Fewer than two samples yield 0.0.
    pub fn std_dev(samples: &[f64]) -> f64 {
        if samples.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean(samples);
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
            / (samples.len() - 1) as f64;
        var.sqrt()
    }

    /// 1.5 * IQR outlier detection.
    pub fn detect_outliers(samples: &[f64]) -> OutlierReport {
        if samples.len() < 4 {
            return OutlierReport {
                lower_fence: f64::NEG_INFINITY,
                upper_fence: f64::INFINITY,
                outliers: Vec::new(),
            };
        }
        let s = sorted(samples);
        let q1 = percentile_sorted(&s, 25.0);
        let q3 = percentile_sorted(&s, 75.0);
        let iqr = q3 - q1;
        let lower_fence = q1 - 1.5 * iqr;
        let upper_fence = q3 + 1.5 * iqr;
        let outliers = samples
            .iter()
            .copied()
            .filter(|x| *x < lower_fence || *x > upper_fence)
            .collect();
        OutlierReport {
            lower_fence,
            upper_fence,
            outliers,
        }
    }

    /// Normal-approximation confidence interval for the mean.
    ///
    /// Supported levels are 0.90, 0.95 and 0.99; anything else uses 0.95.
    pub fn confidence_interval(samples: &[f64], confidence: f64) -> (f64, f64) {
        let mean = Self::mean(samples);
        if samples.len() < 2 {
            return (mean, mean);
        }
        let z = z_score(confidence);
        let margin = z * Self::std_dev(samples) / (samples.len() as f64).sqrt();
        (mean - margin, mean + margin)
    }

    pub fn summarize(samples: &[f64]) -> DistributionSummary {
        if samples.is_empty() {
            return DistributionSummary::default();
        }
        let s = sorted(samples);
        DistributionSummary {
            count: s.len(),
            mean: Self::mean(&s),
            min: s[0],
            max: s[s.len() - 1],
            median: percentile_sorted(&s, 50.0),
            p95: percentile_sorted(&s, 95.0),
            p99: percentile_sorted(&s, 99.0),
            std_dev: Self::std_dev(&s),
        }
    }

    /// Signed change from `old` to `new` in percent of `old`.
    /// Zero baselines yield 0.0 rather than infinity.
    pub fn percent_change(old: f64, new: f64) -> f64 {
        if old == 0.0 {
            0.0
        } else {
            (new - old) / old * 100.0
        }
    }
}

fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut s: Vec<f64> = samples.iter().copied().filter(|x| !x.is_nan()).collect();
    s.sort_by(|a, b| a.total_cmp(b));
    s
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = rank - lo as f64;
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

fn z_score(confidence: f64) -> f64 {
    if (confidence - 0.90).abs() < 1e-9 {
        1.645
    } else if (confidence - 0.99).abs() < 1e-9 {
        2.576
    } else {
        1.96
    }
}
