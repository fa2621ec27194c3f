//! Threshold-based regression detection between two benchmark results.
//!
//! Nothing here fails: missing or zero baselines simply produce no
//! regression, and absent hit-rate data yields [`HitRateStatus::Skipped`].

use super::config::CachePerformanceThresholds;
use super::models::{
    BenchmarkResult, ComparisonResult, HitRateStatus, Regression, RegressionSeverity,
};
use crate::utils::StatisticalCalculator;
use crate::{Error, ErrorContext, Result};
use tracing::debug;

/// Absorbs float noise when a change lands exactly on a threshold.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Larger values are worse (latency, memory).
    HigherIsWorse,
    /// Smaller values are worse (throughput).
    LowerIsWorse,
}

#[derive(Debug, Clone)]
pub struct PerformanceRegressionDetector {
    warning_threshold: f64,
    critical_threshold: f64,
}

impl Default for PerformanceRegressionDetector {
    fn default() -> Self {
        Self {
            warning_threshold: 10.0,
            critical_threshold: 25.0,
        }
    }
}

impl PerformanceRegressionDetector {
    /// Absolute hit-rate drop, in percentage points, tolerated before the
    /// hit rate counts as degraded. A drop of exactly this much is still ok.
    pub const HIT_RATE_DEGRADATION_POINTS: f64 = 5.0;

    pub fn new(warning_threshold: f64, critical_threshold: f64) -> Result<Self> {
        if warning_threshold.is_nan() || warning_threshold <= 0.0 {
            return Err(Error::validation_with_context(
                "warning threshold must be > 0",
                ErrorContext::new()
                    .with_field_path("warning_threshold")
                    .with_details(warning_threshold.to_string())
                    .with_source("regression_detector"),
            ));
        }
        if warning_threshold >= critical_threshold {
            return Err(Error::validation_with_context(
                "critical threshold must be greater than warning threshold",
                ErrorContext::new()
                    .with_field_path("critical_threshold")
                    .with_details(format!(
                        "warning={} critical={}",
                        warning_threshold, critical_threshold
                    ))
                    .with_source("regression_detector"),
            ));
        }
        Ok(Self {
            warning_threshold,
            critical_threshold,
        })
    }

    /// Thresholds are validated together with the rest of the config.
    pub fn from_thresholds(thresholds: &CachePerformanceThresholds) -> Self {
        Self {
            warning_threshold: thresholds.regression_warning_percent,
            critical_threshold: thresholds.regression_critical_percent,
        }
    }

    pub fn warning_threshold(&self) -> f64 {
        self.warning_threshold
    }

    pub fn critical_threshold(&self) -> f64 {
        self.critical_threshold
    }

    fn classify(&self, adverse_change: f64) -> Option<RegressionSeverity> {
        if adverse_change >= self.critical_threshold - EPSILON {
            Some(RegressionSeverity::Critical)
        } else if adverse_change >= self.warning_threshold - EPSILON {
            Some(RegressionSeverity::Warning)
        } else {
            None
        }
    }

    fn check(
        &self,
        metric: &str,
        old_value: f64,
        new_value: f64,
        direction: Direction,
    ) -> Option<Regression> {
        if !old_value.is_finite() || !new_value.is_finite() || old_value <= 0.0 {
            return None;
        }
        let change_percent = StatisticalCalculator::percent_change(old_value, new_value);
        let adverse = match direction {
            Direction::HigherIsWorse => change_percent,
            Direction::LowerIsWorse => -change_percent,
        };
        self.classify(adverse).map(|severity| Regression {
            metric: metric.to_string(),
            old_value,
            new_value,
            change_percent,
            severity,
        })
    }

    /// Average and p95 latency regress when they grow; throughput regresses
    /// when it shrinks.
    pub fn detect_timing_regressions(
        &self,
        old: &BenchmarkResult,
        new: &BenchmarkResult,
    ) -> Vec<Regression> {
        [
            self.check(
                "avg_duration",
                old.avg_duration_ms,
                new.avg_duration_ms,
                Direction::HigherIsWorse,
            ),
            self.check(
                "p95_duration",
                old.p95_duration_ms,
                new.p95_duration_ms,
                Direction::HigherIsWorse,
            ),
            self.check(
                "operations_per_second",
                old.operations_per_second,
                new.operations_per_second,
                Direction::LowerIsWorse,
            ),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn detect_memory_regressions(
        &self,
        old: &BenchmarkResult,
        new: &BenchmarkResult,
    ) -> Vec<Regression> {
        [
            self.check(
                "memory_usage",
                old.memory_usage_mb,
                new.memory_usage_mb,
                Direction::HigherIsWorse,
            ),
            self.check(
                "peak_memory",
                old.peak_memory_mb,
                new.peak_memory_mb,
                Direction::HigherIsWorse,
            ),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Compare hit rates with a fixed absolute tolerance; see
    /// [`Self::HIT_RATE_DEGRADATION_POINTS`].
    pub fn validate_cache_hit_rates(
        &self,
        old: &BenchmarkResult,
        new: &BenchmarkResult,
    ) -> HitRateStatus {
        match (old.cache_hit_rate, new.cache_hit_rate) {
            (Some(old_rate), Some(new_rate)) if old_rate.is_finite() && new_rate.is_finite() => {
                let drop_points = (old_rate - new_rate) * 100.0;
                if drop_points > Self::HIT_RATE_DEGRADATION_POINTS + EPSILON {
                    HitRateStatus::Degraded
                } else {
                    HitRateStatus::Ok
                }
            }
            _ => HitRateStatus::Skipped,
        }
    }

    pub fn compare_results(
        &self,
        baseline: &BenchmarkResult,
        current: &BenchmarkResult,
    ) -> ComparisonResult {
        let timing_regressions = self.detect_timing_regressions(baseline, current);
        let memory_regressions = self.detect_memory_regressions(baseline, current);
        let hit_rate_status = self.validate_cache_hit_rates(baseline, current);

        let performance_change_percent =
            StatisticalCalculator::percent_change(baseline.avg_duration_ms, current.avg_duration_ms);
        let memory_change_percent =
            StatisticalCalculator::percent_change(baseline.memory_usage_mb, current.memory_usage_mb);
        let operations_per_second_change = StatisticalCalculator::percent_change(
            baseline.operations_per_second,
            current.operations_per_second,
        );

        let mut degradation_areas = Vec::new();
        if !timing_regressions.is_empty() {
            degradation_areas.push("timing".to_string());
        }
        if !memory_regressions.is_empty() {
            degradation_areas.push("memory".to_string());
        }
        if hit_rate_status == HitRateStatus::Degraded {
            degradation_areas.push("cache_hit_rate".to_string());
        }

        let improved = |change: f64| change <= -self.warning_threshold + EPSILON;
        let mut improvement_areas = Vec::new();
        if baseline.avg_duration_ms > 0.0 && improved(performance_change_percent) {
            improvement_areas.push("timing".to_string());
        }
        if baseline.memory_usage_mb > 0.0 && improved(memory_change_percent) {
            improvement_areas.push("memory".to_string());
        }
        if baseline.operations_per_second > 0.0 && improved(-operations_per_second_change) {
            improvement_areas.push("throughput".to_string());
        }

        let regression_detected = !degradation_areas.is_empty();
        let critical = timing_regressions
            .iter()
            .chain(memory_regressions.iter())
            .any(|r| r.severity == RegressionSeverity::Critical);
        let recommendation = if critical {
            format!(
                "Critical regression detected in {}; do not deploy until resolved",
                degradation_areas.join(" and ")
            )
        } else if regression_detected {
            format!(
                "Regression detected in {}; review before deployment",
                degradation_areas.join(" and ")
            )
        } else if !improvement_areas.is_empty() {
            format!(
                "No regressions, improved {}; safe to deploy",
                improvement_areas.join(" and ")
            )
        } else {
            "No regressions; safe to deploy".to_string()
        };

        debug!(
            operation = %current.operation_type,
            regression_detected,
            change_percent = performance_change_percent,
            "compared benchmark results"
        );

        ComparisonResult {
            baseline: baseline.clone(),
            current: current.clone(),
            performance_change_percent,
            memory_change_percent,
            operations_per_second_change,
            regression_detected,
            timing_regressions,
            memory_regressions,
            hit_rate_status,
            improvement_areas,
            degradation_areas,
            recommendation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemorySnapshot;
    use std::time::Duration;

    fn result(avg: f64, p95: f64, ops: f64) -> BenchmarkResult {
        let mut r = BenchmarkResult::from_samples(
            "basic_operations",
            100,
            &[avg],
            Duration::from_secs(1),
            100,
            0,
            MemorySnapshot::default(),
        );
        r.avg_duration_ms = avg;
        r.p95_duration_ms = p95;
        r.operations_per_second = ops;
        r
    }

    #[test]
    fn test_twenty_percent_slowdown_is_one_warning() {
        let d = PerformanceRegressionDetector::new(10.0, 25.0).unwrap();
        let regressions = d.detect_timing_regressions(&result(50.0, 80.0, 1000.0), &result(60.0, 80.0, 1000.0));
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].metric, "avg_duration");
        assert_eq!(regressions[0].severity, RegressionSeverity::Warning);
        assert!((regressions[0].change_percent - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_regresses_on_decrease_only() {
        let d = PerformanceRegressionDetector::default();
        let drop = d.detect_timing_regressions(&result(10.0, 20.0, 1000.0), &result(10.0, 20.0, 700.0));
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].metric, "operations_per_second");
        assert_eq!(drop[0].severity, RegressionSeverity::Critical);
        assert!(drop[0].change_percent < 0.0);

        let gain = d.detect_timing_regressions(&result(10.0, 20.0, 1000.0), &result(10.0, 20.0, 1500.0));
        assert!(gain.is_empty());
    }

    #[test]
    fn test_memory_regressions() {
        let d = PerformanceRegressionDetector::default();
        let mut old = result(10.0, 20.0, 100.0);
        old.memory_usage_mb = 10.0;
        old.peak_memory_mb = 200.0;
        let mut new = old.clone();
        new.memory_usage_mb = 13.0;
        new.peak_memory_mb = 205.0;
        let regressions = d.detect_memory_regressions(&old, &new);
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].metric, "memory_usage");
        assert_eq!(regressions[0].severity, RegressionSeverity::Critical);
    }

    #[test]
    fn test_zero_baseline_never_regresses() {
        let d = PerformanceRegressionDetector::default();
        let old = result(0.0, 0.0, 0.0);
        let new = result(100.0, 100.0, 0.0);
        assert!(d.detect_timing_regressions(&old, &new).is_empty());
        assert!(d.detect_memory_regressions(&old, &new).is_empty());
    }

    #[test]
    fn test_hit_rate_boundary_is_inclusive() {
        let d = PerformanceRegressionDetector::default();
        let old = result(1.0, 1.0, 1.0).with_cache_hit_rate(0.85);
        assert_eq!(
            d.validate_cache_hit_rates(&old, &old.clone().with_cache_hit_rate(0.80)),
            HitRateStatus::Ok
        );
        assert_eq!(
            d.validate_cache_hit_rates(&old, &old.clone().with_cache_hit_rate(0.79)),
            HitRateStatus::Degraded
        );
        assert_eq!(
            d.validate_cache_hit_rates(&old, &result(1.0, 1.0, 1.0)),
            HitRateStatus::Skipped
        );
    }

    #[test]
    fn test_improvement_is_not_a_regression() {
        let d = PerformanceRegressionDetector::new(10.0, 25.0).unwrap();
        let cmp = d.compare_results(&result(50.0, 60.0, 100.0), &result(45.0, 60.0, 100.0));
        assert!(!cmp.regression_detected);
        assert!(cmp.improvement_areas.contains(&"timing".to_string()));
        assert!(cmp.recommendation.contains("safe to deploy"));
    }

    #[test]
    fn test_compare_flags_regressions() {
        let d = PerformanceRegressionDetector::default();
        let old = result(10.0, 20.0, 100.0).with_cache_hit_rate(0.9);
        let new = result(15.0, 20.0, 100.0).with_cache_hit_rate(0.7);
        let cmp = d.compare_results(&old, &new);
        assert!(cmp.regression_detected);
        assert!(cmp.has_critical_regression());
        assert_eq!(cmp.degradation_areas, vec!["timing", "cache_hit_rate"]);
        assert_eq!(cmp.hit_rate_status, HitRateStatus::Degraded);
        assert!(cmp.recommendation.starts_with("Critical regression"));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = PerformanceRegressionDetector::new(25.0, 10.0).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("critical_threshold")
        );
        assert!(PerformanceRegressionDetector::new(0.0, 10.0).is_err());
    }
}
