//! Plain-data benchmark results, comparisons and suites.

use crate::utils::{MemorySnapshot, StatisticalCalculator};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Snapshot of one benchmark run. Durations are milliseconds; `success_rate`
/// and `cache_hit_rate` are fractions in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub operation_type: String,
    pub iterations: usize,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub p99_duration_ms: f64,
    pub std_dev_ms: f64,
    pub memory_usage_mb: f64,
    pub peak_memory_mb: f64,
    pub operations_per_second: f64,
    pub success_rate: f64,
    pub error_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit_rate: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Build a result from per-operation latencies.
    ///
    /// `elapsed` is the wall time of the measured loop and drives throughput;
    /// `attempts` is the number of operations tried, including failed ones.
    pub fn from_samples(
        operation_type: impl Into<String>,
        iterations: usize,
        durations_ms: &[f64],
        elapsed: Duration,
        attempts: usize,
        error_count: usize,
        memory: MemorySnapshot,
    ) -> Self {
        let summary = StatisticalCalculator::summarize(durations_ms);
        let secs = elapsed.as_secs_f64();
        let operations_per_second = if secs > 0.0 {
            durations_ms.len() as f64 / secs
        } else {
            0.0
        };
        let success_rate = if attempts == 0 {
            0.0
        } else {
            attempts.saturating_sub(error_count) as f64 / attempts as f64
        };
        Self {
            operation_type: operation_type.into(),
            iterations,
            avg_duration_ms: summary.mean,
            min_duration_ms: summary.min,
            max_duration_ms: summary.max,
            p95_duration_ms: summary.p95,
            p99_duration_ms: summary.p99,
            std_dev_ms: summary.std_dev,
            memory_usage_mb: memory.delta_mb(),
            peak_memory_mb: memory.peak_mb,
            operations_per_second,
            success_rate,
            error_count,
            cache_hit_rate: None,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// A result for a benchmark that produced no measurements, e.g. one cut
    /// off by the suite timeout.
    pub fn failed(operation_type: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self::from_samples(
            operation_type,
            0,
            &[],
            Duration::ZERO,
            0,
            0,
            MemorySnapshot::default(),
        );
        result
            .metadata
            .insert("failure".to_string(), Value::String(reason.into()));
        result
    }

    pub fn with_cache_hit_rate(mut self, rate: f64) -> Self {
        self.cache_hit_rate = Some(rate);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn success_rate_percent(&self) -> f64 {
        self.success_rate * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceGrade {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Critical,
}

impl PerformanceGrade {
    /// Grade an average latency against its threshold: within half of it is
    /// excellent, within it good, then acceptable up to 1.5x and poor up to 2x.
    pub fn from_avg_duration(avg_ms: f64, threshold_ms: f64) -> Self {
        if !avg_ms.is_finite() || threshold_ms <= 0.0 {
            return PerformanceGrade::Critical;
        }
        let ratio = avg_ms / threshold_ms;
        if ratio <= 0.5 {
            PerformanceGrade::Excellent
        } else if ratio <= 1.0 {
            PerformanceGrade::Good
        } else if ratio <= 1.5 {
            PerformanceGrade::Acceptable
        } else if ratio <= 2.0 {
            PerformanceGrade::Poor
        } else {
            PerformanceGrade::Critical
        }
    }
}

impl fmt::Display for PerformanceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PerformanceGrade::Excellent => "Excellent",
            PerformanceGrade::Good => "Good",
            PerformanceGrade::Acceptable => "Acceptable",
            PerformanceGrade::Poor => "Poor",
            PerformanceGrade::Critical => "Critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionSeverity {
    Warning,
    Critical,
}

/// One metric that moved past a regression threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub metric: String,
    pub old_value: f64,
    pub new_value: f64,
    /// Signed change relative to the old value; throughput regressions are
    /// negative.
    pub change_percent: f64,
    pub severity: RegressionSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRateStatus {
    Ok,
    Degraded,
    /// One of the results carried no hit-rate data.
    Skipped,
}

impl HitRateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitRateStatus::Ok => "ok",
            HitRateStatus::Degraded => "degraded",
            HitRateStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub baseline: BenchmarkResult,
    pub current: BenchmarkResult,
    pub performance_change_percent: f64,
    pub memory_change_percent: f64,
    pub operations_per_second_change: f64,
    pub regression_detected: bool,
    pub timing_regressions: Vec<Regression>,
    pub memory_regressions: Vec<Regression>,
    pub hit_rate_status: HitRateStatus,
    pub improvement_areas: Vec<String>,
    pub degradation_areas: Vec<String>,
    pub recommendation: String,
}

impl ComparisonResult {
    pub fn has_critical_regression(&self) -> bool {
        self.timing_regressions
            .iter()
            .chain(self.memory_regressions.iter())
            .any(|r| r.severity == RegressionSeverity::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSuite {
    pub id: Uuid,
    pub name: String,
    pub results: Vec<BenchmarkResult>,
    pub total_duration_ms: f64,
    /// Fraction of benchmarks that met their thresholds.
    pub pass_rate: f64,
    pub failed_benchmarks: Vec<String>,
    pub performance_grade: PerformanceGrade,
    pub environment_info: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkSuite {
    pub fn result(&self, operation_type: &str) -> Option<&BenchmarkResult> {
        self.results
            .iter()
            .find(|r| r.operation_type == operation_type)
    }

    pub fn passed(&self) -> bool {
        self.failed_benchmarks.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MemorySnapshot {
        MemorySnapshot {
            baseline_mb: 100.0,
            current_mb: 104.0,
            peak_mb: 106.0,
        }
    }

    #[test]
    fn test_from_samples_statistics() {
        let durations = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = BenchmarkResult::from_samples(
            "basic_operations",
            5,
            &durations,
            Duration::from_millis(500),
            5,
            0,
            snapshot(),
        );
        assert_eq!(result.avg_duration_ms, 3.0);
        assert_eq!(result.min_duration_ms, 1.0);
        assert_eq!(result.max_duration_ms, 5.0);
        assert!((result.operations_per_second - 10.0).abs() < 1e-9);
        assert_eq!(result.success_rate, 1.0);
        assert_eq!(result.memory_usage_mb, 4.0);
        assert_eq!(result.peak_memory_mb, 106.0);
    }

    #[test]
    fn test_success_rate_counts_failures() {
        let result = BenchmarkResult::from_samples(
            "basic_operations",
            4,
            &[1.0, 1.0, 1.0],
            Duration::from_millis(10),
            4,
            1,
            MemorySnapshot::default(),
        );
        assert_eq!(result.success_rate, 0.75);
        assert_eq!(result.success_rate_percent(), 75.0);
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = BenchmarkResult::failed("memory_pressure", "timed out");
        assert_eq!(result.iterations, 0);
        assert_eq!(result.success_rate, 0.0);
        assert_eq!(result.metadata["failure"], Value::String("timed out".into()));
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(PerformanceGrade::from_avg_duration(5.0, 10.0), PerformanceGrade::Excellent);
        assert_eq!(PerformanceGrade::from_avg_duration(10.0, 10.0), PerformanceGrade::Good);
        assert_eq!(PerformanceGrade::from_avg_duration(15.0, 10.0), PerformanceGrade::Acceptable);
        assert_eq!(PerformanceGrade::from_avg_duration(20.0, 10.0), PerformanceGrade::Poor);
        assert_eq!(PerformanceGrade::from_avg_duration(20.1, 10.0), PerformanceGrade::Critical);
    }

    #[test]
    fn test_suite_serializes_to_json() {
        let suite = BenchmarkSuite {
            id: Uuid::new_v4(),
            name: "suite".into(),
            results: vec![BenchmarkResult::failed("basic_operations", "x").with_cache_hit_rate(0.5)],
            total_duration_ms: 1.0,
            pass_rate: 0.0,
            failed_benchmarks: vec!["basic_operations".into()],
            performance_grade: PerformanceGrade::Critical,
            environment_info: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        let json = suite.to_json().unwrap();
        let back: BenchmarkSuite = serde_json::from_str(&json).unwrap();
        assert_eq!(back.performance_grade, PerformanceGrade::Critical);
        assert_eq!(back.results[0].cache_hit_rate, Some(0.5));
        assert!(!back.passed());
    }
}
