//! Benchmark settings and pass/fail thresholds.
//!
//! Loaded from JSON or YAML files, or taken from a named environment preset.
//! Every constructor path validates before returning, so an inconsistent
//! threshold set fails at load time rather than mid-run.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SOURCE: &str = "benchmark_config";

/// Latency limits are milliseconds, memory limits megabytes, regression
/// limits percent change and success-rate limits percent of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePerformanceThresholds {
    pub basic_operations_avg_ms: f64,
    pub basic_operations_p95_ms: f64,
    pub basic_operations_p99_ms: f64,
    pub memory_usage_warning_mb: f64,
    pub memory_usage_critical_mb: f64,
    pub regression_warning_percent: f64,
    pub regression_critical_percent: f64,
    pub success_rate_warning: f64,
    pub success_rate_critical: f64,
}

impl Default for CachePerformanceThresholds {
    fn default() -> Self {
        Self {
            basic_operations_avg_ms: 25.0,
            basic_operations_p95_ms: 50.0,
            basic_operations_p99_ms: 100.0,
            memory_usage_warning_mb: 50.0,
            memory_usage_critical_mb: 100.0,
            regression_warning_percent: 10.0,
            regression_critical_percent: 25.0,
            success_rate_warning: 95.0,
            success_rate_critical: 90.0,
        }
    }
}

impl CachePerformanceThresholds {
    /// Multiply every latency and memory limit by `factor`, e.g. to relax
    /// limits on shared CI runners.
    pub fn scaled(mut self, factor: f64) -> Self {
        self.basic_operations_avg_ms *= factor;
        self.basic_operations_p95_ms *= factor;
        self.basic_operations_p99_ms *= factor;
        self.memory_usage_warning_mb *= factor;
        self.memory_usage_critical_mb *= factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("thresholds.basic_operations_avg_ms", self.basic_operations_avg_ms),
            ("thresholds.memory_usage_warning_mb", self.memory_usage_warning_mb),
            ("thresholds.regression_warning_percent", self.regression_warning_percent),
        ];
        for (field, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(Error::invalid_field(SOURCE, field, "must be > 0"));
            }
        }
        if self.basic_operations_avg_ms > self.basic_operations_p95_ms
            || self.basic_operations_p95_ms > self.basic_operations_p99_ms
        {
            return Err(Error::configuration_with_context(
                "latency thresholds must satisfy avg_ms <= p95_ms <= p99_ms",
                ErrorContext::new()
                    .with_field_path("thresholds.basic_operations_p95_ms")
                    .with_details(format!(
                        "avg={} p95={} p99={}",
                        self.basic_operations_avg_ms,
                        self.basic_operations_p95_ms,
                        self.basic_operations_p99_ms
                    ))
                    .with_source(SOURCE),
            ));
        }
        if self.memory_usage_warning_mb >= self.memory_usage_critical_mb {
            return Err(Error::invalid_field(
                SOURCE,
                "thresholds.memory_usage_warning_mb",
                "must be < memory_usage_critical_mb",
            ));
        }
        if self.regression_warning_percent >= self.regression_critical_percent {
            return Err(Error::invalid_field(
                SOURCE,
                "thresholds.regression_warning_percent",
                "must be < regression_critical_percent",
            ));
        }
        for (field, value) in [
            ("thresholds.success_rate_warning", self.success_rate_warning),
            ("thresholds.success_rate_critical", self.success_rate_critical),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::invalid_field(SOURCE, field, "must be within 0..=100"));
            }
        }
        if self.success_rate_critical > self.success_rate_warning {
            return Err(Error::invalid_field(
                SOURCE,
                "thresholds.success_rate_critical",
                "must be <= success_rate_warning",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub default_iterations: usize,
    pub warmup_iterations: usize,
    pub timeout_seconds: u64,
    pub enable_memory_tracking: bool,
    pub enable_compression_tests: bool,
    pub environment: String,
    /// Seed for workload generation; equal seeds give identical workloads.
    pub seed: u64,
    pub thresholds: CachePerformanceThresholds,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            default_iterations: 100,
            warmup_iterations: 10,
            timeout_seconds: 300,
            enable_memory_tracking: true,
            enable_compression_tests: true,
            environment: "development".to_string(),
            seed: 42,
            thresholds: CachePerformanceThresholds::default(),
        }
    }
}

impl BenchmarkConfig {
    pub const ENVIRONMENTS: [&'static str; 4] = ["development", "testing", "ci", "production"];

    /// Settings tuned for a named environment.
    pub fn for_environment(name: &str) -> Result<Self> {
        let base = Self::default();
        let config = match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => base,
            "testing" | "test" => Self {
                default_iterations: 20,
                warmup_iterations: 2,
                timeout_seconds: 60,
                enable_memory_tracking: false,
                environment: "testing".to_string(),
                ..base
            },
            "ci" => Self {
                default_iterations: 100,
                warmup_iterations: 10,
                timeout_seconds: 600,
                environment: "ci".to_string(),
                thresholds: CachePerformanceThresholds::default().scaled(1.5),
                ..base
            },
            "production" | "prod" => Self {
                default_iterations: 1000,
                warmup_iterations: 100,
                timeout_seconds: 1800,
                environment: "production".to_string(),
                thresholds: CachePerformanceThresholds {
                    basic_operations_avg_ms: 10.0,
                    basic_operations_p95_ms: 25.0,
                    basic_operations_p99_ms: 50.0,
                    regression_warning_percent: 5.0,
                    regression_critical_percent: 15.0,
                    success_rate_warning: 99.0,
                    success_rate_critical: 95.0,
                    ..CachePerformanceThresholds::default()
                },
                ..base
            },
            _ => {
                return Err(Error::configuration_with_context(
                    format!("unknown benchmark environment '{}'", name),
                    ErrorContext::new()
                        .with_field_path("environment")
                        .with_details(Self::ENVIRONMENTS.join(", "))
                        .with_source(SOURCE),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file. Missing fields take
    /// their defaults.
    pub async fn load_config_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read benchmark config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source(SOURCE),
            )
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config: BenchmarkConfig = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(Error::configuration_with_context(
                    "unsupported benchmark config format",
                    ErrorContext::new()
                        .with_details(format!(
                            "{} (expected .json, .yaml or .yml)",
                            path.display()
                        ))
                        .with_source(SOURCE),
                ))
            }
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), environment = %config.environment, "loaded benchmark config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_iterations == 0 {
            return Err(Error::invalid_field(SOURCE, "default_iterations", "must be > 0"));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::invalid_field(SOURCE, "timeout_seconds", "must be > 0"));
        }
        self.thresholds.validate()
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.default_iterations = iterations;
        self
    }

    pub fn with_warmup_iterations(mut self, iterations: usize) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    pub fn with_memory_tracking(mut self, enabled: bool) -> Self {
        self.enable_memory_tracking = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_presets_validate() {
        BenchmarkConfig::default().validate().unwrap();
        for env in BenchmarkConfig::ENVIRONMENTS {
            let cfg = BenchmarkConfig::for_environment(env).unwrap();
            assert_eq!(cfg.environment, env);
        }
        assert!(BenchmarkConfig::for_environment("staging").is_err());
    }

    #[test]
    fn test_ci_preset_relaxes_latency() {
        let ci = BenchmarkConfig::for_environment("ci").unwrap();
        assert_eq!(ci.thresholds.basic_operations_avg_ms, 37.5);
        assert_eq!(ci.thresholds.regression_warning_percent, 10.0);
    }

    #[test]
    fn test_threshold_ordering_rules() {
        let mut t = CachePerformanceThresholds::default();
        t.basic_operations_p95_ms = 20.0;
        assert!(t.validate().is_err());

        let mut t = CachePerformanceThresholds::default();
        t.memory_usage_warning_mb = 100.0;
        assert!(t.validate().is_err());

        let mut t = CachePerformanceThresholds::default();
        t.regression_critical_percent = 10.0;
        assert!(t.validate().is_err());

        let mut t = CachePerformanceThresholds::default();
        t.success_rate_warning = 101.0;
        let err = t.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("thresholds.success_rate_warning")
        );
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let cfg = BenchmarkConfig::default().with_iterations(0);
        assert!(cfg.validate().unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_load_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("bench.json");
        std::fs::write(
            &json,
            r#"{"default_iterations": 7, "thresholds": {"basic_operations_avg_ms": 5.0}}"#,
        )
        .unwrap();
        let cfg = BenchmarkConfig::load_config_from_file(&json).await.unwrap();
        assert_eq!(cfg.default_iterations, 7);
        assert_eq!(cfg.thresholds.basic_operations_avg_ms, 5.0);
        assert_eq!(cfg.thresholds.basic_operations_p95_ms, 50.0);

        let yaml = dir.path().join("bench.yml");
        std::fs::write(&yaml, "environment: ci\ntimeout_seconds: 30\n").unwrap();
        let cfg = BenchmarkConfig::load_config_from_file(&yaml).await.unwrap();
        assert_eq!(cfg.environment, "ci");
        assert_eq!(cfg.timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_invalid_file_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        std::fs::write(
            &path,
            r#"{"thresholds": {"basic_operations_avg_ms": 80.0, "basic_operations_p95_ms": 60.0}}"#,
        )
        .unwrap();
        let err = BenchmarkConfig::load_config_from_file(&path).await.unwrap_err();
        assert!(err.is_configuration());

        let toml = dir.path().join("bench.toml");
        std::fs::write(&toml, "").unwrap();
        assert!(BenchmarkConfig::load_config_from_file(&toml).await.is_err());
        assert!(BenchmarkConfig::load_config_from_file(dir.path().join("missing.json"))
            .await
            .is_err());
    }
}
