//! Benchmark orchestration.
//!
//! Runs are sequential by construction: one operation is awaited at a time
//! so latency samples are not skewed by competing tasks. A failing cache
//! operation is counted and the run continues.

use super::config::BenchmarkConfig;
use super::generator::CacheBenchmarkDataGenerator;
use super::models::{BenchmarkResult, BenchmarkSuite, ComparisonResult, PerformanceGrade};
use super::regression::PerformanceRegressionDetector;
use crate::cache::{CacheInterface, InMemoryCache, PayloadCodec};
use crate::utils::MemoryTracker;
use crate::Result;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const BASIC_OPERATIONS: &str = "basic_operations";
pub const MEMORY_CACHE_OPERATIONS: &str = "memory_cache_operations";
pub const COMPRESSION_EFFICIENCY: &str = "compression_efficiency";
pub const MEMORY_PRESSURE: &str = "memory_pressure";

const MEMORY_SAMPLE_INTERVAL: usize = 10;
/// Operations between explicit yields, so the suite timeout can fire even
/// for caches that never suspend.
const YIELD_INTERVAL: usize = 64;
const PRESSURE_ENTRY_BYTES: usize = 4 * 1024;

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub struct CachePerformanceBenchmark {
    config: BenchmarkConfig,
    detector: PerformanceRegressionDetector,
}

impl CachePerformanceBenchmark {
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: PerformanceRegressionDetector::from_thresholds(&config.thresholds),
            config,
        })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn detector(&self) -> &PerformanceRegressionDetector {
        &self.detector
    }

    fn generator(&self) -> CacheBenchmarkDataGenerator {
        CacheBenchmarkDataGenerator::new(self.config.seed)
    }

    async fn warm_up(&self, cache: &dyn CacheInterface) {
        // Failures here show up again in the measured loop.
        for i in 0..self.config.warmup_iterations {
            let key = format!("bench:warmup:{}", i);
            if cache.set(&key, json!({ "warmup": i }), None).await.is_ok() {
                let _ = cache.get(&key).await;
                let _ = cache.delete(&key).await;
            }
        }
    }

    async fn run_set_get_workload(
        &self,
        cache: &dyn CacheInterface,
        operation_type: &str,
        iterations: usize,
    ) -> BenchmarkResult {
        let workload = self.generator().generate_basic_operations_data(iterations);
        self.warm_up(cache).await;

        let mut memory = MemoryTracker::new(self.config.enable_memory_tracking);
        let mut durations = Vec::with_capacity(iterations * 2);
        let mut errors = 0usize;
        let mut reads = 0usize;
        let mut hits = 0usize;
        let started = Instant::now();

        for (i, op) in workload.iter().enumerate() {
            let t = Instant::now();
            if let Err(e) = cache.set(&op.key, op.value.clone(), None).await {
                errors += 1;
                debug!(key = %op.key, error = %e, "benchmark set failed");
                continue;
            }
            durations.push(millis(t.elapsed()));

            let t = Instant::now();
            let read = cache.get(&op.key).await;
            let elapsed = t.elapsed();
            match read {
                Ok(found) => {
                    durations.push(millis(elapsed));
                    reads += 1;
                    if found.as_ref() == Some(&op.value) {
                        hits += 1;
                    } else {
                        errors += 1;
                        debug!(key = %op.key, "read-after-write returned a different value");
                    }
                }
                Err(e) => {
                    errors += 1;
                    debug!(key = %op.key, error = %e, "benchmark get failed");
                }
            }

            if i % MEMORY_SAMPLE_INTERVAL == 0 {
                memory.sample();
            }
            if (i + 1) % YIELD_INTERVAL == 0 {
                tokio::task::yield_now().await;
            }
        }
        let elapsed = started.elapsed();
        memory.sample();

        for op in &workload {
            let _ = cache.delete(&op.key).await;
        }

        let hit_rate = if reads == 0 {
            0.0
        } else {
            hits as f64 / reads as f64
        };
        BenchmarkResult::from_samples(
            operation_type,
            iterations,
            &durations,
            elapsed,
            iterations,
            errors,
            memory.snapshot(),
        )
        .with_cache_hit_rate(hit_rate)
        .with_metadata("cache_backend", cache.name())
    }

    /// Warm up, then time `iterations` set/get pairs against `cache`,
    /// checking that every read returns what was just written.
    pub async fn benchmark_basic_operations(
        &self,
        cache: &dyn CacheInterface,
        iterations: usize,
    ) -> BenchmarkResult {
        info!(cache = cache.name(), iterations, "running basic operations benchmark");
        self.run_set_get_workload(cache, BASIC_OPERATIONS, iterations)
            .await
    }

    /// The basic workload against a fresh, standalone [`InMemoryCache`]
    /// sized to hold it.
    pub async fn benchmark_memory_cache_performance(&self, iterations: usize) -> BenchmarkResult {
        let capacity = iterations.max(1) + self.config.warmup_iterations;
        let cache = InMemoryCache::new(capacity, Duration::from_secs(3600));
        let result = self
            .run_set_get_workload(&cache, MEMORY_CACHE_OPERATIONS, iterations)
            .await;
        let stats = cache.stats();
        result
            .with_metadata("evictions", stats.evictions)
            .with_metadata("max_size", stats.max_size)
    }

    /// Encode and decode generated payloads with `codec`, reporting the
    /// aggregate stored-to-original size ratio.
    pub fn benchmark_compression_efficiency(&self, codec: &PayloadCodec) -> BenchmarkResult {
        let samples = self.generator().generate_compression_test_data();
        let mut memory = MemoryTracker::new(self.config.enable_memory_tracking);
        let mut durations = Vec::with_capacity(samples.len());
        let mut errors = 0usize;
        let mut original_bytes = 0usize;
        let mut stored_bytes = 0usize;
        let mut compressed = 0usize;
        let started = Instant::now();

        for sample in &samples {
            let t = Instant::now();
            let round_trip = codec
                .encode(&sample.value)
                .and_then(|encoded| Ok((codec.decode(&encoded.bytes)?, encoded)));
            let elapsed = t.elapsed();
            match round_trip {
                Ok((decoded, encoded)) if decoded == sample.value => {
                    durations.push(millis(elapsed));
                    original_bytes += encoded.original_size;
                    stored_bytes += encoded.bytes.len();
                    if encoded.compressed {
                        compressed += 1;
                    }
                }
                Ok(_) => {
                    errors += 1;
                    warn!(sample = %sample.name, "compression round trip changed the value");
                }
                Err(e) => {
                    errors += 1;
                    warn!(sample = %sample.name, error = %e, "compression round trip failed");
                }
            }
            memory.sample();
        }

        let ratio = if original_bytes == 0 {
            1.0
        } else {
            stored_bytes as f64 / original_bytes as f64
        };
        BenchmarkResult::from_samples(
            COMPRESSION_EFFICIENCY,
            samples.len(),
            &durations,
            started.elapsed(),
            samples.len(),
            errors,
            memory.snapshot(),
        )
        .with_metadata("compression_ratio", ratio)
        .with_metadata("space_savings_percent", (1.0 - ratio) * 100.0)
        .with_metadata("bytes_saved", original_bytes.saturating_sub(stored_bytes))
        .with_metadata("compressed_samples", compressed)
        .with_metadata("compression_threshold", codec.threshold())
    }

    /// Write `entries` payloads of a few KB, then read them all back.
    ///
    /// Reads that miss because the cache evicted under pressure lower the
    /// hit rate but are not errors.
    pub async fn benchmark_memory_pressure(
        &self,
        cache: &dyn CacheInterface,
        entries: usize,
    ) -> BenchmarkResult {
        let data = self
            .generator()
            .generate_memory_pressure_data(entries, PRESSURE_ENTRY_BYTES);
        let mut memory = MemoryTracker::new(self.config.enable_memory_tracking);
        let mut durations = Vec::with_capacity(entries * 2);
        let mut errors = 0usize;
        let mut found = 0usize;
        let started = Instant::now();

        for (i, (key, value)) in data.iter().enumerate() {
            let t = Instant::now();
            match cache.set(key, value.clone(), None).await {
                Ok(()) => durations.push(millis(t.elapsed())),
                Err(e) => {
                    errors += 1;
                    debug!(key = %key, error = %e, "memory pressure write failed");
                }
            }
            if i % MEMORY_SAMPLE_INTERVAL == 0 {
                memory.sample();
            }
            if (i + 1) % YIELD_INTERVAL == 0 {
                tokio::task::yield_now().await;
            }
        }
        for (i, (key, value)) in data.iter().enumerate() {
            let t = Instant::now();
            match cache.get(key).await {
                Ok(read) => {
                    durations.push(millis(t.elapsed()));
                    if read.as_ref() == Some(value) {
                        found += 1;
                    }
                }
                Err(e) => {
                    errors += 1;
                    debug!(key = %key, error = %e, "memory pressure read failed");
                }
            }
            if (i + 1) % YIELD_INTERVAL == 0 {
                tokio::task::yield_now().await;
            }
        }
        let elapsed = started.elapsed();
        memory.sample();

        for (key, _) in &data {
            let _ = cache.delete(key).await;
        }

        let hit_rate = if entries == 0 {
            0.0
        } else {
            found as f64 / entries as f64
        };
        let payload_mb = (entries * PRESSURE_ENTRY_BYTES) as f64 / (1024.0 * 1024.0);
        BenchmarkResult::from_samples(
            MEMORY_PRESSURE,
            entries,
            &durations,
            elapsed,
            entries * 2,
            errors,
            memory.snapshot(),
        )
        .with_cache_hit_rate(hit_rate)
        .with_metadata("entry_bytes", PRESSURE_ENTRY_BYTES)
        .with_metadata("payload_mb", payload_mb)
        .with_metadata("cache_backend", cache.name())
    }

    /// Whether `result` stays within the configured memory and success-rate
    /// limits. The `basic_operations_*` latency limits apply only to the
    /// get/set workloads; compression and memory-pressure steps move much
    /// larger payloads per operation.
    pub fn meets_thresholds(&self, result: &BenchmarkResult) -> bool {
        let t = &self.config.thresholds;
        if result.metadata.contains_key("failure") {
            return false;
        }
        if result.success_rate_percent() < t.success_rate_warning {
            warn!(
                operation = %result.operation_type,
                success_rate = result.success_rate_percent(),
                "success rate below warning threshold"
            );
        }
        if result.memory_usage_mb > t.memory_usage_warning_mb {
            warn!(
                operation = %result.operation_type,
                memory_mb = result.memory_usage_mb,
                "memory usage above warning threshold"
            );
        }
        let latency_ok = match result.operation_type.as_str() {
            BASIC_OPERATIONS | MEMORY_CACHE_OPERATIONS => {
                result.avg_duration_ms <= t.basic_operations_avg_ms
                    && result.p95_duration_ms <= t.basic_operations_p95_ms
                    && result.p99_duration_ms <= t.basic_operations_p99_ms
            }
            _ => true,
        };
        result.success_rate_percent() >= t.success_rate_critical
            && result.memory_usage_mb <= t.memory_usage_critical_mb
            && latency_ok
    }

    async fn run_step<F>(
        &self,
        name: &str,
        deadline: tokio::time::Instant,
        step: F,
    ) -> BenchmarkResult
    where
        F: Future<Output = BenchmarkResult>,
    {
        if tokio::time::Instant::now() >= deadline {
            return BenchmarkResult::failed(name, "skipped: suite timeout exceeded");
        }
        match tokio::time::timeout_at(deadline, step).await {
            Ok(result) => result,
            Err(_) => {
                warn!(benchmark = name, "benchmark exceeded the suite timeout");
                BenchmarkResult::failed(name, "suite timeout exceeded")
            }
        }
    }

    /// Run every benchmark against `cache` within `timeout_seconds`, grading
    /// the suite on the basic-operations average latency.
    pub async fn run_comprehensive_benchmark_suite(
        &self,
        cache: &dyn CacheInterface,
    ) -> BenchmarkSuite {
        let iterations = self.config.default_iterations;
        info!(
            cache = cache.name(),
            iterations,
            environment = %self.config.environment,
            "starting benchmark suite"
        );
        let started = Instant::now();
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.timeout_seconds);

        let mut results = vec![
            self.run_step(
                BASIC_OPERATIONS,
                deadline,
                self.benchmark_basic_operations(cache, iterations),
            )
            .await,
            self.run_step(
                MEMORY_CACHE_OPERATIONS,
                deadline,
                self.benchmark_memory_cache_performance(iterations),
            )
            .await,
        ];
        if self.config.enable_compression_tests {
            let codec = PayloadCodec::default();
            results.push(
                self.run_step(COMPRESSION_EFFICIENCY, deadline, async {
                    self.benchmark_compression_efficiency(&codec)
                })
                .await,
            );
        }
        results.push(
            self.run_step(
                MEMORY_PRESSURE,
                deadline,
                self.benchmark_memory_pressure(cache, iterations),
            )
            .await,
        );

        let failed_benchmarks: Vec<String> = results
            .iter()
            .filter(|r| !self.meets_thresholds(r))
            .map(|r| r.operation_type.clone())
            .collect();
        let pass_rate = (results.len() - failed_benchmarks.len()) as f64 / results.len() as f64;
        let performance_grade = results
            .iter()
            .find(|r| r.operation_type == BASIC_OPERATIONS && !r.metadata.contains_key("failure"))
            .map(|r| {
                PerformanceGrade::from_avg_duration(
                    r.avg_duration_ms,
                    self.config.thresholds.basic_operations_avg_ms,
                )
            })
            .unwrap_or(PerformanceGrade::Critical);

        let suite = BenchmarkSuite {
            id: Uuid::new_v4(),
            name: format!("{}_cache_benchmark_suite", cache.name()),
            results,
            total_duration_ms: millis(started.elapsed()),
            pass_rate,
            failed_benchmarks,
            performance_grade,
            environment_info: self.environment_info(cache),
            timestamp: Utc::now(),
        };
        info!(
            grade = %suite.performance_grade,
            pass_rate = suite.pass_rate,
            failed = suite.failed_benchmarks.len(),
            "benchmark suite finished"
        );
        suite
    }

    fn environment_info(&self, cache: &dyn CacheInterface) -> BTreeMap<String, Value> {
        let mut info = BTreeMap::new();
        info.insert("environment".into(), json!(self.config.environment));
        info.insert("cache_backend".into(), json!(cache.name()));
        info.insert("default_iterations".into(), json!(self.config.default_iterations));
        info.insert("warmup_iterations".into(), json!(self.config.warmup_iterations));
        info.insert("timeout_seconds".into(), json!(self.config.timeout_seconds));
        info.insert("seed".into(), json!(self.config.seed));
        info.insert(
            "memory_tracking".into(),
            json!(self.config.enable_memory_tracking),
        );
        info.insert(
            "thresholds".into(),
            serde_json::to_value(&self.config.thresholds).unwrap_or(Value::Null),
        );
        info.insert("crate_version".into(), json!(env!("CARGO_PKG_VERSION")));
        info.insert("os".into(), json!(std::env::consts::OS));
        info.insert("arch".into(), json!(std::env::consts::ARCH));
        info
    }

    /// Run the identical seeded workload against both caches and compare.
    pub async fn compare_before_after_refactoring(
        &self,
        original_cache: &dyn CacheInterface,
        new_cache: &dyn CacheInterface,
    ) -> ComparisonResult {
        let iterations = self.config.default_iterations;
        let baseline = self
            .benchmark_basic_operations(original_cache, iterations)
            .await;
        let current = self.benchmark_basic_operations(new_cache, iterations).await;
        let comparison = self.detector.compare_results(&baseline, &current);
        info!(
            original = original_cache.name(),
            refactored = new_cache.name(),
            regression = comparison.regression_detected,
            "{}",
            comparison.recommendation
        );
        comparison
    }
}
