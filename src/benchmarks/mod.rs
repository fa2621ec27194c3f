//! # Cache Benchmarks
//!
//! Drives any [`CacheInterface`](crate::cache::CacheInterface) with seeded
//! workloads, summarises latency and memory, and compares runs to catch
//! regressions before a cache change ships.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CachePerformanceBenchmark`] | Runs individual benchmarks and the full suite |
//! | [`PerformanceRegressionDetector`] | Classifies changes between two results |
//! | [`BenchmarkConfig`] | Iterations, timeouts and thresholds, from file or preset |
//! | [`CacheBenchmarkDataGenerator`] | Deterministic workload generation |
//! | [`BenchmarkResult`] / [`BenchmarkSuite`] | Serializable result data |

pub mod config;
pub mod core;
pub mod generator;
pub mod models;
pub mod regression;

pub use self::config::{BenchmarkConfig, CachePerformanceThresholds};
pub use self::core::{
    CachePerformanceBenchmark, BASIC_OPERATIONS, COMPRESSION_EFFICIENCY, MEMORY_CACHE_OPERATIONS,
    MEMORY_PRESSURE,
};
pub use self::generator::{
    AccessKind, AccessOperation, AccessPattern, BenchmarkOperation, CacheBenchmarkDataGenerator,
    CompressionSample, PayloadSize,
};
pub use self::models::{
    BenchmarkResult, BenchmarkSuite, ComparisonResult, HitRateStatus, PerformanceGrade,
    Regression, RegressionSeverity,
};
pub use self::regression::PerformanceRegressionDetector;
pub use crate::utils::{MemoryTracker, StatisticalCalculator};
