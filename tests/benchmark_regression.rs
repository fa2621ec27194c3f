//! Benchmark harness and regression gating, end to end.

use ai_response_cache::benchmarks::{
    BenchmarkConfig, BenchmarkResult, BenchmarkSuite, CachePerformanceBenchmark, HitRateStatus,
    PerformanceRegressionDetector, RegressionSeverity, BASIC_OPERATIONS, MEMORY_CACHE_OPERATIONS,
    MEMORY_PRESSURE,
};
use ai_response_cache::cache::{
    CachePerformanceMonitor, GenericRedisCache, InMemoryCache, InMemoryRemoteStore,
    RedisCacheConfig,
};
use ai_response_cache::utils::MemorySnapshot;
use std::sync::Arc;
use std::time::Duration;

fn result(avg_ms: f64, ops_per_sec: f64, hit_rate: Option<f64>) -> BenchmarkResult {
    let mut r = BenchmarkResult::from_samples(
        BASIC_OPERATIONS,
        100,
        &[avg_ms],
        Duration::from_secs(1),
        100,
        0,
        MemorySnapshot::default(),
    );
    r.avg_duration_ms = avg_ms;
    r.p95_duration_ms = avg_ms * 2.0;
    r.operations_per_second = ops_per_sec;
    r.cache_hit_rate = hit_rate;
    r
}

fn quick_config() -> BenchmarkConfig {
    BenchmarkConfig::for_environment("testing")
        .unwrap()
        .with_iterations(30)
}

fn redis_cache(store: Arc<InMemoryRemoteStore>) -> GenericRedisCache {
    GenericRedisCache::with_store(
        RedisCacheConfig::new(),
        Arc::new(CachePerformanceMonitor::new()),
        store,
    )
    .unwrap()
}

#[test]
fn test_twenty_percent_slowdown_blocks_with_review() {
    let detector = PerformanceRegressionDetector::default();
    let comparison = detector.compare_results(
        &result(50.0, 1000.0, Some(0.9)),
        &result(60.0, 1000.0, Some(0.9)),
    );

    assert!(comparison.regression_detected);
    assert!(!comparison.has_critical_regression());
    assert_eq!(comparison.degradation_areas, vec!["timing".to_string()]);
    // avg and p95 both grew by 20%
    assert_eq!(comparison.timing_regressions.len(), 2);
    assert!(comparison
        .timing_regressions
        .iter()
        .all(|r| r.severity == RegressionSeverity::Warning));
    assert!((comparison.performance_change_percent - 20.0).abs() < 1e-9);
    assert!(comparison.recommendation.starts_with("Regression detected in timing"));
}

#[test]
fn test_doubled_latency_is_critical() {
    let detector = PerformanceRegressionDetector::default();
    let comparison =
        detector.compare_results(&result(10.0, 1000.0, None), &result(20.0, 500.0, None));
    assert!(comparison.has_critical_regression());
    assert!(comparison.recommendation.contains("do not deploy"));
    assert_eq!(comparison.hit_rate_status, HitRateStatus::Skipped);
}

#[test]
fn test_hit_rate_drop_of_five_points_is_tolerated() {
    let detector = PerformanceRegressionDetector::default();
    let baseline = result(10.0, 1000.0, Some(0.85));

    let ok = detector.compare_results(&baseline, &result(10.0, 1000.0, Some(0.80)));
    assert_eq!(ok.hit_rate_status, HitRateStatus::Ok);
    assert!(!ok.regression_detected);

    let degraded = detector.compare_results(&baseline, &result(10.0, 1000.0, Some(0.79)));
    assert_eq!(degraded.hit_rate_status, HitRateStatus::Degraded);
    assert!(degraded.regression_detected);
    assert_eq!(degraded.degradation_areas, vec!["cache_hit_rate".to_string()]);
}

#[test]
fn test_faster_run_is_reported_as_improvement() {
    let detector = PerformanceRegressionDetector::default();
    let comparison =
        detector.compare_results(&result(50.0, 1000.0, None), &result(45.0, 1000.0, None));

    assert!(!comparison.regression_detected);
    assert_eq!(comparison.improvement_areas, vec!["timing".to_string()]);
    assert_eq!(
        comparison.recommendation,
        "No regressions, improved timing; safe to deploy"
    );
}

#[tokio::test]
async fn test_saved_results_compare_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let baseline_path = dir.path().join("baseline.json");
    let current_path = dir.path().join("current.json");
    tokio::fs::write(
        &baseline_path,
        serde_json::to_string(&result(20.0, 500.0, Some(0.95))).unwrap(),
    )
    .await
    .unwrap();
    tokio::fs::write(
        &current_path,
        serde_json::to_string(&result(23.0, 480.0, Some(0.95))).unwrap(),
    )
    .await
    .unwrap();

    let load = |bytes: String| serde_json::from_str::<BenchmarkResult>(&bytes).unwrap();
    let baseline = load(tokio::fs::read_to_string(&baseline_path).await.unwrap());
    let current = load(tokio::fs::read_to_string(&current_path).await.unwrap());

    // 15% slower: a warning by default, ignored under the relaxed CI limits
    let default = PerformanceRegressionDetector::default().compare_results(&baseline, &current);
    assert!(default.regression_detected);

    let yaml_path = dir.path().join("bench.yaml");
    tokio::fs::write(
        &yaml_path,
        "environment: ci\nthresholds:\n  regression_warning_percent: 20\n  regression_critical_percent: 40\n",
    )
    .await
    .unwrap();
    let config = BenchmarkConfig::load_config_from_file(&yaml_path).await.unwrap();
    assert_eq!(config.environment, "ci");
    assert_eq!(config.default_iterations, 100);

    let relaxed = PerformanceRegressionDetector::from_thresholds(&config.thresholds);
    assert!(!relaxed.compare_results(&baseline, &current).regression_detected);
}

#[tokio::test]
async fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let toml = dir.path().join("bench.toml");
    tokio::fs::write(&toml, "default_iterations = 5").await.unwrap();
    let err = BenchmarkConfig::load_config_from_file(&toml).await.unwrap_err();
    assert!(err.is_configuration());

    let missing = dir.path().join("missing.json");
    assert!(BenchmarkConfig::load_config_from_file(&missing)
        .await
        .unwrap_err()
        .is_configuration());

    let inverted = dir.path().join("inverted.json");
    tokio::fs::write(
        &inverted,
        r#"{"thresholds": {"basic_operations_avg_ms": 80, "basic_operations_p95_ms": 50}}"#,
    )
    .await
    .unwrap();
    assert!(BenchmarkConfig::load_config_from_file(&inverted).await.is_err());
}

#[tokio::test]
async fn test_suite_over_two_tier_cache() {
    let store = Arc::new(InMemoryRemoteStore::new());
    let cache = redis_cache(store.clone());
    assert!(cache.connect().await);

    let bench = CachePerformanceBenchmark::new(quick_config()).unwrap();
    let suite = bench.run_comprehensive_benchmark_suite(&cache).await;

    assert_eq!(suite.results.len(), 4);
    assert_eq!(suite.name, "redis_cache_benchmark_suite");
    for name in [BASIC_OPERATIONS, MEMORY_CACHE_OPERATIONS, MEMORY_PRESSURE] {
        let r = suite.result(name).unwrap();
        assert_eq!(r.error_count, 0, "{} had errors", name);
        assert!((r.success_rate - 1.0).abs() < 1e-9);
    }
    assert_eq!(suite.result(BASIC_OPERATIONS).unwrap().cache_hit_rate, Some(1.0));
    assert_eq!(suite.environment_info["cache_backend"], "redis");

    // benchmark keys are cleaned up afterwards
    assert!(store.is_empty());

    let reloaded: BenchmarkSuite = serde_json::from_str(&suite.to_json().unwrap()).unwrap();
    assert_eq!(reloaded.id, suite.id);
    assert_eq!(reloaded.performance_grade, suite.performance_grade);
}

#[tokio::test]
async fn test_benchmark_survives_remote_outage() {
    let store = Arc::new(InMemoryRemoteStore::new());
    let cache = redis_cache(store.clone());
    assert!(cache.connect().await);
    store.set_available(false);

    let bench = CachePerformanceBenchmark::new(quick_config()).unwrap();
    let result = bench.benchmark_basic_operations(&cache, 30).await;

    // the memory tier keeps serving, so nothing fails
    assert_eq!(result.error_count, 0);
    assert_eq!(result.cache_hit_rate, Some(1.0));
    assert!(cache.monitor().stats().degradation_events >= 1);
}

#[tokio::test]
async fn test_refactored_cache_matches_original() {
    let original = InMemoryCache::new(1_000, Duration::from_secs(60));
    let store = Arc::new(InMemoryRemoteStore::new());
    let refactored = redis_cache(store);
    assert!(refactored.connect().await);

    let bench = CachePerformanceBenchmark::new(quick_config()).unwrap();
    let comparison = bench
        .compare_before_after_refactoring(&original, &refactored)
        .await;

    assert_eq!(comparison.baseline.iterations, comparison.current.iterations);
    assert_eq!(comparison.baseline.cache_hit_rate, Some(1.0));
    assert_eq!(comparison.current.cache_hit_rate, Some(1.0));
    assert_eq!(comparison.hit_rate_status, HitRateStatus::Ok);
}
