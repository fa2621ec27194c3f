//! cache-bench: run the cache benchmark suite or compare saved results.
//!
//! Usage:
//!   cache-bench suite [--config <file>] [--env <name>] [--preset <name>] [--redis-url <url>] [--output <file>]
//!   cache-bench compare <baseline.json> <current.json> [--config <file>] [--env <name>]

use ai_response_cache::benchmarks::{
    BenchmarkConfig, BenchmarkResult, CachePerformanceBenchmark, PerformanceRegressionDetector,
};
use ai_response_cache::cache::{build_cache, CacheConfig, CachePerformanceMonitor, CachePreset};
use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("suite");
    let rest: &[String] = args.get(2..).unwrap_or(&[]);

    match command {
        "suite" => cmd_suite(rest).await,
        "compare" => cmd_compare(rest).await,
        "version" | "--version" | "-V" => {
            println!("cache-bench {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        // bare flags mean `suite`
        flag if flag.starts_with("--") => cmd_suite(&args[1..]).await,
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"cache-bench: cache performance benchmarks

USAGE:
    cache-bench <COMMAND> [OPTIONS]

COMMANDS:
    suite                            Run the full benchmark suite (default)
    compare <baseline> <current>     Compare two saved BenchmarkResult JSON files
    version                          Show version information
    help                             Show this help message

OPTIONS:
    --config <file>      Benchmark config (.json, .yaml or .yml)
    --env <name>         Benchmark preset: development, testing, ci, production
    --preset <name>      Cache preset to benchmark (default: simple)
    --redis-url <url>    Redis URL for Redis-backed presets
    --output <file>      Also write the suite JSON to this file

ENVIRONMENT:
    RUST_LOG             Log filter, e.g. "ai_response_cache=debug""#
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
        } else if arg.starts_with("--") {
            skip = true;
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

async fn load_benchmark_config(args: &[String]) -> anyhow::Result<BenchmarkConfig> {
    if let Some(path) = flag_value(args, "--config") {
        return BenchmarkConfig::load_config_from_file(path)
            .await
            .with_context(|| format!("loading benchmark config from {}", path));
    }
    let env = flag_value(args, "--env").unwrap_or("development");
    Ok(BenchmarkConfig::for_environment(env)?)
}

async fn cmd_suite(args: &[String]) -> anyhow::Result<()> {
    let config = load_benchmark_config(args).await?;
    let preset: CachePreset = flag_value(args, "--preset").unwrap_or("simple").parse()?;
    let mut cache_config = CacheConfig::from_preset(preset);
    if let Some(url) = flag_value(args, "--redis-url") {
        cache_config = cache_config.with_redis_url(url);
    }

    let monitor = Arc::new(CachePerformanceMonitor::new());
    let cache = build_cache(&cache_config, monitor.clone()).await?;
    let bench = CachePerformanceBenchmark::new(config)?;
    let suite = bench.run_comprehensive_benchmark_suite(cache.as_ref()).await;

    let json = suite.to_json()?;
    if let Some(path) = flag_value(args, "--output") {
        let path = PathBuf::from(path);
        tokio::fs::write(&path, &json)
            .await
            .with_context(|| format!("writing suite to {}", path.display()))?;
    }
    println!("{}", json);

    for recommendation in monitor.recommendations() {
        tracing::info!("{}", recommendation);
    }
    if !suite.passed() {
        eprintln!(
            "{} benchmark(s) failed: {}",
            suite.failed_benchmarks.len(),
            suite.failed_benchmarks.join(", ")
        );
        std::process::exit(2);
    }
    Ok(())
}

async fn read_result(path: &str) -> anyhow::Result<BenchmarkResult> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path))
}

async fn cmd_compare(args: &[String]) -> anyhow::Result<()> {
    let files = positional(args);
    let [baseline, current] = files.as_slice() else {
        bail!("compare expects exactly two result files, got {}", files.len());
    };
    let config = load_benchmark_config(args).await?;
    let detector = PerformanceRegressionDetector::from_thresholds(&config.thresholds);
    let comparison = detector.compare_results(&read_result(baseline).await?, &read_result(current).await?);

    println!("{}", serde_json::to_string_pretty(&comparison)?);
    eprintln!("{}", comparison.recommendation);
    if comparison.regression_detected {
        std::process::exit(2);
    }
    Ok(())
}
