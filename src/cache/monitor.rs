//! Cache performance monitor.
//!
//! One monitor is constructed by the application and handed to each cache
//! through `Arc`; there is no process-wide instance.

use crate::utils::{DistributionSummary, StatisticalCalculator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    L1Hit,
    L2Hit,
    Miss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub pattern: String,
    pub keys_invalidated: usize,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationHitStats {
    pub hits: u64,
    pub misses: u64,
    pub avg_text_length: f64,
}

impl OperationHitStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    pub count: u64,
    pub avg_ratio: f64,
    pub bytes_saved: u64,
    pub avg_time_ms: f64,
}

/// Summary produced by [`CachePerformanceMonitor::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_gets: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub sets: u64,
    pub deletes: u64,
    pub get_latency_ms: DistributionSummary,
    pub set_latency_ms: DistributionSummary,
    pub key_generation_ms: DistributionSummary,
    pub compression: CompressionStats,
    pub invalidations: u64,
    pub keys_invalidated: u64,
    pub backend_errors: u64,
    pub degradation_events: u64,
    pub recoveries: u64,
    pub per_operation: BTreeMap<String, OperationHitStats>,
}

#[derive(Default)]
struct Inner {
    l1_hits: u64,
    l2_hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    get_ms: VecDeque<f64>,
    set_ms: VecDeque<f64>,
    key_gen_ms: VecDeque<f64>,
    compression_count: u64,
    compression_ratio_sum: f64,
    compression_time_ms_sum: f64,
    bytes_saved: u64,
    invalidations: VecDeque<InvalidationEvent>,
    invalidation_count: u64,
    keys_invalidated: u64,
    backend_errors: u64,
    last_error: Option<String>,
    degradation_events: u64,
    recoveries: u64,
    per_operation: BTreeMap<String, OperationHitStats>,
}

pub struct CachePerformanceMonitor {
    inner: Mutex<Inner>,
    max_measurements: usize,
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, max: usize) {
    if buf.len() >= max {
        buf.pop_front();
    }
    buf.push_back(item);
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl CachePerformanceMonitor {
    pub fn new() -> Self {
        Self::with_max_measurements(1000)
    }

    /// Keep at most `max` latency samples per series (oldest dropped first).
    pub fn with_max_measurements(max: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_measurements: max.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_get(&self, duration: Duration, outcome: LookupOutcome) {
        let max = self.max_measurements;
        let mut st = self.lock();
        match outcome {
            LookupOutcome::L1Hit => st.l1_hits += 1,
            LookupOutcome::L2Hit => st.l2_hits += 1,
            LookupOutcome::Miss => st.misses += 1,
        }
        push_bounded(&mut st.get_ms, ms(duration), max);
    }

    pub fn record_set(&self, duration: Duration) {
        let max = self.max_measurements;
        let mut st = self.lock();
        st.sets += 1;
        push_bounded(&mut st.set_ms, ms(duration), max);
    }

    pub fn record_delete(&self) {
        self.lock().deletes += 1;
    }

    pub fn record_key_generation(&self, duration: Duration) {
        let max = self.max_measurements;
        push_bounded(&mut self.lock().key_gen_ms, ms(duration), max);
    }

    /// Per-AI-operation hit accounting.
    pub fn record_operation_lookup(&self, operation: &str, hit: bool, text_length: usize) {
        let mut st = self.lock();
        let entry = st.per_operation.entry(operation.to_string()).or_default();
        let seen = (entry.hits + entry.misses) as f64;
        entry.avg_text_length = (entry.avg_text_length * seen + text_length as f64) / (seen + 1.0);
        if hit {
            entry.hits += 1;
        } else {
            entry.misses += 1;
        }
    }

    pub fn record_compression(&self, original_size: usize, stored_size: usize, duration: Duration) {
        if original_size == 0 {
            return;
        }
        let mut st = self.lock();
        st.compression_count += 1;
        st.compression_ratio_sum += stored_size as f64 / original_size as f64;
        st.compression_time_ms_sum += ms(duration);
        st.bytes_saved += original_size.saturating_sub(stored_size) as u64;
    }

    pub fn record_invalidation(&self, pattern: &str, keys_invalidated: usize, reason: &str) {
        let max = self.max_measurements;
        let mut st = self.lock();
        st.invalidation_count += 1;
        st.keys_invalidated += keys_invalidated as u64;
        push_bounded(
            &mut st.invalidations,
            InvalidationEvent {
                pattern: pattern.to_string(),
                keys_invalidated,
                reason: reason.to_string(),
                at: Utc::now(),
            },
            max,
        );
    }

    pub fn record_backend_error(&self, operation: &str, message: &str) {
        let mut st = self.lock();
        st.backend_errors += 1;
        st.last_error = Some(format!("{}: {}", operation, message));
    }

    pub fn record_degradation(&self, reason: &str) {
        let mut st = self.lock();
        st.degradation_events += 1;
        st.last_error = Some(format!("degraded: {}", reason));
    }

    pub fn record_recovery(&self) {
        self.lock().recoveries += 1;
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn recent_invalidations(&self) -> Vec<InvalidationEvent> {
        self.lock().invalidations.iter().cloned().collect()
    }

    pub fn operation_hit_rates(&self) -> BTreeMap<String, f64> {
        self.lock()
            .per_operation
            .iter()
            .map(|(op, s)| (op.clone(), s.hit_rate()))
            .collect()
    }

    pub fn stats(&self) -> PerformanceStats {
        let st = self.lock();
        let total_gets = st.l1_hits + st.l2_hits + st.misses;
        let hits = st.l1_hits + st.l2_hits;
        let series = |d: &VecDeque<f64>| {
            let v: Vec<f64> = d.iter().copied().collect();
            StatisticalCalculator::summarize(&v)
        };
        let compression = if st.compression_count == 0 {
            CompressionStats::default()
        } else {
            CompressionStats {
                count: st.compression_count,
                avg_ratio: st.compression_ratio_sum / st.compression_count as f64,
                bytes_saved: st.bytes_saved,
                avg_time_ms: st.compression_time_ms_sum / st.compression_count as f64,
            }
        };
        PerformanceStats {
            total_gets,
            l1_hits: st.l1_hits,
            l2_hits: st.l2_hits,
            misses: st.misses,
            hit_rate: if total_gets == 0 {
                0.0
            } else {
                hits as f64 / total_gets as f64
            },
            sets: st.sets,
            deletes: st.deletes,
            get_latency_ms: series(&st.get_ms),
            set_latency_ms: series(&st.set_ms),
            key_generation_ms: series(&st.key_gen_ms),
            compression,
            invalidations: st.invalidation_count,
            keys_invalidated: st.keys_invalidated,
            backend_errors: st.backend_errors,
            degradation_events: st.degradation_events,
            recoveries: st.recoveries,
            per_operation: st.per_operation.clone(),
        }
    }

    /// Tuning hints derived from the current stats.
    pub fn recommendations(&self) -> Vec<String> {
        let stats = self.stats();
        let mut out = Vec::new();
        if stats.total_gets >= 100 && stats.hit_rate < 0.5 {
            out.push(format!(
                "Hit rate is {:.1}%; consider longer TTLs or a larger memory tier",
                stats.hit_rate * 100.0
            ));
        }
        if stats.compression.count >= 10 && stats.compression.avg_ratio > 0.9 {
            out.push(
                "Compression saves under 10%; consider raising compression_threshold".to_string(),
            );
        }
        if stats.key_generation_ms.count >= 10 && stats.key_generation_ms.p95 > 5.0 {
            out.push(
                "Key generation p95 above 5ms; consider lowering text_hash_threshold".to_string(),
            );
        }
        if stats.backend_errors > 0 || stats.degradation_events > 0 {
            out.push(format!(
                "{} backend errors and {} degradation events; check Redis connectivity",
                stats.backend_errors, stats.degradation_events
            ));
        }
        for (op, s) in &stats.per_operation {
            if s.hits + s.misses >= 50 && s.hit_rate() < 0.2 {
                out.push(format!(
                    "Operation '{}' rarely hits ({:.1}%); its responses may not be worth caching",
                    op,
                    s.hit_rate() * 100.0
                ));
            }
        }
        out
    }

    pub fn reset(&self) {
        *self.lock() = Inner::default();
    }
}

impl Default for CachePerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
