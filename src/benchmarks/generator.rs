//! Seeded workload generation for cache benchmarks.
//!
//! Every generator is driven by a [`StdRng`] so two runs with the same seed
//! produce byte-identical workloads, which is what makes before/after
//! comparisons meaningful.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const WORDS: [&str; 16] = [
    "cache", "latency", "summary", "document", "model", "response", "token", "vector",
    "request", "stream", "layer", "memory", "redis", "compress", "policy", "metric",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSize {
    Small,
    Medium,
    Large,
}

impl PayloadSize {
    /// Approximate text length in characters.
    pub fn approx_chars(&self) -> usize {
        match self {
            PayloadSize::Small => 64,
            PayloadSize::Medium => 1_024,
            PayloadSize::Large => 8_192,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkOperation {
    pub key: String,
    pub value: Value,
    pub size: PayloadSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSample {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Get,
    Set,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessOperation {
    pub kind: AccessKind,
    pub key: String,
}

/// A simulated client's sequence of cache operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPattern {
    pub name: String,
    pub operations: Vec<AccessOperation>,
}

impl AccessPattern {
    pub fn count(&self, kind: AccessKind) -> usize {
        self.operations.iter().filter(|op| op.kind == kind).count()
    }
}

pub struct CacheBenchmarkDataGenerator {
    rng: StdRng,
}

impl CacheBenchmarkDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn prose(&mut self, approx_chars: usize) -> String {
        let mut out = String::with_capacity(approx_chars + 16);
        while out.len() < approx_chars {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(WORDS[self.rng.gen_range(0..WORDS.len())]);
        }
        out
    }

    fn random_text(&mut self, chars: usize) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(chars)
            .map(char::from)
            .collect()
    }

    /// Mixed workload: roughly 60% small, 30% medium, 10% large payloads.
    pub fn generate_basic_operations_data(&mut self, count: usize) -> Vec<BenchmarkOperation> {
        (0..count)
            .map(|i| {
                let roll: f64 = self.rng.gen();
                let size = if roll < 0.6 {
                    PayloadSize::Small
                } else if roll < 0.9 {
                    PayloadSize::Medium
                } else {
                    PayloadSize::Large
                };
                let text = self.prose(size.approx_chars());
                let value = json!({
                    "id": i,
                    "text": text,
                    "score": self.rng.gen_range(0..1_000),
                    "tags": [WORDS[i % WORDS.len()], WORDS[(i * 7) % WORDS.len()]],
                });
                BenchmarkOperation {
                    key: format!("bench:basic:{}:{}", i, self.random_text(8)),
                    value,
                    size,
                }
            })
            .collect()
    }

    /// `count` entries of about `entry_bytes` each.
    pub fn generate_memory_pressure_data(
        &mut self,
        count: usize,
        entry_bytes: usize,
    ) -> Vec<(String, Value)> {
        (0..count)
            .map(|i| {
                let payload = self.random_text(entry_bytes);
                (
                    format!("bench:pressure:{}", i),
                    json!({ "index": i, "payload": payload }),
                )
            })
            .collect()
    }

    /// Highly repetitive text, structured JSON and incompressible random text
    /// at several sizes.
    pub fn generate_compression_test_data(&mut self) -> Vec<CompressionSample> {
        let mut samples = Vec::new();
        for chars in [512usize, 4_096, 32_768] {
            samples.push(CompressionSample {
                name: format!("repetitive_{}", chars),
                value: Value::String("the quick brown fox ".repeat(chars / 20)),
            });
            let records: Vec<Value> = (0..chars / 64)
                .map(|i| {
                    json!({
                        "id": i,
                        "label": WORDS[i % WORDS.len()],
                        "value": self.rng.gen_range(0..10_000),
                    })
                })
                .collect();
            samples.push(CompressionSample {
                name: format!("json_{}", chars),
                value: Value::Array(records),
            });
            samples.push(CompressionSample {
                name: format!("random_{}", chars),
                value: Value::String(self.random_text(chars)),
            });
        }
        samples
    }

    /// Simulated clients with skewed key popularity: 80% of operations hit
    /// the hottest 20% of `key_space` keys.
    pub fn generate_concurrent_access_patterns(
        &mut self,
        patterns: usize,
        operations_per_pattern: usize,
        key_space: usize,
    ) -> Vec<AccessPattern> {
        let key_space = key_space.max(1);
        let hot_keys = (key_space / 5).max(1);
        const MIXES: [(&str, f64, f64); 3] = [
            ("read_heavy", 0.9, 0.08),
            ("write_heavy", 0.3, 0.6),
            ("balanced", 0.6, 0.3),
        ];
        (0..patterns)
            .map(|p| {
                let (label, get_share, set_share) = MIXES[p % MIXES.len()];
                let operations = (0..operations_per_pattern)
                    .map(|_| {
                        let key_index = if self.rng.gen_bool(0.8) {
                            self.rng.gen_range(0..hot_keys)
                        } else {
                            self.rng.gen_range(0..key_space)
                        };
                        let roll: f64 = self.rng.gen();
                        let kind = if roll < get_share {
                            AccessKind::Get
                        } else if roll < get_share + set_share {
                            AccessKind::Set
                        } else {
                            AccessKind::Delete
                        };
                        AccessOperation {
                            kind,
                            key: format!("bench:shared:{}", key_index),
                        }
                    })
                    .collect();
                AccessPattern {
                    name: format!("{}_{}", label, p),
                    operations,
                }
            })
            .collect()
    }
}
