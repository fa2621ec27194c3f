//! Cache key generation for AI responses.
//!
//! Keys have the shape
//! `{prefix}:op:{operation}|txt:{text}|opts:{digest}` for short texts and
//! `{prefix}:op:{operation}|hash:{sha256}|opts:{digest}` once the text reaches
//! the hash threshold, so key length stays bounded for large documents.
//! Segment values escape `\` and `|`, which keeps the mapping injective.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Coarse input size class used for per-tier metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTier {
    Small,
    Medium,
    Large,
    XLarge,
}

impl TextTier {
    /// Tier boundaries in characters: <500, <5000, <50000, larger.
    pub fn classify(text: &str) -> Self {
        match text.chars().count() {
            n if n < 500 => TextTier::Small,
            n if n < 5_000 => TextTier::Medium,
            n if n < 50_000 => TextTier::Large,
            _ => TextTier::XLarge,
        }
    }
}

pub struct CacheKeyGenerator {
    prefix: String,
    text_hash_threshold: usize,
}

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn escape_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\\' || c == '|' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape Redis glob metacharacters so `s` matches literally.
pub(crate) fn glob_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Serialize with object keys sorted at every depth, independent of how
/// the `Value` was built.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(&map[k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl CacheKeyGenerator {
    pub fn new(prefix: impl Into<String>, text_hash_threshold: usize) -> Self {
        Self {
            prefix: prefix.into(),
            text_hash_threshold,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn text_hash_threshold(&self) -> usize {
        self.text_hash_threshold
    }

    /// Whether `text` will be replaced by its hash in the key.
    pub fn hashes_text(&self, text: &str) -> bool {
        text.chars().count() >= self.text_hash_threshold
    }

    pub fn generate(&self, text: &str, operation: &str, options: &Value) -> String {
        let text_part = if self.hashes_text(text) {
            format!("hash:{}", sha256_hex(text.as_bytes()))
        } else {
            format!("txt:{}", escape_segment(text))
        };
        let opts = match options {
            Value::Null => "none".to_string(),
            Value::Object(m) if m.is_empty() => "none".to_string(),
            other => sha256_hex(canonical_json(other).as_bytes())[..16].to_string(),
        };
        format!(
            "{}:op:{}|{}|opts:{}",
            self.prefix,
            escape_segment(operation),
            text_part,
            opts
        )
    }

    /// Glob matching every key generated for `operation`.
    pub fn operation_pattern(&self, operation: &str) -> String {
        format!(
            "{}:op:{}|*",
            glob_escape(&self.prefix),
            glob_escape(&escape_segment(operation))
        )
    }

    /// Glob matching every key under this generator's prefix.
    pub fn namespace_pattern(&self) -> String {
        format!("{}:*", glob_escape(&self.prefix))
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new("ai_cache", 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_short_text_embedded() {
        let g = CacheKeyGenerator::default();
        let key = g.generate("hello world", "summarize", &json!({"max_length": 100}));
        assert!(key.starts_with("ai_cache:op:summarize|txt:hello world|opts:"));
    }

    #[test]
    fn test_long_text_hashed_with_bounded_length() {
        let g = CacheKeyGenerator::new("ai_cache", 100);
        let short = g.generate(&"a".repeat(99), "summarize", &Value::Null);
        let long = g.generate(&"a".repeat(100), "summarize", &Value::Null);
        let huge = g.generate(&"a".repeat(1_000_000), "summarize", &Value::Null);
        assert!(short.contains("|txt:"));
        assert!(long.contains("|hash:"));
        assert_eq!(long.len(), huge.len());
        assert_ne!(long, huge);
    }

    #[test]
    fn test_option_order_does_not_matter() {
        let g = CacheKeyGenerator::default();
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(g.generate("t", "qa", &a), g.generate("t", "qa", &b));
        assert_eq!(canonical_json(&a), r#"{"a":{"x":3,"y":2},"b":1}"#);
    }

    #[test]
    fn test_separator_injection_does_not_collide() {
        let g = CacheKeyGenerator::default();
        let a = g.generate("x|txt:y", "op", &Value::Null);
        let b = g.generate("x", "op|txt:y", &Value::Null);
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_options_equivalent_to_null() {
        let g = CacheKeyGenerator::default();
        assert_eq!(
            g.generate("t", "qa", &json!({})),
            g.generate("t", "qa", &Value::Null)
        );
        assert_ne!(
            g.generate("t", "qa", &json!({"k": 1})),
            g.generate("t", "qa", &Value::Null)
        );
    }

    #[test]
    fn test_no_collisions_over_sample() {
        let g = CacheKeyGenerator::new("ai_cache", 50);
        let ops = ["summarize", "sentiment", "key_points", "questions", "qa"];
        let mut seen = HashSet::new();
        for i in 0..400 {
            for op in ops {
                let text = format!("document {} {}", i, "lorem ".repeat(i % 20));
                let opts = json!({"max_length": i % 7, "style": format!("s{}", i % 3)});
                assert!(seen.insert(g.generate(&text, op, &opts)));
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_operation_pattern_escapes_glob() {
        let g = CacheKeyGenerator::default();
        assert_eq!(g.operation_pattern("summarize"), "ai_cache:op:summarize|*");
        assert_eq!(g.operation_pattern("a*b"), r"ai_cache:op:a\*b|*");
        assert_eq!(g.namespace_pattern(), "ai_cache:*");
    }

    #[test]
    fn test_text_tiers() {
        assert_eq!(TextTier::classify("short"), TextTier::Small);
        assert_eq!(TextTier::classify(&"a".repeat(500)), TextTier::Medium);
        assert_eq!(TextTier::classify(&"a".repeat(5_000)), TextTier::Large);
        assert_eq!(TextTier::classify(&"a".repeat(50_000)), TextTier::XLarge);
    }
}
