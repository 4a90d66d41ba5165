//! Canonicalization and checksumming of a `ConfigDocument` (spec §4.4, §9).
//!
//! Canonicalization recursively sorts object keys so that two configs differing only
//! in key order hash identically; arrays keep their order since it is meaningful
//! (e.g. `Providers`, `models`).

use crate::config::types::ConfigDocument;
use sha2::{Digest, Sha256};

/// Recursively sort the keys of every JSON object in `value`, leaving arrays and
/// scalars untouched.
pub fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 over the canonicalized JSON serialization of `config`.
pub fn checksum(config: &ConfigDocument) -> String {
    let json = serde_json::to_value(config).expect("ConfigDocument always serializes");
    let canonical = canonicalize(&json);
    let bytes = serde_json::to_vec(&canonical).expect("canonicalized value always serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Whether two configs are equivalent under canonicalization.
pub fn configs_are_equal(a: &ConfigDocument, b: &ConfigDocument) -> bool {
    checksum(a) == checksum(b)
}
