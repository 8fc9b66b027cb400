//! JSON helpers shared by the composer and the cache layer
//!
//! - [`shallow_merge`]: top-level key overwrite, used for layer patches and
//!   tool configuration
//! - [`canonical_json`]: sorted-key rendering for stable hashing
//! - [`Fingerprint`]: Blake3 digest of canonical JSON

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Overwrite top-level keys of `target` with those of `patch`
///
/// Nested objects are replaced, not merged.
pub fn shallow_merge(target: &mut Map<String, JsonValue>, patch: &Map<String, JsonValue>) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}

/// Generate canonical JSON (sorted keys, no whitespace)
#[must_use]
pub fn canonical_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();

            let mut parts = Vec::with_capacity(keys.len());
            for key in keys {
                if let Some(val) = map.get(key) {
                    parts.push(format!("{}:{}", quote(key), canonical_json(val)));
                }
            }
            format!("{{{}}}", parts.join(","))
        }
        JsonValue::Array(arr) => {
            let parts: Vec<_> = arr.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        JsonValue::String(s) => quote(s),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
    }
}

fn quote(s: &str) -> String {
    // Serializing a str cannot fail
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// Blake3 fingerprint of a JSON document, hex encoded
///
/// Two documents with the same content have the same fingerprint regardless
/// of key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint raw bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Fingerprint the canonical form of a JSON value
    #[inline]
    #[must_use]
    pub fn of_json(value: &JsonValue) -> Self {
        Self::compute(canonical_json(value).as_bytes())
    }

    /// Hex digest
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 16 hex chars), for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
