//! Content fingerprints used to skip redundant mutating calls.
//!
//! A fingerprint is the lowercase hex SHA-256 of a canonical byte form. The
//! schema is fingerprinted over its raw bytes; resolver maps over a JSON
//! serialization with recursively sorted object keys. Fingerprint equality is
//! the only signal the reconciler uses to skip a deploy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::resolver::ResolverMap;

/// Hex encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints raw bytes.
    pub fn of_bytes(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprints a schema document.
    pub fn of_schema(schema: &str) -> Self {
        Self::of_bytes(schema.as_bytes())
    }

    /// Fingerprints a merged resolver map in its canonical serialization.
    pub fn of_resolvers(resolvers: &ResolverMap) -> Self {
        // Serializing a ResolverMap cannot fail: keys are strings and every
        // value is a plain struct.
        let value = serde_json::to_value(resolvers).unwrap_or(Value::Null);
        Self::of_value(&value)
    }

    /// Fingerprints an arbitrary JSON value, independent of key order.
    pub fn of_value(value: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(value, &mut canonical);
        Self::of_bytes(canonical.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Decides whether a fingerprint gated step must issue its mutating call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Returns `true` unless `previous` matches `current` exactly.
    pub fn has_changed(previous: Option<&Fingerprint>, current: &Fingerprint) -> bool {
        previous != Some(current)
    }
}
