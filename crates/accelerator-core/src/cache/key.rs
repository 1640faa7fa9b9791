//! Cache key derivation from JSON-RPC `params`.
//!
//! Two `abci_query` requests asking the same question must map to the same key even
//! if their clients ordered the `params` fields differently or pretty-printed the
//! body. The key is therefore a canonical re-encoding of the parsed value: object
//! keys sorted, no insignificant whitespace.

use serde_json::Value;
use std::{fmt, sync::Arc};

/// Opaque cache key. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Derives the canonical key for a `params` value.
    #[must_use]
    pub fn from_params(params: &Value) -> Self {
        let mut out = String::new();
        write_canonical(params, &mut out);
        Self(Arc::from(out))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self(Arc::from(raw))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes `value` with sorted object keys, independent of serde_json's map ordering.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (key, field)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
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
