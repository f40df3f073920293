//! Canonical cache key composition and invalidation patterns.
//!
//! Keys follow the `<domain>:<subscope>:<scopeId>:<canonicalFilters>` scheme.
//! Filter objects are serialized with recursively sorted keys, so two
//! logically identical filters always map to the same cache key regardless
//! of field order.

use serde::Serialize;
use serde_json::Value;

/// Build a scoped cache key for an entity plus its filter parameters.
///
/// The filter segment is the canonical JSON form of `filters`; a filter with
/// no set fields serializes as `{}`.
pub fn scoped_key<F: Serialize>(domain: &str, subscope: &str, scope_id: &str, filters: &F) -> String {
  format!(
    "{}:{}:{}:{}",
    domain,
    subscope,
    scope_id,
    canonical_filters(filters)
  )
}

/// Build a key with no filter segment (e.g. per-agent statistics).
pub fn plain_key(domain: &str, subscope: &str, scope_id: &str) -> String {
  format!("{}:{}:{}", domain, subscope, scope_id)
}

/// Canonical JSON serialization of a filter object.
///
/// Object keys are emitted in sorted order at every nesting level. A value
/// that cannot be represented as JSON falls back to `{}` (filters are plain
/// data carriers, so this does not happen in practice).
pub fn canonical_filters<F: Serialize>(filters: &F) -> String {
  match serde_json::to_value(filters) {
    Ok(value) => canonical_json(&value),
    Err(_) => "{}".to_string(),
  }
}

fn canonical_json(value: &Value) -> String {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      let fields: Vec<String> = keys
        .into_iter()
        .map(|k| {
          format!(
            "{}:{}",
            serde_json::to_string(k).unwrap_or_default(),
            canonical_json(&map[k])
          )
        })
        .collect();
      format!("{{{}}}", fields.join(","))
    }
    Value::Array(items) => {
      let items: Vec<String> = items.iter().map(canonical_json).collect();
      format!("[{}]", items.join(","))
    }
    other => serde_json::to_string(other).unwrap_or_default(),
  }
}

/// Target of a cache invalidation: a single entry or a prefix of the key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
  /// Remove the entry stored under exactly this key.
  Key(String),
  /// Remove every entry whose key matches. A single trailing `*` means
  /// "starts with the preceding prefix"; a pattern without `*` behaves as an
  /// exact key. No other glob forms are supported.
  Pattern(String),
}

impl Invalidation {
  pub fn key(key: impl Into<String>) -> Self {
    Self::Key(key.into())
  }

  /// Pattern matching every key that starts with `prefix`.
  pub fn prefix(prefix: impl Into<String>) -> Self {
    Self::Pattern(format!("{}*", prefix.into()))
  }

  /// Whether a stored key is covered by this invalidation.
  pub(crate) fn matches(&self, key: &str) -> bool {
    match self {
      Self::Key(k) => key == k,
      Self::Pattern(p) => match p.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == p,
      },
    }
  }
}
