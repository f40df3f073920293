//! Generic TTL cache store backing the domain facades.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::keys::Invalidation;

/// A stored payload with its absolute expiry instant.
#[derive(Debug, Clone)]
struct CacheEntry {
  value: Value,
  expires_at: DateTime<Utc>,
}

/// In-memory, type-erased store of TTL-bound entries under string keys.
///
/// Payloads are held as JSON values; the typed `get`/`set` wrappers do the
/// serde conversion so facades keep compile-time typing. Every operation is
/// total over the key space: a miss, an expired entry, or an invalidation
/// with no matching keys is never an error.
///
/// One store instance is created at app start and shared (via `Arc`) by all
/// domain facades; there is no global.
pub struct CacheStore {
  entries: Mutex<HashMap<String, CacheEntry>>,
  default_ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl CacheStore {
  /// Create a store with the given default TTL, on wall-clock time.
  pub fn new(default_ttl: Duration) -> Self {
    Self::with_clock(default_ttl, Arc::new(SystemClock))
  }

  /// Create a store with an injected time source.
  pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      default_ttl,
      clock,
    }
  }

  /// Get the value stored under `key`, if present and not expired.
  ///
  /// An expired entry found during lookup is deleted. A payload that no
  /// longer decodes as `T` is treated as a miss and dropped.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let mut entries = self.lock_entries();

    let entry = match entries.get(key) {
      Some(entry) => entry,
      None => {
        trace!(key, "cache miss");
        return None;
      }
    };

    if self.clock.now() >= entry.expires_at {
      entries.remove(key);
      debug!(key, "cache entry expired");
      return None;
    }

    match serde_json::from_value(entry.value.clone()) {
      Ok(value) => {
        trace!(key, "cache hit");
        Some(value)
      }
      Err(_) => {
        // A key collision across payload types; drop it so the caller
        // falls through to a fresh fetch.
        entries.remove(key);
        warn!(key, "cached payload did not decode, dropping entry");
        None
      }
    }
  }

  /// Store `value` under `key`, overwriting any existing entry.
  ///
  /// The entry expires `ttl` after now; the store default applies when `ttl`
  /// is `None`. A payload that cannot be represented as JSON is skipped
  /// (the next read is simply a miss).
  pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
    let value = match serde_json::to_value(value) {
      Ok(value) => value,
      Err(e) => {
        warn!(key, error = %e, "payload not JSON-serializable, skipping cache write");
        return;
      }
    };

    let expires_at = self.clock.now() + ttl.unwrap_or(self.default_ttl);
    trace!(key, %expires_at, "cache set");

    self
      .lock_entries()
      .insert(key.to_string(), CacheEntry { value, expires_at });
  }

  /// Remove the entries covered by `target`.
  ///
  /// Exact keys remove at most one entry; prefix patterns remove every key
  /// that starts with the prefix. Silently a no-op when nothing matches.
  pub fn invalidate(&self, target: &Invalidation) {
    let mut entries = self.lock_entries();

    match target {
      Invalidation::Key(key) => {
        if entries.remove(key).is_some() {
          debug!(key = key.as_str(), "cache entry invalidated");
        }
      }
      Invalidation::Pattern(pattern) => {
        let before = entries.len();
        entries.retain(|key, _| !target.matches(key));
        let removed = before - entries.len();
        if removed > 0 {
          debug!(pattern = pattern.as_str(), removed, "cache entries invalidated");
        }
      }
    }
  }

  /// Number of entries currently stored, expired or not.
  pub fn len(&self) -> usize {
    self.lock_entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock_entries().is_empty()
  }

  fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
    // A panic elsewhere cannot leave the map half-mutated (every write is a
    // single insert/remove), so recover from poisoning instead of failing.
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
