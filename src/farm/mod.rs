//! Domain cache facades and read-through services.
//!
//! One facade per business entity (observations, alerts, farm files), each
//! composing canonical keys under its own prefix and sharing a single
//! [`CacheStore`]. The services implement the read-through protocol: check
//! the cache, fall through to the remote source on a miss, write the result
//! back, and invalidate after successful mutations.

pub mod alerts;
pub mod farm_files;
pub mod observations;
pub mod source;
pub mod types;

use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::CacheConfig;

pub use alerts::{AlertCache, AlertService};
pub use farm_files::{FarmFileCache, FarmFileService};
pub use observations::{ObservationCache, ObservationService};

/// Caching behavior of a single service fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
  /// Read from and write to the cache (default).
  pub use_cache: bool,
  /// Skip the cache read and refetch; the result still populates the cache
  /// when `use_cache` is set.
  pub refresh_cache: bool,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self {
      use_cache: true,
      refresh_cache: false,
    }
  }
}

impl FetchOptions {
  /// Force a source fetch and overwrite the cached value.
  pub fn refresh() -> Self {
    Self {
      refresh_cache: true,
      ..Self::default()
    }
  }

  /// Bypass the cache entirely: no read, no write.
  pub fn no_cache() -> Self {
    Self {
      use_cache: false,
      refresh_cache: false,
    }
  }
}

/// The domain facades of the client, all backed by one store.
///
/// Constructed once at app start and handed to the services; nothing in the
/// crate holds a global store.
#[derive(Clone)]
pub struct FarmCaches {
  pub observations: ObservationCache,
  pub alerts: AlertCache,
  pub farm_files: FarmFileCache,
}

impl FarmCaches {
  /// Create the shared store and the facades from config-driven TTLs.
  pub fn init(config: &CacheConfig) -> (Arc<CacheStore>, Self) {
    let store = Arc::new(CacheStore::new(config.store_ttl()));
    let caches = Self::with_store(store.clone(), config);
    (store, caches)
  }

  /// Build facades over an existing store (tests inject a manual-clock store
  /// this way).
  pub fn with_store(store: Arc<CacheStore>, config: &CacheConfig) -> Self {
    Self {
      observations: ObservationCache::with_ttl(store.clone(), config.observations_ttl()),
      alerts: AlertCache::with_ttl(store.clone(), config.alerts_ttl()),
      farm_files: FarmFileCache::with_ttl(store, config.farm_files_ttl()),
    }
  }
}
