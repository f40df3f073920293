//! Farm file cache facade and read-through service.
//!
//! Farm files (producer dossiers) change rarely, so they carry the longest
//! default TTL. The domain is self-contained: no other domain derives from
//! it and it derives from none, so there is no cross-domain cascade.

use std::sync::Arc;

use chrono::Duration;
use color_eyre::Result;
use tracing::debug;

use crate::cache::{scoped_key, CacheStore, Invalidation};

use super::source::FarmFileSource;
use super::types::{FarmFile, FarmFileFilters};
use super::FetchOptions;

pub const DOMAIN: &str = "farmfiles";

const DEFAULT_TTL_SECS: i64 = 900;

/// Typed cache facade for farm file data.
#[derive(Clone)]
pub struct FarmFileCache {
  store: Arc<CacheStore>,
  ttl: Duration,
}

impl FarmFileCache {
  pub fn new(store: Arc<CacheStore>) -> Self {
    Self::with_ttl(store, Duration::seconds(DEFAULT_TTL_SECS))
  }

  pub fn with_ttl(store: Arc<CacheStore>, ttl: Duration) -> Self {
    Self { store, ttl }
  }

  fn producer_key(producer_id: &str, filters: &FarmFileFilters) -> String {
    scoped_key(DOMAIN, "producer", producer_id, filters)
  }

  fn agent_key(agent_id: &str, filters: &FarmFileFilters) -> String {
    scoped_key(DOMAIN, "agent", agent_id, filters)
  }

  pub fn producer_farm_file(
    &self,
    producer_id: &str,
    filters: &FarmFileFilters,
  ) -> Option<FarmFile> {
    self.store.get(&Self::producer_key(producer_id, filters))
  }

  pub fn set_producer_farm_file(
    &self,
    producer_id: &str,
    farm_file: &FarmFile,
    filters: &FarmFileFilters,
    ttl: Option<Duration>,
  ) {
    self.store.set(
      &Self::producer_key(producer_id, filters),
      farm_file,
      Some(ttl.unwrap_or(self.ttl)),
    );
  }

  pub fn agent_farm_files(
    &self,
    agent_id: &str,
    filters: &FarmFileFilters,
  ) -> Option<Vec<FarmFile>> {
    self.store.get(&Self::agent_key(agent_id, filters))
  }

  pub fn set_agent_farm_files(
    &self,
    agent_id: &str,
    farm_files: &[FarmFile],
    filters: &FarmFileFilters,
    ttl: Option<Duration>,
  ) {
    self.store.set(
      &Self::agent_key(agent_id, filters),
      &farm_files,
      Some(ttl.unwrap_or(self.ttl)),
    );
  }

  /// Invalidate one producer's dossier and every agent aggregate that could
  /// still list its stale version.
  pub fn invalidate_producer(&self, producer_id: &str) {
    debug!(producer_id, "invalidating farm file caches for producer");
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:producer:{producer_id}")));
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:agent:")));
  }

  /// Invalidate every key under the farm files prefix.
  pub fn invalidate_all(&self) {
    self.store.invalidate(&Invalidation::prefix(format!("{DOMAIN}:")));
  }
}

/// Read-through service over [`FarmFileCache`] and a remote source.
pub struct FarmFileService<S> {
  source: S,
  cache: FarmFileCache,
}

impl<S: FarmFileSource> FarmFileService<S> {
  pub fn new(source: S, cache: FarmFileCache) -> Self {
    Self { source, cache }
  }

  /// One producer's farm file, cache-first.
  pub async fn producer_farm_file(
    &self,
    producer_id: &str,
    filters: &FarmFileFilters,
    options: FetchOptions,
  ) -> Result<FarmFile> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.producer_farm_file(producer_id, filters) {
        return Ok(cached);
      }
    }

    let fresh = self.source.producer_farm_file(producer_id, filters).await?;
    if options.use_cache {
      self
        .cache
        .set_producer_farm_file(producer_id, &fresh, filters, None);
    }
    Ok(fresh)
  }

  /// All farm files managed by one agent, cache-first.
  pub async fn agent_farm_files(
    &self,
    agent_id: &str,
    filters: &FarmFileFilters,
    options: FetchOptions,
  ) -> Result<Vec<FarmFile>> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.agent_farm_files(agent_id, filters) {
        return Ok(cached);
      }
    }

    let fresh = self.source.agent_farm_files(agent_id, filters).await?;
    if options.use_cache {
      self
        .cache
        .set_agent_farm_files(agent_id, &fresh, filters, None);
    }
    Ok(fresh)
  }

  /// Update a farm file; invalidates only after the remote call succeeds.
  pub async fn update_farm_file(&self, farm_file: &FarmFile) -> Result<FarmFile> {
    let updated = self.source.update_farm_file(farm_file).await?;
    self.cache.invalidate_producer(&updated.producer_id);
    Ok(updated)
  }
}
