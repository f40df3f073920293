//! Observation cache facade and read-through service.
//!
//! Observations are the fastest-changing domain (field data entered during
//! visits), so the facade defaults to a short TTL. Alerts are derived from
//! observation severity, which makes this the source side of the alert
//! cascade: any observation mutation also invalidates the whole `alerts:`
//! prefix.

use std::sync::Arc;

use chrono::Duration;
use color_eyre::Result;
use tracing::debug;

use crate::cache::{plain_key, scoped_key, CacheStore, Invalidation};

use super::source::ObservationSource;
use super::types::{NewObservation, Observation, ObservationFilters, ObservationStats};
use super::FetchOptions;

pub const DOMAIN: &str = "observations";

const DEFAULT_TTL_SECS: i64 = 120;

/// Typed cache facade for observation data.
#[derive(Clone)]
pub struct ObservationCache {
  store: Arc<CacheStore>,
  ttl: Duration,
}

impl ObservationCache {
  pub fn new(store: Arc<CacheStore>) -> Self {
    Self::with_ttl(store, Duration::seconds(DEFAULT_TTL_SECS))
  }

  pub fn with_ttl(store: Arc<CacheStore>, ttl: Duration) -> Self {
    Self { store, ttl }
  }

  fn plot_key(plot_id: &str, filters: &ObservationFilters) -> String {
    scoped_key(DOMAIN, "plot", plot_id, filters)
  }

  fn agent_key(agent_id: &str, filters: &ObservationFilters) -> String {
    scoped_key(DOMAIN, "agent", agent_id, filters)
  }

  fn stats_key(agent_id: &str) -> String {
    plain_key(DOMAIN, "stats", agent_id)
  }

  pub fn plot_observations(
    &self,
    plot_id: &str,
    filters: &ObservationFilters,
  ) -> Option<Vec<Observation>> {
    self.store.get(&Self::plot_key(plot_id, filters))
  }

  pub fn set_plot_observations(
    &self,
    plot_id: &str,
    observations: &[Observation],
    filters: &ObservationFilters,
    ttl: Option<Duration>,
  ) {
    self.store.set(
      &Self::plot_key(plot_id, filters),
      &observations,
      Some(ttl.unwrap_or(self.ttl)),
    );
  }

  pub fn agent_observations(
    &self,
    agent_id: &str,
    filters: &ObservationFilters,
  ) -> Option<Vec<Observation>> {
    self.store.get(&Self::agent_key(agent_id, filters))
  }

  pub fn set_agent_observations(
    &self,
    agent_id: &str,
    observations: &[Observation],
    filters: &ObservationFilters,
    ttl: Option<Duration>,
  ) {
    self.store.set(
      &Self::agent_key(agent_id, filters),
      &observations,
      Some(ttl.unwrap_or(self.ttl)),
    );
  }

  pub fn stats(&self, agent_id: &str) -> Option<ObservationStats> {
    self.store.get(&Self::stats_key(agent_id))
  }

  pub fn set_stats(&self, agent_id: &str, stats: &ObservationStats, ttl: Option<Duration>) {
    self
      .store
      .set(&Self::stats_key(agent_id), stats, Some(ttl.unwrap_or(self.ttl)));
  }

  /// Invalidate everything an observation mutation on `plot_id` can have
  /// made stale: the plot's own lists, every agent aggregate and stats key,
  /// and the derived alerts domain. Alerts are cleared here explicitly;
  /// this facade never assumes the alert side will do it.
  pub fn invalidate_plot(&self, plot_id: &str) {
    debug!(plot_id, "invalidating observation caches for plot");
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:plot:{plot_id}")));
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:agent:")));
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:stats:")));
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{}:", super::alerts::DOMAIN)));
  }

  /// Invalidate every key under the observations prefix.
  pub fn invalidate_all(&self) {
    self.store.invalidate(&Invalidation::prefix(format!("{DOMAIN}:")));
  }
}

/// Read-through service over [`ObservationCache`] and a remote source.
pub struct ObservationService<S> {
  source: S,
  cache: ObservationCache,
}

impl<S: ObservationSource> ObservationService<S> {
  pub fn new(source: S, cache: ObservationCache) -> Self {
    Self { source, cache }
  }

  /// Observations for one plot, cache-first.
  pub async fn plot_observations(
    &self,
    plot_id: &str,
    filters: &ObservationFilters,
    options: FetchOptions,
  ) -> Result<Vec<Observation>> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.plot_observations(plot_id, filters) {
        return Ok(cached);
      }
    }

    let fresh = self.source.plot_observations(plot_id, filters).await?;
    if options.use_cache {
      self
        .cache
        .set_plot_observations(plot_id, &fresh, filters, None);
    }
    Ok(fresh)
  }

  /// All observations recorded by one agent, cache-first.
  pub async fn agent_observations(
    &self,
    agent_id: &str,
    filters: &ObservationFilters,
    options: FetchOptions,
  ) -> Result<Vec<Observation>> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.agent_observations(agent_id, filters) {
        return Ok(cached);
      }
    }

    let fresh = self.source.agent_observations(agent_id, filters).await?;
    if options.use_cache {
      self
        .cache
        .set_agent_observations(agent_id, &fresh, filters, None);
    }
    Ok(fresh)
  }

  /// Per-agent observation statistics, derived from an unfiltered agent
  /// fetch and cached under the stats key.
  pub async fn observation_stats(
    &self,
    agent_id: &str,
    options: FetchOptions,
  ) -> Result<ObservationStats> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.stats(agent_id) {
        return Ok(cached);
      }
    }

    let observations = self
      .source
      .agent_observations(agent_id, &ObservationFilters::default())
      .await?;
    let stats = ObservationStats::from_observations(&observations);
    if options.use_cache {
      self.cache.set_stats(agent_id, &stats, None);
    }
    Ok(stats)
  }

  /// Create an observation; invalidates only after the remote call succeeds.
  pub async fn create_observation(&self, observation: &NewObservation) -> Result<Observation> {
    let created = self.source.create_observation(observation).await?;
    self.cache.invalidate_plot(&created.plot_id);
    Ok(created)
  }

  /// Update an observation; invalidates only after the remote call succeeds.
  pub async fn update_observation(&self, observation: &Observation) -> Result<Observation> {
    let updated = self.source.update_observation(observation).await?;
    self.cache.invalidate_plot(&updated.plot_id);
    Ok(updated)
  }

  /// Delete an observation; invalidates only after the remote call succeeds.
  pub async fn delete_observation(&self, observation_id: &str, plot_id: &str) -> Result<()> {
    self.source.delete_observation(observation_id).await?;
    self.cache.invalidate_plot(plot_id);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use chrono::Utc;
  use color_eyre::eyre::eyre;

  use super::*;
  use crate::cache::ManualClock;
  use crate::farm::alerts::AlertCache;
  use crate::farm::types::AlertFilters;

  fn observation(id: &str, plot_id: &str, severity: u8) -> Observation {
    Observation {
      id: id.to_string(),
      plot_id: plot_id.to_string(),
      agent_id: "agent-1".to_string(),
      crop: Some("maize".to_string()),
      pest: None,
      severity,
      notes: None,
      observed_at: Utc::now(),
    }
  }

  struct MockSource {
    observations: Mutex<Vec<Observation>>,
    plot_calls: AtomicUsize,
    agent_calls: AtomicUsize,
    fail_mutations: bool,
  }

  impl MockSource {
    fn with_observations(observations: Vec<Observation>) -> Self {
      Self {
        observations: Mutex::new(observations),
        plot_calls: AtomicUsize::new(0),
        agent_calls: AtomicUsize::new(0),
        fail_mutations: false,
      }
    }

    fn failing_mutations() -> Self {
      Self {
        fail_mutations: true,
        ..Self::with_observations(vec![])
      }
    }

    fn set_observations(&self, observations: Vec<Observation>) {
      *self.observations.lock().unwrap() = observations;
    }
  }

  impl ObservationSource for MockSource {
    async fn plot_observations(
      &self,
      plot_id: &str,
      _filters: &ObservationFilters,
    ) -> Result<Vec<Observation>> {
      self.plot_calls.fetch_add(1, Ordering::SeqCst);
      let observations = self.observations.lock().unwrap();
      Ok(
        observations
          .iter()
          .filter(|o| o.plot_id == plot_id)
          .cloned()
          .collect(),
      )
    }

    async fn agent_observations(
      &self,
      agent_id: &str,
      _filters: &ObservationFilters,
    ) -> Result<Vec<Observation>> {
      self.agent_calls.fetch_add(1, Ordering::SeqCst);
      let observations = self.observations.lock().unwrap();
      Ok(
        observations
          .iter()
          .filter(|o| o.agent_id == agent_id)
          .cloned()
          .collect(),
      )
    }

    async fn create_observation(&self, observation: &NewObservation) -> Result<Observation> {
      if self.fail_mutations {
        return Err(eyre!("rpc rejected"));
      }
      Ok(Observation {
        id: "obs-new".to_string(),
        plot_id: observation.plot_id.clone(),
        agent_id: observation.agent_id.clone(),
        crop: observation.crop.clone(),
        pest: observation.pest.clone(),
        severity: observation.severity,
        notes: observation.notes.clone(),
        observed_at: observation.observed_at,
      })
    }

    async fn update_observation(&self, observation: &Observation) -> Result<Observation> {
      if self.fail_mutations {
        return Err(eyre!("rpc rejected"));
      }
      Ok(observation.clone())
    }

    async fn delete_observation(&self, _observation_id: &str) -> Result<()> {
      if self.fail_mutations {
        return Err(eyre!("rpc rejected"));
      }
      Ok(())
    }

    async fn set_observation_severity(&self, _observation_id: &str, _severity: u8) -> Result<()> {
      if self.fail_mutations {
        return Err(eyre!("rpc rejected"));
      }
      Ok(())
    }
  }

  fn service_with(source: MockSource) -> (ObservationService<MockSource>, Arc<CacheStore>) {
    let store = Arc::new(CacheStore::new(Duration::minutes(5)));
    let service = ObservationService::new(source, ObservationCache::new(store.clone()));
    (service, store)
  }

  #[tokio::test]
  async fn test_second_fetch_is_served_from_cache() {
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let (service, _store) = service_with(source);
    let filters = ObservationFilters::default();

    let first = service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    let second = service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(service.source.plot_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refresh_forces_a_second_source_call() {
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let (service, _store) = service_with(source);
    let filters = ObservationFilters::default();

    service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    service
      .plot_observations("p1", &filters, FetchOptions::refresh())
      .await
      .unwrap();

    assert_eq!(service.source.plot_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_no_cache_never_populates_the_store() {
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let (service, store) = service_with(source);
    let filters = ObservationFilters::default();

    service
      .plot_observations("p1", &filters, FetchOptions::no_cache())
      .await
      .unwrap();

    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn test_distinct_filters_are_cached_independently() {
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let (service, _store) = service_with(source);

    let all = ObservationFilters::default();
    let maize = ObservationFilters {
      crop: Some("maize".to_string()),
      ..Default::default()
    };

    service
      .plot_observations("p1", &all, FetchOptions::default())
      .await
      .unwrap();
    service
      .plot_observations("p1", &maize, FetchOptions::default())
      .await
      .unwrap();

    assert_eq!(service.source.plot_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_expired_entry_repopulates_with_fresh_data() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(CacheStore::with_clock(Duration::minutes(5), clock.clone()));
    let cache = ObservationCache::with_ttl(store.clone(), Duration::milliseconds(2000));
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let service = ObservationService::new(source, cache.clone());
    let filters = ObservationFilters::default();

    let first = service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    assert_eq!(first.len(), 1);

    clock.advance(Duration::milliseconds(2001));
    assert!(cache.plot_observations("p1", &filters).is_none());

    // Source now has more data; the next fetch repopulates the cache.
    service.source.set_observations(vec![
      observation("obs-a", "p1", 2),
      observation("obs-b", "p1", 3),
    ]);
    let refetched = service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    assert_eq!(refetched.len(), 2);
    assert_eq!(cache.plot_observations("p1", &filters), Some(refetched));
  }

  #[tokio::test]
  async fn test_stats_are_derived_and_cached() {
    let source = MockSource::with_observations(vec![
      observation("obs-a", "p1", 2),
      observation("obs-b", "p2", 4),
      observation("obs-c", "p2", 4),
    ]);
    let (service, _store) = service_with(source);

    let stats = service
      .observation_stats("agent-1", FetchOptions::default())
      .await
      .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.plots_observed, 2);
    assert_eq!(stats.by_severity.get(&4), Some(&2));

    service
      .observation_stats("agent-1", FetchOptions::default())
      .await
      .unwrap();
    assert_eq!(service.source.agent_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_create_invalidates_plot_agent_stats_and_alerts() {
    let source = MockSource::with_observations(vec![observation("obs-a", "p1", 2)]);
    let (service, store) = service_with(source);
    let filters = ObservationFilters::default();
    let alert_cache = AlertCache::new(store.clone());

    // Warm every key the mutation must clear.
    service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    service
      .agent_observations("agent-1", &filters, FetchOptions::default())
      .await
      .unwrap();
    service
      .observation_stats("agent-1", FetchOptions::default())
      .await
      .unwrap();
    alert_cache.set_agent_alerts("agent-1", &[], &AlertFilters::default(), None);

    service
      .create_observation(&NewObservation {
        plot_id: "p1".to_string(),
        agent_id: "agent-1".to_string(),
        crop: None,
        pest: Some("aphid".to_string()),
        severity: 5,
        notes: None,
        observed_at: Utc::now(),
      })
      .await
      .unwrap();

    assert!(service.cache.plot_observations("p1", &filters).is_none());
    assert!(service.cache.agent_observations("agent-1", &filters).is_none());
    assert!(service.cache.stats("agent-1").is_none());
    assert!(alert_cache
      .agent_alerts("agent-1", &AlertFilters::default())
      .is_none());
  }

  #[tokio::test]
  async fn test_delete_leaves_other_plots_cached() {
    let source = MockSource::with_observations(vec![
      observation("obs-a", "p1", 2),
      observation("obs-b", "p2", 3),
    ]);
    let (service, _store) = service_with(source);
    let filters = ObservationFilters::default();

    service
      .plot_observations("p1", &filters, FetchOptions::default())
      .await
      .unwrap();
    service
      .plot_observations("p2", &filters, FetchOptions::default())
      .await
      .unwrap();

    service.delete_observation("obs-a", "p1").await.unwrap();

    assert!(service.cache.plot_observations("p1", &filters).is_none());
    assert!(service.cache.plot_observations("p2", &filters).is_some());
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let source = MockSource::failing_mutations();
    let (service, _store) = service_with(source);
    let filters = ObservationFilters::default();

    let cached = vec![observation("obs-a", "p1", 2)];
    service
      .cache
      .set_plot_observations("p1", &cached, &filters, None);

    let result = service
      .update_observation(&observation("obs-a", "p1", 3))
      .await;
    assert!(result.is_err());
    assert_eq!(service.cache.plot_observations("p1", &filters), Some(cached));
  }
}
