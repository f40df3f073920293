//! Alert cache facade and read-through service.
//!
//! Alerts have no storage of their own: they are the agent's high-severity
//! observations, relabelled for the alerting views. That makes this the
//! derived side of the cascade rule: any alert mutation invalidates the
//! `alerts:` prefix *and* the `observations:` prefix it derives from,
//! explicitly and unconditionally.

use std::sync::Arc;

use chrono::Duration;
use color_eyre::Result;
use tracing::debug;

use crate::cache::{plain_key, scoped_key, CacheStore, Invalidation};

use super::source::ObservationSource;
use super::types::{
  Alert, AlertFilters, AlertStats, ObservationFilters, ALERT_SEVERITY_THRESHOLD,
  RESOLVED_SEVERITY,
};
use super::FetchOptions;

pub const DOMAIN: &str = "alerts";

const DEFAULT_TTL_SECS: i64 = 300;

/// Typed cache facade for alert data.
#[derive(Clone)]
pub struct AlertCache {
  store: Arc<CacheStore>,
  ttl: Duration,
}

impl AlertCache {
  pub fn new(store: Arc<CacheStore>) -> Self {
    Self::with_ttl(store, Duration::seconds(DEFAULT_TTL_SECS))
  }

  pub fn with_ttl(store: Arc<CacheStore>, ttl: Duration) -> Self {
    Self { store, ttl }
  }

  fn agent_key(agent_id: &str, filters: &AlertFilters) -> String {
    scoped_key(DOMAIN, "agent", agent_id, filters)
  }

  fn stats_key(agent_id: &str) -> String {
    plain_key(DOMAIN, "stats", agent_id)
  }

  pub fn agent_alerts(&self, agent_id: &str, filters: &AlertFilters) -> Option<Vec<Alert>> {
    self.store.get(&Self::agent_key(agent_id, filters))
  }

  pub fn set_agent_alerts(
    &self,
    agent_id: &str,
    alerts: &[Alert],
    filters: &AlertFilters,
    ttl: Option<Duration>,
  ) {
    self.store.set(
      &Self::agent_key(agent_id, filters),
      &alerts,
      Some(ttl.unwrap_or(self.ttl)),
    );
  }

  pub fn stats(&self, agent_id: &str) -> Option<AlertStats> {
    self.store.get(&Self::stats_key(agent_id))
  }

  pub fn set_stats(&self, agent_id: &str, stats: &AlertStats, ttl: Option<Duration>) {
    self
      .store
      .set(&Self::stats_key(agent_id), stats, Some(ttl.unwrap_or(self.ttl)));
  }

  /// Invalidate one agent's alert lists and every alert stats key.
  pub fn invalidate_agent(&self, agent_id: &str) {
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:agent:{agent_id}")));
    self
      .store
      .invalidate(&Invalidation::prefix(format!("{DOMAIN}:stats:")));
  }

  /// Invalidate every key under the alerts prefix.
  pub fn invalidate_all(&self) {
    self.store.invalidate(&Invalidation::prefix(format!("{DOMAIN}:")));
  }

  /// Invalidate both the alerts domain and the observations domain it is
  /// derived from. Full-domain rather than per-id: a severity change can
  /// affect any observation list or stats key, so the safe scope is the
  /// whole source prefix.
  pub fn invalidate_cascade(&self) {
    debug!("cascading alert invalidation into observations");
    self.invalidate_all();
    self
      .store
      .invalidate(&Invalidation::prefix(format!(
        "{}:",
        super::observations::DOMAIN
      )));
  }
}

/// Read-through service over [`AlertCache`].
///
/// Reads pull high-severity observations from the same remote source the
/// observations domain uses and relabel them as alerts.
pub struct AlertService<S> {
  source: S,
  cache: AlertCache,
}

impl<S: ObservationSource> AlertService<S> {
  pub fn new(source: S, cache: AlertCache) -> Self {
    Self { source, cache }
  }

  /// Active alerts for one agent, cache-first.
  pub async fn agent_alerts(
    &self,
    agent_id: &str,
    filters: &AlertFilters,
    options: FetchOptions,
  ) -> Result<Vec<Alert>> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.agent_alerts(agent_id, filters) {
        return Ok(cached);
      }
    }

    let fresh = self.fetch_alerts(agent_id, filters).await?;
    if options.use_cache {
      self.cache.set_agent_alerts(agent_id, &fresh, filters, None);
    }
    Ok(fresh)
  }

  /// Per-agent alert statistics, cached under the stats key.
  pub async fn alert_stats(&self, agent_id: &str, options: FetchOptions) -> Result<AlertStats> {
    if options.use_cache && !options.refresh_cache {
      if let Some(cached) = self.cache.stats(agent_id) {
        return Ok(cached);
      }
    }

    let alerts = self.fetch_alerts(agent_id, &AlertFilters::default()).await?;
    let stats = AlertStats::from_alerts(&alerts);
    if options.use_cache {
      self.cache.set_stats(agent_id, &stats, None);
    }
    Ok(stats)
  }

  /// Resolve an alert by downgrading the underlying observation's severity.
  ///
  /// The remote call comes first; the cascade only runs on success, so a
  /// rejected resolution leaves both domains' caches intact.
  pub async fn resolve_alert(&self, alert: &Alert) -> Result<()> {
    self
      .source
      .set_observation_severity(&alert.id, RESOLVED_SEVERITY)
      .await?;
    self.cache.invalidate_cascade();
    Ok(())
  }

  async fn fetch_alerts(&self, agent_id: &str, filters: &AlertFilters) -> Result<Vec<Alert>> {
    let observation_filters = ObservationFilters {
      pest: filters.pest.clone(),
      min_severity: Some(ALERT_SEVERITY_THRESHOLD),
      ..Default::default()
    };

    let observations = self
      .source
      .agent_observations(agent_id, &observation_filters)
      .await?;

    Ok(
      observations
        .iter()
        .filter(|o| o.severity >= ALERT_SEVERITY_THRESHOLD)
        .filter(|o| {
          filters
            .plot_id
            .as_ref()
            .is_none_or(|plot_id| &o.plot_id == plot_id)
        })
        .map(Alert::from_observation)
        .collect(),
    )
  }
}
