use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity at or above which an observation surfaces as an alert.
pub const ALERT_SEVERITY_THRESHOLD: u8 = 4;

/// Severity an observation is downgraded to when its alert is resolved.
pub const RESOLVED_SEVERITY: u8 = 1;

/// A field observation recorded on a plot by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub id: String,
  pub plot_id: String,
  pub agent_id: String,
  pub crop: Option<String>,
  pub pest: Option<String>,
  /// 1 (benign) to 5 (critical).
  pub severity: u8,
  pub notes: Option<String>,
  pub observed_at: DateTime<Utc>,
}

/// Payload for creating an observation; the backend assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObservation {
  pub plot_id: String,
  pub agent_id: String,
  pub crop: Option<String>,
  pub pest: Option<String>,
  pub severity: u8,
  pub notes: Option<String>,
  pub observed_at: DateTime<Utc>,
}

/// An alert shown to an agent: a high-severity observation relabelled for
/// the alerting views. Alerts have no storage of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
  /// Id of the underlying observation.
  pub id: String,
  pub plot_id: String,
  pub agent_id: String,
  pub pest: Option<String>,
  pub severity: u8,
  pub raised_at: DateTime<Utc>,
}

impl Alert {
  /// Relabel a high-severity observation as an alert.
  pub fn from_observation(obs: &Observation) -> Self {
    Self {
      id: obs.id.clone(),
      plot_id: obs.plot_id.clone(),
      agent_id: obs.agent_id.clone(),
      pest: obs.pest.clone(),
      severity: obs.severity,
      raised_at: obs.observed_at,
    }
  }
}

/// A producer's farm dossier: identity, plots and current crops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmFile {
  pub producer_id: String,
  pub producer_name: String,
  pub agent_id: String,
  pub plot_count: u32,
  pub crops: Vec<String>,
  pub updated_at: DateTime<Utc>,
}

/// Filters for observation list queries.
///
/// Unset fields are omitted from the canonical key, so the empty filter
/// serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub crop: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pest: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_severity: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub from: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to: Option<DateTime<Utc>>,
}

/// Filters for alert list queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pest: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub plot_id: Option<String>,
}

/// Filters for farm file queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmFileFilters {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub season: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub crop: Option<String>,
}

/// Per-agent observation statistics, derived from the agent's observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationStats {
  pub total: u64,
  pub plots_observed: u64,
  pub by_severity: BTreeMap<u8, u64>,
}

impl ObservationStats {
  pub fn from_observations(observations: &[Observation]) -> Self {
    let mut by_severity = BTreeMap::new();
    let mut plots = std::collections::BTreeSet::new();
    for obs in observations {
      *by_severity.entry(obs.severity).or_insert(0) += 1;
      plots.insert(obs.plot_id.as_str());
    }
    Self {
      total: observations.len() as u64,
      plots_observed: plots.len() as u64,
      by_severity,
    }
  }
}

/// Per-agent alert statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertStats {
  pub total: u64,
  pub by_severity: BTreeMap<u8, u64>,
}

impl AlertStats {
  pub fn from_alerts(alerts: &[Alert]) -> Self {
    let mut by_severity = BTreeMap::new();
    for alert in alerts {
      *by_severity.entry(alert.severity).or_insert(0) += 1;
    }
    Self {
      total: alerts.len() as u64,
      by_severity,
    }
  }
}
