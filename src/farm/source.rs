//! Contracts for the remote data source (the generated RPC layer).
//!
//! The cache layer treats the backend as an opaque asynchronous producer of
//! domain values: any fetch may fail, and a fetch failure propagates to the
//! caller unchanged. Production implementations live with the RPC client;
//! tests use in-crate mocks.

use color_eyre::Result;

use super::types::{
  FarmFile, FarmFileFilters, NewObservation, Observation, ObservationFilters,
};

/// Remote producer of observation data.
pub trait ObservationSource {
  fn plot_observations(
    &self,
    plot_id: &str,
    filters: &ObservationFilters,
  ) -> impl std::future::Future<Output = Result<Vec<Observation>>> + Send;

  fn agent_observations(
    &self,
    agent_id: &str,
    filters: &ObservationFilters,
  ) -> impl std::future::Future<Output = Result<Vec<Observation>>> + Send;

  fn create_observation(
    &self,
    observation: &NewObservation,
  ) -> impl std::future::Future<Output = Result<Observation>> + Send;

  fn update_observation(
    &self,
    observation: &Observation,
  ) -> impl std::future::Future<Output = Result<Observation>> + Send;

  fn delete_observation(
    &self,
    observation_id: &str,
  ) -> impl std::future::Future<Output = Result<()>> + Send;

  /// Overwrite the severity of a single observation (used when resolving
  /// the alert derived from it).
  fn set_observation_severity(
    &self,
    observation_id: &str,
    severity: u8,
  ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Remote producer of farm file data.
pub trait FarmFileSource {
  fn producer_farm_file(
    &self,
    producer_id: &str,
    filters: &FarmFileFilters,
  ) -> impl std::future::Future<Output = Result<FarmFile>> + Send;

  fn agent_farm_files(
    &self,
    agent_id: &str,
    filters: &FarmFileFilters,
  ) -> impl std::future::Future<Output = Result<Vec<FarmFile>>> + Send;

  fn update_farm_file(
    &self,
    farm_file: &FarmFile,
  ) -> impl std::future::Future<Output = Result<FarmFile>> + Send;
}
