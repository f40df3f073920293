//! Client-side read-through cache layer for the AgriConnect farm client.
//!
//! The client's business data (producers, plots, observations, alerts)
//! lives in a remote backend reached through generated RPC calls; this
//! crate keeps the hot read paths off the network. It is built in three
//! layers:
//!
//! - [`cache::CacheStore`] — the generic engine: typed entries under string
//!   keys, TTL expiration, invalidation by exact key or trailing-wildcard
//!   prefix pattern.
//! - the facades in [`farm`] — one per domain, composing canonical
//!   `domain:scope:id:filters` keys and owning the cross-domain
//!   invalidation cascades (alerts are derived from observation severity,
//!   so resolving an alert clears both prefixes).
//! - the services in [`farm`] — read-through orchestration: cache hit, or
//!   fetch from the remote source, write back, return. Mutations hit the
//!   source first and only invalidate on success.
//!
//! The store is a single-process, in-memory cache with no durability
//! contract; a fetch failure always propagates to the caller rather than
//! being papered over with stale data.

pub mod cache;
pub mod config;
pub mod farm;

pub use cache::{CacheStore, Invalidation};
pub use config::CacheConfig;
pub use farm::{FarmCaches, FetchOptions};
