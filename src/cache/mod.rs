//! Generic caching layer for the AgriConnect client.
//!
//! This module is domain-agnostic: it stores typed entries under string
//! keys with TTL expiration, and removes them by exact key or by
//! trailing-wildcard prefix pattern. The per-domain key schemes and
//! invalidation cascades live in the facades under [`crate::farm`].

mod clock;
mod keys;
mod store;

pub use clock::{Clock, SystemClock};
pub use keys::{canonical_filters, plain_key, scoped_key, Invalidation};
pub use store::CacheStore;

#[cfg(test)]
pub use clock::ManualClock;
