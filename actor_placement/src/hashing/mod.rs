//! Consistent hashing rings, one per actor type.
//!
//! The placement state machine does not care how a ring spreads keys over hosts. It only needs
//! the capability described by [`HashRing`]: build an empty ring, add and remove hosts by name,
//! list the hosts, and look up the host for a key. [`ConsistentRing`] is the implementation used
//! in production. Tests can swap in [`FakeRing`](crate::testkit::FakeRing).
//!
//! ### Determinism
//! Every replica applies the same sequence of adds and removes to its rings. Implementations must
//! produce the same host set, and the same key-to-host mapping, for the same sequence and the same
//! [`RingConfig`]. In particular, nothing may depend on a randomly seeded hasher or on iteration
//! order of a hash map.

mod consistent;
mod utils;

#[rustfmt::skip]
pub use {
  consistent::ConsistentRing,
  utils::Host,
  utils::RingConfig,
  utils::HOST_WEIGHT,
};

/// The capability the placement state machine needs from a consistent hashing ring.
///
/// Implementations are infallible. A ring that can fail must escalate the failure as fatal,
/// because applying a command on one replica but not another breaks replica equivalence.
pub trait HashRing {
  /// Builds an empty ring.
  fn new(config: &RingConfig) -> Self
  where
    Self: Sized;

  /// Adds a host. Returns `false` if a host with this name is already in the ring.
  fn add(&mut self, name: &str, id: &str, weight: u64) -> bool;

  /// Removes a host. Returns `false` if there was no host with this name.
  fn remove(&mut self, name: &str) -> bool;

  /// Names of the hosts in the ring, sorted.
  fn hosts(&self) -> Vec<&str>;

  /// The host responsible for `key`, if the ring has any hosts.
  fn get(&self, key: &str) -> Option<&str>;

  fn is_empty(&self) -> bool {
    self.hosts().is_empty()
  }
}
