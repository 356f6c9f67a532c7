use serde::{Deserialize, Serialize};

/// The weight the placement state machine assigns to every host it adds to a ring.
///
/// Weighted virtual nodes are not supported yet, so this is the only value ever passed to
/// [`HashRing::add`](crate::hashing::HashRing::add).
pub const HOST_WEIGHT: u64 = 0;

/// Configures every [`HashRing`](crate::hashing::HashRing) built by the placement state machine.
///
/// Ring layout is a pure function of this config and the host set. THESE VALUES MUST BE THE SAME
/// FOR EVERY REPLICA, or replicas will route the same key to different hosts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RingConfig {
  /// The number of points each host occupies on the ring.
  ///
  /// default: `100`
  pub vnodes: usize,
  /// Seed for the hash function placing hosts and keys on the ring.
  ///
  /// default: `0`
  pub seed: u64,
}
impl Default for RingConfig {
  #[inline]
  fn default() -> Self {
    RingConfig {
      vnodes: 100,
      seed: 0,
    }
  }
}

/// A host as it is stored inside a ring.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Host {
  /// Unique name of the runtime host.
  pub name: String,
  /// The application the host belongs to.
  pub app_id: String,
  /// Always [`HOST_WEIGHT`] when added by the state machine.
  pub weight: u64,
}
impl Host {
  pub fn new(name: String, app_id: String, weight: u64) -> Host {
    Host {
      name: name,
      app_id: app_id,
      weight: weight,
    }
  }
}

#[test]
fn test_default_ring_config() {
  let config = RingConfig::default();
  assert_eq!(config.vnodes, 100);
  assert_eq!(config.seed, 0);
}
