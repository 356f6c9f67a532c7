use crate::hashing::{HashRing, Host, RingConfig};
use itertools::Itertools;
use std::cmp::max;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hasher;
use wyhash::{wyrng, WyHash};

/// A consistent hashing ring with a fixed number of virtual nodes per host.
///
/// Each point on the ring holds the set of hosts hashed to it. Collisions are rare, but keeping
/// every colliding host (ordered by name) means the layout only depends on which hosts are in the
/// ring, not on the order they were added.
#[derive(Clone, Debug)]
pub struct ConsistentRing {
  pub(in crate::hashing) ring: BTreeMap<u64, BTreeSet<String>>,
  hosts: BTreeMap<String, Host>,
  vnodes: usize,
  seed: u64,
}
impl ConsistentRing {
  /// The first `num` distinct hosts found walking clockwise from the hash of `key`.
  pub fn replicas(&self, key: &str, num: usize) -> Vec<&str> {
    let key = self.hash_code(key.as_bytes());
    self
      .ring
      .range(key..)
      .chain(self.ring.range(..key))
      .flat_map(|(_, names)| names.iter())
      .map(|name| name.as_str())
      .unique()
      .take(num)
      .collect()
  }

  pub fn host(&self, name: &str) -> Option<&Host> {
    self.hosts.get(name)
  }

  pub fn len(&self) -> usize {
    self.hosts.len()
  }

  /// Number of occupied points on the ring.
  pub fn points(&self) -> usize {
    self.ring.len()
  }

  fn keys(&self, name: &str) -> Vec<u64> {
    let mut key = self.hash_code(name.as_bytes());
    let num = max(1, self.vnodes);
    let mut v = Vec::with_capacity(num);
    for _ in 0..num {
      v.push(key);
      key = wyrng(&mut key);
    }
    v
  }

  fn hash_code(&self, bytes: &[u8]) -> u64 {
    let mut hasher = WyHash::with_seed(self.seed);
    hasher.write(bytes);
    hasher.finish()
  }
}
impl HashRing for ConsistentRing {
  fn new(config: &RingConfig) -> Self {
    ConsistentRing {
      ring: BTreeMap::new(),
      hosts: BTreeMap::new(),
      vnodes: config.vnodes,
      seed: config.seed,
    }
  }

  fn add(&mut self, name: &str, id: &str, weight: u64) -> bool {
    if self.hosts.contains_key(name) {
      return false;
    }
    for key in self.keys(name) {
      self.ring.entry(key).or_default().insert(name.to_string());
    }
    self
      .hosts
      .insert(name.to_string(), Host::new(name.to_string(), id.to_string(), weight));
    true
  }

  fn remove(&mut self, name: &str) -> bool {
    if self.hosts.remove(name).is_none() {
      return false;
    }
    for key in self.keys(name) {
      if let Entry::Occupied(mut o) = self.ring.entry(key) {
        o.get_mut().remove(name);
        if o.get().is_empty() {
          o.remove();
        }
      }
    }
    true
  }

  fn hosts(&self) -> Vec<&str> {
    self.hosts.keys().map(|name| name.as_str()).collect()
  }

  fn get(&self, key: &str) -> Option<&str> {
    let key = self.hash_code(key.as_bytes());
    self
      .ring
      .range(key..)
      .chain(self.ring.range(..key))
      .next()
      .and_then(|(_, names)| names.iter().next())
      .map(|name| name.as_str())
  }

  fn is_empty(&self) -> bool {
    self.hosts.is_empty()
  }
}

#[cfg(test)]
fn ring_of(names: &[&str]) -> ConsistentRing {
  let mut ring = ConsistentRing::new(&RingConfig::default());
  for name in names {
    assert!(ring.add(name, "app", 0));
  }
  ring
}

#[test]
fn test_layout_ignores_insertion_order() {
  let forward = ring_of(&["h1", "h2", "h3", "h4"]);
  let backward = ring_of(&["h4", "h3", "h2", "h1"]);
  assert_eq!(forward.ring, backward.ring);
  assert_eq!(forward.points(), 400);
  for i in 0..200 {
    let key = format!("actor-{}", i);
    assert_eq!(forward.get(&key), backward.get(&key));
  }
}

#[test]
fn test_add_and_remove_hosts() {
  let mut ring = ring_of(&["h1", "h2"]);
  assert!(!ring.add("h1", "other-app", 0));
  assert_eq!(ring.host("h1").map(|h| h.app_id.as_str()), Some("app"));
  assert_eq!(ring.hosts(), vec!["h1", "h2"]);
  assert!(ring.remove("h1"));
  assert!(!ring.remove("h1"));
  assert_eq!(ring.hosts(), vec!["h2"]);
  assert_eq!(ring.points(), 100);
  assert!(ring.remove("h2"));
  assert!(ring.is_empty());
  assert!(ring.ring.is_empty());
  assert_eq!(ring.get("anything"), None);
}

#[test]
fn test_removal_only_moves_keys_of_removed_host() {
  let mut ring = ring_of(&["h1", "h2", "h3"]);
  let before = (0..500)
    .map(|i| ring.get(&format!("key-{}", i)).map(str::to_string))
    .collect::<Vec<_>>();
  ring.remove("h2");
  for (i, owner) in before.into_iter().enumerate() {
    let now = ring.get(&format!("key-{}", i));
    match owner.as_deref() {
      Some("h2") => assert!(matches!(now, Some("h1") | Some("h3"))),
      other => assert_eq!(now, other),
    }
  }
}

#[test]
fn test_replicas_are_distinct() {
  let ring = ring_of(&["h1", "h2", "h3"]);
  let replicas = ring.replicas("some-actor", 5);
  assert_eq!(replicas.len(), 3);
  assert_eq!(replicas.iter().unique().count(), 3);
  assert_eq!(Some(replicas[0]), ring.get("some-actor"));
}
