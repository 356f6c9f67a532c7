use crate::hashing::{HashRing, RingConfig, HOST_WEIGHT};
use crate::placement::HostMember;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// The hashing rings of every actor type currently served by at least one host.
///
/// This index is derived from the member table and is never persisted. [`build`](Self::build)
/// recreates it from the members alone.
#[derive(Clone, Debug)]
pub struct HashingTables<R> {
  tables: BTreeMap<String, R>,
  config: RingConfig,
}
impl<R: HashRing> HashingTables<R> {
  pub fn new(config: RingConfig) -> Self {
    HashingTables {
      tables: BTreeMap::new(),
      config: config,
    }
  }

  /// Rebuilds the index from scratch out of the given members.
  pub fn build<'a, I>(config: RingConfig, members: I) -> Self
  where
    I: IntoIterator<Item = &'a HostMember>,
  {
    let mut tables = Self::new(config);
    for member in members {
      tables.add_host(member);
    }
    tables
  }

  /// Adds `host` to the ring of each actor type it serves, creating rings as needed.
  pub(crate) fn add_host(&mut self, host: &HostMember) {
    for entity in host.entities.iter() {
      let config = &self.config;
      self
        .tables
        .entry(entity.clone())
        .or_insert_with(|| R::new(config))
        .add(&host.name, &host.app_id, HOST_WEIGHT);
    }
  }

  /// Removes `host` from the ring of each actor type it serves. Rings left without hosts are
  /// dropped, so the index never outgrows the set of actor types currently being served.
  pub(crate) fn remove_host(&mut self, host: &HostMember) {
    for entity in host.entities.iter() {
      if let Some(ring) = self.tables.get_mut(entity) {
        ring.remove(&host.name);
        if ring.is_empty() {
          trace!(entity = entity.as_str(), "dropping empty hashing table");
          self.tables.remove(entity);
        }
      }
    }
  }

  pub fn get(&self, entity: &str) -> Option<&R> {
    self.tables.get(entity)
  }

  pub fn contains(&self, entity: &str) -> bool {
    self.tables.contains_key(entity)
  }

  /// The actor types that have a ring, sorted.
  pub fn entities(&self) -> impl Iterator<Item = &str> {
    self.tables.keys().map(|entity| entity.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &R)> {
    self.tables.iter().map(|(entity, ring)| (entity.as_str(), ring))
  }

  pub fn len(&self) -> usize {
    self.tables.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tables.is_empty()
  }

  pub fn config(&self) -> &RingConfig {
    &self.config
  }

  /// The view handed to routing table distribution, stamped with `version`.
  pub fn placement_tables(&self, version: u64) -> PlacementTables {
    PlacementTables {
      version: version,
      entries: self
        .tables
        .iter()
        .map(|(entity, ring)| {
          let hosts: Vec<String> = ring.hosts().into_iter().map(str::to_string).collect();
          (entity.clone(), hosts)
        })
        .collect(),
    }
  }
}

/// Routing tables broadcast to runtime hosts: which hosts serve each actor type.
///
/// `version` is the table generation the entries were computed at. Receivers can ignore any
/// tables whose version they have already seen.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlacementTables {
  pub version: u64,
  pub entries: BTreeMap<String, Vec<String>>,
}
impl PlacementTables {
  pub fn hosts(&self, entity: &str) -> Option<&[String]> {
    self.entries.get(entity).map(|hosts| hosts.as_slice())
  }
}

#[cfg(test)]
use crate::testkit::FakeRing;

#[cfg(test)]
fn member(name: &str, entities: &[&str]) -> HostMember {
  HostMember::new(name, "app", entities.iter().map(|e| e.to_string()).collect())
}

#[test]
fn test_add_and_remove_host() {
  let mut tables = HashingTables::<FakeRing>::new(RingConfig::default());
  let h1 = member("h1", &["a", "b"]);
  let h2 = member("h2", &["b"]);
  tables.add_host(&h1);
  tables.add_host(&h2);
  assert_eq!(tables.entities().collect::<Vec<_>>(), vec!["a", "b"]);
  assert_eq!(tables.get("b").map(|r| r.hosts()), Some(vec!["h1", "h2"]));
  tables.remove_host(&h1);
  assert!(!tables.contains("a"));
  assert_eq!(tables.get("b").map(|r| r.hosts()), Some(vec!["h2"]));
  tables.remove_host(&h2);
  assert!(tables.is_empty());
}

#[test]
fn test_remove_unknown_host_is_noop() {
  let mut tables = HashingTables::<FakeRing>::new(RingConfig::default());
  tables.add_host(&member("h1", &["a"]));
  tables.remove_host(&member("h2", &["a", "c"]));
  assert_eq!(tables.get("a").map(|r| r.hosts()), Some(vec!["h1"]));
  assert!(!tables.contains("c"));
}

#[test]
fn test_placement_tables() {
  let tables = HashingTables::<FakeRing>::build(
    RingConfig::default(),
    &[member("h2", &["a"]), member("h1", &["a", "b"])],
  );
  let view = tables.placement_tables(7);
  assert_eq!(view.version, 7);
  assert_eq!(view.hosts("a"), Some(&["h1".to_string(), "h2".to_string()][..]));
  assert_eq!(view.hosts("b"), Some(&["h1".to_string()][..]));
  assert_eq!(view.hosts("c"), None);
}
