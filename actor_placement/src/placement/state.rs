use crate::hashing::{ConsistentRing, HashRing, RingConfig};
use crate::placement::{Command, HashingTables, HostMember, PlacementTables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

/// The authoritative placement state. This, and only this, is persisted in snapshots.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberState {
  /// Log position of the last applied command.
  pub index: u64,
  /// Registered hosts, keyed by host name.
  pub members: BTreeMap<String, HostMember>,
  /// Incremented once for every applied command that changes a hashing ring.
  pub table_generation: u64,
}

/// Host membership plus the hashing rings derived from it.
///
/// Commands must be applied one at a time, in log order, by a single writer. Nothing in here
/// locks. The rings are rebuilt from the members by
/// [`restore_hashing_tables`](Self::restore_hashing_tables) and otherwise kept up to date by each
/// transition.
#[derive(Debug)]
pub struct PlacementState<R = ConsistentRing> {
  state: MemberState,
  tables: Option<HashingTables<R>>,
  config: RingConfig,
}
impl<R: HashRing> PlacementState<R> {
  pub fn new(config: RingConfig) -> Self {
    PlacementState {
      state: MemberState::default(),
      tables: Some(HashingTables::new(config.clone())),
      config: config,
    }
  }

  /// Wraps state loaded from a snapshot. The hashing rings are absent until
  /// [`restore_hashing_tables`](Self::restore_hashing_tables) is called.
  pub fn from_snapshot(state: MemberState, config: RingConfig) -> Self {
    PlacementState {
      state: state,
      tables: None,
      config: config,
    }
  }

  pub fn index(&self) -> u64 {
    self.state.index
  }

  pub fn table_generation(&self) -> u64 {
    self.state.table_generation
  }

  pub fn members(&self) -> &BTreeMap<String, HostMember> {
    &self.state.members
  }

  pub fn member(&self, name: &str) -> Option<&HostMember> {
    self.state.members.get(name)
  }

  pub fn config(&self) -> &RingConfig {
    &self.config
  }

  /// A copy of the authoritative state, without the hashing rings.
  pub fn clone_state(&self) -> MemberState {
    self.state.clone()
  }

  pub fn into_state(self) -> MemberState {
    self.state
  }

  /// Rebuilds every hashing ring from the current members. Safe to call more than once.
  pub fn restore_hashing_tables(&mut self) {
    let tables = HashingTables::build(self.config.clone(), self.state.members.values());
    debug!(
      members = self.state.members.len(),
      tables = tables.len(),
      "restored hashing tables"
    );
    self.tables = Some(tables);
  }

  /// The derived rings, or `None` if they have not been restored since a clone or snapshot load.
  pub fn hashing_tables(&self) -> Option<&HashingTables<R>> {
    self.tables.as_ref()
  }

  pub fn hashing_table(&self, entity: &str) -> Option<&R> {
    self.tables.as_ref().and_then(|tables| tables.get(entity))
  }

  /// The host responsible for `key` among the hosts serving `entity`.
  pub fn lookup(&self, entity: &str, key: &str) -> Option<&str> {
    self.hashing_table(entity).and_then(|ring| ring.get(key))
  }

  /// Routing tables for distribution, versioned with the current table generation.
  pub fn placement_tables(&self) -> PlacementTables {
    let version = self.state.table_generation;
    match &self.tables {
      Some(tables) => tables.placement_tables(version),
      None => HashingTables::<R>::build(self.config.clone(), self.state.members.values())
        .placement_tables(version),
    }
  }

  /// Applies the command at log position `index`. Entries at or below the last applied position
  /// were applied before and are skipped.
  ///
  /// Returns whether any hashing ring changed.
  pub fn apply(&mut self, index: u64, command: Command) -> bool {
    if index <= self.state.index {
      warn!(
        current = self.state.index,
        index = index,
        "skipping already applied log entry"
      );
      return false;
    }
    self.state.index = index;
    match command {
      Command::MemberUpsert(host) => self.upsert_member(host),
      Command::MemberRemove { name } => self.remove_member(&name),
    }
  }

  /// Registers `host`, or updates its registration. Returns whether any hashing ring changed.
  pub fn upsert_member(&mut self, host: HostMember) -> bool {
    self.upsert_member_at(host, SystemTime::now())
  }

  /// [`upsert_member`](Self::upsert_member) with an explicit clock reading.
  ///
  /// The candidate's own timestamps are ignored. Any effective change stamps both `created_at`
  /// and `updated_at` with `now`; re-registering an unchanged host only touches `updated_at`.
  pub fn upsert_member_at(&mut self, host: HostMember, now: SystemTime) -> bool {
    let (state, tables) = self.split();
    let mut table_update_required = false;

    if let Some(existing) = state.members.get_mut(&host.name) {
      if existing.same_registration(&host) {
        trace!(host = host.name.as_str(), "unchanged host registration");
        existing.updated_at = now;
        return false;
      }
      if existing.is_actor_host() {
        tables.remove_host(existing);
        table_update_required = true;
      }
    }

    let HostMember {
      name,
      app_id,
      entities,
      ..
    } = host;
    let member = HostMember {
      name: name.clone(),
      app_id: app_id,
      entities: entities,
      created_at: now,
      updated_at: now,
    };
    if member.is_actor_host() {
      tables.add_host(&member);
      table_update_required = true;
    }
    if table_update_required {
      state.table_generation += 1;
    }
    debug!(
      host = name.as_str(),
      generation = state.table_generation,
      changed = table_update_required,
      "upserted host"
    );
    state.members.insert(name, member);
    table_update_required
  }

  /// Deregisters the host called `name`. Returns whether any hashing ring changed.
  pub fn remove_member(&mut self, name: &str) -> bool {
    let (state, tables) = self.split();
    let mut table_update_required = false;
    if let Some(existing) = state.members.remove(name) {
      if existing.is_actor_host() {
        tables.remove_host(&existing);
        state.table_generation += 1;
        table_update_required = true;
      }
      debug!(
        host = name,
        generation = state.table_generation,
        "removed host"
      );
    }
    table_update_required
  }

  // Transitions on a state whose rings were never restored rebuild them first.
  fn split(&mut self) -> (&mut MemberState, &mut HashingTables<R>) {
    let PlacementState {
      state,
      tables,
      config,
    } = self;
    let tables =
      tables.get_or_insert_with(|| HashingTables::build(config.clone(), state.members.values()));
    (state, tables)
  }
}
impl<R: HashRing> Default for PlacementState<R> {
  fn default() -> Self {
    Self::new(RingConfig::default())
  }
}
/// Copies the authoritative state only. The copy's hashing rings are absent until restored.
impl<R> Clone for PlacementState<R> {
  fn clone(&self) -> Self {
    PlacementState {
      state: self.state.clone(),
      tables: None,
      config: self.config.clone(),
    }
  }
}

#[cfg(test)]
use crate::testkit::FakeRing;

#[cfg(test)]
fn host(name: &str, app_id: &str, entities: &[&str]) -> HostMember {
  HostMember::new(name, app_id, entities.iter().map(|e| e.to_string()).collect())
}

#[test]
fn test_upsert_new_plain_member() {
  let mut s = PlacementState::<FakeRing>::default();
  assert!(!s.upsert_member(host("h1", "a1", &[])));
  assert_eq!(s.table_generation(), 0);
  assert!(s.member("h1").is_some());
  assert!(s.hashing_tables().map_or(false, |t| t.is_empty()));
}

#[test]
fn test_unchanged_upsert_only_touches_updated_at() {
  let mut s = PlacementState::<FakeRing>::default();
  let t0 = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10);
  let t1 = t0 + std::time::Duration::from_secs(5);
  assert!(s.upsert_member_at(host("h1", "a1", &["x"]), t0));
  assert!(!s.upsert_member_at(host("h1", "a1", &["x"]), t1));
  let m = s.member("h1").unwrap();
  assert_eq!(m.created_at, t0);
  assert_eq!(m.updated_at, t1);
  assert_eq!(s.table_generation(), 1);
  assert_eq!(s.hashing_table("x").unwrap().adds, 1);
}

#[test]
fn test_changed_upsert_resets_created_at() {
  let mut s = PlacementState::<FakeRing>::default();
  let t0 = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10);
  let t1 = t0 + std::time::Duration::from_secs(5);
  s.upsert_member_at(host("h1", "a1", &[]), t0);
  assert!(!s.upsert_member_at(host("h1", "a2", &[]), t1));
  let m = s.member("h1").unwrap();
  assert_eq!(m.app_id, "a2");
  assert_eq!(m.created_at, t1);
  assert_eq!(s.table_generation(), 0);
}

#[test]
fn test_entity_change_bumps_generation_once() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x", "y"]));
  assert!(s.upsert_member(host("h1", "a1", &["y", "z"])));
  assert_eq!(s.table_generation(), 2);
  assert!(s.hashing_table("x").is_none());
  assert_eq!(s.hashing_table("y").unwrap().hosts(), vec!["h1"]);
  assert_eq!(s.hashing_table("z").unwrap().hosts(), vec!["h1"]);
}

#[test]
fn test_reordered_entities_is_a_change() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x", "y"]));
  assert!(s.upsert_member(host("h1", "a1", &["y", "x"])));
  assert_eq!(s.table_generation(), 2);
  assert_eq!(s.member("h1").unwrap().entities, vec!["y", "x"]);
}

#[test]
fn test_actor_host_becomes_plain_member() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x"]));
  assert!(s.upsert_member(host("h1", "a1", &[])));
  assert_eq!(s.table_generation(), 2);
  assert!(s.hashing_tables().unwrap().is_empty());
  assert!(!s.member("h1").unwrap().is_actor_host());
}

#[test]
fn test_remove_member() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &[]));
  s.upsert_member(host("h2", "a2", &["x"]));
  assert!(!s.remove_member("missing"));
  assert!(!s.remove_member("h1"));
  assert_eq!(s.table_generation(), 1);
  assert!(s.remove_member("h2"));
  assert_eq!(s.table_generation(), 2);
  assert!(s.members().is_empty());
  assert!(s.hashing_table("x").is_none());
}

#[test]
fn test_apply_skips_old_entries() {
  let mut s = PlacementState::<FakeRing>::default();
  assert!(s.apply(1, Command::MemberUpsert(host("h1", "a1", &["x"]))));
  assert_eq!(s.index(), 1);
  assert!(!s.apply(1, Command::MemberRemove { name: "h1".to_string() }));
  assert!(s.member("h1").is_some());
  assert!(s.apply(2, Command::MemberRemove { name: "h1".to_string() }));
  assert_eq!(s.index(), 2);
  assert_eq!(s.table_generation(), 2);
}

#[test]
fn test_clone_drops_tables() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x"]));
  let mut c = s.clone();
  assert!(c.hashing_tables().is_none());
  assert_eq!(c.clone_state(), s.clone_state());
  c.restore_hashing_tables();
  assert_eq!(c.hashing_table("x").unwrap().hosts(), vec!["h1"]);
}

#[test]
fn test_transition_on_unrestored_state_rebuilds_tables() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x"]));
  let mut c = PlacementState::<FakeRing>::from_snapshot(s.clone_state(), RingConfig::default());
  assert!(c.upsert_member(host("h2", "a2", &["x"])));
  assert_eq!(c.hashing_table("x").unwrap().hosts(), vec!["h1", "h2"]);
}

#[test]
fn test_placement_tables_without_restore() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x"]));
  let c = s.clone();
  assert_eq!(c.placement_tables(), s.placement_tables());
  assert_eq!(c.placement_tables().version, 1);
}

#[cfg(test)]
fn text_keys(value: &serde_cbor::Value) -> std::collections::BTreeSet<String> {
  match value {
    serde_cbor::Value::Map(map) => map
      .keys()
      .filter_map(|k| match k {
        serde_cbor::Value::Text(t) => Some(t.clone()),
        _ => None,
      })
      .collect(),
    _ => panic!("expected a map, got {:?}", value),
  }
}

#[test]
fn test_persisted_layout() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["x"]));
  let value = serde_cbor::value::to_value(s.clone_state()).unwrap();
  assert_eq!(
    text_keys(&value),
    maplit::btreeset! {
      "index".to_string(), "members".to_string(), "tableGeneration".to_string()
    }
  );
  let member = serde_cbor::value::to_value(s.member("h1").unwrap()).unwrap();
  assert_eq!(
    text_keys(&member),
    maplit::btreeset! {
      "name".to_string(), "appID".to_string(), "entities".to_string(),
      "createdAt".to_string(), "updatedAt".to_string()
    }
  );
}
