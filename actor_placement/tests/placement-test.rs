use actor_placement::hashing::{ConsistentRing, HashRing, RingConfig};
use actor_placement::placement::{HostMember, MemberState, PlacementState};
use actor_placement::testkit::FakeRing;
use maplit::btreeset;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ENTITIES: [&str; 4] = ["actor1", "actor2", "actor3", "actor4"];

fn host(name: &str, app_id: &str, entities: &[&str]) -> HostMember {
  HostMember::new(name, app_id, entities.iter().map(|e| e.to_string()).collect())
}

fn ring_hosts<R: HashRing>(state: &PlacementState<R>, entity: &str) -> Option<BTreeSet<String>> {
  state
    .hashing_table(entity)
    .map(|ring| ring.hosts().into_iter().map(str::to_string).collect())
}

#[derive(Clone, Debug)]
enum Op {
  Upsert(HostMember),
  Remove(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
  prop_oneof![
    (0usize..5, 0usize..2, prop::collection::vec(0usize..4, 0..4)).prop_map(|(h, a, es)| {
      let entities = es.into_iter().map(|e| ENTITIES[e].to_string()).collect();
      Op::Upsert(HostMember::new(format!("host-{}", h), format!("app-{}", a), entities))
    }),
    (0usize..6).prop_map(|h| Op::Remove(format!("host-{}", h))),
  ]
}

fn run<R: HashRing>(state: &mut PlacementState<R>, ops: &[Op], now: SystemTime) {
  for op in ops {
    let before = state.table_generation();
    let changed = match op.clone() {
      Op::Upsert(h) => state.upsert_member_at(h, now),
      Op::Remove(name) => state.remove_member(&name),
    };
    assert_eq!(state.table_generation(), before + changed as u64);
  }
}

#[test]
fn placement_scenario() {
  let mut s = PlacementState::<ConsistentRing>::default();

  assert!(s.upsert_member(host("h1", "a1", &["actor1"])));
  assert_eq!(s.table_generation(), 1);

  assert!(s.upsert_member(host("h2", "a2", &["actor1", "actor2"])));
  assert_eq!(s.table_generation(), 2);
  assert_eq!(ring_hosts(&s, "actor1"), Some(btreeset! {"h1".to_string(), "h2".to_string()}));
  assert_eq!(ring_hosts(&s, "actor2"), Some(btreeset! {"h2".to_string()}));

  assert!(s.remove_member("h1"));
  assert_eq!(s.table_generation(), 3);
  assert_eq!(ring_hosts(&s, "actor1"), Some(btreeset! {"h2".to_string()}));

  assert!(s.remove_member("h2"));
  assert_eq!(s.table_generation(), 4);
  assert_eq!(ring_hosts(&s, "actor1"), None);
  assert_eq!(ring_hosts(&s, "actor2"), None);
  assert!(s.members().is_empty());
}

#[test]
fn idempotent_reregistration() {
  let mut s = PlacementState::<ConsistentRing>::default();
  assert!(s.upsert_member(host("h1", "a1", &["actor1", "actor2"])));
  let generation = s.table_generation();
  assert!(!s.upsert_member(host("h1", "a1", &["actor1", "actor2"])));
  assert_eq!(s.table_generation(), generation);
}

#[test]
fn orphan_rings_are_dropped() {
  let mut s = PlacementState::<FakeRing>::default();
  s.upsert_member(host("h1", "a1", &["actor1"]));
  s.upsert_member(host("h2", "a1", &["actor1"]));
  s.remove_member("h1");
  s.remove_member("h2");
  assert!(s.hashing_tables().unwrap().is_empty());

  s.upsert_member(host("h3", "a3", &["actor1"]));
  let ring = s.hashing_table("actor1").unwrap();
  assert_eq!(ring.hosts(), vec!["h3"]);
  assert_eq!(ring.adds, 1);
}

#[test]
fn clone_isolation() {
  let mut source = PlacementState::<ConsistentRing>::default();
  source.upsert_member(host("h1", "a1", &["actor1"]));
  source.upsert_member(host("h2", "a2", &[]));

  let mut copy = source.clone();
  copy.upsert_member(host("h1", "a1", &["actor2"]));
  copy.remove_member("h2");
  copy.upsert_member(host("h3", "a3", &["actor3"]));

  assert_eq!(source.member("h1").unwrap().entities, vec!["actor1"]);
  assert!(source.member("h2").is_some());
  assert!(source.member("h3").is_none());
  assert_eq!(source.table_generation(), 1);
  assert_eq!(ring_hosts(&source, "actor1"), Some(btreeset! {"h1".to_string()}));

  source.remove_member("h1");
  assert_eq!(copy.member("h1").unwrap().entities, vec!["actor2"]);
  assert_eq!(copy.table_generation(), 3);
}

#[test]
fn restore_is_idempotent() {
  let mut s = PlacementState::<ConsistentRing>::default();
  s.upsert_member(host("h1", "a1", &["actor1", "actor2"]));
  s.upsert_member(host("h2", "a2", &["actor2"]));
  let mut restored = PlacementState::<ConsistentRing>::from_snapshot(s.clone_state(), RingConfig::default());
  restored.restore_hashing_tables();
  restored.restore_hashing_tables();
  assert_eq!(restored.placement_tables(), s.placement_tables());
  for i in 0..100 {
    let key = format!("actor-{}", i);
    assert_eq!(restored.lookup("actor2", &key), s.lookup("actor2", &key));
  }
}

proptest! {
  #[test]
  fn replicas_converge(ops in prop::collection::vec(op_strategy(), 0..60)) {
    let now = UNIX_EPOCH + Duration::from_secs(1_000);
    let mut a = PlacementState::<ConsistentRing>::default();
    let mut b = PlacementState::<ConsistentRing>::default();
    run(&mut a, &ops, now);
    run(&mut b, &ops, now);
    prop_assert_eq!(a.clone_state(), b.clone_state());
    prop_assert_eq!(a.placement_tables(), b.placement_tables());
    for entity in ENTITIES.iter() {
      prop_assert_eq!(a.lookup(entity, "actor-7"), b.lookup(entity, "actor-7"));
    }
  }

  #[test]
  fn restore_matches_incremental(ops in prop::collection::vec(op_strategy(), 0..60)) {
    let now = UNIX_EPOCH + Duration::from_secs(1_000);
    let mut incremental = PlacementState::<ConsistentRing>::default();
    run(&mut incremental, &ops, now);

    let snapshot: MemberState = incremental.clone_state();
    let mut restored = PlacementState::<ConsistentRing>::from_snapshot(snapshot.clone(), RingConfig::default());
    restored.restore_hashing_tables();

    let mut reversed = PlacementState::<ConsistentRing>::default();
    for member in snapshot.members.values().rev() {
      reversed.upsert_member_at(member.clone(), now);
    }

    let expected = incremental.placement_tables();
    prop_assert_eq!(&restored.placement_tables(), &expected);
    prop_assert_eq!(&reversed.placement_tables().entries, &expected.entries);
    for entity in ENTITIES.iter() {
      for i in 0..20 {
        let key = format!("key-{}", i);
        prop_assert_eq!(restored.lookup(entity, &key), incremental.lookup(entity, &key));
        prop_assert_eq!(reversed.lookup(entity, &key), incremental.lookup(entity, &key));
      }
    }
  }

  #[test]
  fn rings_match_members(ops in prop::collection::vec(op_strategy(), 0..60)) {
    let mut s = PlacementState::<FakeRing>::default();
    run(&mut s, &ops, SystemTime::now());
    let tables = s.hashing_tables().unwrap();
    for entity in ENTITIES.iter() {
      let serving = s
        .members()
        .values()
        .filter(|m| m.entities.iter().any(|e| e == entity))
        .map(|m| m.name.clone())
        .collect::<BTreeSet<_>>();
      match tables.get(entity) {
        Some(ring) => {
          let hosts = ring.hosts().into_iter().map(str::to_string).collect::<BTreeSet<_>>();
          prop_assert_eq!(hosts, serving);
        }
        None => prop_assert!(serving.is_empty()),
      }
    }
  }
}
