use crate::hashing::{ConsistentRing, HashRing, RingConfig};
use crate::placement::{
  Command, HostMember, MemberState, PlacementError, PlacementState, PlacementTables,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tokio::sync::watch;
use tracing::debug;

/// The placement state machine as driven by the consensus layer.
///
/// The consensus apply loop is the only writer. Readers (routing lookups, snapshot production,
/// table distribution) go through the read lock and never see a half-applied command.
/// Subscribers to [`subscribe`](Self::subscribe) are told the new table generation whenever it
/// changes.
pub struct PlacementFsm<R = ConsistentRing> {
  state: RwLock<PlacementState<R>>,
  config: RingConfig,
  generation: watch::Sender<u64>,
}
impl<R: HashRing> PlacementFsm<R> {
  pub fn new(config: RingConfig) -> Self {
    let (generation, _) = watch::channel(0);
    PlacementFsm {
      state: RwLock::new(PlacementState::new(config.clone())),
      config: config,
      generation: generation,
    }
  }

  /// Decodes and applies the committed log entry at `index`. Returns whether the hashing rings
  /// changed.
  ///
  /// An error leaves the state untouched, but this replica has now diverged from the others and
  /// should not keep serving.
  pub fn apply(&self, index: u64, data: &[u8]) -> Result<bool, PlacementError> {
    let command = Command::decode(data)?;
    Ok(self.apply_command(index, command))
  }

  pub fn apply_command(&self, index: u64, command: Command) -> bool {
    let mut state = self.state.write();
    let changed = state.apply(index, command);
    if changed {
      self.generation.send_replace(state.table_generation());
    }
    changed
  }

  /// A copy of the authoritative state, taken under the read lock.
  pub fn snapshot(&self) -> MemberState {
    self.state.read().clone_state()
  }

  /// Writes a CBOR encoded snapshot of the authoritative state.
  pub fn persist<W: Write>(&self, writer: W) -> Result<(), PlacementError> {
    let snapshot = self.snapshot();
    serde_cbor::to_writer(writer, &snapshot)?;
    Ok(())
  }

  /// Replaces the whole state with a snapshot written by [`persist`](Self::persist).
  pub fn restore<Rd: Read>(&self, reader: Rd) -> Result<(), PlacementError> {
    let snapshot: MemberState = serde_cbor::from_reader(reader)?;
    self.restore_state(snapshot);
    Ok(())
  }

  /// Replaces the whole state, rebuilding the hashing rings before anyone can read them.
  pub fn restore_state(&self, snapshot: MemberState) {
    let mut restored = PlacementState::from_snapshot(snapshot, self.config.clone());
    restored.restore_hashing_tables();
    let generation = restored.table_generation();
    debug!(
      index = restored.index(),
      generation = generation,
      "restored placement state"
    );
    *self.state.write() = restored;
    self.generation.send_replace(generation);
  }

  /// Follows the table generation. The receiver starts out having seen the current value.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.generation.subscribe()
  }

  pub fn index(&self) -> u64 {
    self.state.read().index()
  }

  pub fn table_generation(&self) -> u64 {
    self.state.read().table_generation()
  }

  pub fn members(&self) -> BTreeMap<String, HostMember> {
    self.state.read().members().clone()
  }

  pub fn member(&self, name: &str) -> Option<HostMember> {
    self.state.read().member(name).cloned()
  }

  pub fn placement_tables(&self) -> PlacementTables {
    self.state.read().placement_tables()
  }

  /// The host that should run the actor `key` of type `entity`.
  pub fn lookup(&self, entity: &str, key: &str) -> Option<String> {
    self.state.read().lookup(entity, key).map(str::to_string)
  }

  /// Runs `f` against the current state under the read lock.
  pub fn with_state<T, F>(&self, f: F) -> T
  where
    F: FnOnce(&PlacementState<R>) -> T,
  {
    f(&self.state.read())
  }
}
impl<R: HashRing> Default for PlacementFsm<R> {
  fn default() -> Self {
    Self::new(RingConfig::default())
  }
}
