//! Helpers for testing code built on the placement state machine.

use crate::hashing::{HashRing, RingConfig};
use std::collections::BTreeSet;

/// A [`HashRing`] that only tracks its host set.
///
/// Lookups go to the first host by name. It also counts the adds and removes it has seen, so
/// tests can check how much ring work a transition caused.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FakeRing {
  hosts: BTreeSet<String>,
  pub adds: usize,
  pub removes: usize,
}
impl HashRing for FakeRing {
  fn new(_: &RingConfig) -> Self {
    FakeRing::default()
  }

  fn add(&mut self, name: &str, _: &str, _: u64) -> bool {
    self.adds += 1;
    self.hosts.insert(name.to_string())
  }

  fn remove(&mut self, name: &str) -> bool {
    self.removes += 1;
    self.hosts.remove(name)
  }

  fn hosts(&self) -> Vec<&str> {
    self.hosts.iter().map(|name| name.as_str()).collect()
  }

  fn get(&self, _: &str) -> Option<&str> {
    self.hosts.iter().next().map(|name| name.as_str())
  }
}
