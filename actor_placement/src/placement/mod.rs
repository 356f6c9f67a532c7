//! The replicated membership state machine behind actor placement.
//!
//! Runtime hosts register with the placement service, reporting the actor types (entities) they
//! can run. Registrations and deregistrations are committed to a replicated log, and every
//! replica applies the committed [`Command`]s to its own [`PlacementState`] in log order. Because
//! the transitions are deterministic, all replicas end up with the same members and the same
//! hashing rings without talking to each other.
//!
//! ### Authoritative and Derived State
//! [`MemberState`] holds the last applied log index, the registered hosts and the table
//! generation. It is the only thing written to snapshots. The [`HashingTables`] (one
//! [`HashRing`](crate::hashing::HashRing) per actor type) are derived from the members: after a
//! snapshot is loaded, or a [`PlacementState`] is cloned, the rings are absent and
//! [`PlacementState::restore_hashing_tables`] rebuilds them. Each transition then keeps them up to
//! date. A ring exists for an actor type exactly as long as some host serves that type.
//!
//! ### Table Generation
//! Every applied command that changes ring membership increments the table generation exactly
//! once, no matter how many rings it touched. Routing table distribution compares generations to
//! decide whether there is anything new to broadcast. [`PlacementFsm::subscribe`] pushes new
//! generations as they happen.
//!
//! ```ignore
//! let fsm = PlacementFsm::<ConsistentRing>::new(RingConfig::default());
//! let host = HostMember::new("host-1", "app-1", vec!["counter".to_string()]);
//! let data = Command::MemberUpsert(host).encode()?;
//! assert!(fsm.apply(1, &data)?);
//! assert_eq!(fsm.lookup("counter", "counter-42"), Some("host-1".to_string()));
//! ```

mod command;
mod error;
mod fsm;
mod member;
mod state;
mod tables;

#[rustfmt::skip]
pub use {
  command::Command,
  command::CommandType,
  error::PlacementError,
  fsm::PlacementFsm,
  member::HostMember,
  state::MemberState,
  state::PlacementState,
  tables::HashingTables,
  tables::PlacementTables,
};
