//! Tracks which runtime hosts are alive, which actor types each of them serves, and keeps one
//! consistent hashing ring per actor type to route actor invocations. The state machine in
//! [`placement`] is applied, in the same order, on every replica of a consensus log.

pub mod hashing;
pub mod placement;
pub mod testkit;
