use thiserror::Error;

/// Failures at the edges of the state machine: decoding commands and snapshots.
///
/// The transitions themselves cannot fail. An error here means a replica could not apply an entry
/// every other replica applies, so callers should treat it as fatal.
#[derive(Debug, Error)]
pub enum PlacementError {
  #[error("command is empty")]
  EmptyCommand,
  #[error("unknown command type {0}")]
  UnknownCommand(u8),
  #[error("cbor codec error: {0}")]
  Codec(#[from] serde_cbor::Error),
}
