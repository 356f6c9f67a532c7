use crate::placement::{HostMember, PlacementError};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The leading byte of an encoded [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandType {
  MemberUpsert = 0,
  MemberRemove = 1,
}

/// An entry of the replicated log, as understood by the placement state machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
  /// Registers a host, or updates its registration.
  MemberUpsert(HostMember),
  /// Deregisters the host with this name.
  MemberRemove { name: String },
}
impl Command {
  pub fn command_type(&self) -> CommandType {
    match self {
      Command::MemberUpsert(_) => CommandType::MemberUpsert,
      Command::MemberRemove { .. } => CommandType::MemberRemove,
    }
  }

  /// One [`CommandType`] byte followed by the CBOR encoded payload.
  pub fn encode(&self) -> Result<Vec<u8>, PlacementError> {
    let mut buf = vec![u8::from(self.command_type())];
    match self {
      Command::MemberUpsert(host) => serde_cbor::to_writer(&mut buf, host)?,
      Command::MemberRemove { name } => serde_cbor::to_writer(&mut buf, name)?,
    }
    Ok(buf)
  }

  pub fn decode(bytes: &[u8]) -> Result<Command, PlacementError> {
    let (tag, body) = bytes.split_first().ok_or(PlacementError::EmptyCommand)?;
    let command_type =
      CommandType::try_from(*tag).map_err(|_| PlacementError::UnknownCommand(*tag))?;
    match command_type {
      CommandType::MemberUpsert => Ok(Command::MemberUpsert(serde_cbor::from_slice(body)?)),
      CommandType::MemberRemove => Ok(Command::MemberRemove {
        name: serde_cbor::from_slice(body)?,
      }),
    }
  }
}

#[test]
fn test_command_codec() {
  let upsert = Command::MemberUpsert(HostMember::new(
    "h1",
    "a1",
    vec!["actor1".to_string(), "actor2".to_string()],
  ));
  let bytes = upsert.encode().unwrap();
  assert_eq!(bytes[0], 0);
  assert_eq!(Command::decode(&bytes).unwrap(), upsert);

  let remove = Command::MemberRemove {
    name: "h1".to_string(),
  };
  let bytes = remove.encode().unwrap();
  assert_eq!(bytes[0], 1);
  assert_eq!(Command::decode(&bytes).unwrap(), remove);
}

#[test]
fn test_decode_rejects_bad_input() {
  assert!(matches!(Command::decode(&[]), Err(PlacementError::EmptyCommand)));
  assert!(matches!(Command::decode(&[7, 0]), Err(PlacementError::UnknownCommand(7))));
  assert!(matches!(Command::decode(&[0, 0xff]), Err(PlacementError::Codec(_))));
}
