use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A runtime host registered with the placement service.
///
/// A host with at least one entry in [`entities`](#structfield.entities) serves actors and takes
/// part in the hashing rings of those actor types. A host with no entities is a plain member.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMember {
  /// Unique name of the runtime host. Primary key of the member table.
  pub name: String,
  /// The application this host runs. Not unique.
  #[serde(rename = "appID")]
  pub app_id: String,
  /// The actor types this host serves, in the order the host reported them.
  pub entities: Vec<String>,
  pub created_at: SystemTime,
  pub updated_at: SystemTime,
}
impl HostMember {
  /// A registration candidate. Timestamps are assigned by the state machine when it is applied.
  pub fn new<S: Into<String>>(name: S, app_id: S, entities: Vec<String>) -> HostMember {
    HostMember {
      name: name.into(),
      app_id: app_id.into(),
      entities: entities,
      created_at: UNIX_EPOCH,
      updated_at: UNIX_EPOCH,
    }
  }

  pub fn is_actor_host(&self) -> bool {
    !self.entities.is_empty()
  }

  // Entity order matters: a host reporting the same types in another order is a new registration.
  pub(crate) fn same_registration(&self, other: &HostMember) -> bool {
    self.app_id == other.app_id && self.name == other.name && self.entities == other.entities
  }
}

#[test]
fn test_actor_host() {
  assert!(HostMember::new("h1", "a1", vec!["actor1".to_string()]).is_actor_host());
  assert!(!HostMember::new("h1", "a1", vec![]).is_actor_host());
}

#[test]
fn test_same_registration_is_order_sensitive() {
  let a = HostMember::new("h1", "a1", vec!["x".to_string(), "y".to_string()]);
  let b = HostMember::new("h1", "a1", vec!["y".to_string(), "x".to_string()]);
  let mut c = a.clone();
  c.updated_at = SystemTime::now();
  assert!(a.same_registration(&c));
  assert!(!a.same_registration(&b));
  assert!(!a.same_registration(&HostMember::new("h1", "a2", a.entities.clone())));
}
