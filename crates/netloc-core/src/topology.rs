//! Switch-to-switch links learned from neighbor discovery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Which neighbor table a link came from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkProtocol {
  /// Standard LLDP-MIB remote table.
  Lldp,
  /// Vendor-private LLDP table.
  VendorLldp,
}

/// One logical link per unordered device pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyLink {
  pub link_id:          Uuid,
  pub local_device_id:  Uuid,
  pub local_port_id:    Uuid,
  pub remote_device_id: Uuid,
  pub remote_port_id:   Option<Uuid>,
  pub protocol:         LinkProtocol,
  pub discovered_at:    DateTime<Utc>,
  pub last_seen:        DateTime<Utc>,
}

impl TopologyLink {
  /// The unordered device pair, smaller id first.
  pub fn pair(&self) -> (Uuid, Uuid) {
    if self.local_device_id <= self.remote_device_id {
      (self.local_device_id, self.remote_device_id)
    } else {
      (self.remote_device_id, self.local_device_id)
    }
  }

  pub fn involves(&self, device_id: Uuid) -> bool {
    self.local_device_id == device_id || self.remote_device_id == device_id
  }

  /// The port this link uses on `device_id`, if recorded.
  pub fn port_on(&self, device_id: Uuid) -> Option<Uuid> {
    if self.local_device_id == device_id {
      Some(self.local_port_id)
    } else if self.remote_device_id == device_id {
      self.remote_port_id
    } else {
      None
    }
  }

  /// The device at the other end, seen from `device_id`.
  pub fn peer_of(&self, device_id: Uuid) -> Option<Uuid> {
    if self.local_device_id == device_id {
      Some(self.remote_device_id)
    } else if self.remote_device_id == device_id {
      Some(self.local_device_id)
    } else {
      None
    }
  }
}
