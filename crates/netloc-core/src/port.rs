//! Ports and the roles the classifier assigns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::naming;

/// What sits behind a port.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PortRole {
  /// A true endpoint attachment point.
  Access,
  /// Aggregation-group member or group interface, by name.
  Trunk,
  /// Faces another switch or router.
  Uplink,
  AccessPoint,
  Phone,
}

impl PortRole {
  /// Uplink-class roles carry traffic for many downstream addresses.
  pub fn is_uplink(self) -> bool { matches!(self, Self::Trunk | Self::Uplink) }

  /// The role an interface name alone suggests.
  pub fn from_name(name: &str) -> Self {
    if naming::is_aggregation_name(name) {
      Self::Trunk
    } else {
      Self::Access
    }
  }
}

/// Neighbor type derived from neighbor-discovery capability bits.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NeighborType {
  Switch,
  Router,
  AccessPoint,
  Phone,
  Station,
  Unknown,
}

impl NeighborType {
  /// Unclassifiable neighbors are treated as network gear.
  pub fn implies_uplink(self) -> bool {
    matches!(self, Self::Switch | Self::Router | Self::Unknown)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
  pub port_id:       Uuid,
  pub device_id:     Uuid,
  pub name:          String,
  /// The device's own interface index, or 0 when unknown.
  pub index:         u32,
  pub role:          PortRole,
  pub vlan:          Option<u16>,
  pub neighbor_name: Option<String>,
  pub neighbor_type: Option<NeighborType>,
  /// Current locations on this port, recomputed after each pass.
  pub address_count: u32,
  pub updated_at:    DateTime<Utc>,
}

impl Port {
  /// A freshly sighted port, with its role guessed from the name.
  pub fn new(device_id: Uuid, name: impl Into<String>, index: u32, at: DateTime<Utc>) -> Self {
    let name = name.into();
    Self {
      port_id: Uuid::new_v4(),
      device_id,
      role: PortRole::from_name(&name),
      name,
      index,
      vlan: None,
      neighbor_name: None,
      neighbor_type: None,
      address_count: 0,
      updated_at: at,
    }
  }

  pub fn is_uplink(&self) -> bool { self.role.is_uplink() }

  pub fn normalized_name(&self) -> String { naming::normalize_port_name(&self.name) }

  pub fn has_neighbor(&self) -> bool { self.neighbor_name.is_some() }

  /// Tagged by neighbor discovery as facing a switch or router, whether or
  /// not a topology link was recorded through it.
  pub fn faces_network(&self) -> bool {
    self.role == PortRole::Uplink || self.neighbor_type.is_some_and(NeighborType::implies_uplink)
  }
}
