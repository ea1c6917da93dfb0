//! Normalized collector output.
//!
//! Whatever the transport (SNMP table walk or CLI text), collectors hand the
//! engine these shapes.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::{MacAddr, naming, port::NeighborType, topology::LinkProtocol};

// ─── Forwarding table ────────────────────────────────────────────────────────

/// One forwarding-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdbRow {
  pub mac:        MacAddr,
  pub port_name:  String,
  /// Interface index when the source knows it, else 0.
  pub port_index: u32,
  pub vlan:       u16,
}

// ─── Capabilities ────────────────────────────────────────────────────────────

/// IEEE 802.1AB system capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(u16);

impl Capabilities {
  pub const OTHER: u16 = 0x0001;
  pub const REPEATER: u16 = 0x0002;
  pub const BRIDGE: u16 = 0x0004;
  pub const WLAN_AP: u16 = 0x0008;
  pub const ROUTER: u16 = 0x0010;
  pub const TELEPHONE: u16 = 0x0020;
  pub const DOCSIS: u16 = 0x0040;
  pub const STATION: u16 = 0x0080;

  pub const fn from_bits(bits: u16) -> Self { Self(bits) }

  pub const fn bits(self) -> u16 { self.0 }

  /// Decode an SNMP `BITS` value (`LldpSystemCapabilitiesMap`). Bit *n* of
  /// the named-bit list is the most significant bit first: octet `n / 8`,
  /// mask `0x80 >> (n % 8)`.
  pub fn from_snmp_bits(octets: &[u8]) -> Self {
    let mut bits = 0u16;
    for n in 0..16usize {
      let Some(octet) = octets.get(n / 8) else { break };
      if octet & (0x80 >> (n % 8)) != 0 {
        bits |= 1 << n;
      }
    }
    Self(bits)
  }

  pub fn contains(self, flag: u16) -> bool { self.0 & flag != 0 }

  pub fn is_empty(self) -> bool { self.0 == 0 }
}

// ─── Neighbor records ────────────────────────────────────────────────────────

/// One remote system seen on one local port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
  /// Local interface index (LLDP `localPortNum`).
  pub local_port_index:        u32,
  pub local_port_name:         Option<String>,
  pub remote_system_name:      Option<String>,
  pub remote_port_id:          Option<String>,
  pub remote_port_description: Option<String>,
  pub remote_chassis_id:       Option<String>,
  pub remote_address:          Option<IpAddr>,
  pub capabilities_supported:  Capabilities,
  pub capabilities_enabled:    Capabilities,
  pub protocol:                LinkProtocol,
}

impl NeighborRecord {
  /// Enabled capabilities, or supported ones when the agent reports none
  /// enabled.
  fn effective_capabilities(&self) -> Capabilities {
    if self.capabilities_enabled.is_empty() {
      self.capabilities_supported
    } else {
      self.capabilities_enabled
    }
  }

  pub fn is_network_device(&self) -> bool {
    let caps = self.effective_capabilities();
    caps.contains(Capabilities::BRIDGE) || caps.contains(Capabilities::ROUTER)
  }

  pub fn is_access_point(&self) -> bool {
    self.effective_capabilities().contains(Capabilities::WLAN_AP)
  }

  pub fn is_phone(&self) -> bool {
    self.effective_capabilities().contains(Capabilities::TELEPHONE)
  }

  /// Phones and access points also advertise the bridge bit, so they are
  /// checked first.
  pub fn neighbor_type(&self) -> NeighborType {
    let caps = self.effective_capabilities();
    if caps.contains(Capabilities::WLAN_AP) {
      NeighborType::AccessPoint
    } else if caps.contains(Capabilities::TELEPHONE) {
      NeighborType::Phone
    } else if caps.contains(Capabilities::ROUTER) {
      NeighborType::Router
    } else if caps.contains(Capabilities::BRIDGE) {
      NeighborType::Switch
    } else if caps.contains(Capabilities::STATION) {
      NeighborType::Station
    } else if self
      .remote_system_name
      .as_deref()
      .is_some_and(naming::looks_like_access_point)
    {
      NeighborType::AccessPoint
    } else {
      NeighborType::Unknown
    }
  }

  /// Best display name for the remote system.
  pub fn display_name(&self) -> Option<&str> {
    self
      .remote_system_name
      .as_deref()
      .or(self.remote_chassis_id.as_deref())
  }
}
