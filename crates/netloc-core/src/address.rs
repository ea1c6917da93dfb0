//! Addresses, their placements (locations) and the history of transitions.
//!
//! Invariant: at most one [`Location`] per address has `is_current = true`.
//! A superseded location is flipped to not-current and a new row is written;
//! location rows are never re-pointed in place.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{MacAddr, oui::EndpointClass};

/// Global identity of a hardware address, independent of where it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
  pub mac:            MacAddr,
  pub vendor_hint:    Option<String>,
  pub endpoint_class: Option<EndpointClass>,
  pub is_active:      bool,
  pub first_seen:     DateTime<Utc>,
  pub last_seen:      DateTime<Utc>,
}

impl AddressRecord {
  /// A record for an address sighted at `at`, with hints from the endpoint
  /// allow-list.
  pub fn sighted(mac: MacAddr, at: DateTime<Utc>) -> Self {
    let vendor = crate::oui::endpoint_vendor(&mac);
    Self {
      mac,
      vendor_hint: vendor.map(|v| v.vendor.to_owned()),
      endpoint_class: vendor.map(|v| v.class),
      is_active: true,
      first_seen: at,
      last_seen: at,
    }
  }
}

/// One placement of an address on a (device, port, VLAN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  pub location_id: Uuid,
  pub mac:         MacAddr,
  pub device_id:   Uuid,
  pub port_id:     Uuid,
  pub vlan:        u16,
  pub ip:          Option<IpAddr>,
  pub hostname:    Option<String>,
  pub is_current:  bool,
  pub first_seen:  DateTime<Utc>,
  pub last_seen:   DateTime<Utc>,
}

impl Location {
  pub fn new(mac: MacAddr, attachment: Attachment, at: DateTime<Utc>) -> Self {
    Self {
      location_id: Uuid::new_v4(),
      mac,
      device_id: attachment.device_id,
      port_id: attachment.port_id,
      vlan: attachment.vlan,
      ip: None,
      hostname: None,
      is_current: true,
      first_seen: at,
      last_seen: at,
    }
  }

  pub fn attachment(&self) -> Attachment {
    Attachment { device_id: self.device_id, port_id: self.port_id, vlan: self.vlan }
  }

  /// Same device and port, regardless of VLAN.
  pub fn is_at(&self, device_id: Uuid, port_id: Uuid) -> bool {
    self.device_id == device_id && self.port_id == port_id
  }
}

/// The (device, port, VLAN) triple a history event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub device_id: Uuid,
  pub port_id:   Uuid,
  pub vlan:      u16,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  /// The address appeared with no current location.
  New,
  Move,
  Disappear,
}

/// Append-only record of a location transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
  pub event_id:    Uuid,
  pub mac:         MacAddr,
  pub kind:        EventKind,
  pub from:        Option<Attachment>,
  pub to:          Option<Attachment>,
  pub recorded_at: DateTime<Utc>,
}

impl HistoryEvent {
  pub fn new(mac: MacAddr, to: Attachment, at: DateTime<Utc>) -> Self {
    Self::build(mac, EventKind::New, None, Some(to), at)
  }

  pub fn moved(mac: MacAddr, from: Attachment, to: Attachment, at: DateTime<Utc>) -> Self {
    Self::build(mac, EventKind::Move, Some(from), Some(to), at)
  }

  pub fn disappeared(mac: MacAddr, from: Attachment, at: DateTime<Utc>) -> Self {
    Self::build(mac, EventKind::Disappear, Some(from), None, at)
  }

  fn build(
    mac: MacAddr,
    kind: EventKind,
    from: Option<Attachment>,
    to: Option<Attachment>,
    recorded_at: DateTime<Utc>,
  ) -> Self {
    Self { event_id: Uuid::new_v4(), mac, kind, from, to, recorded_at }
  }
}
