//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so that lexical order equals chronological order. Enum discriminants use
//! their `snake_case` names. UUIDs are hyphenated lowercase strings.

use std::{net::IpAddr, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use netloc_core::{
  MacAddr,
  address::{AddressRecord, Attachment, HistoryEvent, Location},
  device::{Device, SystemInfo},
  discovery::DiscoveryLog,
  port::Port,
  topology::TopologyLink,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

/// Parse a `snake_case` discriminant column.
pub fn decode_enum<T: FromStr>(kind: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {kind}: {s:?}")))
}

pub fn decode_ip(s: &str) -> Result<IpAddr> {
  s.parse()
    .map_err(|_| Error::Decode(format!("bad ip address: {s:?}")))
}

pub fn decode_mac(s: &str) -> Result<MacAddr> { Ok(MacAddr::parse(s)?) }

fn decode_vlan(v: Option<i64>) -> Option<u16> { v.and_then(|v| u16::try_from(v).ok()) }

// ─── Column lists ────────────────────────────────────────────────────────────

pub const DEVICE_COLUMNS: &str = "device_id, hostname, address, dialect, credentials, \
   community, is_active, ssh_fallback, site_code, info_json, created_at, last_seen, \
   last_discovery";

pub const PORT_COLUMNS: &str = "port_id, device_id, name, port_index, role, vlan, \
   neighbor_name, neighbor_type, address_count, updated_at";

pub const ADDRESS_COLUMNS: &str =
  "mac, vendor_hint, endpoint_class, is_active, first_seen, last_seen";

pub const LOCATION_COLUMNS: &str = "location_id, mac, device_id, port_id, vlan, ip, \
   hostname, is_current, first_seen, last_seen";

pub const HISTORY_COLUMNS: &str = "event_id, mac, kind, from_device_id, from_port_id, \
   from_vlan, to_device_id, to_port_id, to_vlan, recorded_at";

pub const LINK_COLUMNS: &str = "link_id, local_device_id, local_port_id, \
   remote_device_id, remote_port_id, protocol, discovered_at, last_seen";

pub const LOG_COLUMNS: &str = "log_id, device_id, method, status, address_count, error, \
   started_at, completed_at, duration_ms";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `devices` row.
pub struct RawDevice {
  pub device_id:      String,
  pub hostname:       String,
  pub address:        String,
  pub dialect:        String,
  pub credentials:    Option<String>,
  pub community:      Option<String>,
  pub is_active:      bool,
  pub ssh_fallback:   bool,
  pub site_code:      Option<String>,
  pub info_json:      String,
  pub created_at:     String,
  pub last_seen:      Option<String>,
  pub last_discovery: Option<String>,
}

impl RawDevice {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      device_id:      row.get(0)?,
      hostname:       row.get(1)?,
      address:        row.get(2)?,
      dialect:        row.get(3)?,
      credentials:    row.get(4)?,
      community:      row.get(5)?,
      is_active:      row.get(6)?,
      ssh_fallback:   row.get(7)?,
      site_code:      row.get(8)?,
      info_json:      row.get(9)?,
      created_at:     row.get(10)?,
      last_seen:      row.get(11)?,
      last_discovery: row.get(12)?,
    })
  }

  pub fn into_device(self) -> Result<Device> {
    let info: SystemInfo = serde_json::from_str(&self.info_json)?;
    Ok(Device {
      device_id: decode_uuid(&self.device_id)?,
      hostname: self.hostname,
      address: decode_ip(&self.address)?,
      dialect: decode_enum("dialect", &self.dialect)?,
      credentials: self.credentials,
      community: self.community,
      is_active: self.is_active,
      ssh_fallback: self.ssh_fallback,
      site_code: self.site_code,
      info,
      created_at: decode_dt(&self.created_at)?,
      last_seen: decode_opt_dt(self.last_seen)?,
      last_discovery: decode_opt_dt(self.last_discovery)?,
    })
  }
}

pub struct RawPort {
  pub port_id:       String,
  pub device_id:     String,
  pub name:          String,
  pub port_index:    i64,
  pub role:          String,
  pub vlan:          Option<i64>,
  pub neighbor_name: Option<String>,
  pub neighbor_type: Option<String>,
  pub address_count: i64,
  pub updated_at:    String,
}

impl RawPort {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      port_id:       row.get(0)?,
      device_id:     row.get(1)?,
      name:          row.get(2)?,
      port_index:    row.get(3)?,
      role:          row.get(4)?,
      vlan:          row.get(5)?,
      neighbor_name: row.get(6)?,
      neighbor_type: row.get(7)?,
      address_count: row.get(8)?,
      updated_at:    row.get(9)?,
    })
  }

  pub fn into_port(self) -> Result<Port> {
    Ok(Port {
      port_id:       decode_uuid(&self.port_id)?,
      device_id:     decode_uuid(&self.device_id)?,
      name:          self.name,
      index:         u32::try_from(self.port_index).unwrap_or(0),
      role:          decode_enum("port role", &self.role)?,
      vlan:          decode_vlan(self.vlan),
      neighbor_name: self.neighbor_name,
      neighbor_type: self
        .neighbor_type
        .as_deref()
        .map(|s| decode_enum("neighbor type", s))
        .transpose()?,
      address_count: u32::try_from(self.address_count).unwrap_or(0),
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawAddress {
  pub mac:            String,
  pub vendor_hint:    Option<String>,
  pub endpoint_class: Option<String>,
  pub is_active:      bool,
  pub first_seen:     String,
  pub last_seen:      String,
}

impl RawAddress {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      mac:            row.get(0)?,
      vendor_hint:    row.get(1)?,
      endpoint_class: row.get(2)?,
      is_active:      row.get(3)?,
      first_seen:     row.get(4)?,
      last_seen:      row.get(5)?,
    })
  }

  pub fn into_address(self) -> Result<AddressRecord> {
    Ok(AddressRecord {
      mac:            decode_mac(&self.mac)?,
      vendor_hint:    self.vendor_hint,
      endpoint_class: self
        .endpoint_class
        .as_deref()
        .map(|s| decode_enum("endpoint class", s))
        .transpose()?,
      is_active:      self.is_active,
      first_seen:     decode_dt(&self.first_seen)?,
      last_seen:      decode_dt(&self.last_seen)?,
    })
  }
}

pub struct RawLocation {
  pub location_id: String,
  pub mac:         String,
  pub device_id:   String,
  pub port_id:     String,
  pub vlan:        i64,
  pub ip:          Option<String>,
  pub hostname:    Option<String>,
  pub is_current:  bool,
  pub first_seen:  String,
  pub last_seen:   String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      location_id: row.get(0)?,
      mac:         row.get(1)?,
      device_id:   row.get(2)?,
      port_id:     row.get(3)?,
      vlan:        row.get(4)?,
      ip:          row.get(5)?,
      hostname:    row.get(6)?,
      is_current:  row.get(7)?,
      first_seen:  row.get(8)?,
      last_seen:   row.get(9)?,
    })
  }

  pub fn into_location(self) -> Result<Location> {
    Ok(Location {
      location_id: decode_uuid(&self.location_id)?,
      mac:         decode_mac(&self.mac)?,
      device_id:   decode_uuid(&self.device_id)?,
      port_id:     decode_uuid(&self.port_id)?,
      vlan:        u16::try_from(self.vlan).unwrap_or(1),
      ip:          self.ip.as_deref().map(decode_ip).transpose()?,
      hostname:    self.hostname,
      is_current:  self.is_current,
      first_seen:  decode_dt(&self.first_seen)?,
      last_seen:   decode_dt(&self.last_seen)?,
    })
  }
}

pub struct RawEvent {
  pub event_id:       String,
  pub mac:            String,
  pub kind:           String,
  pub from_device_id: Option<String>,
  pub from_port_id:   Option<String>,
  pub from_vlan:      Option<i64>,
  pub to_device_id:   Option<String>,
  pub to_port_id:     Option<String>,
  pub to_vlan:        Option<i64>,
  pub recorded_at:    String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:       row.get(0)?,
      mac:            row.get(1)?,
      kind:           row.get(2)?,
      from_device_id: row.get(3)?,
      from_port_id:   row.get(4)?,
      from_vlan:      row.get(5)?,
      to_device_id:   row.get(6)?,
      to_port_id:     row.get(7)?,
      to_vlan:        row.get(8)?,
      recorded_at:    row.get(9)?,
    })
  }

  pub fn into_event(self) -> Result<HistoryEvent> {
    let from = attachment(self.from_device_id, self.from_port_id, self.from_vlan)?;
    let to = attachment(self.to_device_id, self.to_port_id, self.to_vlan)?;
    Ok(HistoryEvent {
      event_id: decode_uuid(&self.event_id)?,
      mac: decode_mac(&self.mac)?,
      kind: decode_enum("event kind", &self.kind)?,
      from,
      to,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

fn attachment(
  device: Option<String>,
  port: Option<String>,
  vlan: Option<i64>,
) -> Result<Option<Attachment>> {
  match (decode_opt_uuid(device)?, decode_opt_uuid(port)?) {
    (Some(device_id), Some(port_id)) => Ok(Some(Attachment {
      device_id,
      port_id,
      vlan: decode_vlan(vlan).unwrap_or(1),
    })),
    _ => Ok(None),
  }
}

/// Split an optional attachment into its three nullable columns.
pub fn encode_attachment(a: Option<Attachment>) -> (Option<String>, Option<String>, Option<i64>) {
  match a {
    Some(a) => (
      Some(encode_uuid(a.device_id)),
      Some(encode_uuid(a.port_id)),
      Some(i64::from(a.vlan)),
    ),
    None => (None, None, None),
  }
}

pub struct RawLink {
  pub link_id:          String,
  pub local_device_id:  String,
  pub local_port_id:    String,
  pub remote_device_id: String,
  pub remote_port_id:   Option<String>,
  pub protocol:         String,
  pub discovered_at:    String,
  pub last_seen:        String,
}

impl RawLink {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      link_id:          row.get(0)?,
      local_device_id:  row.get(1)?,
      local_port_id:    row.get(2)?,
      remote_device_id: row.get(3)?,
      remote_port_id:   row.get(4)?,
      protocol:         row.get(5)?,
      discovered_at:    row.get(6)?,
      last_seen:        row.get(7)?,
    })
  }

  pub fn into_link(self) -> Result<TopologyLink> {
    Ok(TopologyLink {
      link_id:          decode_uuid(&self.link_id)?,
      local_device_id:  decode_uuid(&self.local_device_id)?,
      local_port_id:    decode_uuid(&self.local_port_id)?,
      remote_device_id: decode_uuid(&self.remote_device_id)?,
      remote_port_id:   decode_opt_uuid(self.remote_port_id)?,
      protocol:         decode_enum("link protocol", &self.protocol)?,
      discovered_at:    decode_dt(&self.discovered_at)?,
      last_seen:        decode_dt(&self.last_seen)?,
    })
  }
}

pub struct RawLog {
  pub log_id:        String,
  pub device_id:     String,
  pub method:        String,
  pub status:        String,
  pub address_count: i64,
  pub error:         Option<String>,
  pub started_at:    String,
  pub completed_at:  String,
  pub duration_ms:   i64,
}

impl RawLog {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      log_id:        row.get(0)?,
      device_id:     row.get(1)?,
      method:        row.get(2)?,
      status:        row.get(3)?,
      address_count: row.get(4)?,
      error:         row.get(5)?,
      started_at:    row.get(6)?,
      completed_at:  row.get(7)?,
      duration_ms:   row.get(8)?,
    })
  }

  pub fn into_log(self) -> Result<DiscoveryLog> {
    Ok(DiscoveryLog {
      log_id:        decode_uuid(&self.log_id)?,
      device_id:     decode_uuid(&self.device_id)?,
      method:        decode_enum("discovery method", &self.method)?,
      status:        decode_enum("discovery status", &self.status)?,
      address_count: u32::try_from(self.address_count).unwrap_or(0),
      error:         self.error,
      started_at:    decode_dt(&self.started_at)?,
      completed_at:  decode_dt(&self.completed_at)?,
      duration_ms:   self.duration_ms,
    })
  }
}
