//! Managed devices (switches) and their derived system information.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::naming;

/// Device family. Selects object-identifier layouts and CLI grammars.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Dialect {
  #[default]
  Generic,
  Huawei,
  Cisco,
}

/// Facts about a device gathered on every discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
  pub sys_name:   Option<String>,
  pub model:      Option<String>,
  pub serial:     Option<String>,
  pub ports_up:   u32,
  pub ports_down: u32,
  pub vlan_count: u32,
}

/// A managed switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
  pub device_id:      Uuid,
  pub hostname:       String,
  /// Management address used for both SNMP and SSH.
  pub address:        IpAddr,
  pub dialect:        Dialect,
  /// Name of a credential set in configuration; `None` uses the default.
  pub credentials:    Option<String>,
  /// SNMP community override.
  pub community:      Option<String>,
  pub is_active:      bool,
  /// Collect the forwarding table over the CLI when SNMP yields nothing.
  pub ssh_fallback:   bool,
  pub site_code:      Option<String>,
  pub info:           SystemInfo,
  pub created_at:     DateTime<Utc>,
  pub last_seen:      Option<DateTime<Utc>>,
  pub last_discovery: Option<DateTime<Utc>>,
}

/// Input for [`NetworkStore::add_device`](crate::store::NetworkStore::add_device).
#[derive(Debug, Clone)]
pub struct NewDevice {
  pub hostname:     String,
  pub address:      IpAddr,
  pub dialect:      Dialect,
  pub credentials:  Option<String>,
  pub community:    Option<String>,
  pub ssh_fallback: bool,
}

impl NewDevice {
  pub fn new(hostname: impl Into<String>, address: IpAddr) -> Self {
    Self {
      hostname: hostname.into(),
      address,
      dialect: Dialect::Generic,
      credentials: None,
      community: None,
      ssh_fallback: false,
    }
  }

  pub fn with_dialect(mut self, dialect: Dialect) -> Self {
    self.dialect = dialect;
    self
  }

  pub fn with_ssh_fallback(mut self, on: bool) -> Self {
    self.ssh_fallback = on;
    self
  }

  /// Materialise the device record. The site code is derived from the
  /// hostname here, once.
  pub fn into_device(self, device_id: Uuid, created_at: DateTime<Utc>) -> Device {
    let site_code = naming::site_code(&self.hostname);
    Device {
      device_id,
      hostname: self.hostname,
      address: self.address,
      dialect: self.dialect,
      credentials: self.credentials,
      community: self.community,
      is_active: true,
      ssh_fallback: self.ssh_fallback,
      site_code,
      info: SystemInfo::default(),
      created_at,
      last_seen: None,
      last_discovery: None,
    }
  }
}
