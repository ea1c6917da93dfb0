//! Per-device discovery log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// How the forwarding table was obtained.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryMethod {
  Snmp,
  Cli,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryStatus {
  Success,
  Failed,
  Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryLog {
  pub log_id:        Uuid,
  pub device_id:     Uuid,
  pub method:        DiscoveryMethod,
  pub status:        DiscoveryStatus,
  pub address_count: u32,
  pub error:         Option<String>,
  pub started_at:    DateTime<Utc>,
  pub completed_at:  DateTime<Utc>,
  pub duration_ms:   i64,
}

impl DiscoveryLog {
  pub fn finished(
    device_id: Uuid,
    method: DiscoveryMethod,
    status: DiscoveryStatus,
    address_count: u32,
    error: Option<String>,
    started_at: DateTime<Utc>,
  ) -> Self {
    let completed_at = Utc::now();
    Self {
      log_id: Uuid::new_v4(),
      device_id,
      method,
      status,
      address_count,
      error,
      started_at,
      completed_at,
      duration_ms: (completed_at - started_at).num_milliseconds(),
    }
  }
}
