//! Engine configuration.
//!
//! Every field has a default, so an empty `[engine]` table is valid.

use netloc_device::{snmp::SnmpSettings, ssh::SshSettings};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Devices discovered at the same time.
  pub concurrency:               usize,
  /// Wall-clock cap on one device's pass.
  pub device_timeout_secs:       u64,
  pub snmp:                      SnmpSettings,
  pub ssh:                       SshSettings,
  pub trace:                     TraceConfig,
  pub scoring:                   ScoringConfig,
  /// Access ports holding more addresses than this are reported as likely
  /// unmapped uplinks.
  pub unmapped_uplink_threshold: u32,
  /// How many of the best-connected devices count as core.
  pub graph_core_count:          usize,
  /// Addresses unseen for this long are marked inactive after a run.
  pub address_retention_days:    i64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      concurrency:               8,
      device_timeout_secs:       120,
      snmp:                      SnmpSettings::default(),
      ssh:                       SshSettings::default(),
      trace:                     TraceConfig::default(),
      scoring:                   ScoringConfig::default(),
      unmapped_uplink_threshold: 10,
      graph_core_count:          5,
      address_retention_days:    90,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
  /// Devices a live trace may visit.
  pub max_hops:     usize,
  /// Hostname fragments that mark a core switch (case-insensitive).
  pub core_markers: Vec<String>,
}

impl Default for TraceConfig {
  fn default() -> Self {
    Self { max_hops: 10, core_markers: vec!["L3".to_owned(), "core".to_owned()] }
  }
}

/// Weights for offline endpoint scoring. The defaults were tuned against
/// one campus; expect to adjust them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  pub trunk_penalty:                i32,
  pub no_link_bonus:                i32,
  pub neighbor_lacks_address_bonus: i32,
  pub neighbor_has_address_penalty: i32,
  /// Above this many addresses the score is forced to `high_count_score`.
  pub high_count_threshold:         u32,
  pub high_count_score:             i32,
  pub mid_count_threshold:          u32,
  pub mid_count_penalty:            i32,
  pub low_count_threshold:          u32,
  pub low_count_penalty:            i32,
  /// At or below this many addresses the port earns `low_count_bonus`.
  pub bonus_count_ceiling:          u32,
  pub low_count_bonus:              i32,
  pub default_count_bonus:          i32,
  pub core_name_penalty:            i32,
  pub access_name_bonus:            i32,
  /// Hostname fragments that mark an access switch (case-insensitive).
  pub access_markers:               Vec<String>,
  /// Candidates at or below this score are disqualified.
  pub disqualify_floor:             i32,
  /// Candidates above this score are confirmed endpoints.
  pub endpoint_threshold:           i32,
  /// A quiet edge port that saw the address within this many hours wins
  /// before any scoring.
  pub recent_window_hours:          i64,
  pub recent_max_addresses:         u32,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      trunk_penalty:                -1000,
      no_link_bonus:                100,
      neighbor_lacks_address_bonus: 80,
      neighbor_has_address_penalty: -50,
      high_count_threshold:         50,
      high_count_score:             -800,
      mid_count_threshold:          20,
      mid_count_penalty:            -150,
      low_count_threshold:          5,
      low_count_penalty:            -50,
      bonus_count_ceiling:          3,
      low_count_bonus:              50,
      default_count_bonus:          20,
      core_name_penalty:            -10,
      access_name_bonus:            10,
      access_markers:               vec!["L2".to_owned()],
      disqualify_floor:             -500,
      endpoint_threshold:           50,
      recent_window_hours:          24,
      recent_max_addresses:         3,
    }
  }
}
