//! Per-vendor strategy table.
//!
//! Everything that differs between device families lives here: which
//! forwarding-table layout the SNMP agent exposes, whether a private
//! neighbor table exists, and the CLI command spellings with their output
//! grammars. Collectors and the tracer look a profile up once and never
//! branch on [`Dialect`] themselves.

use netloc_core::{
  MacAddr,
  device::Dialect,
  naming,
  observation::FdbRow,
};

use crate::cli::{self, CliNeighbor};

/// Where the agent publishes learned addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdbLayout {
  /// BRIDGE-MIB / Q-BRIDGE-MIB, indexed by bridge port.
  Bridge,
  /// Huawei `hwDynFdbPort`, indexed by MAC and VLAN, valued by ifIndex.
  /// Falls back to [`FdbLayout::Bridge`] when empty.
  HuaweiDynamic,
}

pub struct DialectProfile {
  dialect:          Dialect,
  fdb_layout:       FdbLayout,
  vendor_lldp:      bool,
  pager_off:        &'static str,
  fdb_commands:     &'static [&'static str],
  fdb_grammar:      fn(&str) -> Vec<FdbRow>,
  lookup_command:   fn(&MacAddr) -> String,
  lookup_grammar:   fn(&str, &MacAddr) -> Option<String>,
  members_command:  fn(u32) -> String,
  members_grammar:  fn(&str) -> Vec<String>,
  neighbor_command: fn(&str) -> String,
  neighbor_grammar: fn(&str) -> Option<CliNeighbor>,
}

impl std::fmt::Debug for DialectProfile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DialectProfile")
      .field("dialect", &self.dialect)
      .field("fdb_layout", &self.fdb_layout)
      .field("vendor_lldp", &self.vendor_lldp)
      .finish_non_exhaustive()
  }
}

impl DialectProfile {
  pub fn dialect(&self) -> Dialect { self.dialect }

  pub fn fdb_layout(&self) -> FdbLayout { self.fdb_layout }

  /// A vendor-private neighbor table is worth walking when the standard
  /// one is empty.
  pub fn has_vendor_lldp(&self) -> bool { self.vendor_lldp }

  /// Disables output paging for the rest of the session.
  pub fn pager_off(&self) -> &'static str { self.pager_off }

  /// Forwarding-table commands, tried in order until one is accepted.
  pub fn fdb_commands(&self) -> &'static [&'static str] { self.fdb_commands }

  pub fn parse_fdb(&self, output: &str) -> Vec<FdbRow> { (self.fdb_grammar)(output) }

  pub fn lookup_command(&self, mac: &MacAddr) -> String { (self.lookup_command)(mac) }

  pub fn parse_lookup(&self, output: &str, mac: &MacAddr) -> Option<String> {
    (self.lookup_grammar)(output, mac)
  }

  pub fn members_command(&self, group: u32) -> String { (self.members_command)(group) }

  pub fn parse_members(&self, output: &str) -> Vec<String> { (self.members_grammar)(output) }

  pub fn neighbor_command(&self, port_name: &str) -> String { (self.neighbor_command)(port_name) }

  pub fn parse_neighbor(&self, output: &str) -> Option<CliNeighbor> {
    (self.neighbor_grammar)(output)
  }
}

// ─── Profiles ────────────────────────────────────────────────────────────────

static HUAWEI: DialectProfile = DialectProfile {
  dialect:          Dialect::Huawei,
  fdb_layout:       FdbLayout::HuaweiDynamic,
  vendor_lldp:      true,
  pager_off:        "screen-length 0 temporary",
  fdb_commands:     &["display mac-address"],
  fdb_grammar:      cli::parse_huawei_fdb,
  lookup_command:   |mac| format!("display mac-address {}", mac.to_dashed_quads()),
  lookup_grammar:   cli::parse_huawei_lookup,
  members_command:  |group| format!("display eth-trunk {group}"),
  members_grammar:  cli::parse_huawei_members,
  neighbor_command: |port| {
    format!("display lldp neighbor interface {}", naming::expand_port_name(port))
  },
  neighbor_grammar: cli::parse_huawei_neighbor,
};

static CISCO: DialectProfile = DialectProfile {
  dialect:          Dialect::Cisco,
  fdb_layout:       FdbLayout::Bridge,
  vendor_lldp:      false,
  pager_off:        "terminal length 0",
  fdb_commands:     &["show mac address-table"],
  fdb_grammar:      cli::parse_cisco_fdb,
  lookup_command:   |mac| format!("show mac address-table address {}", mac.to_dotted_quads()),
  lookup_grammar:   cli::parse_cisco_lookup,
  members_command:  |group| format!("show etherchannel {group} port"),
  members_grammar:  cli::parse_cisco_members,
  neighbor_command: |port| format!("show lldp neighbors {port} detail"),
  neighbor_grammar: cli::parse_cisco_neighbor,
};

/// Unknown families: Cisco-style commands plus the spellings other vendors
/// use. Output goes through each vendor grammar before the line-oriented
/// fallback.
static GENERIC: DialectProfile = DialectProfile {
  dialect:          Dialect::Generic,
  fdb_layout:       FdbLayout::Bridge,
  vendor_lldp:      false,
  pager_off:        "terminal length 0",
  fdb_commands:     &["show mac address-table", "display mac-address", "show mac-address-table"],
  fdb_grammar:      generic_fdb,
  lookup_command:   |mac| format!("show mac address-table address {}", mac.to_dotted_quads()),
  lookup_grammar:   generic_lookup,
  members_command:  |group| format!("show etherchannel {group} port"),
  members_grammar:  cli::parse_cisco_members,
  neighbor_command: |port| format!("show lldp neighbors {port} detail"),
  neighbor_grammar: cli::parse_cisco_neighbor,
};

fn generic_fdb(output: &str) -> Vec<FdbRow> {
  let rows = cli::parse_cisco_fdb(output);
  if !rows.is_empty() {
    return rows;
  }
  let rows = cli::parse_huawei_fdb(output);
  if !rows.is_empty() {
    return rows;
  }
  cli::parse_generic_fdb(output)
}

fn generic_lookup(output: &str, mac: &MacAddr) -> Option<String> {
  generic_fdb(output)
    .into_iter()
    .find(|row| row.mac == *mac)
    .map(|row| row.port_name)
}

pub fn profile(dialect: Dialect) -> &'static DialectProfile {
  match dialect {
    Dialect::Huawei => &HUAWEI,
    Dialect::Cisco => &CISCO,
    Dialect::Generic => &GENERIC,
  }
}
