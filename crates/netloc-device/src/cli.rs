//! Output grammars for switch command lines.
//!
//! Every parser is pure: text in, normalized rows out. Lines that do not
//! fit the grammar are skipped rather than failing the whole output, since
//! banners, pager residue and headers vary across firmware releases.

use std::sync::LazyLock;

use netloc_core::{MacAddr, observation::FdbRow};
use regex::Regex;

/// Any of the common hardware-address spellings.
static MAC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)\b([0-9a-f]{4}[.-][0-9a-f]{4}[.-][0-9a-f]{4}|[0-9a-f]{2}(?:[:-][0-9a-f]{2}){5})\b",
  )
  .expect("valid regex")
});

static CISCO_MEMBER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)^\s*Port:\s*(\S+)").expect("valid regex"));

/// A neighbor reported on one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliNeighbor {
  pub system_name: String,
  pub port_id:     Option<String>,
}

/// The first hardware address in `line`.
pub fn find_mac(line: &str) -> Option<MacAddr> {
  MAC_TOKEN
    .captures(line)
    .and_then(|c| MacAddr::parse(&c[1]).ok())
}

/// Whether the device rejected the command rather than answering it.
pub fn is_rejection(output: &str) -> bool {
  output.lines().any(|line| {
    let line = line.trim_start();
    line.starts_with('%')
      || line.starts_with("Error")
      || line.contains("Unrecognized command")
      || line.contains("Invalid input")
  })
}

fn is_rule_or_blank(line: &str) -> bool { line.is_empty() || line.starts_with('-') }

fn fdb_row(mac: MacAddr, port_name: &str, vlan: u16) -> Option<FdbRow> {
  mac.is_usable().then(|| FdbRow {
    mac,
    port_name: port_name.to_owned(),
    // Trailing numbers repeat across slots; ports from text are matched by
    // name instead.
    port_index: 0,
    vlan,
  })
}

// ─── Forwarding-table dumps ──────────────────────────────────────────────────

/// `display mac-address`:
///
/// ```text
/// MAC Address       VLAN/VSI/BD  Learned-From  Type
/// 0000-5e00-0101    100/-/-      GE1/0/1       dynamic
/// ```
pub fn parse_huawei_fdb(output: &str) -> Vec<FdbRow> {
  output
    .lines()
    .map(str::trim)
    .filter(|l| !is_rule_or_blank(l) && !l.contains("MAC Address"))
    .filter_map(|line| {
      let parts: Vec<&str> = line.split_whitespace().collect();
      let [mac, vlan, port, kind, ..] = parts.as_slice() else { return None };
      if kind.eq_ignore_ascii_case("static") || kind.eq_ignore_ascii_case("system") {
        return None;
      }
      let mac = MacAddr::parse(mac).ok()?;
      let vlan = vlan
        .split('/')
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
      fdb_row(mac, port, vlan)
    })
    .collect()
}

/// `show mac address-table`:
///
/// ```text
/// Vlan    Mac Address       Type        Ports
///  100    0000.5e00.0101    DYNAMIC     Gi0/1
/// ```
pub fn parse_cisco_fdb(output: &str) -> Vec<FdbRow> {
  output
    .lines()
    .map(str::trim)
    .filter(|l| !is_rule_or_blank(l) && !l.contains("Mac Address") && !l.contains("Vlan"))
    .filter_map(|line| {
      let parts: Vec<&str> = line.split_whitespace().collect();
      let [vlan, mac, kind, port, ..] = parts.as_slice() else { return None };
      let vlan: u16 = vlan.parse().ok()?;
      if kind.eq_ignore_ascii_case("static") {
        return None;
      }
      let mac = MacAddr::parse(mac).ok()?;
      fdb_row(mac, port, vlan)
    })
    .collect()
}

/// Any table with one address per line: the port is the last token that
/// looks like an interface, the VLAN the last number in range.
pub fn parse_generic_fdb(output: &str) -> Vec<FdbRow> {
  const PORT_HINTS: [&str; 5] = ["gi", "ge", "fa", "eth", "port"];

  output
    .lines()
    .filter_map(|line| {
      let mac = find_mac(line)?;
      let mut port = "Unknown";
      let mut vlan = 1u16;
      for token in line.split_whitespace() {
        if MAC_TOKEN.is_match(token) {
          continue;
        }
        let lower = token.to_ascii_lowercase();
        if PORT_HINTS.iter().any(|hint| lower.contains(hint)) {
          port = token;
        }
        if let Ok(n) = token.parse::<u16>()
          && (1..=4095).contains(&n)
        {
          vlan = n;
        }
      }
      fdb_row(mac, port, vlan)
    })
    .collect()
}

// ─── Single-address lookup ───────────────────────────────────────────────────

/// `display mac-address aabb-ccdd-eeff`: the port is the third column of
/// the line carrying the address.
pub fn parse_huawei_lookup(output: &str, mac: &MacAddr) -> Option<String> {
  lookup_column(output, mac, 2)
}

/// `show mac address-table address aabb.ccdd.eeff`: fourth column.
pub fn parse_cisco_lookup(output: &str, mac: &MacAddr) -> Option<String> {
  lookup_column(output, mac, 3)
}

fn lookup_column(output: &str, mac: &MacAddr, column: usize) -> Option<String> {
  output
    .lines()
    .map(str::trim)
    .filter(|l| !is_rule_or_blank(l))
    .find(|line| find_mac(line) == Some(*mac))
    .and_then(|line| line.split_whitespace().nth(column))
    .map(str::to_owned)
}

// ─── Aggregation members ─────────────────────────────────────────────────────

/// `display eth-trunk N`: rows after the `PortName  Status  Weight` header.
pub fn parse_huawei_members(output: &str) -> Vec<String> {
  let mut members = Vec::new();
  let mut in_ports = false;
  for line in output.lines().map(str::trim) {
    if line.contains("PortName") && line.contains("Status") {
      in_ports = true;
      continue;
    }
    if !in_ports {
      continue;
    }
    if let Some(first) = line.split_whitespace().next()
      && (first.contains("Ethernet") || first.contains("XGE") || first.contains("GE"))
    {
      members.push(first.to_owned());
    }
  }
  members
}

/// `show etherchannel N port`: one `Port: Gi1/0/1` line per member.
pub fn parse_cisco_members(output: &str) -> Vec<String> {
  output
    .lines()
    .filter_map(|line| CISCO_MEMBER.captures(line))
    .map(|c| c[1].to_owned())
    .collect()
}

// ─── Neighbor on interface ───────────────────────────────────────────────────

/// `display lldp neighbor interface <if>`:
///
/// ```text
///   System name     :07_L2_RACK01
///   Port ID subtype :Interface name
///   Port ID         :XGigabitEthernet0/0/50
/// ```
pub fn parse_huawei_neighbor(output: &str) -> Option<CliNeighbor> {
  parse_neighbor(output, "System name", "Port ID")
}

/// `show lldp neighbors <if> detail`: `System Name: X` and `Port id: Y`.
pub fn parse_cisco_neighbor(output: &str) -> Option<CliNeighbor> {
  parse_neighbor(output, "System Name", "Port id")
}

fn parse_neighbor(output: &str, name_key: &str, port_key: &str) -> Option<CliNeighbor> {
  let mut system_name = None;
  let mut port_id = None;
  for line in output.lines().map(str::trim) {
    let Some((key, value)) = line.split_once(':') else { continue };
    let key = key.trim();
    let value = value.trim();
    if value.is_empty() {
      continue;
    }
    if key.eq_ignore_ascii_case(name_key) && system_name.is_none() {
      system_name = Some(value.to_owned());
    } else if key.eq_ignore_ascii_case(port_key) && port_id.is_none() {
      port_id = Some(value.to_owned());
    }
  }
  system_name.map(|system_name| CliNeighbor { system_name, port_id })
}
