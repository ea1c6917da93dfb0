//! Naming conventions: interface names, aggregation groups, site codes.
//!
//! The same physical interface shows up as `XGigabitEthernet1/0/1` in one
//! table and `XGE1/0/1` in another. [`normalize_port_name`] folds those
//! spellings into one key so ports can be matched across collection paths.

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
  let head = s.get(..prefix.len())?;
  head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn starts_with_digit(s: &str) -> bool {
  s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

// ─── Port names ──────────────────────────────────────────────────────────────

/// Fold vendor spellings of an interface name into a short canonical key.
///
/// ```
/// use netloc_core::naming::normalize_port_name;
/// assert_eq!(normalize_port_name("XGigabitEthernet1/0/8"), "XGE1/0/8");
/// assert_eq!(normalize_port_name("Gi0/0/3"), "GE0/0/3");
/// assert_eq!(normalize_port_name("Eth-Trunk 81"), "Eth-Trunk81");
/// ```
pub fn normalize_port_name(name: &str) -> String {
  let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
  let s = compact.as_str();

  if let Some(rest) = strip_prefix_ci(s, "XGigabitEthernet") {
    return format!("XGE{rest}");
  }
  if let Some(rest) = strip_prefix_ci(s, "XGi")
    && starts_with_digit(rest)
  {
    return format!("XGE{rest}");
  }
  if let Some(rest) = strip_prefix_ci(s, "10GE")
    && starts_with_digit(rest)
  {
    return format!("XGE{rest}");
  }
  if let Some(rest) = strip_prefix_ci(s, "GigabitEthernet") {
    return format!("GE{rest}");
  }
  if let Some(rest) = strip_prefix_ci(s, "Gi")
    && starts_with_digit(rest)
  {
    return format!("GE{rest}");
  }
  if let Some(rest) = strip_prefix_ci(s, "Eth-Trunk") {
    return format!("Eth-Trunk{rest}");
  }
  compact
}

/// Two names refer to the same interface once normalized.
pub fn same_port(a: &str, b: &str) -> bool {
  normalize_port_name(a) == normalize_port_name(b)
}

/// Expand a short interface name into the long form some CLIs insist on
/// (`XGE1/0/1` → `XGigabitEthernet1/0/1`).
pub fn expand_port_name(name: &str) -> String {
  if let Some(rest) = strip_prefix_ci(name, "XGE")
    && starts_with_digit(rest)
  {
    return format!("XGigabitEthernet{rest}");
  }
  if let Some(rest) = strip_prefix_ci(name, "GE")
    && starts_with_digit(rest)
  {
    return format!("GigabitEthernet{rest}");
  }
  name.to_owned()
}

const AGGREGATION_PREFIXES: &[&str] = &[
  "eth-trunk",
  "trunk",
  "port-channel",
  "bridge-aggregation",
  "lag",
  "bond",
  "agg",
];

/// Whether an interface name denotes a link-aggregation group.
pub fn is_aggregation_name(name: &str) -> bool {
  let lower = name.trim().to_ascii_lowercase();
  if AGGREGATION_PREFIXES.iter().any(|p| lower.starts_with(p)) {
    return true;
  }
  ["po", "ae"].iter().any(|p| {
    lower
      .strip_prefix(p)
      .is_some_and(starts_with_digit)
  })
}

/// The trailing number of an interface name (`Eth-Trunk81` → 81,
/// `GE0/0/5` → 5).
pub fn trailing_number(name: &str) -> Option<u32> {
  let trimmed = name.trim_end();
  let digits_start = trimmed
    .char_indices()
    .rev()
    .take_while(|(_, c)| c.is_ascii_digit())
    .last()
    .map(|(i, _)| i)?;
  trimmed[digits_start..].parse().ok()
}

// ─── Hostnames ───────────────────────────────────────────────────────────────

/// Site code encoded as a numeric hostname prefix (`07_L2_RACK01` → `07`).
pub fn site_code(hostname: &str) -> Option<String> {
  let digits: String = hostname
    .chars()
    .take_while(|c| c.is_ascii_digit())
    .collect();
  if digits.is_empty() {
    return None;
  }
  hostname[digits.len()..]
    .starts_with('_')
    .then_some(digits)
}

/// Case-insensitive check for any of `markers` inside `hostname`.
pub fn has_marker(hostname: &str, markers: &[String]) -> bool {
  let lower = hostname.to_ascii_lowercase();
  markers
    .iter()
    .any(|m| lower.contains(&m.to_ascii_lowercase()))
}

/// Access points that advertise no capability bits are usually still named
/// like one (`FLOOR2-AP03`, `AP1_LOBBY`).
pub fn looks_like_access_point(system_name: &str) -> bool {
  let upper = system_name.to_ascii_uppercase();
  if upper.contains("-AP") || upper.contains("_AP") {
    return true;
  }
  upper
    .strip_prefix("AP")
    .is_some_and(starts_with_digit)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalizes_vendor_spellings() {
    assert_eq!(normalize_port_name("XGigabitEthernet1/0/8"), "XGE1/0/8");
    assert_eq!(normalize_port_name("XGi1/0/8"), "XGE1/0/8");
    assert_eq!(normalize_port_name("10GE1/0/8"), "XGE1/0/8");
    assert_eq!(normalize_port_name("GigabitEthernet0/0/1"), "GE0/0/1");
    assert_eq!(normalize_port_name("Gi0/0/1"), "GE0/0/1");
    assert_eq!(normalize_port_name("Eth-Trunk 81"), "Eth-Trunk81");
    assert_eq!(normalize_port_name("GE0/0/1"), "GE0/0/1");
    assert_eq!(normalize_port_name("Port12"), "Port12");
  }

  #[test]
  fn equivalent_names_match() {
    assert!(same_port("XGigabitEthernet2/0/1", "XGE2/0/1"));
    assert!(!same_port("GE0/0/1", "GE0/0/2"));
  }

  #[test]
  fn expands_short_forms() {
    assert_eq!(expand_port_name("XGE2/0/1"), "XGigabitEthernet2/0/1");
    assert_eq!(expand_port_name("GE0/0/1"), "GigabitEthernet0/0/1");
    assert_eq!(expand_port_name("Eth-Trunk1"), "Eth-Trunk1");
  }

  #[test]
  fn recognises_aggregation_groups() {
    for name in ["Eth-Trunk81", "Port-channel1", "Po12", "ae0", "Agg1", "bond0", "LAG3"] {
      assert!(is_aggregation_name(name), "{name}");
    }
    for name in ["GE0/0/1", "Gi1/0/48", "Port7", "power1", "aeth1"] {
      assert!(!is_aggregation_name(name), "{name}");
    }
  }

  #[test]
  fn extracts_trailing_number() {
    assert_eq!(trailing_number("Eth-Trunk81"), Some(81));
    assert_eq!(trailing_number("GE0/0/5"), Some(5));
    assert_eq!(trailing_number("mgmt"), None);
  }

  #[test]
  fn site_code_requires_underscore() {
    assert_eq!(site_code("07_L2_RACK01"), Some("07".into()));
    assert_eq!(site_code("123_core"), Some("123".into()));
    assert_eq!(site_code("07-L2"), None);
    assert_eq!(site_code("core_07"), None);
  }

  #[test]
  fn access_point_name_patterns() {
    assert!(looks_like_access_point("FLOOR2-AP03"));
    assert!(looks_like_access_point("lobby_ap"));
    assert!(looks_like_access_point("AP1-LOBBY"));
    assert!(!looks_like_access_point("APC-UPS"));
    assert!(!looks_like_access_point("07_L2_RACK01"));
  }
}
