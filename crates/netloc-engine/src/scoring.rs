//! Offline endpoint scoring.
//!
//! Every historical placement of an address is a candidate. A score is a
//! sum of weighted facts about the candidate port; the weights live in
//! [`ScoringConfig`] and each applied weight is reported as a [`Reason`].

use netloc_core::naming;
use serde::Serialize;

use crate::config::ScoringConfig;

/// What is known about one candidate `(device, port)`.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFacts<'a> {
  pub hostname:              &'a str,
  pub port_name:             &'a str,
  /// A topology link leaves the device through this port.
  pub has_link:              bool,
  /// The device across that link has also placed the address. Ignored
  /// without a link.
  pub neighbor_sees_address: bool,
  /// Distinct addresses ever placed on the port.
  pub address_count:         u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reason {
  pub label: &'static str,
  pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Score {
  pub value:   i32,
  pub reasons: Vec<Reason>,
}

impl Score {
  fn add(&mut self, label: &'static str, delta: i32) {
    self.value += delta;
    self.reasons.push(Reason { label, delta });
  }
}

pub fn score(facts: &CandidateFacts<'_>, cfg: &ScoringConfig, core_markers: &[String]) -> Score {
  let mut s = Score { value: 0, reasons: Vec::new() };

  if naming::is_aggregation_name(facts.port_name) {
    s.add("trunk_port", cfg.trunk_penalty);
    return s;
  }

  if !facts.has_link {
    s.add("no_neighbor_link", cfg.no_link_bonus);
  } else if facts.neighbor_sees_address {
    s.add("neighbor_has_address", cfg.neighbor_has_address_penalty);
  } else {
    s.add("neighbor_lacks_address", cfg.neighbor_lacks_address_bonus);
  }

  let count = facts.address_count;
  if count > cfg.high_count_threshold {
    let forced = cfg.high_count_score - s.value;
    s.add("high_address_count", forced);
    return s;
  } else if count > cfg.mid_count_threshold {
    s.add("mid_address_count", cfg.mid_count_penalty);
  } else if count > cfg.low_count_threshold {
    s.add("low_address_count", cfg.low_count_penalty);
  } else if count <= cfg.bonus_count_ceiling {
    s.add("few_addresses", cfg.low_count_bonus);
  } else {
    s.add("some_addresses", cfg.default_count_bonus);
  }

  if naming::has_marker(facts.hostname, core_markers) {
    s.add("core_hostname", cfg.core_name_penalty);
  } else if naming::has_marker(facts.hostname, &cfg.access_markers) {
    s.add("access_hostname", cfg.access_name_bonus);
  }

  s
}

#[cfg(test)]
mod tests {
  use super::*;

  fn markers() -> Vec<String> { vec!["L3".to_owned(), "core".to_owned()] }

  fn facts(port_name: &str, has_link: bool, sees: bool, count: u32) -> CandidateFacts<'_> {
    CandidateFacts {
      hostname: "07_L2_RACK02",
      port_name,
      has_link,
      neighbor_sees_address: sees,
      address_count: count,
    }
  }

  fn value(f: &CandidateFacts<'_>) -> i32 { score(f, &ScoringConfig::default(), &markers()).value }

  #[test]
  fn trunk_ports_are_disqualified() {
    let s = score(&facts("Eth-Trunk81", false, false, 1), &ScoringConfig::default(), &markers());
    assert_eq!(s.value, -1000);
    assert_eq!(s.reasons.len(), 1);
    assert_eq!(s.reasons[0].label, "trunk_port");
  }

  #[test]
  fn quiet_unlinked_access_port_is_an_endpoint() {
    // 100 no link, 50 few addresses, 10 access hostname
    assert_eq!(value(&facts("GE0/0/3", false, false, 1)), 160);
  }

  #[test]
  fn neighbor_visibility() {
    assert_eq!(value(&facts("GE0/0/48", true, false, 1)), 80 + 50 + 10);
    assert_eq!(value(&facts("GE0/0/48", true, true, 1)), -50 + 50 + 10);
  }

  #[test]
  fn address_count_tiers() {
    assert_eq!(value(&facts("GE0/0/1", false, false, 4)), 100 + 20 + 10);
    assert_eq!(value(&facts("GE0/0/1", false, false, 6)), 100 - 50 + 10);
    assert_eq!(value(&facts("GE0/0/1", false, false, 21)), 100 - 150 + 10);
    assert_eq!(value(&facts("GE0/0/1", false, false, 51)), -800);
  }

  #[test]
  fn core_hostnames_lose_a_little() {
    let mut f = facts("GE0/0/1", false, false, 1);
    f.hostname = "07_L3_CORE_251";
    let s = score(&f, &ScoringConfig::default(), &markers());
    assert_eq!(s.value, 140);
    assert_eq!(s.reasons.last().unwrap().label, "core_hostname");
  }

  #[test]
  fn reasons_add_up() {
    let s = score(&facts("GE0/0/9", true, false, 7), &ScoringConfig::default(), &markers());
    assert_eq!(s.reasons.iter().map(|r| r.delta).sum::<i32>(), s.value);
  }
}
