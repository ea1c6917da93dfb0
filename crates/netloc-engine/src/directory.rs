//! Resolving neighbor announcements to managed devices.

use std::net::IpAddr;

use netloc_core::{device::Device, naming};
use uuid::Uuid;

/// A point-in-time view of the device inventory.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
  devices: Vec<Device>,
}

impl DeviceDirectory {
  pub fn new(devices: Vec<Device>) -> Self { Self { devices } }

  pub fn devices(&self) -> &[Device] { &self.devices }

  pub fn get(&self, device_id: Uuid) -> Option<&Device> {
    self.devices.iter().find(|d| d.device_id == device_id)
  }

  /// Exact case-insensitive match, then the domain-less form of `name`,
  /// then a unique device whose stored hostname is `name` plus a domain.
  pub fn by_hostname(&self, name: &str) -> Option<&Device> {
    let name = name.trim();
    if name.is_empty() {
      return None;
    }
    if let Some(d) = self
      .devices
      .iter()
      .find(|d| d.hostname.eq_ignore_ascii_case(name))
    {
      return Some(d);
    }

    let short = name.split('.').next().unwrap_or(name);
    if let Some(d) = self
      .devices
      .iter()
      .find(|d| d.hostname.eq_ignore_ascii_case(short))
    {
      return Some(d);
    }

    let mut matches = self.devices.iter().filter(|d| {
      d.hostname
        .split_once('.')
        .is_some_and(|(host, _)| host.eq_ignore_ascii_case(short))
    });
    let first = matches.next()?;
    matches.next().is_none().then_some(first)
  }

  pub fn by_address(&self, address: IpAddr) -> Option<&Device> {
    self.devices.iter().find(|d| d.address == address)
  }

  /// Name first, management address second.
  pub fn resolve(&self, name: Option<&str>, address: Option<IpAddr>) -> Option<&Device> {
    name
      .and_then(|n| self.by_hostname(n))
      .or_else(|| address.and_then(|a| self.by_address(a)))
  }

  /// Active devices whose hostname carries a core marker, optionally
  /// limited to one site, ordered by hostname.
  pub fn marked_cores(&self, site: Option<&str>, markers: &[String]) -> Vec<&Device> {
    let mut cores: Vec<&Device> = self
      .devices
      .iter()
      .filter(|d| d.is_active && naming::has_marker(&d.hostname, markers))
      .filter(|d| site.is_none_or(|s| d.site_code.as_deref() == Some(s)))
      .collect();
    cores.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    cores
  }
}

#[cfg(test)]
mod tests {
  use std::net::Ipv4Addr;

  use chrono::Utc;
  use netloc_core::device::NewDevice;

  use super::*;

  fn device(hostname: &str, last_octet: u8) -> Device {
    NewDevice::new(hostname, IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)))
      .into_device(Uuid::new_v4(), Utc::now())
  }

  fn directory() -> DeviceDirectory {
    DeviceDirectory::new(vec![
      device("07_L3_CORE_251", 251),
      device("07_L2_RACK01_Formaggi_NEW_181", 181),
      device("07_L2_RACK02", 182),
      device("09_L3_CORE_251", 252),
      device("10_L2_EDGE.campus.example", 10),
    ])
  }

  #[test]
  fn hostname_resolution_order() {
    let dir = directory();
    assert_eq!(dir.by_hostname("07_l2_rack02").unwrap().hostname, "07_L2_RACK02");
    assert_eq!(dir.by_hostname("07_L2_RACK02.campus.example").unwrap().hostname, "07_L2_RACK02");
    // stored with a domain, announced without one
    assert_eq!(dir.by_hostname("10_l2_edge").unwrap().hostname, "10_L2_EDGE.campus.example");
    // a bare prefix of a longer hostname is not that device
    assert!(dir.by_hostname("07_L2_RACK01").is_none());
    assert!(dir.by_hostname("07_L2").is_none());
    assert!(dir.by_hostname("  ").is_none());
  }

  #[test]
  fn address_is_the_fallback() {
    let dir = directory();
    let found = dir.resolve(Some("unknown-host"), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 182))));
    assert_eq!(found.unwrap().hostname, "07_L2_RACK02");
  }

  #[test]
  fn cores_by_site() {
    let dir = directory();
    let markers = vec!["L3".to_owned(), "core".to_owned()];
    let cores = dir.marked_cores(Some("07"), &markers);
    assert_eq!(cores.len(), 1);
    assert_eq!(cores[0].hostname, "07_L3_CORE_251");
    assert_eq!(dir.marked_cores(None, &markers).len(), 2);
  }
}
