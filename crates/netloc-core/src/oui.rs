//! Vendor prefixes of endpoint-class devices.
//!
//! Access points and IP phones bridge traffic for other hosts and advertise
//! themselves like small switches, yet they are endpoints in their own
//! right. Their addresses are accepted on uplink ports where any other
//! address would be discarded as in transit.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::MacAddr;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndpointClass {
  AccessPoint,
  Phone,
}

/// One allow-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointVendor {
  pub oui:    &'static str,
  pub vendor: &'static str,
  pub class:  EndpointClass,
}

const fn ap(oui: &'static str, vendor: &'static str) -> EndpointVendor {
  EndpointVendor { oui, vendor, class: EndpointClass::AccessPoint }
}

const fn phone(oui: &'static str, vendor: &'static str) -> EndpointVendor {
  EndpointVendor { oui, vendor, class: EndpointClass::Phone }
}

pub const ENDPOINT_VENDORS: &[EndpointVendor] = &[
  // ── Access points ─────────────────────────────────────────────────────
  ap("00186E", "Extreme"),
  ap("00012E", "Extreme"),
  ap("5C0E8B", "Extreme"),
  ap("B4C799", "Extreme"),
  ap("00E60E", "Extreme"),
  ap("000B86", "Aruba"),
  ap("24DE9A", "Aruba"),
  ap("6CFDB9", "Aruba"),
  ap("9C1C12", "Aruba"),
  ap("ACA31E", "Aruba"),
  ap("D8C7C8", "Aruba"),
  ap("20A6CD", "Aruba"),
  ap("94B40F", "Aruba"),
  ap("0018BA", "Meraki"),
  ap("0024A5", "Meraki"),
  ap("88155F", "Meraki"),
  ap("0C8BFD", "Meraki"),
  ap("00275D", "Ubiquiti"),
  ap("0418D6", "Ubiquiti"),
  ap("24A43C", "Ubiquiti"),
  ap("44D9E7", "Ubiquiti"),
  ap("68D79A", "Ubiquiti"),
  ap("788A20", "Ubiquiti"),
  ap("802AA8", "Ubiquiti"),
  ap("B4FBE4", "Ubiquiti"),
  ap("DC9FDB", "Ubiquiti"),
  ap("E063DA", "Ubiquiti"),
  ap("F09FC2", "Ubiquiti"),
  ap("FCECDA", "Ubiquiti"),
  ap("C4108A", "Ruckus"),
  ap("58B633", "Ruckus"),
  ap("4C1D96", "Ruckus"),
  ap("842B2B", "Ruckus"),
  ap("EC589F", "Ruckus"),
  ap("74911A", "Ruckus"),
  ap("58C17A", "Cambium"),
  // ── IP phones ─────────────────────────────────────────────────────────
  phone("00070E", "Cisco"),
  phone("000FEE", "Cisco"),
  phone("001121", "Cisco"),
  phone("001A2F", "Cisco"),
  phone("001BD4", "Cisco"),
  phone("00226B", "Cisco"),
  phone("002490", "Cisco"),
  phone("002566", "Cisco"),
  phone("0026CB", "Cisco"),
  phone("10BDEC", "Cisco"),
  phone("1CE6C7", "Cisco"),
  phone("442B03", "Cisco"),
  phone("503DE5", "Cisco"),
  phone("5CF9DD", "Cisco"),
  phone("6400F1", "Cisco"),
  phone("6C416A", "Cisco"),
  phone("7C1E52", "Cisco"),
  phone("A8A666", "Cisco"),
  phone("C4649B", "Cisco"),
  phone("DCF898", "Cisco"),
  phone("F8B7E2", "Cisco"),
  phone("0004F2", "Polycom"),
  phone("64167F", "Polycom"),
  phone("001565", "Yealink"),
  phone("24CF11", "Yealink"),
  phone("309E65", "Yealink"),
  phone("805E0C", "Yealink"),
  phone("805EC0", "Yealink"),
  phone("000B82", "Grandstream"),
  phone("00040D", "Avaya"),
  phone("001B4F", "Avaya"),
  phone("3CE5A6", "Avaya"),
  phone("70521C", "Avaya"),
  phone("7C57BC", "Avaya"),
  phone("000413", "Snom"),
  phone("08000F", "Mitel"),
];

/// Look up the allow-list entry for an address's vendor prefix.
pub fn endpoint_vendor(mac: &MacAddr) -> Option<&'static EndpointVendor> {
  let oui = mac.oui();
  ENDPOINT_VENDORS.iter().find(|v| v.oui == oui)
}

pub fn is_endpoint_vendor(mac: &MacAddr) -> bool { endpoint_vendor(mac).is_some() }
