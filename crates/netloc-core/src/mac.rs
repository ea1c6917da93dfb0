//! Hardware (MAC) addresses.
//!
//! Devices print addresses in several shapes (`aa:bb:..`, `aabb-ccdd-eeff`,
//! `aabb.ccdd.eeff`). All of them parse into [`MacAddr`], whose canonical
//! rendering is upper-case colon form.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 48-bit hardware address.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr([u8; 6]);

impl MacAddr {
  pub const fn new(octets: [u8; 6]) -> Self { Self(octets) }

  pub fn octets(&self) -> [u8; 6] { self.0 }

  /// Parse any of the common textual forms. Separators (`:`, `-`, `.`) are
  /// ignored; exactly twelve hex digits must remain.
  pub fn parse(s: &str) -> Result<Self> {
    let digits: String = s
      .trim()
      .chars()
      .filter(|c| !matches!(c, ':' | '-' | '.'))
      .collect();

    if digits.len() != 12 {
      return Err(Error::InvalidMac(s.to_owned()));
    }

    let mut out = [0u8; 6];
    hex::decode_to_slice(&digits, &mut out)
      .map_err(|_| Error::InvalidMac(s.to_owned()))?;
    Ok(Self(out))
  }

  /// Build from raw bytes, e.g. an SNMP octet string or OID suffix.
  pub fn from_slice(bytes: &[u8]) -> Option<Self> {
    <[u8; 6]>::try_from(bytes).ok().map(Self)
  }

  /// The vendor prefix as six upper-case hex digits (`"00186E"`).
  pub fn oui(&self) -> String { hex::encode_upper(&self.0[..3]) }

  pub fn is_multicast(&self) -> bool { self.0[0] & 0x01 == 0x01 }

  pub fn is_zero(&self) -> bool { self.0 == [0; 6] }

  /// Unicast and non-zero: the only addresses a forwarding table collector
  /// keeps.
  pub fn is_usable(&self) -> bool { !self.is_multicast() && !self.is_zero() }

  /// `aabb-ccdd-eeff`, as accepted by Huawei VRP.
  pub fn to_dashed_quads(&self) -> String {
    let h = hex::encode(self.0);
    format!("{}-{}-{}", &h[0..4], &h[4..8], &h[8..12])
  }

  /// `aabb.ccdd.eeff`, as accepted by Cisco IOS.
  pub fn to_dotted_quads(&self) -> String {
    let h = hex::encode(self.0);
    format!("{}.{}.{}", &h[0..4], &h[4..8], &h[8..12])
  }
}

impl fmt::Display for MacAddr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let [a, b, c, d, e, g] = self.0;
    write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
  }
}

impl FromStr for MacAddr {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for MacAddr {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<MacAddr> for String {
  fn from(mac: MacAddr) -> Self { mac.to_string() }
}
