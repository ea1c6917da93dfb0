//! SNMPv2c: a BER codec for the handful of PDUs discovery needs, and a UDP
//! client with bounded retries and GETBULK table walks.

pub mod ber;
mod oid;
mod transport;

use std::net::Ipv4Addr;

use bytes::Bytes;

pub use self::{
  oid::Oid,
  transport::{SnmpClient, SnmpSettings},
};

/// A decoded variable-binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Integer(i64),
  OctetString(Bytes),
  Null,
  ObjectId(Oid),
  IpAddress(Ipv4Addr),
  Counter32(u32),
  Gauge32(u32),
  TimeTicks(u32),
  Opaque(Bytes),
  Counter64(u64),
  NoSuchObject,
  NoSuchInstance,
  EndOfMibView,
}

impl Value {
  /// `noSuchObject`, `noSuchInstance` and `endOfMibView`.
  pub fn is_exception(&self) -> bool {
    matches!(self, Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView)
  }

  pub fn as_u64(&self) -> Option<u64> {
    match *self {
      Self::Integer(v) => u64::try_from(v).ok(),
      Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(u64::from(v)),
      Self::Counter64(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_u32(&self) -> Option<u32> { self.as_u64().and_then(|v| u32::try_from(v).ok()) }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Self::OctetString(b) | Self::Opaque(b) => Some(b),
      _ => None,
    }
  }

  /// An octet string as trimmed text; `None` when absent or blank.
  pub fn as_text(&self) -> Option<String> {
    let bytes = self.as_bytes()?;
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    (!text.is_empty()).then(|| text.to_owned())
  }

  /// An octet string rendered for humans: text when printable, otherwise
  /// colon-separated hex (chassis ids are usually raw MACs).
  pub fn display(&self) -> Option<String> {
    let bytes = self.as_bytes()?;
    if bytes.is_empty() {
      return None;
    }
    let printable = bytes
      .iter()
      .all(|b| b.is_ascii_graphic() || *b == b' ' || *b == 0);
    if printable {
      return self.as_text();
    }
    let hex = hex::encode_upper(bytes);
    let pairs: Vec<&str> = (0..hex.len())
      .step_by(2)
      .map(|i| &hex[i..i + 2])
      .collect();
    Some(pairs.join(":"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn text_is_trimmed() {
    let v = Value::OctetString(Bytes::from_static(b"  sw-core-01\0"));
    assert_eq!(v.as_text().as_deref(), Some("sw-core-01"));
    assert_eq!(Value::OctetString(Bytes::new()).as_text(), None);
  }

  #[test]
  fn binary_displays_as_hex() {
    let v = Value::OctetString(Bytes::from_static(&[0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]));
    assert_eq!(v.display().as_deref(), Some("00:1A:2B:3C:4D:5E"));
  }

  #[test]
  fn numeric_views() {
    assert_eq!(Value::Integer(7).as_u32(), Some(7));
    assert_eq!(Value::Integer(-1).as_u32(), None);
    assert_eq!(Value::Gauge32(3).as_u64(), Some(3));
    assert!(Value::EndOfMibView.is_exception());
  }
}
