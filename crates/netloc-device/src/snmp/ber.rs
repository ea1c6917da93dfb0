//! Minimal BER encoding and decoding of SNMPv2c messages.
//!
//! Only what a manager needs: GET, GETNEXT and GETBULK requests out,
//! RESPONSE PDUs in. Lengths up to four octets of long form are accepted.

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Oid, Value};
use crate::{Error, Result};

pub mod tag {
  pub const INTEGER: u8 = 0x02;
  pub const OCTET_STRING: u8 = 0x04;
  pub const NULL: u8 = 0x05;
  pub const OBJECT_ID: u8 = 0x06;
  pub const SEQUENCE: u8 = 0x30;
  pub const IP_ADDRESS: u8 = 0x40;
  pub const COUNTER32: u8 = 0x41;
  pub const GAUGE32: u8 = 0x42;
  pub const TIME_TICKS: u8 = 0x43;
  pub const OPAQUE: u8 = 0x44;
  pub const COUNTER64: u8 = 0x46;
  pub const NO_SUCH_OBJECT: u8 = 0x80;
  pub const NO_SUCH_INSTANCE: u8 = 0x81;
  pub const END_OF_MIB_VIEW: u8 = 0x82;
  pub const GET_REQUEST: u8 = 0xA0;
  pub const GET_NEXT_REQUEST: u8 = 0xA1;
  pub const RESPONSE: u8 = 0xA2;
  pub const GET_BULK_REQUEST: u8 = 0xA5;
}

/// SNMP version field value for v2c.
const VERSION_2C: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
  Get,
  GetNext,
  GetBulk { non_repeaters: u32, max_repetitions: u32 },
}

#[derive(Debug, Clone)]
pub struct Request<'a> {
  pub community:  &'a str,
  pub request_id: i32,
  pub kind:       RequestKind,
  pub oids:       &'a [Oid],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub request_id:   i32,
  pub error_status: i64,
  pub error_index:  i64,
  pub varbinds:     Vec<(Oid, Value)>,
}

// ─── Encoding ────────────────────────────────────────────────────────────────

pub fn encode_request(req: &Request<'_>) -> Result<Bytes> {
  let mut varbinds = BytesMut::new();
  for oid in req.oids {
    let mut vb = BytesMut::new();
    put_tlv(&mut vb, tag::OBJECT_ID, &oid_content(oid)?);
    put_tlv(&mut vb, tag::NULL, &[]);
    put_tlv(&mut varbinds, tag::SEQUENCE, &vb);
  }

  let (pdu_tag, field2, field3) = match req.kind {
    RequestKind::Get => (tag::GET_REQUEST, 0, 0),
    RequestKind::GetNext => (tag::GET_NEXT_REQUEST, 0, 0),
    RequestKind::GetBulk { non_repeaters, max_repetitions } => (
      tag::GET_BULK_REQUEST,
      i64::from(non_repeaters),
      i64::from(max_repetitions),
    ),
  };

  let mut pdu = BytesMut::new();
  put_tlv(&mut pdu, tag::INTEGER, &integer_content(i64::from(req.request_id)));
  put_tlv(&mut pdu, tag::INTEGER, &integer_content(field2));
  put_tlv(&mut pdu, tag::INTEGER, &integer_content(field3));
  put_tlv(&mut pdu, tag::SEQUENCE, &varbinds);

  let mut message = BytesMut::new();
  put_tlv(&mut message, tag::INTEGER, &integer_content(VERSION_2C));
  put_tlv(&mut message, tag::OCTET_STRING, req.community.as_bytes());
  put_tlv(&mut message, pdu_tag, &pdu);

  let mut out = BytesMut::with_capacity(message.len() + 4);
  put_tlv(&mut out, tag::SEQUENCE, &message);
  Ok(out.freeze())
}

fn put_tlv(out: &mut BytesMut, tag: u8, content: &[u8]) {
  out.put_u8(tag);
  put_length(out, content.len());
  out.put_slice(content);
}

fn put_length(out: &mut BytesMut, len: usize) {
  if len < 0x80 {
    out.put_u8(len as u8);
    return;
  }
  let bytes = (len as u64).to_be_bytes();
  let skip = bytes.iter().take_while(|b| **b == 0).count();
  out.put_u8(0x80 | (bytes.len() - skip) as u8);
  out.put_slice(&bytes[skip..]);
}

/// Minimal two's-complement big-endian encoding.
fn integer_content(v: i64) -> Vec<u8> {
  let bytes = v.to_be_bytes();
  let mut start = 0;
  while start < bytes.len() - 1 {
    let (b, next) = (bytes[start], bytes[start + 1]);
    let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0);
    if !redundant {
      break;
    }
    start += 1;
  }
  bytes[start..].to_vec()
}

fn oid_content(oid: &Oid) -> Result<Vec<u8>> {
  let arcs = oid.arcs();
  let (first, second) = match arcs {
    [a, b, ..] if *a <= 2 && (*a == 2 || *b < 40) => (*a, *b),
    _ => return Err(Error::parse("object identifier", oid.to_string())),
  };

  let mut out = Vec::with_capacity(arcs.len() + 4);
  put_base128(&mut out, first * 40 + second);
  for arc in &arcs[2..] {
    put_base128(&mut out, *arc);
  }
  Ok(out)
}

fn put_base128(out: &mut Vec<u8>, mut v: u32) {
  let mut tmp = [0u8; 5];
  let mut i = tmp.len();
  loop {
    i -= 1;
    tmp[i] = (v & 0x7F) as u8;
    v >>= 7;
    if v == 0 {
      break;
    }
  }
  let last = tmp.len() - 1;
  for b in &mut tmp[i..last] {
    *b |= 0x80;
  }
  out.extend_from_slice(&tmp[i..]);
}

// ─── Decoding ────────────────────────────────────────────────────────────────

struct Reader<'a> {
  buf: &'a [u8],
}

impl<'a> Reader<'a> {
  fn new(buf: &'a [u8]) -> Self { Self { buf } }

  fn is_empty(&self) -> bool { self.buf.is_empty() }

  fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
    let truncated = || Error::parse("truncated BER element", self.buf);
    let (&tag, rest) = self.buf.split_first().ok_or_else(truncated)?;
    let (&first, mut rest) = rest.split_first().ok_or_else(truncated)?;

    let len = if first & 0x80 == 0 {
      usize::from(first)
    } else {
      let n = usize::from(first & 0x7F);
      if n == 0 || n > 4 || rest.len() < n {
        return Err(Error::parse("BER length", self.buf));
      }
      let len = rest[..n]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
      rest = &rest[n..];
      len
    };

    if rest.len() < len {
      return Err(truncated());
    }
    let (content, tail) = rest.split_at(len);
    self.buf = tail;
    Ok((tag, content))
  }

  fn expect(&mut self, expected: u8, what: &'static str) -> Result<&'a [u8]> {
    let (tag, content) = self.read_tlv()?;
    if tag != expected {
      return Err(Error::parse(what, [tag]));
    }
    Ok(content)
  }
}

fn decode_integer(c: &[u8]) -> Result<i64> {
  if c.is_empty() || c.len() > 8 {
    return Err(Error::parse("INTEGER", c));
  }
  let seed: i64 = if c[0] & 0x80 != 0 { -1 } else { 0 };
  Ok(c.iter().fold(seed, |acc, b| (acc << 8) | i64::from(*b)))
}

fn decode_unsigned(c: &[u8]) -> Result<u64> {
  let significant = match c {
    [0, rest @ ..] => rest,
    _ => c,
  };
  if c.is_empty() || significant.len() > 8 {
    return Err(Error::parse("unsigned integer", c));
  }
  Ok(significant.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u32(c: &[u8]) -> Result<u32> {
  u32::try_from(decode_unsigned(c)?).map_err(|_| Error::parse("32-bit unsigned", c))
}

fn decode_oid(c: &[u8]) -> Result<Oid> {
  let mut arcs = Vec::with_capacity(c.len() + 1);
  let mut acc: u64 = 0;
  let mut in_arc = false;
  for &b in c {
    acc = (acc << 7) | u64::from(b & 0x7F);
    in_arc = true;
    if acc > u64::from(u32::MAX) {
      return Err(Error::parse("object identifier arc", c));
    }
    if b & 0x80 == 0 {
      if arcs.is_empty() {
        let (first, second) = match acc {
          0..40 => (0, acc),
          40..80 => (1, acc - 40),
          _ => (2, acc - 80),
        };
        arcs.push(first as u32);
        arcs.push(second as u32);
      } else {
        arcs.push(acc as u32);
      }
      acc = 0;
      in_arc = false;
    }
  }
  if in_arc || arcs.is_empty() {
    return Err(Error::parse("object identifier", c));
  }
  Ok(Oid::from_arcs(arcs))
}

fn decode_value(tag: u8, c: &[u8]) -> Result<Value> {
  Ok(match tag {
    tag::INTEGER => Value::Integer(decode_integer(c)?),
    tag::OCTET_STRING => Value::OctetString(Bytes::copy_from_slice(c)),
    tag::NULL => Value::Null,
    tag::OBJECT_ID => Value::ObjectId(decode_oid(c)?),
    tag::IP_ADDRESS => match c {
      [a, b, d, e] => Value::IpAddress(Ipv4Addr::new(*a, *b, *d, *e)),
      _ => return Err(Error::parse("IpAddress", c)),
    },
    tag::COUNTER32 => Value::Counter32(decode_u32(c)?),
    tag::GAUGE32 => Value::Gauge32(decode_u32(c)?),
    tag::TIME_TICKS => Value::TimeTicks(decode_u32(c)?),
    tag::OPAQUE => Value::Opaque(Bytes::copy_from_slice(c)),
    tag::COUNTER64 => Value::Counter64(decode_unsigned(c)?),
    tag::NO_SUCH_OBJECT => Value::NoSuchObject,
    tag::NO_SUCH_INSTANCE => Value::NoSuchInstance,
    tag::END_OF_MIB_VIEW => Value::EndOfMibView,
    other => return Err(Error::parse("value type", [other])),
  })
}

/// Decode a whole v2c message carrying a RESPONSE PDU.
pub fn decode_response(buf: &[u8]) -> Result<Response> {
  let mut outer = Reader::new(buf);
  let mut message = Reader::new(outer.expect(tag::SEQUENCE, "message")?);

  let version = decode_integer(message.expect(tag::INTEGER, "version")?)?;
  if version != VERSION_2C {
    return Err(Error::parse("SNMP version", version.to_string()));
  }
  message.expect(tag::OCTET_STRING, "community")?;

  let mut pdu = Reader::new(message.expect(tag::RESPONSE, "response PDU")?);
  let request_id = decode_integer(pdu.expect(tag::INTEGER, "request-id")?)?;
  let error_status = decode_integer(pdu.expect(tag::INTEGER, "error-status")?)?;
  let error_index = decode_integer(pdu.expect(tag::INTEGER, "error-index")?)?;

  let mut list = Reader::new(pdu.expect(tag::SEQUENCE, "varbind list")?);
  let mut varbinds = Vec::new();
  while !list.is_empty() {
    let mut vb = Reader::new(list.expect(tag::SEQUENCE, "varbind")?);
    let oid = decode_oid(vb.expect(tag::OBJECT_ID, "varbind name")?)?;
    let (value_tag, content) = vb.read_tlv()?;
    varbinds.push((oid, decode_value(value_tag, content)?));
  }

  Ok(Response {
    request_id: i32::try_from(request_id).map_err(|_| Error::parse("request-id", buf))?,
    error_status,
    error_index,
    varbinds,
  })
}

// ─── Agent side (tests) ──────────────────────────────────────────────────────

/// Request id, PDU tag and requested OIDs of an encoded request.
#[cfg(test)]
pub(crate) fn decode_request(buf: &[u8]) -> Result<(i32, u8, Vec<Oid>)> {
  let mut outer = Reader::new(buf);
  let mut message = Reader::new(outer.expect(tag::SEQUENCE, "message")?);
  message.expect(tag::INTEGER, "version")?;
  message.expect(tag::OCTET_STRING, "community")?;
  let (pdu_tag, content) = message.read_tlv()?;
  let mut pdu = Reader::new(content);
  let request_id = decode_integer(pdu.expect(tag::INTEGER, "request-id")?)? as i32;
  pdu.expect(tag::INTEGER, "field 2")?;
  pdu.expect(tag::INTEGER, "field 3")?;
  let mut list = Reader::new(pdu.expect(tag::SEQUENCE, "varbind list")?);
  let mut oids = Vec::new();
  while !list.is_empty() {
    let mut vb = Reader::new(list.expect(tag::SEQUENCE, "varbind")?);
    oids.push(decode_oid(vb.expect(tag::OBJECT_ID, "varbind name")?)?);
  }
  Ok((request_id, pdu_tag, oids))
}

/// Encode a RESPONSE carrying integers, octet strings and exceptions.
#[cfg(test)]
pub(crate) fn encode_response(request_id: i32, varbinds: &[(Oid, Value)]) -> Bytes {
  let mut list = BytesMut::new();
  for (oid, value) in varbinds {
    let mut vb = BytesMut::new();
    put_tlv(&mut vb, tag::OBJECT_ID, &oid_content(oid).expect("valid oid"));
    match value {
      Value::Integer(v) => put_tlv(&mut vb, tag::INTEGER, &integer_content(*v)),
      Value::OctetString(b) => put_tlv(&mut vb, tag::OCTET_STRING, b),
      Value::EndOfMibView => put_tlv(&mut vb, tag::END_OF_MIB_VIEW, &[]),
      Value::NoSuchObject => put_tlv(&mut vb, tag::NO_SUCH_OBJECT, &[]),
      _ => put_tlv(&mut vb, tag::NULL, &[]),
    }
    put_tlv(&mut list, tag::SEQUENCE, &vb);
  }

  let mut pdu = BytesMut::new();
  put_tlv(&mut pdu, tag::INTEGER, &integer_content(i64::from(request_id)));
  put_tlv(&mut pdu, tag::INTEGER, &[0]);
  put_tlv(&mut pdu, tag::INTEGER, &[0]);
  put_tlv(&mut pdu, tag::SEQUENCE, &list);

  let mut message = BytesMut::new();
  put_tlv(&mut message, tag::INTEGER, &integer_content(VERSION_2C));
  put_tlv(&mut message, tag::OCTET_STRING, b"public");
  put_tlv(&mut message, tag::RESPONSE, &pdu);

  let mut out = BytesMut::new();
  put_tlv(&mut out, tag::SEQUENCE, &message);
  out.freeze()
}
