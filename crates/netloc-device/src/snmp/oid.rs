use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// An SNMP object identifier.
///
/// Ordering is lexicographic over the arcs, which is the order agents walk
/// in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
  pub fn from_arcs(arcs: impl Into<Vec<u32>>) -> Self { Self(arcs.into()) }

  pub fn arcs(&self) -> &[u32] { &self.0 }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn starts_with(&self, prefix: &Oid) -> bool { self.0.starts_with(&prefix.0) }

  /// The arcs after `prefix`, i.e. the table index of a column instance.
  pub fn suffix(&self, prefix: &Oid) -> Option<&[u32]> { self.0.strip_prefix(prefix.0.as_slice()) }

  /// A copy with `arcs` appended.
  pub fn child(&self, arcs: &[u32]) -> Self {
    let mut out = self.0.clone();
    out.extend_from_slice(arcs);
    Self(out)
  }
}

impl fmt::Display for Oid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for arc in &self.0 {
      if !first {
        f.write_str(".")?;
      }
      write!(f, "{arc}")?;
      first = false;
    }
    Ok(())
  }
}

impl FromStr for Oid {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let trimmed = s.trim().trim_start_matches('.');
    let arcs = trimmed
      .split('.')
      .map(|part| part.parse::<u32>())
      .collect::<Result<Vec<_>, _>>()
      .map_err(|_| Error::parse("object identifier", s))?;
    if arcs.len() < 2 {
      return Err(Error::parse("object identifier", s));
    }
    Ok(Self(arcs))
  }
}
