//! Error type for `netloc-device`.
//!
//! Variants follow how a caller should react: transport and timeout
//! failures may be retried or fall back to another path, authentication
//! failures end the device's pass, parse failures carry the offending text.

use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Unreachable host, refused connection, socket failure.
  #[error("transport error talking to {address}: {message}")]
  Transport { address: IpAddr, message: String },

  #[error("timed out after {attempts} attempt(s) talking to {address}")]
  Timeout { address: IpAddr, attempts: u32 },

  #[error("authentication rejected by {address}")]
  Authentication { address: IpAddr },

  /// The agent answered with a non-zero SNMP error-status.
  #[error("query {oid} failed on {address}: error-status {status}")]
  QueryFailed {
    address: IpAddr,
    oid:     String,
    status:  i64,
  },

  /// Unexpected bytes or text from the device.
  #[error("could not parse {what}: {snippet:?}")]
  Parse { what: &'static str, snippet: String },

  #[error("{0} is not supported for this device")]
  Unsupported(&'static str),

  #[error("no credentials available for {0}")]
  NoCredentials(String),

  #[error("ssh error: {0}")]
  Ssh(#[from] russh::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Builds a [`Error::Parse`], keeping at most a short prefix of the input.
  pub fn parse(what: &'static str, raw: impl AsRef<[u8]>) -> Self {
    let raw = raw.as_ref();
    let snippet = match std::str::from_utf8(raw) {
      Ok(text) => text.chars().take(120).collect(),
      Err(_) => hex::encode(&raw[..raw.len().min(48)]),
    };
    Self::Parse { what, snippet }
  }

  /// Whether a caller may reasonably try an alternative path.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Transport { .. } | Self::Timeout { .. } | Self::Io(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
