//! Error types for `netloc-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid hardware address: {0:?}")]
  InvalidMac(String),

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
