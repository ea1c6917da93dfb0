//! Error type for `netloc-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] netloc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored discriminant or address column did not decode.
  #[error("column decode error: {0}")]
  Decode(String),

  #[error("device not found: {0}")]
  DeviceNotFound(uuid::Uuid),

  #[error("port not found: {0}")]
  PortNotFound(uuid::Uuid),

  /// A placement expected `expected` to be the current location of `mac`,
  /// but another pass changed it first.
  #[error("current location of {mac} changed concurrently (expected {expected:?})")]
  StaleSupersession {
    mac:      String,
    expected: Option<uuid::Uuid>,
  },

  /// The pass would leave an address with more than one current location.
  #[error("address {0} would have more than one current location")]
  MultipleCurrent(String),
}

impl netloc_core::store::StoreError for Error {
  fn is_integrity_violation(&self) -> bool {
    matches!(self, Self::StaleSupersession { .. } | Self::MultipleCurrent(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
