//! Error type for `netloc-engine`.
//!
//! Store and device failures are wrapped with the stage that hit them so a
//! failed pass can be diagnosed from its discovery log entry alone. Trace
//! exhaustion is not an error; see [`crate::tracer::TraceOutcome`].

use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Where in a discovery pass or query a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  SystemInfo,
  Fdb,
  Neighbors,
  Classify,
  Commit,
  Merge,
  Graph,
  Trace,
  Query,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{stage} failed on {hostname}: {source}")]
  Device {
    hostname: String,
    stage:    Stage,
    #[source]
    source:   netloc_device::Error,
  },

  #[error("store error during {stage}: {source}")]
  Store {
    stage:  Stage,
    #[source]
    source: BoxError,
  },

  /// A write would have broken the one-current-location invariant. The
  /// device's pass is failed and nothing was written.
  #[error("integrity violation on {hostname}: {message}")]
  Integrity { hostname: String, message: String },

  #[error("a discovery run is already in progress")]
  AlreadyRunning,

  #[error("device not found: {0}")]
  DeviceNotFound(String),

  #[error("device {hostname} refers to unknown credential set {name:?}")]
  UnknownCredentials { hostname: String, name: String },

  #[error(transparent)]
  Core(#[from] netloc_core::Error),
}

impl Error {
  pub(crate) fn device(hostname: &str, stage: Stage) -> impl FnOnce(netloc_device::Error) -> Self {
    let hostname = hostname.to_owned();
    move |source| Self::Device { hostname, stage, source }
  }

  pub(crate) fn store<E>(stage: Stage) -> impl FnOnce(E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    move |source| Self::Store { stage, source: Box::new(source) }
  }

  /// The failure was a device not answering in time.
  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Device { source: netloc_device::Error::Timeout { .. }, .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
