//! The seam between collectors and the network.
//!
//! Collectors and the live tracer are written against [`DeviceClient`] so
//! tests can drive them with scripted tables and command outputs.
//! [`NetworkClient`] is the real implementation: SNMP over UDP and an
//! interactive SSH shell.

use std::{fmt, future::Future, net::IpAddr};

use netloc_core::device::{Device, Dialect};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result, dialect,
  snmp::{Oid, SnmpClient, SnmpSettings, Value},
  ssh::{SshSession, SshSettings},
};

fn default_community() -> String { "public".to_owned() }

/// A named set of login details.
#[derive(Clone, Deserialize)]
pub struct Credentials {
  pub username:  String,
  #[serde(default)]
  pub password:  String,
  /// SNMPv2c community used when the device has no override.
  #[serde(default = "default_community")]
  pub community: String,
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("community", &self.community)
      .finish()
  }
}

/// Everything a client needs to reach one device.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
  pub device_id:   Uuid,
  pub hostname:    String,
  pub address:     IpAddr,
  pub dialect:     Dialect,
  pub community:   String,
  pub credentials: Option<Credentials>,
}

impl DeviceTarget {
  /// The device's own community wins over the credential set's.
  pub fn new(device: &Device, credentials: Option<Credentials>) -> Self {
    let community = device
      .community
      .clone()
      .or_else(|| credentials.as_ref().map(|c| c.community.clone()))
      .unwrap_or_else(default_community);
    Self {
      device_id: device.device_id,
      hostname: device.hostname.clone(),
      address: device.address,
      dialect: device.dialect,
      community,
      credentials,
    }
  }
}

/// An open command line on one device.
pub trait CommandSession: Send {
  /// Run one command and return its output with echo and prompt removed.
  fn run_command(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

  fn close(self) -> impl Future<Output = ()> + Send;
}

/// How collectors talk to devices.
pub trait DeviceClient: Send + Sync {
  type Session: CommandSession + 'static;

  // ── SNMP ──────────────────────────────────────────────────────────────

  /// Every instance under `column`, in OID order.
  fn walk(
    &self,
    target: &DeviceTarget,
    column: &Oid,
  ) -> impl Future<Output = Result<Vec<(Oid, Value)>>> + Send;

  fn get(
    &self,
    target: &DeviceTarget,
    oid: &Oid,
  ) -> impl Future<Output = Result<Option<Value>>> + Send;

  // ── CLI ───────────────────────────────────────────────────────────────

  /// Log in and disable paging.
  fn open_session(&self, target: &DeviceTarget) -> impl Future<Output = Result<Self::Session>> + Send;
}

// ─── Network implementation ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct NetworkClient {
  snmp: SnmpClient,
  ssh:  SshSettings,
}

impl NetworkClient {
  pub fn new(snmp: SnmpSettings, ssh: SshSettings) -> Self {
    Self { snmp: SnmpClient::new(snmp), ssh }
  }
}

impl CommandSession for SshSession {
  async fn run_command(&mut self, command: &str) -> Result<String> {
    SshSession::run_command(self, command).await
  }

  async fn close(self) { SshSession::close(self).await }
}

impl DeviceClient for NetworkClient {
  type Session = SshSession;

  async fn walk(&self, target: &DeviceTarget, column: &Oid) -> Result<Vec<(Oid, Value)>> {
    self
      .snmp
      .walk(target.address, &target.community, column)
      .await
  }

  async fn get(&self, target: &DeviceTarget, oid: &Oid) -> Result<Option<Value>> {
    self.snmp.get(target.address, &target.community, oid).await
  }

  async fn open_session(&self, target: &DeviceTarget) -> Result<SshSession> {
    let credentials = target
      .credentials
      .as_ref()
      .ok_or_else(|| Error::NoCredentials(target.hostname.clone()))?;

    let mut session = SshSession::connect(target.address, credentials, &self.ssh).await?;
    let pager_off = dialect::profile(target.dialect).pager_off();
    if let Err(e) = session.run_command(pager_off).await {
      debug!(host = %target.hostname, error = %e, "could not disable paging");
    }
    Ok(session)
  }
}
