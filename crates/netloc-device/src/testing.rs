//! A scripted [`DeviceClient`] for collector tests.

use std::{
  collections::BTreeMap,
  net::{IpAddr, Ipv4Addr},
};

use bytes::Bytes;
use netloc_core::device::Dialect;
use uuid::Uuid;

use crate::{
  CommandSession, DeviceClient, DeviceTarget, Result,
  snmp::{Oid, Value},
};

const REJECTED: &str = "Error: Unrecognized command found at '^' position.";

#[derive(Debug, Default)]
pub struct ScriptedClient {
  table:    BTreeMap<Oid, Value>,
  commands: BTreeMap<String, String>,
}

impl ScriptedClient {
  pub fn with(mut self, oid: &str, value: Value) -> Self {
    self.table.insert(oid.parse().unwrap(), value);
    self
  }

  pub fn with_command(mut self, command: &str, output: &str) -> Self {
    self.commands.insert(command.to_owned(), output.to_owned());
    self
  }
}

pub struct ScriptedSession {
  commands: BTreeMap<String, String>,
}

impl CommandSession for ScriptedSession {
  async fn run_command(&mut self, command: &str) -> Result<String> {
    Ok(
      self
        .commands
        .get(command)
        .cloned()
        .unwrap_or_else(|| REJECTED.to_owned()),
    )
  }

  async fn close(self) {}
}

impl DeviceClient for ScriptedClient {
  type Session = ScriptedSession;

  async fn walk(&self, _target: &DeviceTarget, column: &Oid) -> Result<Vec<(Oid, Value)>> {
    Ok(
      self
        .table
        .range(column.clone()..)
        .take_while(|(oid, _)| oid.starts_with(column))
        .map(|(oid, value)| (oid.clone(), value.clone()))
        .collect(),
    )
  }

  async fn get(&self, _target: &DeviceTarget, oid: &Oid) -> Result<Option<Value>> {
    Ok(self.table.get(oid).cloned())
  }

  async fn open_session(&self, _target: &DeviceTarget) -> Result<ScriptedSession> {
    Ok(ScriptedSession { commands: self.commands.clone() })
  }
}

pub fn text(s: &str) -> Value { Value::OctetString(Bytes::copy_from_slice(s.as_bytes())) }

pub fn target(dialect: Dialect) -> DeviceTarget {
  DeviceTarget {
    device_id: Uuid::new_v4(),
    hostname: "sw-test".to_owned(),
    address: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
    dialect,
    community: "public".to_owned(),
    credentials: None,
  }
}
