//! System information and interface naming.

use std::collections::BTreeMap;

use netloc_core::device::SystemInfo;
use tracing::debug;

use crate::{
  DeviceClient, DeviceTarget, Result, oids,
  snmp::{Oid, Value},
};

/// Interface names keyed by ifIndex: `ifName`, or `ifDescr` when the agent
/// has no IF-MIB extensions.
pub async fn interface_names<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<BTreeMap<u32, String>> {
  let names = text_column(client, target, oids::IF_NAME).await?;
  if !names.is_empty() {
    return Ok(names);
  }
  debug!(host = %target.hostname, "ifName empty, using ifDescr");
  text_column(client, target, oids::IF_DESCR).await
}

/// A single-arc-indexed text column.
async fn text_column<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
  column: &[u32],
) -> Result<BTreeMap<u32, String>> {
  let root = Oid::from_arcs(column);
  let rows = client.walk(target, &root).await?;
  Ok(
    rows
      .into_iter()
      .filter_map(|(oid, value)| {
        let index = *oid.suffix(&root)?.last()?;
        Some((index, value.as_text()?))
      })
      .collect(),
  )
}

fn counts_as_physical(name: &str) -> bool {
  let lower = name.to_ascii_lowercase();
  lower.contains("ethernet") || lower.starts_with("ge") || lower.contains("trunk")
}

/// Collect [`SystemInfo`]. Each piece is independent; a failing column
/// leaves its field empty instead of failing the whole collection.
pub async fn collect<C: DeviceClient>(client: &C, target: &DeviceTarget) -> Result<SystemInfo> {
  let sys_name = client
    .get(target, &Oid::from_arcs(oids::SYS_NAME))
    .await?
    .and_then(|v| v.as_text());

  let mut info = SystemInfo { sys_name, ..SystemInfo::default() };

  info.model = first_text(client, target, oids::ENT_PHYSICAL_MODEL).await;
  info.serial = first_text(client, target, oids::ENT_PHYSICAL_SERIAL).await;

  match interface_names(client, target).await {
    Ok(names) => {
      let root = Oid::from_arcs(oids::IF_OPER_STATUS);
      let statuses = client.walk(target, &root).await.unwrap_or_default();
      for (oid, value) in statuses {
        let Some(index) = oid.suffix(&root).and_then(|s| s.last().copied()) else {
          continue;
        };
        if !names.get(&index).is_some_and(|n| counts_as_physical(n)) {
          continue;
        }
        match value {
          Value::Integer(1) => info.ports_up += 1,
          Value::Integer(2) => info.ports_down += 1,
          _ => {}
        }
      }
    }
    Err(e) => debug!(host = %target.hostname, error = %e, "interface names unavailable"),
  }

  let vlans = client
    .walk(target, &Oid::from_arcs(oids::DOT1Q_VLAN_STATIC_NAME))
    .await
    .unwrap_or_default();
  info.vlan_count = u32::try_from(vlans.len()).unwrap_or(u32::MAX);

  Ok(info)
}

async fn first_text<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
  column: &[u32],
) -> Option<String> {
  match client.walk(target, &Oid::from_arcs(column)).await {
    Ok(rows) => rows.into_iter().find_map(|(_, v)| v.as_text()),
    Err(e) => {
      debug!(host = %target.hostname, error = %e, "entity column unavailable");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ScriptedClient, text, target};
  use netloc_core::device::Dialect;

  #[tokio::test]
  async fn counts_only_physical_interfaces() {
    let client = ScriptedClient::default()
      .with("1.3.6.1.2.1.1.5.0", text("07_L2_RACK01"))
      .with("1.3.6.1.2.1.31.1.1.1.1.1", text("GigabitEthernet0/0/1"))
      .with("1.3.6.1.2.1.31.1.1.1.1.2", text("GigabitEthernet0/0/2"))
      .with("1.3.6.1.2.1.31.1.1.1.1.3", text("Vlanif100"))
      .with("1.3.6.1.2.1.31.1.1.1.1.4", text("Eth-Trunk1"))
      .with("1.3.6.1.2.1.2.2.1.8.1", Value::Integer(1))
      .with("1.3.6.1.2.1.2.2.1.8.2", Value::Integer(2))
      .with("1.3.6.1.2.1.2.2.1.8.3", Value::Integer(1))
      .with("1.3.6.1.2.1.2.2.1.8.4", Value::Integer(1))
      .with("1.3.6.1.2.1.47.1.1.1.1.13.1", text(""))
      .with("1.3.6.1.2.1.47.1.1.1.1.13.9", text("S5735-L48T4X"))
      .with("1.3.6.1.2.1.17.7.1.4.3.1.1.1", text("default"))
      .with("1.3.6.1.2.1.17.7.1.4.3.1.1.100", text("users"));

    let info = collect(&client, &target(Dialect::Huawei)).await.unwrap();
    assert_eq!(info.sys_name.as_deref(), Some("07_L2_RACK01"));
    assert_eq!(info.model.as_deref(), Some("S5735-L48T4X"));
    assert_eq!(info.serial, None);
    assert_eq!((info.ports_up, info.ports_down), (2, 1));
    assert_eq!(info.vlan_count, 2);
  }

  #[tokio::test]
  async fn falls_back_to_if_descr() {
    let client = ScriptedClient::default()
      .with("1.3.6.1.2.1.2.2.1.2.5", text("GigabitEthernet0/0/5"));
    let names = interface_names(&client, &target(Dialect::Generic))
      .await
      .unwrap();
    assert_eq!(names.get(&5).map(String::as_str), Some("GigabitEthernet0/0/5"));
  }
}
