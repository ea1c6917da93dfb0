//! Forwarding-table collection.
//!
//! Both paths return [`FdbRow`]s with usable (unicast, non-zero) addresses
//! only. SNMP rows carry the real ifIndex; CLI rows carry index 0 and are
//! matched to ports by name.

use std::collections::BTreeMap;

use netloc_core::{MacAddr, observation::FdbRow};
use tracing::debug;

use crate::{
  CommandSession, DeviceClient, DeviceTarget, Error, Result, cli,
  dialect::{self, DialectProfile, FdbLayout},
  oids,
  snmp::Oid,
  system,
};

fn mac_from_arcs(arcs: &[u32]) -> Option<MacAddr> {
  let mut octets = [0u8; 6];
  for (slot, arc) in octets.iter_mut().zip(arcs) {
    *slot = u8::try_from(*arc).ok()?;
  }
  (arcs.len() >= 6).then(|| MacAddr::new(octets))
}

// ─── SNMP ────────────────────────────────────────────────────────────────────

/// Walk the forwarding table in the layout the device's dialect exposes.
pub async fn collect_snmp<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<Vec<FdbRow>> {
  let names = system::interface_names(client, target).await?;

  if dialect::profile(target.dialect).fdb_layout() == FdbLayout::HuaweiDynamic {
    match huawei_dynamic(client, target, &names).await {
      Ok(rows) if !rows.is_empty() => return Ok(rows),
      Ok(_) => debug!(host = %target.hostname, "private forwarding table empty"),
      Err(e) if !e.is_transient() => {
        debug!(host = %target.hostname, error = %e, "private forwarding table unavailable");
      }
      Err(e) => return Err(e),
    }
  }

  bridge(client, target, &names).await
}

/// `hwDynFdbPort`: index is `mac(6).vlan.vsi...`, value is the ifIndex.
async fn huawei_dynamic<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
  names: &BTreeMap<u32, String>,
) -> Result<Vec<FdbRow>> {
  let root = Oid::from_arcs(oids::HW_DYN_FDB_PORT);
  let entries = client.walk(target, &root).await?;

  let mut rows = Vec::with_capacity(entries.len());
  let mut unnamed = 0usize;
  for (oid, value) in entries {
    let Some(index) = oid.suffix(&root).filter(|s| s.len() >= 7) else { continue };
    let Some(mac) = mac_from_arcs(&index[..6]).filter(MacAddr::is_usable) else { continue };
    let Some(if_index) = value.as_u32() else { continue };
    let Some(port_name) = names.get(&if_index) else {
      unnamed += 1;
      continue;
    };
    rows.push(FdbRow {
      mac,
      port_name: port_name.clone(),
      port_index: if_index,
      vlan: u16::try_from(index[6]).unwrap_or(1),
    });
  }

  if unnamed > 0 {
    debug!(host = %target.hostname, unnamed, "skipped entries on unnamed interfaces");
  }
  Ok(rows)
}

/// Q-BRIDGE (`fdbId.mac`) when populated, otherwise BRIDGE-MIB (`mac`,
/// VLAN 1). Bridge ports are translated to ifIndex through
/// `dot1dBasePortIfIndex`; agents that omit it number both the same.
async fn bridge<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
  names: &BTreeMap<u32, String>,
) -> Result<Vec<FdbRow>> {
  let base_root = Oid::from_arcs(oids::DOT1D_BASE_PORT_IF_INDEX);
  let base_ports: BTreeMap<u32, u32> = client
    .walk(target, &base_root)
    .await?
    .into_iter()
    .filter_map(|(oid, value)| Some((*oid.suffix(&base_root)?.last()?, value.as_u32()?)))
    .collect();

  let q_root = Oid::from_arcs(oids::DOT1Q_TP_FDB_PORT);
  let mut entries: Vec<(u16, MacAddr, u32)> = client
    .walk(target, &q_root)
    .await?
    .into_iter()
    .filter_map(|(oid, value)| {
      let index = oid.suffix(&q_root).filter(|s| s.len() == 7)?;
      let vlan = u16::try_from(index[0]).ok()?;
      Some((vlan, mac_from_arcs(&index[1..])?, value.as_u32()?))
    })
    .collect();

  if entries.is_empty() {
    let d_root = Oid::from_arcs(oids::DOT1D_TP_FDB_PORT);
    entries = client
      .walk(target, &d_root)
      .await?
      .into_iter()
      .filter_map(|(oid, value)| {
        let index = oid.suffix(&d_root).filter(|s| s.len() == 6)?;
        Some((1, mac_from_arcs(index)?, value.as_u32()?))
      })
      .collect();
  }

  let rows = entries
    .into_iter()
    .filter(|(_, mac, bridge_port)| *bridge_port != 0 && mac.is_usable())
    .filter_map(|(vlan, mac, bridge_port)| {
      let if_index = base_ports.get(&bridge_port).copied().unwrap_or(bridge_port);
      let port_name = names.get(&if_index)?.clone();
      Some(FdbRow { mac, port_name, port_index: if_index, vlan })
    })
    .collect();
  Ok(rows)
}

// ─── CLI ─────────────────────────────────────────────────────────────────────

/// Dump the forwarding table over the command line. The session is closed
/// whatever the outcome.
pub async fn collect_cli<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<Vec<FdbRow>> {
  let profile = dialect::profile(target.dialect);
  let mut session = client.open_session(target).await?;
  let result = dump_table(&mut session, profile, target).await;
  session.close().await;
  result
}

async fn dump_table<S: CommandSession>(
  session: &mut S,
  profile: &DialectProfile,
  target: &DeviceTarget,
) -> Result<Vec<FdbRow>> {
  for command in profile.fdb_commands() {
    let output = session.run_command(command).await?;
    if cli::is_rejection(&output) {
      debug!(host = %target.hostname, command, "command rejected");
      continue;
    }
    return Ok(profile.parse_fdb(&output));
  }
  Err(Error::Unsupported("forwarding table dump"))
}

#[cfg(test)]
mod tests {
  use netloc_core::device::Dialect;

  use super::*;
  use crate::{
    snmp::Value,
    testing::{ScriptedClient, target, text},
  };

  fn names(client: ScriptedClient) -> ScriptedClient {
    client
      .with("1.3.6.1.2.1.31.1.1.1.1.5", text("GigabitEthernet0/0/5"))
      .with("1.3.6.1.2.1.31.1.1.1.1.81", text("Eth-Trunk81"))
  }

  #[tokio::test]
  async fn huawei_private_table() {
    let client = names(ScriptedClient::default())
      // 00:18:6e:35:76:31 in VLAN 100, VSI 0
      .with("1.3.6.1.4.1.2011.5.25.42.2.1.3.1.4.0.24.110.53.118.49.100.0", Value::Integer(81))
      // multicast, dropped
      .with("1.3.6.1.4.1.2011.5.25.42.2.1.3.1.4.1.0.94.0.0.1.1.0", Value::Integer(5))
      // unnamed interface, dropped
      .with("1.3.6.1.4.1.2011.5.25.42.2.1.3.1.4.0.24.110.53.118.50.1.0", Value::Integer(99));

    let rows = collect_snmp(&client, &target(Dialect::Huawei)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].mac.to_string(), "00:18:6E:35:76:31");
    assert_eq!(rows[0].port_name, "Eth-Trunk81");
    assert_eq!(rows[0].port_index, 81);
    assert_eq!(rows[0].vlan, 100);
  }

  #[tokio::test]
  async fn huawei_falls_back_to_bridge_tables() {
    let client = names(ScriptedClient::default())
      .with("1.3.6.1.2.1.17.1.4.1.2.3", Value::Integer(5))
      .with("1.3.6.1.2.1.17.7.1.2.2.1.2.20.0.24.110.53.118.49", Value::Integer(3));

    let rows = collect_snmp(&client, &target(Dialect::Huawei)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].port_name, "GigabitEthernet0/0/5");
    assert_eq!(rows[0].vlan, 20);
  }

  #[tokio::test]
  async fn plain_bridge_table_without_base_ports() {
    let client = names(ScriptedClient::default())
      .with("1.3.6.1.2.1.17.4.3.1.2.0.24.110.53.118.49", Value::Integer(5))
      // bridge port 0 is the CPU
      .with("1.3.6.1.2.1.17.4.3.1.2.0.24.110.53.118.50", Value::Integer(0));

    let rows = collect_snmp(&client, &target(Dialect::Cisco)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].port_index, 5);
    assert_eq!(rows[0].vlan, 1);
  }

  #[tokio::test]
  async fn generic_cli_tries_command_variants() {
    let client = ScriptedClient::default().with_command(
      "display mac-address",
      "0018-6e35-7631 100/-/-   GE0/0/5   dynamic\n",
    );

    let rows = collect_cli(&client, &target(Dialect::Generic)).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].port_name, "GE0/0/5");
    assert_eq!(rows[0].vlan, 100);
    assert_eq!(rows[0].port_index, 0);
  }

  #[tokio::test]
  async fn every_command_rejected_is_unsupported() {
    let err = collect_cli(&ScriptedClient::default(), &target(Dialect::Cisco))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
  }
}
