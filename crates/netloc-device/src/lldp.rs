//! Neighbor-discovery collection from the LLDP remote tables.

use std::{
  collections::BTreeMap,
  net::{IpAddr, Ipv4Addr},
};

use netloc_core::{
  observation::{Capabilities, NeighborRecord},
  topology::LinkProtocol,
};
use tracing::debug;

use crate::{
  DeviceClient, DeviceTarget, Result, dialect, oids,
  snmp::{Oid, Value},
  system,
};

/// `(localPortNum, remIndex)` plus the time mark, as it appears in the
/// index. Entries are keyed on the full triple so re-learned neighbors do
/// not collide.
type InstanceKey = Vec<u32>;

#[derive(Debug, Default)]
struct Partial {
  local_port:   u32,
  chassis_id:   Option<String>,
  port_id:      Option<String>,
  port_desc:    Option<String>,
  system_name:  Option<String>,
  caps_sup:     Capabilities,
  caps_enabled: Capabilities,
  address:      Option<IpAddr>,
}

/// Split a row index into its key and local port number. Standard rows
/// are `timeMark.localPortNum.remIndex`; shorter vendor rows drop the
/// time mark.
fn split_instance(index: &[u32]) -> Option<(InstanceKey, u32)> {
  match index.len() {
    0 | 1 => None,
    2 => Some((index.to_vec(), index[0])),
    n => {
      let key = index[n - 3..].to_vec();
      let local = key[1];
      Some((key, local))
    }
  }
}

/// Collect the device's neighbors: the standard table, then the vendor
/// alternate when the standard one is empty and the dialect has one.
pub async fn collect<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<Vec<NeighborRecord>> {
  let mut entries = standard_table(client, target).await?;
  let mut protocol = LinkProtocol::Lldp;

  if entries.is_empty() && dialect::profile(target.dialect).has_vendor_lldp() {
    debug!(host = %target.hostname, "standard neighbor table empty, trying vendor table");
    entries = vendor_table(client, target).await?;
    protocol = LinkProtocol::VendorLldp;
  }
  if entries.is_empty() {
    return Ok(Vec::new());
  }

  let names = system::interface_names(client, target)
    .await
    .unwrap_or_default();
  let loc_root = Oid::from_arcs(oids::LLDP_LOC_PORT_ID);
  let loc_ids: BTreeMap<u32, String> = client
    .walk(target, &loc_root)
    .await
    .unwrap_or_default()
    .into_iter()
    .filter_map(|(oid, value)| Some((*oid.suffix(&loc_root)?.last()?, value.as_text()?)))
    .collect();

  let records = entries
    .into_values()
    .filter(|p| p.system_name.is_some() || p.chassis_id.is_some())
    .map(|p| NeighborRecord {
      local_port_index: p.local_port,
      local_port_name: names
        .get(&p.local_port)
        .or_else(|| loc_ids.get(&p.local_port))
        .cloned(),
      remote_system_name: p.system_name,
      remote_port_id: p.port_id,
      remote_port_description: p.port_desc,
      remote_chassis_id: p.chassis_id,
      remote_address: p.address,
      capabilities_supported: p.caps_sup,
      capabilities_enabled: p.caps_enabled,
      protocol,
    })
    .collect::<Vec<_>>();

  debug!(host = %target.hostname, neighbors = records.len(), %protocol, "neighbors collected");
  Ok(records)
}

async fn walk_column<C, F>(
  client: &C,
  target: &DeviceTarget,
  root: Oid,
  entries: &mut BTreeMap<InstanceKey, Partial>,
  mut apply: F,
) -> Result<()>
where
  C: DeviceClient,
  F: FnMut(&mut Partial, Value),
{
  for (oid, value) in client.walk(target, &root).await? {
    let Some((key, local_port)) = oid.suffix(&root).and_then(split_instance) else {
      continue;
    };
    let partial = entries.entry(key).or_default();
    partial.local_port = local_port;
    apply(partial, value);
  }
  Ok(())
}

async fn standard_table<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<BTreeMap<InstanceKey, Partial>> {
  let entry = Oid::from_arcs(oids::LLDP_REM_ENTRY);
  let mut entries = BTreeMap::new();

  walk_column(client, target, entry.child(&[oids::LLDP_REM_SYS_NAME]), &mut entries, |p, v| {
    p.system_name = v.as_text();
  })
  .await?;
  walk_column(client, target, entry.child(&[oids::LLDP_REM_CHASSIS_ID]), &mut entries, |p, v| {
    p.chassis_id = v.display();
  })
  .await?;
  walk_column(client, target, entry.child(&[oids::LLDP_REM_PORT_ID]), &mut entries, |p, v| {
    p.port_id = v.display();
  })
  .await?;
  walk_column(client, target, entry.child(&[oids::LLDP_REM_PORT_DESC]), &mut entries, |p, v| {
    p.port_desc = v.as_text();
  })
  .await?;
  walk_column(
    client,
    target,
    entry.child(&[oids::LLDP_REM_SYS_CAP_SUPPORTED]),
    &mut entries,
    |p, v| p.caps_sup = v.as_bytes().map(Capabilities::from_snmp_bits).unwrap_or_default(),
  )
  .await?;
  walk_column(
    client,
    target,
    entry.child(&[oids::LLDP_REM_SYS_CAP_ENABLED]),
    &mut entries,
    |p, v| p.caps_enabled = v.as_bytes().map(Capabilities::from_snmp_bits).unwrap_or_default(),
  )
  .await?;

  if !entries.is_empty() {
    management_addresses(client, target, &mut entries).await;
  }
  Ok(entries)
}

/// `lldpRemManAddrTable` carries the address in its index:
/// `timeMark.localPortNum.remIndex.addrSubtype.addrLen.addr...`. Only IPv4
/// (subtype 1, four octets) is decoded.
async fn management_addresses<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
  entries: &mut BTreeMap<InstanceKey, Partial>,
) {
  let root = Oid::from_arcs(oids::LLDP_REM_MAN_ADDR_IF_SUBTYPE);
  let rows = match client.walk(target, &root).await {
    Ok(rows) => rows,
    Err(e) => {
      debug!(host = %target.hostname, error = %e, "management addresses unavailable");
      return;
    }
  };

  for (oid, _) in rows {
    let Some(index) = oid.suffix(&root) else { continue };
    let &[time_mark, local, rem, 1, 4, a, b, c, d, ..] = index else { continue };
    let octets = [a, b, c, d].map(|x| u8::try_from(x).unwrap_or(0));
    if let Some(partial) = entries.get_mut(&[time_mark, local, rem][..]) {
      partial.address = Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
  }
}

fn value_to_address(value: &Value) -> Option<IpAddr> {
  match value {
    Value::IpAddress(ip) => Some(IpAddr::V4(*ip)),
    Value::OctetString(bytes) if bytes.len() == 4 => {
      Some(IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])))
    }
    other => other.as_text()?.parse().ok(),
  }
}

async fn vendor_table<C: DeviceClient>(
  client: &C,
  target: &DeviceTarget,
) -> Result<BTreeMap<InstanceKey, Partial>> {
  let mut entries = BTreeMap::new();
  walk_column(client, target, Oid::from_arcs(oids::HW_LLDP_REM_SYS_NAME), &mut entries, |p, v| {
    p.system_name = v.as_text();
  })
  .await?;
  walk_column(client, target, Oid::from_arcs(oids::HW_LLDP_REM_PORT_ID), &mut entries, |p, v| {
    p.port_id = v.display();
  })
  .await?;
  walk_column(client, target, Oid::from_arcs(oids::HW_LLDP_REM_MAN_ADDR), &mut entries, |p, v| {
    p.address = value_to_address(&v);
  })
  .await?;
  Ok(entries)
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use netloc_core::{device::Dialect, port::NeighborType};

  use super::*;
  use crate::testing::{ScriptedClient, target, text};

  const REM: &str = "1.0.8802.1.1.2.1.4.1.1";

  fn caps(octet: u8) -> Value { Value::OctetString(Bytes::copy_from_slice(&[octet, 0])) }

  #[tokio::test]
  async fn standard_table_with_management_address() {
    let client = ScriptedClient::default()
      .with("1.3.6.1.2.1.31.1.1.1.1.49", text("XGigabitEthernet0/0/1"))
      .with(&format!("{REM}.5.0.49.1"), Value::OctetString(Bytes::from_static(&[0, 0xe0, 0xfc, 0x12, 0x34, 0x56])))
      .with(&format!("{REM}.7.0.49.1"), text("XGigabitEthernet1/0/8"))
      .with(&format!("{REM}.9.0.49.1"), text("07_L3_CORE"))
      .with(&format!("{REM}.11.0.49.1"), caps(0x28))
      .with(&format!("{REM}.12.0.49.1"), caps(0x28))
      .with("1.0.8802.1.1.2.1.4.2.1.3.0.49.1.1.4.10.0.0.1", Value::Integer(2));

    let records = collect(&client, &target(Dialect::Huawei)).await.unwrap();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.local_port_index, 49);
    assert_eq!(r.local_port_name.as_deref(), Some("XGigabitEthernet0/0/1"));
    assert_eq!(r.remote_system_name.as_deref(), Some("07_L3_CORE"));
    assert_eq!(r.remote_port_id.as_deref(), Some("XGigabitEthernet1/0/8"));
    assert_eq!(r.remote_chassis_id.as_deref(), Some("00:E0:FC:12:34:56"));
    assert_eq!(r.remote_address, Some("10.0.0.1".parse().unwrap()));
    assert_eq!(r.neighbor_type(), NeighborType::Router);
    assert_eq!(r.protocol, LinkProtocol::Lldp);
  }

  #[tokio::test]
  async fn local_name_falls_back_to_loc_port_id() {
    let client = ScriptedClient::default()
      .with("1.0.8802.1.1.2.1.3.7.1.3.3", text("GE0/0/3"))
      .with(&format!("{REM}.9.0.3.2"), text("FLOOR1-AP02"));

    let records = collect(&client, &target(Dialect::Cisco)).await.unwrap();
    assert_eq!(records[0].local_port_name.as_deref(), Some("GE0/0/3"));
    assert_eq!(records[0].neighbor_type(), NeighborType::AccessPoint);
  }

  #[tokio::test]
  async fn vendor_table_when_standard_is_empty() {
    let client = ScriptedClient::default()
      .with("1.3.6.1.4.1.2011.5.25.134.1.1.1.1.6.12.1", text("07_L2_RACK02"))
      .with("1.3.6.1.4.1.2011.5.25.134.1.1.1.1.4.12.1", text("GE0/0/48"))
      .with("1.3.6.1.4.1.2011.5.25.134.1.1.1.1.9.12.1", Value::IpAddress(Ipv4Addr::new(10, 0, 7, 2)));

    let records = collect(&client, &target(Dialect::Huawei)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].local_port_index, 12);
    assert_eq!(records[0].protocol, LinkProtocol::VendorLldp);
    assert_eq!(records[0].remote_address, Some("10.0.7.2".parse().unwrap()));

    let cisco = collect(&client, &target(Dialect::Cisco)).await.unwrap();
    assert!(cisco.is_empty());
  }
}
