//! Integration tests for `SqliteStore` against an in-memory database.

use std::net::{IpAddr, Ipv4Addr};

use chrono::{Duration, Utc};
use netloc_core::{
  MacAddr,
  address::{AddressRecord, Attachment, EventKind, HistoryEvent, Location},
  device::{Device, Dialect, NewDevice, SystemInfo},
  discovery::{DiscoveryLog, DiscoveryMethod, DiscoveryStatus},
  plan::{Classification, DevicePass, Placement, PortMerge, Retirement},
  port::{NeighborType, Port, PortRole},
  store::NetworkStore,
  topology::{LinkProtocol, TopologyLink},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ip(last: u8) -> IpAddr { IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)) }

fn mac(last: u8) -> MacAddr { MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, last]) }

async fn device(s: &SqliteStore, hostname: &str, last: u8) -> Device {
  s.add_device(NewDevice::new(hostname, ip(last)).with_dialect(Dialect::Huawei))
    .await
    .unwrap()
}

fn empty_pass(device_id: Uuid) -> DevicePass {
  DevicePass {
    device_id,
    observed_at: Utc::now(),
    info: None,
    ports: vec![],
    links: vec![],
    classification: Classification::default(),
  }
}

/// A pass that places `m` on `port` with no previous location.
fn place_new(port: &Port, m: MacAddr) -> DevicePass {
  let at = Utc::now();
  let to = Attachment { device_id: port.device_id, port_id: port.port_id, vlan: 10 };
  let mut pass = empty_pass(port.device_id);
  pass.ports = vec![port.clone()];
  pass.classification.addresses = vec![AddressRecord::sighted(m, at)];
  pass.classification.placements = vec![Placement {
    supersedes: None,
    location:   Location::new(m, to, at),
    event:      Some(HistoryEvent::new(m, to, at)),
  }];
  pass
}

/// A pass that moves `m` from `old` to `port`.
fn place_move(port: &Port, old: &Location) -> DevicePass {
  let at = Utc::now();
  let to = Attachment { device_id: port.device_id, port_id: port.port_id, vlan: 10 };
  let mut pass = empty_pass(port.device_id);
  pass.ports = vec![port.clone()];
  pass.classification.addresses = vec![AddressRecord::sighted(old.mac, at)];
  pass.classification.placements = vec![Placement {
    supersedes: Some(old.location_id),
    location:   Location::new(old.mac, to, at),
    event:      Some(HistoryEvent::moved(old.mac, old.attachment(), to, at)),
  }];
  pass
}

// ─── Devices ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_device() {
  let s = store().await;
  let d = device(&s, "07_L2_RACK01", 1).await;

  let fetched = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(fetched.hostname, "07_L2_RACK01");
  assert_eq!(fetched.address, ip(1));
  assert_eq!(fetched.dialect, Dialect::Huawei);
  assert_eq!(fetched.site_code.as_deref(), Some("07"));
  assert!(fetched.is_active);
  assert!(fetched.last_discovery.is_none());
}

#[tokio::test]
async fn get_device_missing_returns_none() {
  let s = store().await;
  assert!(s.get_device(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn hostname_lookup_is_case_insensitive() {
  let s = store().await;
  let d = device(&s, "AB-Core-01", 1).await;

  let found = s
    .find_device_by_hostname("ab-core-01".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found.device_id, d.device_id);
}

#[tokio::test]
async fn duplicate_hostname_is_rejected() {
  let s = store().await;
  device(&s, "sw1", 1).await;
  let err = s.add_device(NewDevice::new("SW1", ip(2))).await.unwrap_err();
  assert!(matches!(err, Error::Database(_)));
}

#[tokio::test]
async fn find_device_by_address() {
  let s = store().await;
  let d = device(&s, "sw1", 7).await;
  let found = s.find_device_by_address(ip(7)).await.unwrap().unwrap();
  assert_eq!(found.device_id, d.device_id);
  assert!(s.find_device_by_address(ip(8)).await.unwrap().is_none());
}

#[tokio::test]
async fn list_devices_respects_active_flag() {
  let s = store().await;
  let a = device(&s, "sw-a", 1).await;
  device(&s, "sw-b", 2).await;

  s.set_device_active(a.device_id, false).await.unwrap();

  assert_eq!(s.list_devices(false).await.unwrap().len(), 2);
  let active = s.list_devices(true).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].hostname, "sw-b");
}

#[tokio::test]
async fn set_active_on_missing_device_errors() {
  let s = store().await;
  let err = s.set_device_active(Uuid::new_v4(), false).await.unwrap_err();
  assert!(matches!(err, Error::DeviceNotFound(_)));
}

// ─── Device passes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn new_placement_creates_location_event_and_count() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GigabitEthernet0/0/1", 5, Utc::now());
  let m = mac(1);

  let mut pass = place_new(&port, m);
  pass.info = Some(SystemInfo {
    sys_name: Some("sw1".into()),
    ports_up: 4,
    ..SystemInfo::default()
  });
  s.commit_device_pass(pass).await.unwrap();

  let current = s.locations_of(m, true).await.unwrap();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].port_id, port.port_id);
  assert_eq!(current[0].vlan, 10);

  let history = s.history_of(m).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].kind, EventKind::New);

  let ports = s.list_ports(d.device_id).await.unwrap();
  assert_eq!(ports.len(), 1);
  assert_eq!(ports[0].address_count, 1);

  let d = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(d.info.ports_up, 4);
  assert!(d.last_discovery.is_some());

  let record = s.get_address(m).await.unwrap().unwrap();
  assert!(record.is_active);
}

#[tokio::test]
async fn move_supersedes_previous_location() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let p1 = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let p2 = Port::new(d.device_id, "GE0/0/2", 2, Utc::now());
  let m = mac(2);

  s.commit_device_pass(place_new(&p1, m)).await.unwrap();
  let old = s.locations_of(m, true).await.unwrap().remove(0);

  s.commit_device_pass(place_move(&p2, &old)).await.unwrap();

  let all = s.locations_of(m, false).await.unwrap();
  assert_eq!(all.len(), 2);
  let current: Vec<_> = all.iter().filter(|l| l.is_current).collect();
  assert_eq!(current.len(), 1);
  assert_eq!(current[0].port_id, p2.port_id);

  let kinds: Vec<_> = s.history_of(m).await.unwrap().iter().map(|e| e.kind).collect();
  assert_eq!(kinds, vec![EventKind::New, EventKind::Move]);

  let ports = s.list_ports(d.device_id).await.unwrap();
  let count = |id| ports.iter().find(|p| p.port_id == id).unwrap().address_count;
  assert_eq!(count(p1.port_id), 0);
  assert_eq!(count(p2.port_id), 1);
}

#[tokio::test]
async fn stale_supersession_rolls_back_whole_pass() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let p1 = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let m = mac(3);
  s.commit_device_pass(place_new(&p1, m)).await.unwrap();

  // A placement that believes the address has no current location.
  let p2 = Port::new(d.device_id, "GE0/0/2", 2, Utc::now());
  let err = s.commit_device_pass(place_new(&p2, m)).await.unwrap_err();
  assert!(matches!(err, Error::StaleSupersession { expected: None, .. }));

  // Nothing from the rejected pass survives, not even its port.
  let ports = s.list_ports(d.device_id).await.unwrap();
  assert_eq!(ports.len(), 1);
  assert_eq!(s.locations_of(m, false).await.unwrap().len(), 1);
  assert_eq!(s.history_of(m).await.unwrap().len(), 1);
}

#[tokio::test]
async fn superseding_an_old_location_is_rejected() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let p1 = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let p2 = Port::new(d.device_id, "GE0/0/2", 2, Utc::now());
  let p3 = Port::new(d.device_id, "GE0/0/3", 3, Utc::now());
  let m = mac(4);

  s.commit_device_pass(place_new(&p1, m)).await.unwrap();
  let first = s.locations_of(m, true).await.unwrap().remove(0);
  s.commit_device_pass(place_move(&p2, &first)).await.unwrap();

  let err = s.commit_device_pass(place_move(&p3, &first)).await.unwrap_err();
  assert!(matches!(err, Error::StaleSupersession { .. }));
  assert_eq!(s.locations_of(m, true).await.unwrap()[0].port_id, p2.port_id);
}

#[tokio::test]
async fn retirement_records_disappear() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let m = mac(5);
  s.commit_device_pass(place_new(&port, m)).await.unwrap();
  let loc = s.locations_of(m, true).await.unwrap().remove(0);

  let mut pass = empty_pass(d.device_id);
  pass.classification.retirements = vec![Retirement {
    location_id: loc.location_id,
    event:       HistoryEvent::disappeared(m, loc.attachment(), Utc::now()),
  }];
  s.commit_device_pass(pass).await.unwrap();

  assert!(s.locations_of(m, true).await.unwrap().is_empty());
  assert!(s.current_locations_on_device(d.device_id).await.unwrap().is_empty());
  let history = s.history_of(m).await.unwrap();
  assert_eq!(history.last().unwrap().kind, EventKind::Disappear);
  assert_eq!(history.last().unwrap().to, None);
  assert_eq!(s.list_ports(d.device_id).await.unwrap()[0].address_count, 0);
}

#[tokio::test]
async fn refresh_moves_only_last_seen() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let m = mac(6);
  s.commit_device_pass(place_new(&port, m)).await.unwrap();
  let before = s.locations_of(m, true).await.unwrap().remove(0);

  let mut pass = empty_pass(d.device_id);
  pass.observed_at = before.last_seen + Duration::minutes(5);
  pass.classification.refreshes = vec![before.location_id];
  s.commit_device_pass(pass).await.unwrap();

  let after = s.locations_of(m, true).await.unwrap().remove(0);
  assert_eq!(after.location_id, before.location_id);
  assert_eq!(after.first_seen, before.first_seen);
  assert!(after.last_seen > before.last_seen);
  assert_eq!(s.history_of(m).await.unwrap().len(), 1);
}

#[tokio::test]
async fn current_locations_for_batches() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  s.commit_device_pass(place_new(&port, mac(10))).await.unwrap();
  s.commit_device_pass(place_new(&port, mac(11))).await.unwrap();

  let found = s
    .current_locations_for(vec![mac(10), mac(11), mac(12)])
    .await
    .unwrap();
  assert_eq!(found.len(), 2);
  assert!(s.current_locations_for(vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn known_addresses_filters_unrecorded() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  s.commit_device_pass(place_new(&port, mac(30))).await.unwrap();

  let known = s.known_addresses(vec![mac(30), mac(31)]).await.unwrap();
  assert_eq!(known, vec![mac(30)]);
  assert!(s.known_addresses(vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn placement_without_event_writes_no_history() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let mut pass = place_new(&port, mac(32));
  pass.classification.placements[0].event = None;
  s.commit_device_pass(pass).await.unwrap();

  assert_eq!(s.locations_of(mac(32), true).await.unwrap().len(), 1);
  assert!(s.history_of(mac(32)).await.unwrap().is_empty());
}

#[tokio::test]
async fn distinct_addresses_counts_history_rows() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let p1 = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  let p2 = Port::new(d.device_id, "GE0/0/2", 2, Utc::now());

  s.commit_device_pass(place_new(&p1, mac(20))).await.unwrap();
  s.commit_device_pass(place_new(&p1, mac(21))).await.unwrap();
  let old = s.locations_of(mac(21), true).await.unwrap().remove(0);
  s.commit_device_pass(place_move(&p2, &old)).await.unwrap();

  assert_eq!(s.distinct_addresses_on_port(p1.port_id).await.unwrap(), 2);
  assert_eq!(s.distinct_addresses_on_port(p2.port_id).await.unwrap(), 1);
}

#[tokio::test]
async fn deactivate_addresses_before_cutoff() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let port = Port::new(d.device_id, "GE0/0/1", 1, Utc::now());
  s.commit_device_pass(place_new(&port, mac(30))).await.unwrap();

  let changed = s
    .deactivate_addresses_before(Utc::now() - Duration::days(1))
    .await
    .unwrap();
  assert_eq!(changed, 0);

  let changed = s
    .deactivate_addresses_before(Utc::now() + Duration::seconds(1))
    .await
    .unwrap();
  assert_eq!(changed, 1);
  assert!(!s.get_address(mac(30)).await.unwrap().unwrap().is_active);
}

// ─── Links ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn link_is_unique_per_unordered_pair() {
  let s = store().await;
  let a = device(&s, "sw-a", 1).await;
  let b = device(&s, "sw-b", 2).await;
  let pa = Port::new(a.device_id, "XGE0/0/1", 1, Utc::now());
  let pb = Port::new(b.device_id, "XGE0/0/2", 2, Utc::now());
  let now = Utc::now();

  let mut from_a = empty_pass(a.device_id);
  from_a.ports = vec![pa.clone()];
  from_a.links = vec![TopologyLink {
    link_id:          Uuid::new_v4(),
    local_device_id:  a.device_id,
    local_port_id:    pa.port_id,
    remote_device_id: b.device_id,
    remote_port_id:   None,
    protocol:         LinkProtocol::Lldp,
    discovered_at:    now,
    last_seen:        now,
  }];
  s.commit_device_pass(from_a).await.unwrap();

  let mut from_b = empty_pass(b.device_id);
  from_b.ports = vec![pb.clone()];
  from_b.links = vec![TopologyLink {
    link_id:          Uuid::new_v4(),
    local_device_id:  b.device_id,
    local_port_id:    pb.port_id,
    remote_device_id: a.device_id,
    remote_port_id:   Some(pa.port_id),
    protocol:         LinkProtocol::Lldp,
    discovered_at:    now,
    last_seen:        now,
  }];
  s.commit_device_pass(from_b).await.unwrap();

  let links = s.list_links().await.unwrap();
  assert_eq!(links.len(), 1);
  assert_eq!(links[0].port_on(a.device_id), Some(pa.port_id));
  assert_eq!(links[0].port_on(b.device_id), Some(pb.port_id));
  assert_eq!(s.links_of_device(b.device_id).await.unwrap().len(), 1);
}

// ─── Port merge ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_ports_repoints_every_reference() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let peer = device(&s, "sw2", 2).await;
  let keep = Port::new(d.device_id, "GigabitEthernet0/0/7", 7, Utc::now());
  let dup = Port::new(d.device_id, "GE0/0/7", 7, Utc::now());
  let now = Utc::now();

  s.commit_device_pass(place_new(&keep, mac(40))).await.unwrap();
  s.commit_device_pass(place_new(&keep, mac(41))).await.unwrap();
  let mut pass = place_new(&dup, mac(42));
  pass.links = vec![TopologyLink {
    link_id:          Uuid::new_v4(),
    local_device_id:  d.device_id,
    local_port_id:    dup.port_id,
    remote_device_id: peer.device_id,
    remote_port_id:   None,
    protocol:         LinkProtocol::Lldp,
    discovered_at:    now,
    last_seen:        now,
  }];
  s.commit_device_pass(pass).await.unwrap();

  let groups = s.duplicate_ports().await.unwrap();
  assert_eq!(groups.len(), 1);
  assert_eq!(groups[0].index, 7);
  assert_eq!(groups[0].ports.len(), 2);

  s.merge_ports(PortMerge {
    device_id:     d.device_id,
    keep:          keep.port_id,
    remove:        vec![dup.port_id],
    neighbor_name: Some("sw2".into()),
    neighbor_type: Some(NeighborType::Switch),
  })
  .await
  .unwrap();

  let ports = s.list_ports(d.device_id).await.unwrap();
  assert_eq!(ports.len(), 1);
  assert_eq!(ports[0].address_count, 3);
  assert_eq!(ports[0].neighbor_name.as_deref(), Some("sw2"));

  let moved = s.locations_of(mac(42), true).await.unwrap();
  assert_eq!(moved[0].port_id, keep.port_id);
  let event = &s.history_of(mac(42)).await.unwrap()[0];
  assert_eq!(event.to.unwrap().port_id, keep.port_id);
  assert_eq!(s.list_links().await.unwrap()[0].local_port_id, keep.port_id);
  assert!(s.duplicate_ports().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_index_ports_are_never_duplicates() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let mut pass = empty_pass(d.device_id);
  pass.ports = vec![
    Port::new(d.device_id, "Vlanif10", 0, Utc::now()),
    Port::new(d.device_id, "Vlanif20", 0, Utc::now()),
  ];
  s.commit_device_pass(pass).await.unwrap();

  assert!(s.duplicate_ports().await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_into_missing_port_errors() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let err = s
    .merge_ports(PortMerge {
      device_id:     d.device_id,
      keep:          Uuid::new_v4(),
      remove:        vec![],
      neighbor_name: None,
      neighbor_type: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::PortNotFound(_)));
}

#[tokio::test]
async fn port_role_roundtrips() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let mut port = Port::new(d.device_id, "Eth-Trunk1", 30, Utc::now());
  assert_eq!(port.role, PortRole::Trunk);
  port.role = PortRole::Uplink;
  port.neighbor_type = Some(NeighborType::Router);

  let mut pass = empty_pass(d.device_id);
  pass.ports = vec![port.clone()];
  s.commit_device_pass(pass).await.unwrap();

  let fetched = s.get_port(port.port_id).await.unwrap().unwrap();
  assert_eq!(fetched.role, PortRole::Uplink);
  assert_eq!(fetched.neighbor_type, Some(NeighborType::Router));
}

// ─── Discovery log ───────────────────────────────────────────────────────────

#[tokio::test]
async fn recent_discoveries_newest_first() {
  let s = store().await;
  let d = device(&s, "sw1", 1).await;
  let base = Utc::now() - Duration::hours(1);

  for (i, status) in [DiscoveryStatus::Success, DiscoveryStatus::Failed, DiscoveryStatus::Timeout]
    .into_iter()
    .enumerate()
  {
    let started = base + Duration::minutes(i as i64);
    s.record_discovery(DiscoveryLog::finished(
      d.device_id,
      DiscoveryMethod::Snmp,
      status,
      i as u32,
      None,
      started,
    ))
    .await
    .unwrap();
  }

  let logs = s.recent_discoveries(2).await.unwrap();
  assert_eq!(logs.len(), 2);
  assert_eq!(logs[0].status, DiscoveryStatus::Timeout);
  assert_eq!(logs[1].status, DiscoveryStatus::Failed);
}
