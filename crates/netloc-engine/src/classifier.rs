//! Location classification.
//!
//! An address is learned on every switch its frames cross, so a sighting
//! on an uplink says little about where the address lives. The rules here
//! let a sighting on an access port win over one on an uplink, never the
//! other way round. The classifier is pure: it reads a snapshot and returns
//! a [`Classification`] for the store to apply atomically.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use netloc_core::{
  MacAddr,
  address::{AddressRecord, Attachment, HistoryEvent, Location},
  oui,
  plan::{Classification, Placement, Retirement},
  port::{NeighborType, Port, PortRole},
};
use serde::Serialize;
use uuid::Uuid;

/// One forwarding-table row after its port has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
  pub mac:     MacAddr,
  pub port_id: Uuid,
  pub vlan:    u16,
}

/// The role a port should carry given what neighbor discovery last said
/// about it. Access-point and phone neighbors override an uplink-looking
/// name; switch, router and unclassifiable neighbors make it an uplink.
pub fn infer_role(port: &Port) -> PortRole {
  match port.neighbor_type {
    Some(t) if t.implies_uplink() => PortRole::Uplink,
    Some(NeighborType::AccessPoint) => PortRole::AccessPoint,
    Some(NeighborType::Phone) => PortRole::Phone,
    _ => PortRole::from_name(&port.name),
  }
}

/// Decide, for one device's snapshot, which addresses appeared, moved,
/// stayed or vanished.
///
/// `current` holds the current locations of every sighted address plus
/// every current location on `device_id`. `is_uplink` answers for any port
/// referenced by either. `known` lists the sighted addresses recorded by an
/// earlier pass; only the others get a "new" history event.
pub fn classify<F>(
  device_id: Uuid,
  sightings: &[Sighting],
  current: &[Location],
  known: &HashSet<MacAddr>,
  is_uplink: F,
  at: DateTime<Utc>,
) -> Classification
where
  F: Fn(Uuid) -> bool,
{
  let mut seen = HashSet::new();
  let sightings: Vec<&Sighting> = sightings
    .iter()
    .filter(|s| seen.insert(s.mac))
    .collect();

  let by_mac: HashMap<MacAddr, &Location> = current
    .iter()
    .filter(|l| l.is_current)
    .map(|l| (l.mac, l))
    .collect();

  let mut plan = Classification::default();

  for location in by_mac.values() {
    if location.device_id == device_id && !seen.contains(&location.mac) {
      plan.retirements.push(Retirement {
        location_id: location.location_id,
        event:       HistoryEvent::disappeared(location.mac, location.attachment(), at),
      });
    }
  }
  plan.retirements.sort_by_key(|r| r.event.mac);

  for sighting in sightings {
    plan.addresses.push(AddressRecord::sighted(sighting.mac, at));
    let to = Attachment { device_id, port_id: sighting.port_id, vlan: sighting.vlan };
    let uplink = is_uplink(sighting.port_id);
    let endpoint_class = oui::is_endpoint_vendor(&sighting.mac);
    let first_sighting = !known.contains(&sighting.mac);

    match by_mac.get(&sighting.mac) {
      // Only a brand-new access point or phone may land on an uplink; a
      // known one waits for its access port to be discovered.
      None if uplink && !(endpoint_class && first_sighting) => {
        plan.discarded.push(sighting.mac);
      }
      None => plan.placements.push(Placement {
        supersedes: None,
        location:   Location::new(sighting.mac, to, at),
        event:      first_sighting.then(|| HistoryEvent::new(sighting.mac, to, at)),
      }),
      Some(old) if old.is_at(device_id, sighting.port_id) => {
        plan.refreshes.push(old.location_id);
      }
      // Still transiting this device on its way to the real endpoint.
      Some(old) if uplink && !is_uplink(old.port_id) => {
        plan.refreshes.push(old.location_id);
      }
      // Uplink to uplink says nothing new about an access point or phone.
      Some(old) if uplink && endpoint_class => {
        plan.refreshes.push(old.location_id);
      }
      Some(old) => plan.placements.push(Placement {
        supersedes: Some(old.location_id),
        location:   Location::new(sighting.mac, to, at),
        event:      Some(HistoryEvent::moved(sighting.mac, old.attachment(), to, at)),
      }),
    }
  }

  plan
}

/// An access port carrying more addresses than an access port should.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UplinkSignal {
  pub port_id:       Uuid,
  pub port_name:     String,
  pub address_count: u32,
}

/// Ports not classified uplink whose distinct sighted addresses exceed
/// `threshold`, ordered by port name.
pub fn unmapped_uplinks<'a>(
  sightings: &[Sighting],
  ports: impl IntoIterator<Item = &'a Port>,
  threshold: u32,
) -> Vec<UplinkSignal> {
  let mut per_port: HashMap<Uuid, HashSet<MacAddr>> = HashMap::new();
  for s in sightings {
    per_port.entry(s.port_id).or_default().insert(s.mac);
  }

  let mut signals: Vec<UplinkSignal> = ports
    .into_iter()
    .filter(|p| !infer_role(p).is_uplink())
    .filter_map(|p| {
      let count = u32::try_from(per_port.get(&p.port_id)?.len()).unwrap_or(u32::MAX);
      (count > threshold).then(|| UplinkSignal {
        port_id:       p.port_id,
        port_name:     p.name.clone(),
        address_count: count,
      })
    })
    .collect();
  signals.sort_by(|a, b| a.port_name.cmp(&b.port_name));
  signals
}
