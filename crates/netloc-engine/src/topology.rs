//! Turning neighbor records into port roles and switch-to-switch links,
//! and reconciling duplicate port identities.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use netloc_core::{
  MacAddr,
  device::Device,
  observation::NeighborRecord,
  plan::{DuplicatePortGroup, PortMerge, PortUsage},
  port::{NeighborType, Port},
  topology::TopologyLink,
};
use uuid::Uuid;

use crate::{classifier::infer_role, directory::DeviceDirectory, ports::PortMap};

/// What one device's neighbor table contributes to its pass.
#[derive(Debug, Clone, Default)]
pub struct NeighborPlan {
  pub links:     Vec<TopologyLink>,
  /// Far-end ports on other devices that were created or tagged.
  pub remote:    Vec<Port>,
  /// Local ports whose neighbor data was recorded.
  pub tagged:    usize,
  /// Neighbor names that matched no managed device.
  pub unmanaged: Vec<String>,
}

/// Managed devices, other than `device_id`, that `records` point at.
pub fn remote_devices(
  device_id: Uuid,
  records: &[NeighborRecord],
  directory: &DeviceDirectory,
) -> Vec<Uuid> {
  let mut ids: Vec<Uuid> = records
    .iter()
    .filter_map(|r| resolve_remote(r, directory))
    .map(|d| d.device_id)
    .filter(|id| *id != device_id)
    .collect();
  ids.sort();
  ids.dedup();
  ids
}

fn resolve_remote<'a>(record: &NeighborRecord, directory: &'a DeviceDirectory) -> Option<&'a Device> {
  directory.resolve(record.remote_system_name.as_deref(), record.remote_address)
}

/// The far-end interface name. Some agents put the MAC address in the port
/// id and the interface name in the description.
fn remote_port_name(record: &NeighborRecord) -> Option<&str> {
  [record.remote_port_id.as_deref(), record.remote_port_description.as_deref()]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|name| !name.is_empty() && MacAddr::parse(name).is_err())
}

/// Tag `device`'s ports from its neighbor records and build the links to
/// managed neighbors. `remote_ports` must hold a port map for every id
/// [`remote_devices`] returned; missing maps just leave the far-end port
/// unset.
pub fn plan_neighbors(
  device: &Device,
  records: &[NeighborRecord],
  ports: &mut PortMap,
  directory: &DeviceDirectory,
  remote_ports: &mut HashMap<Uuid, PortMap>,
  at: DateTime<Utc>,
) -> NeighborPlan {
  let mut plan = NeighborPlan::default();
  let mut linked = HashSet::new();

  for record in records {
    let local_port_id = match record.local_port_name.as_deref() {
      Some(name) => ports.resolve(record.local_port_index, name, at),
      None => match ports.find(record.local_port_index, None) {
        Some(port) => port.port_id,
        None => continue,
      },
    };

    let neighbor_type = record.neighbor_type();
    let neighbor_name = record.display_name().map(str::to_owned);
    tag_port(ports, local_port_id, neighbor_name, neighbor_type, at);
    plan.tagged += 1;

    let Some(remote) = resolve_remote(record, directory) else {
      if let Some(name) = record.display_name() {
        plan.unmanaged.push(name.to_owned());
      }
      continue;
    };
    if remote.device_id == device.device_id || !linked.insert(remote.device_id) {
      continue;
    }

    let remote_port_id = remote_port_name(record).and_then(|name| {
      let map = remote_ports.get_mut(&remote.device_id)?;
      let port_id = map.resolve(0, name, at);
      if map.get(port_id).is_some_and(|p| !p.has_neighbor()) {
        tag_port(map, port_id, Some(device.hostname.clone()), NeighborType::Switch, at);
      }
      Some(port_id)
    });

    plan.links.push(TopologyLink {
      link_id: Uuid::new_v4(),
      local_device_id: device.device_id,
      local_port_id,
      remote_device_id: remote.device_id,
      remote_port_id,
      protocol: record.protocol,
      discovered_at: at,
      last_seen: at,
    });
  }

  plan.remote = remote_ports
    .values()
    .flat_map(|map| map.changed().cloned())
    .collect();
  plan
}

fn tag_port(
  ports: &mut PortMap,
  port_id: Uuid,
  neighbor_name: Option<String>,
  neighbor_type: NeighborType,
  at: DateTime<Utc>,
) {
  let unchanged = ports.get(port_id).is_some_and(|p| {
    p.neighbor_name == neighbor_name && p.neighbor_type == Some(neighbor_type) && p.role == infer_role(p)
  });
  if unchanged {
    return;
  }
  if let Some(port) = ports.get_mut(port_id) {
    port.neighbor_name = neighbor_name;
    port.neighbor_type = Some(neighbor_type);
    port.role = infer_role(port);
    port.updated_at = at;
  }
}

// ─── Port merge ──────────────────────────────────────────────────────────────

/// Pick the survivor of a duplicate group: the port most locations
/// reference, then one carrying neighbor data, then the first listed.
pub fn plan_merge(group: &DuplicatePortGroup) -> Option<PortMerge> {
  if group.ports.len() < 2 {
    return None;
  }

  let rank = |u: &PortUsage| (u.location_count, u.port.has_neighbor());
  let mut keeper = &group.ports[0];
  for usage in &group.ports[1..] {
    if rank(usage) > rank(keeper) {
      keeper = usage;
    }
  }

  let remove: Vec<Uuid> = group
    .ports
    .iter()
    .map(|u| u.port.port_id)
    .filter(|id| *id != keeper.port.port_id)
    .collect();

  let donor = (!keeper.port.has_neighbor())
    .then(|| group.ports.iter().find(|u| u.port.has_neighbor()))
    .flatten();

  Some(PortMerge {
    device_id: group.device_id,
    keep: keeper.port.port_id,
    remove,
    neighbor_name: donor.and_then(|u| u.port.neighbor_name.clone()),
    neighbor_type: donor.and_then(|u| u.port.neighbor_type),
  })
}
