//! Write plans.
//!
//! The engine decides; the store applies. A [`DevicePass`] carries every
//! mutation one device's discovery pass produces so a backend can commit it
//! as a single transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  MacAddr,
  address::{AddressRecord, HistoryEvent, Location},
  device::SystemInfo,
  port::{NeighborType, Port},
  topology::TopologyLink,
};

// ─── Device pass ─────────────────────────────────────────────────────────────

/// Everything one device's pass writes.
#[derive(Debug, Clone)]
pub struct DevicePass {
  pub device_id:      Uuid,
  pub observed_at:    DateTime<Utc>,
  /// Refreshed system information, when collection succeeded.
  pub info:           Option<SystemInfo>,
  /// Ports to insert or update by `port_id`. May include the far-end port
  /// on a neighbor device.
  pub ports:          Vec<Port>,
  /// Links to upsert, keyed by their unordered device pair.
  pub links:          Vec<TopologyLink>,
  pub classification: Classification,
}

/// Location decisions for one forwarding-table snapshot.
#[derive(Debug, Clone, Default)]
pub struct Classification {
  /// Every usable address in the snapshot; inserted if unknown, otherwise
  /// `last_seen` is bumped and the record re-activated.
  pub addresses:   Vec<AddressRecord>,
  /// Current locations on this device whose address vanished.
  pub retirements: Vec<Retirement>,
  /// New current locations, each optionally superseding the previous one.
  pub placements:  Vec<Placement>,
  /// Locations that stay current; only `last_seen` moves.
  pub refreshes:   Vec<Uuid>,
  /// Sightings dropped as in transit.
  pub discarded:   Vec<MacAddr>,
}

#[derive(Debug, Clone)]
pub struct Retirement {
  pub location_id: Uuid,
  pub event:       HistoryEvent,
}

#[derive(Debug, Clone)]
pub struct Placement {
  /// The current location being replaced. The store must verify it is still
  /// the address's current location before flipping it.
  pub supersedes: Option<Uuid>,
  pub location:   Location,
  /// `None` when a known address is placed again after disappearing.
  pub event:      Option<HistoryEvent>,
}

impl Classification {
  /// Addresses whose current location this plan changes.
  pub fn touched(&self) -> Vec<MacAddr> {
    let mut macs: Vec<MacAddr> = self
      .placements
      .iter()
      .map(|p| p.location.mac)
      .chain(self.retirements.iter().map(|r| r.event.mac))
      .collect();
    macs.sort();
    macs.dedup();
    macs
  }

  pub fn summary(&self) -> ClassificationSummary {
    let moved = self
      .placements
      .iter()
      .filter(|p| p.supersedes.is_some())
      .count();
    ClassificationSummary {
      created:     self.placements.len() - moved,
      moved,
      refreshed:   self.refreshes.len(),
      disappeared: self.retirements.len(),
      discarded:   self.discarded.len(),
    }
  }
}

/// Counts reported back to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationSummary {
  pub created:     usize,
  pub moved:       usize,
  pub refreshed:   usize,
  pub disappeared: usize,
  pub discarded:   usize,
}

// ─── Port merge ──────────────────────────────────────────────────────────────

/// Ports on one device that share an interface index.
#[derive(Debug, Clone)]
pub struct DuplicatePortGroup {
  pub device_id: Uuid,
  pub index:     u32,
  pub ports:     Vec<PortUsage>,
}

#[derive(Debug, Clone)]
pub struct PortUsage {
  pub port:           Port,
  /// Location rows (current or not) referencing the port.
  pub location_count: u32,
}

/// Collapse `remove` into `keep`, re-pointing every reference.
#[derive(Debug, Clone)]
pub struct PortMerge {
  pub device_id:     Uuid,
  pub keep:          Uuid,
  pub remove:        Vec<Uuid>,
  /// Neighbor data to carry onto the survivor when it has none.
  pub neighbor_name: Option<String>,
  pub neighbor_type: Option<NeighborType>,
}
