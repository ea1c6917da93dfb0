//! The `NetworkStore` trait: the persistence collaborator of the engine.
//!
//! The trait is implemented by storage backends (e.g. `netloc-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.

use std::{future::Future, net::IpAddr};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  MacAddr,
  address::{AddressRecord, HistoryEvent, Location},
  device::{Device, NewDevice},
  discovery::DiscoveryLog,
  plan::{DevicePass, DuplicatePortGroup, PortMerge},
  port::Port,
  topology::TopologyLink,
};

/// Errors a backend reports. Callers need to tell a refused write apart
/// from a failed one.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The write was refused because it would break the one-current-location
  /// invariant, or because it was planned against state that has changed.
  fn is_integrity_violation(&self) -> bool;
}

/// Abstraction over a netloc store backend.
///
/// Locations and history are append-only from the caller's point of view:
/// a superseded location is flipped to not-current, never re-pointed.
/// Backends must reject any write that would leave an address with more
/// than one current location.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait NetworkStore: Send + Sync {
  type Error: StoreError;

  // ── Devices ───────────────────────────────────────────────────────────

  fn add_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  fn get_device(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn list_devices(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  /// Case-insensitive exact hostname match.
  fn find_device_by_hostname(
    &self,
    hostname: String,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn find_device_by_address(
    &self,
    address: IpAddr,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn set_device_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Ports ─────────────────────────────────────────────────────────────

  fn list_ports(
    &self,
    device_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Port>, Self::Error>> + Send + '_;

  fn get_port(
    &self,
    port_id: Uuid,
  ) -> impl Future<Output = Result<Option<Port>, Self::Error>> + Send + '_;

  // ── Addresses and locations ───────────────────────────────────────────

  fn get_address(
    &self,
    mac: MacAddr,
  ) -> impl Future<Output = Result<Option<AddressRecord>, Self::Error>> + Send + '_;

  /// Current locations placed on one device.
  fn current_locations_on_device(
    &self,
    device_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  /// Current locations (anywhere) for a batch of addresses.
  fn current_locations_for(
    &self,
    macs: Vec<MacAddr>,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  /// The subset of `macs` already recorded as addresses.
  fn known_addresses(
    &self,
    macs: Vec<MacAddr>,
  ) -> impl Future<Output = Result<Vec<MacAddr>, Self::Error>> + Send + '_;

  /// Every location row of one address, newest `last_seen` first.
  fn locations_of(
    &self,
    mac: MacAddr,
    current_only: bool,
  ) -> impl Future<Output = Result<Vec<Location>, Self::Error>> + Send + '_;

  /// Distinct addresses ever placed on a port, current or not.
  fn distinct_addresses_on_port(
    &self,
    port_id: Uuid,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  fn history_of(
    &self,
    mac: MacAddr,
  ) -> impl Future<Output = Result<Vec<HistoryEvent>, Self::Error>> + Send + '_;

  /// Mark addresses unseen since `before` inactive. Returns how many changed.
  fn deactivate_addresses_before(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Topology ──────────────────────────────────────────────────────────

  /// All links, oldest first.
  fn list_links(&self) -> impl Future<Output = Result<Vec<TopologyLink>, Self::Error>> + Send + '_;

  fn links_of_device(
    &self,
    device_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TopologyLink>, Self::Error>> + Send + '_;

  // ── Atomic writes ─────────────────────────────────────────────────────

  /// Apply a device pass in one transaction. Fails without side effects if
  /// any placement's `supersedes` no longer matches, or if the pass would
  /// leave an address with two current locations.
  fn commit_device_pass(
    &self,
    pass: DevicePass,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Groups of ports sharing `(device, index)` with `index > 0`.
  fn duplicate_ports(
    &self,
  ) -> impl Future<Output = Result<Vec<DuplicatePortGroup>, Self::Error>> + Send + '_;

  /// Re-point every location, history and link reference from the removed
  /// ports to the survivor, then delete the removed ports. One transaction.
  fn merge_ports(
    &self,
    merge: PortMerge,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Discovery log ─────────────────────────────────────────────────────

  fn record_discovery(
    &self,
    log: DiscoveryLog,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Newest first.
  fn recent_discoveries(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DiscoveryLog>, Self::Error>> + Send + '_;
}
