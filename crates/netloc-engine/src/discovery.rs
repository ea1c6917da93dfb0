//! Discovery passes: one device, or the whole active fleet.
//!
//! Every pass, scheduled or on demand, goes through [`Engine::run_pass`]:
//! collect over the network without holding any engine-wide lock, then plan
//! and commit under the commit lock so each plan is built against committed
//! state. Passes on one device are serialized by a per-device lock.

use std::{
  collections::{HashMap, HashSet},
  sync::atomic::{AtomicBool, Ordering},
  time::{Duration, Instant},
};

use chrono::Utc;
use futures::{StreamExt, stream};
use netloc_core::{
  MacAddr,
  address::Location,
  device::{Device, SystemInfo},
  discovery::{DiscoveryLog, DiscoveryMethod, DiscoveryStatus},
  observation::{FdbRow, NeighborRecord},
  plan::{ClassificationSummary, DevicePass},
  store::{NetworkStore, StoreError},
};
use netloc_device::{DeviceClient, DeviceTarget, fdb, lldp, system};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  classifier::{self, Sighting, UplinkSignal},
  engine::{Engine, RunState, RunStatus},
  error::{Error, Result, Stage},
  ports::PortMap,
  topology,
};

/// What one device's pass did.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
  pub device_id:      Uuid,
  pub hostname:       String,
  pub method:         DiscoveryMethod,
  pub status:         DiscoveryStatus,
  pub address_count:  u32,
  pub neighbors:      usize,
  pub links:          usize,
  pub summary:        ClassificationSummary,
  pub uplink_signals: Vec<UplinkSignal>,
  pub error:          Option<String>,
  pub duration_ms:    i64,
}

impl PassOutcome {
  pub fn succeeded(&self) -> bool { self.status == DiscoveryStatus::Success }
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
  pub total:           usize,
  pub successful:      usize,
  pub failed:          usize,
  pub total_addresses: u64,
  pub merged_ports:    usize,
  pub deactivated:     usize,
  pub outcomes:        Vec<PassOutcome>,
}

#[derive(Debug, Default)]
struct PassReport {
  address_count:  u32,
  neighbors:      usize,
  links:          usize,
  summary:        ClassificationSummary,
  uplink_signals: Vec<UplinkSignal>,
}

/// Clears the running flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

fn distinct_count(rows: &[FdbRow]) -> u32 {
  let distinct: HashSet<MacAddr> = rows.iter().map(|r| r.mac).collect();
  u32::try_from(distinct.len()).unwrap_or(u32::MAX)
}

// ─── Single device ───────────────────────────────────────────────────────────

impl<S: NetworkStore, C: DeviceClient> Engine<S, C> {
  /// Discover one device by hostname, now.
  pub async fn discover_device(&self, hostname: &str, force_cli: bool) -> Result<PassOutcome> {
    let device = self
      .store
      .find_device_by_hostname(hostname.to_owned())
      .await
      .map_err(Error::store(Stage::Query))?
      .ok_or_else(|| Error::DeviceNotFound(hostname.to_owned()))?;
    Ok(self.run_pass(&device, force_cli).await)
  }

  /// One device's pass. Failures are reported in the outcome and the
  /// discovery log, never returned.
  pub(crate) async fn run_pass(&self, device: &Device, force_cli: bool) -> PassOutcome {
    let lock = self.device_lock(device.device_id);
    let _held = lock.lock().await;

    let started_at = Utc::now();
    let clock = Instant::now();
    let mut method = if force_cli { DiscoveryMethod::Cli } else { DiscoveryMethod::Snmp };
    let result = self.collect_and_commit(device, force_cli, &mut method).await;

    let (status, report, error) = match result {
      Ok(report) => (DiscoveryStatus::Success, report, None),
      Err(e) => {
        let status = if e.is_timeout() { DiscoveryStatus::Timeout } else { DiscoveryStatus::Failed };
        warn!(host = %device.hostname, error = %e, "discovery pass failed");
        (status, PassReport::default(), Some(e.to_string()))
      }
    };

    let log = DiscoveryLog::finished(
      device.device_id,
      method,
      status,
      report.address_count,
      error.clone(),
      started_at,
    );
    if let Err(e) = self.store.record_discovery(log).await {
      warn!(host = %device.hostname, error = %e, "could not write discovery log");
    }

    PassOutcome {
      device_id: device.device_id,
      hostname: device.hostname.clone(),
      method,
      status,
      address_count: report.address_count,
      neighbors: report.neighbors,
      links: report.links,
      summary: report.summary,
      uplink_signals: report.uplink_signals,
      error,
      duration_ms: i64::try_from(clock.elapsed().as_millis()).unwrap_or(i64::MAX),
    }
  }

  async fn collect_and_commit(
    &self,
    device: &Device,
    force_cli: bool,
    method: &mut DiscoveryMethod,
  ) -> Result<PassReport> {
    let target = self.target_for(device)?;
    let client = &*self.client;

    let info = match system::collect(client, &target).await {
      Ok(info) => Some(info),
      Err(e) => {
        warn!(host = %device.hostname, error = %e, "system information unavailable");
        None
      }
    };
    let neighbors = match lldp::collect(client, &target).await {
      Ok(neighbors) => neighbors,
      Err(e) => {
        warn!(host = %device.hostname, error = %e, "neighbor table unavailable");
        Vec::new()
      }
    };
    let rows = self
      .collect_fdb(device, &target, force_cli, method)
      .await?;

    let report = self
      .plan_and_commit(device, info, &neighbors, &rows)
      .await?;
    info!(
      host = %device.hostname,
      %method,
      addresses = report.address_count,
      created = report.summary.created,
      moved = report.summary.moved,
      disappeared = report.summary.disappeared,
      discarded = report.summary.discarded,
      links = report.links,
      "discovery pass complete"
    );
    Ok(report)
  }

  /// SNMP per dialect; the command line when forced, or when SNMP failed
  /// or came back empty on a device flagged for it.
  async fn collect_fdb(
    &self,
    device: &Device,
    target: &DeviceTarget,
    force_cli: bool,
    method: &mut DiscoveryMethod,
  ) -> Result<Vec<FdbRow>> {
    let client = &*self.client;
    let to_error = || Error::device(&device.hostname, Stage::Fdb);

    if !force_cli {
      match fdb::collect_snmp(client, target).await {
        Ok(rows) if !rows.is_empty() || !device.ssh_fallback => return Ok(rows),
        Err(e) if !device.ssh_fallback => return Err(to_error()(e)),
        Ok(_) => warn!(host = %device.hostname, "forwarding table empty over SNMP, trying CLI"),
        Err(e) => warn!(host = %device.hostname, error = %e, "SNMP forwarding table failed, trying CLI"),
      }
    }

    *method = DiscoveryMethod::Cli;
    fdb::collect_cli(client, target).await.map_err(to_error())
  }

  async fn plan_and_commit(
    &self,
    device: &Device,
    info: Option<SystemInfo>,
    neighbors: &[NeighborRecord],
    rows: &[FdbRow],
  ) -> Result<PassReport> {
    let store = &*self.store;
    let _commit = self.commit.lock().await;
    let at = Utc::now();

    let directory = self.directory(false).await?;
    let local = store
      .list_ports(device.device_id)
      .await
      .map_err(Error::store(Stage::Classify))?;
    let mut ports = PortMap::new(device.device_id, local);

    let mut remote = HashMap::new();
    for id in topology::remote_devices(device.device_id, neighbors, &directory) {
      let found = store.list_ports(id).await.map_err(Error::store(Stage::Neighbors))?;
      remote.insert(id, PortMap::new(id, found));
    }
    let neighbor_plan =
      topology::plan_neighbors(device, neighbors, &mut ports, &directory, &mut remote, at);
    for name in &neighbor_plan.unmanaged {
      debug!(host = %device.hostname, neighbor = %name, "neighbor is not a managed device");
    }

    let sightings: Vec<Sighting> = rows
      .iter()
      .map(|r| Sighting {
        mac:     r.mac,
        port_id: ports.resolve(r.port_index, &r.port_name, at),
        vlan:    r.vlan,
      })
      .collect();

    let current = self.current_snapshot(device.device_id, &sightings).await?;

    // Roles of every port the snapshot refers to: this device's as tagged
    // above, neighbors' as planned, everyone else's as stored.
    let mut uplink: HashMap<Uuid, bool> = ports
      .ports()
      .iter()
      .chain(remote.values().flat_map(|m| m.ports()))
      .map(|p| (p.port_id, classifier::infer_role(p).is_uplink()))
      .collect();
    let foreign: HashSet<Uuid> = current
      .iter()
      .filter(|l| !uplink.contains_key(&l.port_id))
      .map(|l| l.device_id)
      .collect();
    for id in foreign {
      let found = store.list_ports(id).await.map_err(Error::store(Stage::Classify))?;
      uplink.extend(
        found
          .iter()
          .map(|p| (p.port_id, classifier::infer_role(p).is_uplink())),
      );
    }

    let known: HashSet<MacAddr> = store
      .known_addresses(sighted_macs(&sightings))
      .await
      .map_err(Error::store(Stage::Classify))?
      .into_iter()
      .collect();

    let classification = classifier::classify(
      device.device_id,
      &sightings,
      &current,
      &known,
      |id| uplink.get(&id).copied().unwrap_or(false),
      at,
    );
    let uplink_signals = classifier::unmapped_uplinks(
      &sightings,
      ports.ports(),
      self.config.unmapped_uplink_threshold,
    );
    for signal in &uplink_signals {
      warn!(
        host = %device.hostname,
        port = %signal.port_name,
        addresses = signal.address_count,
        "access port looks like an unmapped uplink"
      );
    }

    let report = PassReport {
      address_count: distinct_count(rows),
      neighbors: neighbors.len(),
      links: neighbor_plan.links.len(),
      summary: classification.summary(),
      uplink_signals,
    };

    let mut changed = ports.into_changed();
    changed.extend(neighbor_plan.remote);
    let pass = DevicePass {
      device_id: device.device_id,
      observed_at: at,
      info,
      ports: changed,
      links: neighbor_plan.links,
      classification,
    };

    store.commit_device_pass(pass).await.map_err(|e| {
      if e.is_integrity_violation() {
        error!(host = %device.hostname, error = %e, "location integrity violation, pass rejected");
        Error::Integrity { hostname: device.hostname.clone(), message: e.to_string() }
      } else {
        Error::store(Stage::Commit)(e)
      }
    })?;

    if report.links > 0 {
      self.graph.invalidate();
    }
    Ok(report)
  }

  /// Current locations of every sighted address, plus every current
  /// location on the device itself.
  async fn current_snapshot(&self, device_id: Uuid, sightings: &[Sighting]) -> Result<Vec<Location>> {
    let mut current = self
      .store
      .current_locations_for(sighted_macs(sightings))
      .await
      .map_err(Error::store(Stage::Classify))?;
    let on_device = self
      .store
      .current_locations_on_device(device_id)
      .await
      .map_err(Error::store(Stage::Classify))?;

    let known: HashSet<Uuid> = current.iter().map(|l| l.location_id).collect();
    current.extend(on_device.into_iter().filter(|l| !known.contains(&l.location_id)));
    Ok(current)
  }
}

fn sighted_macs(sightings: &[Sighting]) -> Vec<MacAddr> {
  let mut macs: Vec<MacAddr> = sightings.iter().map(|s| s.mac).collect();
  macs.sort();
  macs.dedup();
  macs
}

// ─── Fleet ───────────────────────────────────────────────────────────────────

impl<S: NetworkStore, C: DeviceClient> Engine<S, C> {
  /// Discover every active device with bounded concurrency, then merge
  /// duplicate ports, retire stale addresses and rebuild the graph.
  pub async fn discover_all(&self, force_cli: bool) -> Result<FleetSummary> {
    if self.running.swap(true, Ordering::AcqRel) {
      return Err(Error::AlreadyRunning);
    }
    let _guard = RunGuard(&self.running);

    let devices = match self.store.list_devices(true).await {
      Ok(devices) => devices,
      Err(e) => {
        let err = Error::store(Stage::Query)(e);
        self.finish_status(RunState::Error, Some(err.to_string()));
        return Err(err);
      }
    };

    *self.status.write() = RunStatus {
      state: RunState::Running,
      started_at: Some(Utc::now()),
      devices_total: devices.len(),
      ..RunStatus::default()
    };
    info!(devices = devices.len(), "fleet discovery started");

    let timeout = Duration::from_secs(self.config.device_timeout_secs);
    let outcomes: Vec<PassOutcome> = stream::iter(&devices)
      .map(|device| self.run_bounded(device, force_cli, timeout))
      .buffer_unordered(self.config.concurrency.max(1))
      .collect()
      .await;

    let merged_ports = match self.merge_duplicate_ports().await {
      Ok(n) => n,
      Err(e) => {
        warn!(error = %e, "port merge failed");
        0
      }
    };
    let cutoff = Utc::now() - chrono::Duration::days(self.config.address_retention_days);
    let deactivated = match self.store.deactivate_addresses_before(cutoff).await {
      Ok(n) => n,
      Err(e) => {
        warn!(error = %e, "address retention sweep failed");
        0
      }
    };
    self.graph.invalidate();
    if let Err(e) = self.graph.rebuild(&*self.store).await {
      warn!(error = %e, "topology graph rebuild failed");
    }

    let successful = outcomes.iter().filter(|o| o.succeeded()).count();
    let summary = FleetSummary {
      total: devices.len(),
      successful,
      failed: outcomes.len() - successful,
      total_addresses: outcomes.iter().map(|o| u64::from(o.address_count)).sum(),
      merged_ports,
      deactivated,
      outcomes,
    };
    info!(
      total = summary.total,
      successful = summary.successful,
      failed = summary.failed,
      addresses = summary.total_addresses,
      "fleet discovery finished"
    );
    self.finish_status(
      RunState::Completed,
      Some(format!("{} of {} devices discovered", summary.successful, summary.total)),
    );
    Ok(summary)
  }

  /// A pass capped by the per-device timeout, with progress tracking.
  async fn run_bounded(&self, device: &Device, force_cli: bool, timeout: Duration) -> PassOutcome {
    self.status.write().in_flight.push(device.hostname.clone());
    let started_at = Utc::now();

    let outcome = match tokio::time::timeout(timeout, self.run_pass(device, force_cli)).await {
      Ok(outcome) => outcome,
      Err(_) => {
        warn!(host = %device.hostname, secs = timeout.as_secs(), "discovery pass timed out");
        let error = format!("no result within {}s", timeout.as_secs());
        let method = if force_cli { DiscoveryMethod::Cli } else { DiscoveryMethod::Snmp };
        let log = DiscoveryLog::finished(
          device.device_id,
          method,
          DiscoveryStatus::Timeout,
          0,
          Some(error.clone()),
          started_at,
        );
        let duration_ms = log.duration_ms;
        if let Err(e) = self.store.record_discovery(log).await {
          warn!(host = %device.hostname, error = %e, "could not write discovery log");
        }
        PassOutcome {
          device_id: device.device_id,
          hostname: device.hostname.clone(),
          method,
          status: DiscoveryStatus::Timeout,
          address_count: 0,
          neighbors: 0,
          links: 0,
          summary: ClassificationSummary::default(),
          uplink_signals: Vec::new(),
          error: Some(error),
          duration_ms,
        }
      }
    };

    let mut status = self.status.write();
    status.in_flight.retain(|h| h != &device.hostname);
    status.devices_processed += 1;
    if !outcome.succeeded() {
      status.devices_failed += 1;
    }
    status.addresses_found += u64::from(outcome.address_count);
    outcome
  }

  fn finish_status(&self, state: RunState, message: Option<String>) {
    let mut status = self.status.write();
    status.state = state;
    status.message = message;
    status.completed_at = Some(Utc::now());
    status.in_flight.clear();
  }

  /// Collapse ports that share a device and interface index. Returns how
  /// many groups were merged.
  pub async fn merge_duplicate_ports(&self) -> Result<usize> {
    let _commit = self.commit.lock().await;
    let groups = self
      .store
      .duplicate_ports()
      .await
      .map_err(Error::store(Stage::Merge))?;

    let mut merged = 0;
    for group in &groups {
      let Some(merge) = topology::plan_merge(group) else { continue };
      info!(
        device = %merge.device_id,
        index = group.index,
        keep = %merge.keep,
        removed = merge.remove.len(),
        "merging duplicate ports"
      );
      self
        .store
        .merge_ports(merge)
        .await
        .map_err(Error::store(Stage::Merge))?;
      merged += 1;
    }
    if merged > 0 {
      self.graph.invalidate();
    }
    Ok(merged)
  }
}
