//! The engine handle: shared state, graph queries and tracing.
//!
//! Discovery lives in [`crate::discovery`]; both are `impl` blocks on the
//! same [`Engine`].

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use netloc_core::{
  MacAddr,
  address::Location,
  device::Device,
  port::Port,
  store::NetworkStore,
  topology::TopologyLink,
};
use netloc_device::{Credentials, DeviceClient, DeviceTarget};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::warn;
use uuid::Uuid;

use crate::{
  config::EngineConfig,
  directory::DeviceDirectory,
  error::{Error, Result, Stage},
  graph::{GraphSnapshot, GraphStats, TopologyGraph},
  ports::PortMap,
  scoring::{self, CandidateFacts},
  tracer::{self, Candidate, TraceMethod, TraceOutcome, TraceReason, TraceStep},
};

/// Credential set used by devices that do not name one.
pub const DEFAULT_CREDENTIALS: &str = "default";

// ─── Run status ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
  Idle,
  Running,
  Completed,
  Error,
}

/// Progress of the current (or last) fleet discovery run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
  pub state:             RunState,
  pub message:           Option<String>,
  pub started_at:        Option<DateTime<Utc>>,
  pub completed_at:      Option<DateTime<Utc>>,
  pub devices_total:     usize,
  pub devices_processed: usize,
  pub devices_failed:    usize,
  pub addresses_found:   u64,
  /// Hostnames with a pass in progress.
  pub in_flight:         Vec<String>,
}

impl Default for RunStatus {
  fn default() -> Self {
    Self {
      state:             RunState::Idle,
      message:           None,
      started_at:        None,
      completed_at:      None,
      devices_total:     0,
      devices_processed: 0,
      devices_failed:    0,
      addresses_found:   0,
      in_flight:         Vec::new(),
    }
  }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Discovery, topology and tracing over one store and one device client.
pub struct Engine<S: NetworkStore, C: DeviceClient> {
  pub(crate) store:        Arc<S>,
  pub(crate) client:       Arc<C>,
  pub(crate) config:       EngineConfig,
  pub(crate) credentials:  HashMap<String, Credentials>,
  pub(crate) graph:        Arc<TopologyGraph>,
  /// Serializes plan-and-commit so passes plan against committed state.
  pub(crate) commit:       tokio::sync::Mutex<()>,
  pub(crate) device_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
  pub(crate) status:       RwLock<RunStatus>,
  pub(crate) running:      AtomicBool,
}

impl<S: NetworkStore, C: DeviceClient> Engine<S, C> {
  pub fn new(store: Arc<S>, client: Arc<C>, config: EngineConfig) -> Self {
    let graph = Arc::new(TopologyGraph::new(config.graph_core_count));
    Self {
      store,
      client,
      config,
      credentials: HashMap::new(),
      graph,
      commit: tokio::sync::Mutex::new(()),
      device_locks: Mutex::new(HashMap::new()),
      status: RwLock::new(RunStatus::default()),
      running: AtomicBool::new(false),
    }
  }

  pub fn with_credentials(mut self, credentials: HashMap<String, Credentials>) -> Self {
    self.credentials = credentials;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn graph(&self) -> &Arc<TopologyGraph> { &self.graph }

  pub fn run_status(&self) -> RunStatus { self.status.read().clone() }

  pub fn is_running(&self) -> bool { self.running.load(Ordering::Acquire) }

  /// Resolve the device's credential set. A device naming an unknown set
  /// is an error; a device naming none falls back to the default set, or
  /// to SNMP alone when there is no default.
  pub(crate) fn target_for(&self, device: &Device) -> Result<DeviceTarget> {
    let credentials = match device.credentials.as_deref() {
      Some(name) => Some(
        self
          .credentials
          .get(name)
          .cloned()
          .ok_or_else(|| Error::UnknownCredentials {
            hostname: device.hostname.clone(),
            name:     name.to_owned(),
          })?,
      ),
      None => self.credentials.get(DEFAULT_CREDENTIALS).cloned(),
    };
    Ok(DeviceTarget::new(device, credentials))
  }

  pub(crate) fn device_lock(&self, device_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
    Arc::clone(self.device_locks.lock().entry(device_id).or_default())
  }

  pub(crate) async fn directory(&self, active_only: bool) -> Result<DeviceDirectory> {
    let devices = self
      .store
      .list_devices(active_only)
      .await
      .map_err(Error::store(Stage::Query))?;
    Ok(DeviceDirectory::new(devices))
  }

  async fn device_named(&self, hostname: &str) -> Result<Device> {
    self
      .store
      .find_device_by_hostname(hostname.to_owned())
      .await
      .map_err(Error::store(Stage::Query))?
      .ok_or_else(|| Error::DeviceNotFound(hostname.to_owned()))
  }
}

// ─── Graph queries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
  pub device_id: Uuid,
  pub hostname:  String,
}

/// One link along a path, with the port used at each end when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortHop {
  pub from:      PathNode,
  pub from_port: Option<String>,
  pub to:        PathNode,
  pub to_port:   Option<String>,
}

fn nodes(graph: &GraphSnapshot, ids: &[Uuid]) -> Vec<PathNode> {
  ids
    .iter()
    .map(|id| PathNode {
      device_id: *id,
      hostname:  graph.hostname(*id).unwrap_or_default().to_owned(),
    })
    .collect()
}

impl<S: NetworkStore, C: DeviceClient> Engine<S, C> {
  pub async fn graph_stats(&self) -> Result<GraphStats> {
    self.graph.ensure_valid(&*self.store).await?;
    Ok(self.graph.stats())
  }

  /// Shortest path between two devices, endpoints included.
  pub async fn find_path(&self, from: &str, to: &str) -> Result<Option<Vec<PathNode>>> {
    let (from, to) = (self.device_named(from).await?, self.device_named(to).await?);
    let graph = self.graph.ensure_valid(&*self.store).await?;
    Ok(
      graph
        .find_path(from.device_id, to.device_id)
        .map(|path| nodes(&graph, &path)),
    )
  }

  pub async fn neighbors(&self, hostname: &str) -> Result<Vec<PathNode>> {
    let device = self.device_named(hostname).await?;
    let graph = self.graph.ensure_valid(&*self.store).await?;
    Ok(nodes(&graph, graph.neighbors(device.device_id)))
  }

  pub async fn path_to_core(&self, hostname: &str) -> Result<Option<Vec<PathNode>>> {
    let device = self.device_named(hostname).await?;
    let graph = self.graph.ensure_valid(&*self.store).await?;
    Ok(
      graph
        .path_to_core(device.device_id)
        .map(|path| nodes(&graph, &path)),
    )
  }

  /// [`find_path`](Self::find_path) with the ports each link uses.
  pub async fn path_with_ports(&self, from: &str, to: &str) -> Result<Option<Vec<PortHop>>> {
    let Some(path) = self.find_path(from, to).await? else {
      return Ok(None);
    };

    let mut hops = Vec::with_capacity(path.len().saturating_sub(1));
    for pair in path.windows(2) {
      let (a, b) = (&pair[0], &pair[1]);
      let links = self
        .store
        .links_of_device(a.device_id)
        .await
        .map_err(Error::store(Stage::Graph))?;
      let link = links
        .iter()
        .find(|l| l.peer_of(a.device_id) == Some(b.device_id));
      hops.push(PortHop {
        from:      a.clone(),
        from_port: self.port_name(link.and_then(|l| l.port_on(a.device_id))).await?,
        to:        b.clone(),
        to_port:   self.port_name(link.and_then(|l| l.port_on(b.device_id))).await?,
      });
    }
    Ok(Some(hops))
  }

  async fn port_name(&self, port_id: Option<Uuid>) -> Result<Option<String>> {
    let Some(port_id) = port_id else { return Ok(None) };
    Ok(
      self
        .store
        .get_port(port_id)
        .await
        .map_err(Error::store(Stage::Graph))?
        .map(|p| p.name),
    )
  }
}

// ─── Tracing ─────────────────────────────────────────────────────────────────

impl<S: NetworkStore, C: DeviceClient> Engine<S, C> {
  /// Find the port `mac` is attached to.
  ///
  /// Offline mode scores the persisted history and is deterministic. Live
  /// mode walks the network from a core switch and falls back to the
  /// offline answer when the walk ends without a confirmed endpoint and the
  /// offline answer is confirmed, or when the walk reached nothing.
  pub async fn trace(&self, mac: MacAddr, live: bool, site: Option<&str>) -> Result<TraceOutcome> {
    if !live {
      return self.trace_offline(mac).await;
    }

    let walked = match self.trace_live(mac, site).await {
      Ok(outcome) => outcome,
      Err(e) => {
        warn!(%mac, error = %e, "live trace failed");
        let mut outcome = TraceOutcome::empty(mac, TraceMethod::Live, TraceReason::SessionFailed);
        outcome.note = Some(e.to_string());
        outcome
      }
    };
    if walked.confirmed {
      return Ok(walked);
    }

    let mut offline = self.trace_offline(mac).await?;
    if offline.confirmed || !walked.reached() {
      warn!(%mac, reason = ?walked.reason, "live trace inconclusive, using offline result");
      offline.note = offline.note.or_else(|| {
        walked
          .reason
          .map(|r| format!("live trace ended: {r}"))
      });
      Ok(offline)
    } else {
      Ok(walked)
    }
  }

  pub async fn trace_live(&self, mac: MacAddr, site: Option<&str>) -> Result<TraceOutcome> {
    let directory = self.directory(true).await?;
    let history = self
      .store
      .locations_of(mac, false)
      .await
      .map_err(Error::store(Stage::Trace))?;
    let current = history.iter().find(|l| l.is_current);
    let near = current.map(|l| l.device_id);
    let site = site.map(str::to_owned).or_else(|| {
      near
        .and_then(|id| directory.get(id))
        .and_then(|d| d.site_code.clone())
    });

    let graph = self.graph.ensure_valid(&*self.store).await?;
    let markers = &self.config.trace.core_markers;
    let Some(core) = tracer::pick_core(&directory, &graph, site.as_deref(), near, markers) else {
      return Ok(TraceOutcome::empty(mac, TraceMethod::Live, TraceReason::NoCoreDevice));
    };

    let walk = tracer::walk(
      &*self.client,
      &directory,
      core,
      mac,
      self.config.trace.max_hops,
      |device| self.target_for(device),
    )
    .await;

    let mut outcome = TraceOutcome {
      confirmed: walk.confirmed,
      reason: walk.reason,
      note: walk.note,
      path: walk.path,
      ..TraceOutcome::empty(mac, TraceMethod::Live, TraceReason::AddressNotFound)
    };
    if let Some(reached) = walk.reached {
      let ports = self
        .store
        .list_ports(reached.device_id)
        .await
        .map_err(Error::store(Stage::Trace))?;
      let port_id = PortMap::new(reached.device_id, ports)
        .find(0, Some(&reached.port_name))
        .map(|p| p.port_id);
      outcome.vlan = port_id.and_then(|id| vlan_on(&history, reached.device_id, id));
      outcome.port_id = port_id;
      outcome.device_id = Some(reached.device_id);
      outcome.hostname = Some(reached.hostname);
      outcome.port_name = Some(reached.port_name);
    }
    Ok(outcome)
  }

  /// Score every `(device, port)` the address was ever placed on.
  pub async fn trace_offline(&self, mac: MacAddr) -> Result<TraceOutcome> {
    let history = self
      .store
      .locations_of(mac, false)
      .await
      .map_err(Error::store(Stage::Trace))?;
    let directory = self.directory(false).await?;
    let seen_on: HashSet<Uuid> = history.iter().map(|l| l.device_id).collect();

    let mut pairs = HashSet::new();
    let mut links: HashMap<Uuid, Vec<TopologyLink>> = HashMap::new();
    let mut candidates = Vec::new();

    for location in &history {
      if !pairs.insert((location.device_id, location.port_id)) {
        continue;
      }
      let Some(device) = directory.get(location.device_id) else { continue };
      let Some(port) = self
        .store
        .get_port(location.port_id)
        .await
        .map_err(Error::store(Stage::Trace))?
      else {
        continue;
      };
      let address_count = self
        .store
        .distinct_addresses_on_port(port.port_id)
        .await
        .map_err(Error::store(Stage::Trace))?;

      if !links.contains_key(&device.device_id) {
        let found = self
          .store
          .links_of_device(device.device_id)
          .await
          .map_err(Error::store(Stage::Trace))?;
        links.insert(device.device_id, found);
      }
      let linked = links
        .get(&device.device_id)
        .and_then(|ls| ls.iter().find(|l| l.port_on(device.device_id) == Some(port.port_id)))
        .and_then(|l| l.peer_of(device.device_id));
      // Tagging counts even when no link row was recorded through the port.
      let tagged = port.faces_network();
      let neighbor = linked.or_else(|| {
        tagged
          .then(|| directory.by_hostname(port.neighbor_name.as_deref()?))
          .flatten()
          .map(|d| d.device_id)
      });
      let has_link = linked.is_some() || tagged;
      let neighbor_sees_address = neighbor.is_some_and(|n| seen_on.contains(&n));

      let facts = CandidateFacts {
        hostname: &device.hostname,
        port_name: &port.name,
        has_link,
        neighbor_sees_address,
        address_count,
      };
      let score = scoring::score(&facts, &self.config.scoring, &self.config.trace.core_markers);

      candidates.push(Candidate {
        device_id: device.device_id,
        hostname: device.hostname.clone(),
        port_id: port.port_id,
        port_name: port.name.clone(),
        vlan: location.vlan,
        address_count,
        has_link,
        neighbor_hostname: neighbor
          .and_then(|n| directory.get(n))
          .map(|d| d.hostname.clone()),
        neighbor_sees_address,
        last_seen: location.last_seen,
        score,
      });
    }

    let mut outcome = tracer::decide_offline(
      mac,
      candidates,
      &self.config.scoring,
      &self.config.trace.core_markers,
      Utc::now(),
    );
    if let Some(device_id) = outcome.device_id {
      let graph = self.graph.ensure_valid(&*self.store).await?;
      outcome.path = offline_path(&graph, device_id, outcome.port_name.clone());
    }
    Ok(outcome)
  }

  /// Every current endpoint placement of `mac`: current locations on ports
  /// that carry no topology link and no network-facing neighbor tagging.
  /// Without one, the offline trace result.
  pub async fn all_endpoints(&self, mac: MacAddr) -> Result<Vec<TraceOutcome>> {
    let current = self
      .store
      .locations_of(mac, true)
      .await
      .map_err(Error::store(Stage::Query))?;
    let directory = self.directory(false).await?;

    let mut endpoints = Vec::new();
    for location in &current {
      let links = self
        .store
        .links_of_device(location.device_id)
        .await
        .map_err(Error::store(Stage::Query))?;
      if links
        .iter()
        .any(|l| l.port_on(location.device_id) == Some(location.port_id))
      {
        continue;
      }
      let port = self
        .store
        .get_port(location.port_id)
        .await
        .map_err(Error::store(Stage::Query))?;
      if port.as_ref().is_some_and(Port::faces_network) {
        continue;
      }
      endpoints.push(TraceOutcome {
        device_id: Some(location.device_id),
        hostname: directory.get(location.device_id).map(|d| d.hostname.clone()),
        port_id: Some(location.port_id),
        port_name: port.map(|p| p.name),
        vlan: Some(location.vlan),
        confirmed: true,
        reason: None,
        ..TraceOutcome::empty(mac, TraceMethod::Offline, TraceReason::AddressNotFound)
      });
    }

    if endpoints.is_empty() {
      endpoints.push(self.trace_offline(mac).await?);
    }
    Ok(endpoints)
  }
}

/// VLAN of the newest placement on `(device, port)`.
fn vlan_on(history: &[Location], device_id: Uuid, port_id: Uuid) -> Option<u16> {
  history
    .iter()
    .find(|l| l.is_at(device_id, port_id))
    .map(|l| l.vlan)
}

/// Devices from the nearest core down to `device_id`, for audit.
fn offline_path(graph: &GraphSnapshot, device_id: Uuid, port_name: Option<String>) -> Vec<TraceStep> {
  let mut ids = graph.path_to_core(device_id).unwrap_or_else(|| vec![device_id]);
  ids.reverse();

  let mut steps: Vec<TraceStep> = ids
    .iter()
    .map(|id| TraceStep {
      device_id:      *id,
      hostname:       graph.hostname(*id).unwrap_or_default().to_owned(),
      port_name:      None,
      members:        Vec::new(),
      next_device_id: None,
      next_hostname:  None,
    })
    .collect();
  for i in 1..steps.len() {
    let (next_id, next_host) = (steps[i].device_id, steps[i].hostname.clone());
    steps[i - 1].next_device_id = Some(next_id);
    steps[i - 1].next_hostname = Some(next_host);
  }
  if let Some(last) = steps.last_mut() {
    last.port_name = port_name;
  }
  steps
}
