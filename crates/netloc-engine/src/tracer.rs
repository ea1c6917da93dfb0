//! Endpoint tracing.
//!
//! Two strategies find the port an address is physically attached to:
//!
//! - [`walk`]: a live walk from a core switch, asking each device where it
//!   forwards the address, resolving aggregation groups to their member
//!   ports and following neighbor announcements downstream until a port
//!   has no neighbor.
//! - [`decide_offline`]: a pick among every place the address has ever
//!   been recorded, deterministic for a given store state and clock. A
//!   recent quiet edge port wins first, then [`crate::scoring`] decides.
//!
//! Neither returns an error for an inconclusive trace. Exhaustion is
//! reported through [`TraceOutcome::reason`].

use std::collections::{HashMap, HashSet, hash_map::Entry};

use chrono::{DateTime, Duration, Utc};
use netloc_core::{MacAddr, device::Device, naming};
use netloc_device::{CommandSession, DeviceClient, DeviceTarget, cli, dialect};
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  config::ScoringConfig,
  directory::DeviceDirectory,
  error::{Error, Result, Stage},
  graph::GraphSnapshot,
  scoring::Score,
};

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TraceMethod {
  Live,
  Offline,
}

/// Why a trace stopped short of a confirmed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TraceReason {
  HopCap,
  LoopDetected,
  UnresolvedNeighbor,
  SessionFailed,
  AddressNotFound,
  AllCandidatesDisqualified,
  NoCoreDevice,
}

/// One device visited by a live walk, or one device on the way to an
/// offline result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
  pub device_id:      Uuid,
  pub hostname:       String,
  /// Where the device forwards the address.
  pub port_name:      Option<String>,
  /// Physical members when `port_name` came back as an aggregation group.
  pub members:        Vec<String>,
  pub next_device_id: Option<Uuid>,
  pub next_hostname:  Option<String>,
}

impl TraceStep {
  fn at(device: &Device) -> Self {
    Self {
      device_id:      device.device_id,
      hostname:       device.hostname.clone(),
      port_name:      None,
      members:        Vec::new(),
      next_device_id: None,
      next_hostname:  None,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceOutcome {
  pub mac:        MacAddr,
  pub method:     TraceMethod,
  pub device_id:  Option<Uuid>,
  pub hostname:   Option<String>,
  pub port_id:    Option<Uuid>,
  pub port_name:  Option<String>,
  pub vlan:       Option<u16>,
  /// The port is the address's own attachment point, not a best guess.
  pub confirmed:  bool,
  pub reason:     Option<TraceReason>,
  pub note:       Option<String>,
  pub path:       Vec<TraceStep>,
  /// Scored candidates, best first. Empty for live results.
  pub candidates: Vec<Candidate>,
}

impl TraceOutcome {
  pub fn empty(mac: MacAddr, method: TraceMethod, reason: TraceReason) -> Self {
    Self {
      mac,
      method,
      device_id: None,
      hostname: None,
      port_id: None,
      port_name: None,
      vlan: None,
      confirmed: false,
      reason: Some(reason),
      note: None,
      path: Vec::new(),
      candidates: Vec::new(),
    }
  }

  /// A port was identified, confirmed or not.
  pub fn reached(&self) -> bool { self.device_id.is_some() && self.port_name.is_some() }
}

// ─── Core selection ──────────────────────────────────────────────────────────

/// Where a live walk starts: a marked core of the site, else the graph's
/// core devices nearest `near`, else any marked core.
pub fn pick_core<'a>(
  directory: &'a DeviceDirectory,
  graph: &GraphSnapshot,
  site: Option<&str>,
  near: Option<Uuid>,
  markers: &[String],
) -> Option<&'a Device> {
  if let Some(site) = site
    && let Some(core) = directory.marked_cores(Some(site), markers).first().copied()
  {
    return Some(core);
  }

  let mut graph_cores: Vec<(usize, &Device)> = graph
    .core()
    .iter()
    .filter_map(|id| directory.get(*id))
    .filter(|d| d.is_active)
    .map(|d| {
      let distance = near
        .and_then(|n| graph.distance(n, d.device_id))
        .unwrap_or(usize::MAX);
      (distance, d)
    })
    .collect();
  graph_cores.sort_by_key(|(distance, _)| *distance);
  if let Some((_, core)) = graph_cores.first() {
    return Some(*core);
  }

  directory.marked_cores(None, markers).first().copied()
}

// ─── Live walk ───────────────────────────────────────────────────────────────

/// Open command lines, one per device, for the duration of one walk.
struct SessionPool<'a, C: DeviceClient> {
  client:   &'a C,
  sessions: HashMap<Uuid, C::Session>,
}

impl<'a, C: DeviceClient> SessionPool<'a, C> {
  fn new(client: &'a C) -> Self { Self { client, sessions: HashMap::new() } }

  async fn session(&mut self, target: &DeviceTarget) -> netloc_device::Result<&mut C::Session> {
    match self.sessions.entry(target.device_id) {
      Entry::Occupied(e) => Ok(e.into_mut()),
      Entry::Vacant(e) => {
        let session = self.client.open_session(target).await?;
        Ok(e.insert(session))
      }
    }
  }

  async fn close_all(self) {
    for (_, session) in self.sessions {
      session.close().await;
    }
  }
}

/// The deepest point a live walk reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reached {
  pub device_id: Uuid,
  pub hostname:  String,
  pub port_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct LiveWalk {
  pub reached:   Option<Reached>,
  pub confirmed: bool,
  pub reason:    Option<TraceReason>,
  pub note:      Option<String>,
  pub path:      Vec<TraceStep>,
}

enum Hop {
  Endpoint(TraceStep),
  Follow(TraceStep, Device),
  Stop(Option<TraceStep>, TraceReason, String),
}

/// Walk from `start` towards the device that has `mac` on a port with no
/// neighbor. At most `max_hops` devices are visited; every session opened
/// is closed before returning.
pub async fn walk<C, F>(
  client: &C,
  directory: &DeviceDirectory,
  start: &Device,
  mac: MacAddr,
  max_hops: usize,
  target_for: F,
) -> LiveWalk
where
  C: DeviceClient,
  F: Fn(&Device) -> Result<DeviceTarget>,
{
  let mut pool = SessionPool::new(client);
  let mut result = LiveWalk::default();
  let mut visited = HashSet::new();
  let mut device = start.clone();

  loop {
    if visited.contains(&device.device_id) {
      result.reason = Some(TraceReason::LoopDetected);
      result.note = Some(format!("{} reached twice", device.hostname));
      break;
    }
    if visited.len() >= max_hops {
      result.reason = Some(TraceReason::HopCap);
      result.note = Some(format!("stopped after {max_hops} devices before {}", device.hostname));
      break;
    }
    visited.insert(device.device_id);
    info!(%mac, host = %device.hostname, hop = visited.len(), "trace hop");

    match hop(&mut pool, directory, &device, mac, &target_for).await {
      Ok(Hop::Endpoint(step)) => {
        result.path.push(step);
        result.confirmed = true;
        break;
      }
      Ok(Hop::Follow(step, next)) => {
        result.path.push(step);
        device = next;
      }
      Ok(Hop::Stop(step, reason, note)) => {
        result.path.extend(step);
        result.reason = Some(reason);
        result.note = Some(note);
        break;
      }
      Err(e) => {
        result.path.push(TraceStep::at(&device));
        result.reason = Some(TraceReason::SessionFailed);
        result.note = Some(e.to_string());
        break;
      }
    }
  }

  pool.close_all().await;

  result.reached = result.path.iter().rev().find_map(|s| {
    Some(Reached {
      device_id: s.device_id,
      hostname:  s.hostname.clone(),
      port_name: s.port_name.clone()?,
    })
  });
  result
}

async fn hop<C, F>(
  pool: &mut SessionPool<'_, C>,
  directory: &DeviceDirectory,
  device: &Device,
  mac: MacAddr,
  target_for: &F,
) -> Result<Hop>
where
  C: DeviceClient,
  F: Fn(&Device) -> Result<DeviceTarget>,
{
  let target = target_for(device)?;
  let profile = dialect::profile(device.dialect);
  let to_error = || Error::device(&device.hostname, Stage::Trace);

  let session = pool.session(&target).await.map_err(to_error())?;
  let output = session
    .run_command(&profile.lookup_command(&mac))
    .await
    .map_err(to_error())?;
  debug!(host = %device.hostname, %output, "address lookup");
  if cli::is_rejection(&output) {
    return Ok(Hop::Stop(
      Some(TraceStep::at(device)),
      TraceReason::SessionFailed,
      format!("{} rejected the address lookup", device.hostname),
    ));
  }
  let Some(port) = profile.parse_lookup(&output, &mac) else {
    return Ok(Hop::Stop(
      Some(TraceStep::at(device)),
      TraceReason::AddressNotFound,
      format!("{mac} is not in the forwarding table of {}", device.hostname),
    ));
  };

  let mut step = TraceStep::at(device);
  let candidates = if naming::is_aggregation_name(&port) {
    let members = match naming::trailing_number(&port) {
      Some(group) => {
        let output = session
          .run_command(&profile.members_command(group))
          .await
          .map_err(to_error())?;
        profile.parse_members(&output)
      }
      None => Vec::new(),
    };
    debug!(host = %device.hostname, %port, ?members, "aggregation members");
    step.members = members.clone();
    if members.is_empty() { vec![port.clone()] } else { members }
  } else {
    vec![port.clone()]
  };
  step.port_name = Some(port);

  for candidate in &candidates {
    let output = session
      .run_command(&profile.neighbor_command(candidate))
      .await
      .map_err(to_error())?;
    if cli::is_rejection(&output) {
      debug!(host = %device.hostname, port = %candidate, "neighbor query rejected");
      continue;
    }
    step.port_name = Some(candidate.clone());

    let Some(neighbor) = profile.parse_neighbor(&output) else {
      return Ok(Hop::Endpoint(step));
    };
    return match directory.by_hostname(&neighbor.system_name) {
      Some(next) => {
        step.next_device_id = Some(next.device_id);
        step.next_hostname = Some(next.hostname.clone());
        Ok(Hop::Follow(step, next.clone()))
      }
      None => Ok(Hop::Stop(
        Some(step),
        TraceReason::UnresolvedNeighbor,
        format!("{} on {candidate} is not a managed device", neighbor.system_name),
      )),
    };
  }

  Ok(Hop::Stop(
    Some(step),
    TraceReason::SessionFailed,
    format!("{} rejected every neighbor query", device.hostname),
  ))
}

// ─── Offline decision ────────────────────────────────────────────────────────

/// One `(device, port)` the address has been placed on.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
  pub device_id:             Uuid,
  pub hostname:              String,
  pub port_id:               Uuid,
  pub port_name:             String,
  pub vlan:                  u16,
  pub address_count:         u32,
  /// Faces another device, through a recorded link or neighbor tagging.
  pub has_link:              bool,
  pub neighbor_hostname:     Option<String>,
  pub neighbor_sees_address: bool,
  /// Newest sighting of the address on this port.
  pub last_seen:             DateTime<Utc>,
  pub score:                 Score,
}

impl Candidate {
  fn key(&self) -> (&str, &str) { (&self.hostname, &self.port_name) }
}

/// Pick the endpoint among scored candidates.
///
/// A quiet edge port the address was seen on within the recent window wins
/// outright, newest first. Otherwise the best candidate above the
/// disqualification floor wins and is confirmed when it clears the
/// endpoint threshold. When every candidate
/// is disqualified, the deepest one (linked onwards to a device that never
/// saw the address) is reported unconfirmed, access-named devices and
/// quieter ports first. Failing that, the best-scored candidate is.
pub fn decide_offline(
  mac: MacAddr,
  mut candidates: Vec<Candidate>,
  cfg: &ScoringConfig,
  core_markers: &[String],
  now: DateTime<Utc>,
) -> TraceOutcome {
  if candidates.is_empty() {
    return TraceOutcome::empty(mac, TraceMethod::Offline, TraceReason::AddressNotFound);
  }

  candidates.sort_by(|a, b| {
    b.score
      .value
      .cmp(&a.score.value)
      .then_with(|| a.key().cmp(&b.key()))
  });

  let cutoff = now - Duration::hours(cfg.recent_window_hours);
  let recent_edge = candidates
    .iter()
    .filter(|c| {
      c.last_seen >= cutoff
        && !c.has_link
        && c.address_count <= cfg.recent_max_addresses
        && !naming::is_aggregation_name(&c.port_name)
    })
    .max_by(|a, b| {
      a.last_seen
        .cmp(&b.last_seen)
        .then_with(|| b.key().cmp(&a.key()))
    });

  let best = &candidates[0];
  let (chosen, confirmed, reason, note) = if let Some(edge) = recent_edge {
    debug!(%mac, host = %edge.hostname, port = %edge.port_name, "recent edge sighting");
    (edge, true, None, None)
  } else if best.score.value > cfg.disqualify_floor {
    let confirmed = best.score.value > cfg.endpoint_threshold;
    let note = (!confirmed).then(|| "score below the endpoint threshold".to_owned());
    (best, confirmed, None, note)
  } else {
    let deepest = candidates
      .iter()
      .filter(|c| c.has_link && !c.neighbor_sees_address)
      .min_by(|a, b| {
        let access = |c: &Candidate| !naming::has_marker(&c.hostname, &cfg.access_markers);
        access(a)
          .cmp(&access(b))
          .then(a.address_count.cmp(&b.address_count))
          .then_with(|| a.key().cmp(&b.key()))
      });
    match deepest {
      Some(c) => {
        let behind_core = c
          .neighbor_hostname
          .as_deref()
          .is_some_and(|n| naming::has_marker(n, core_markers));
        let note = if behind_core {
          format!("{} needs discovery", c.neighbor_hostname.as_deref().unwrap_or_default())
        } else {
          "endpoint is likely behind an unmanaged device".to_owned()
        };
        (c, false, Some(TraceReason::AllCandidatesDisqualified), Some(note))
      }
      None => (best, false, Some(TraceReason::AllCandidatesDisqualified), None),
    }
  };

  TraceOutcome {
    mac,
    method: TraceMethod::Offline,
    device_id: Some(chosen.device_id),
    hostname: Some(chosen.hostname.clone()),
    port_id: Some(chosen.port_id),
    port_name: Some(chosen.port_name.clone()),
    vlan: Some(chosen.vlan),
    confirmed,
    reason,
    note,
    path: Vec::new(),
    candidates,
  }
}
