//! The cached switch-level topology graph.
//!
//! [`TopologyGraph`] owns the current [`GraphSnapshot`] and its state
//! (`invalid → building → valid`). Readers always get the last built
//! snapshot without waiting; rebuilds are serialized behind one async
//! mutex. Invalidation only flips the state flag.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
  },
};

use chrono::{DateTime, Utc};
use netloc_core::{device::Device, store::NetworkStore, topology::TopologyLink};
use parking_lot::RwLock;
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GraphState {
  Invalid,
  Building,
  Valid,
}

impl GraphState {
  fn from_u8(v: u8) -> Self {
    match v {
      1 => Self::Building,
      2 => Self::Valid,
      _ => Self::Invalid,
    }
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// An immutable adjacency view over devices and links.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
  /// Neighbor lists in link insertion order; breadth-first searches visit
  /// them in this order, which fixes the tie-break between equal paths.
  adjacency: HashMap<Uuid, Vec<Uuid>>,
  hostnames: HashMap<Uuid, String>,
  edges:     usize,
  core:      Vec<Uuid>,
  built_at:  Option<DateTime<Utc>>,
}

impl GraphSnapshot {
  /// Links naming a device outside `devices`, and self-links, are ignored.
  pub fn build(
    devices: &[Device],
    links: &[TopologyLink],
    core_count: usize,
    at: DateTime<Utc>,
  ) -> Self {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> =
      devices.iter().map(|d| (d.device_id, Vec::new())).collect();
    let hostnames = devices
      .iter()
      .map(|d| (d.device_id, d.hostname.clone()))
      .collect::<HashMap<_, _>>();

    let mut edges = 0;
    for link in links {
      let (a, b) = (link.local_device_id, link.remote_device_id);
      if a == b || !adjacency.contains_key(&a) || !adjacency.contains_key(&b) {
        continue;
      }
      if adjacency[&a].contains(&b) {
        continue;
      }
      if let Some(list) = adjacency.get_mut(&a) {
        list.push(b);
      }
      if let Some(list) = adjacency.get_mut(&b) {
        list.push(a);
      }
      edges += 1;
    }

    let mut ranked: Vec<(&Uuid, usize)> = adjacency
      .iter()
      .map(|(id, peers)| (id, peers.len()))
      .filter(|(_, degree)| *degree > 0)
      .collect();
    ranked.sort_by(|(a, da), (b, db)| {
      db.cmp(da)
        .then_with(|| hostnames.get(*a).cmp(&hostnames.get(*b)))
    });
    let core = ranked
      .into_iter()
      .take(core_count)
      .map(|(id, _)| *id)
      .collect();

    Self { adjacency, hostnames, edges, core, built_at: Some(at) }
  }

  pub fn contains(&self, device_id: Uuid) -> bool { self.adjacency.contains_key(&device_id) }

  pub fn hostname(&self, device_id: Uuid) -> Option<&str> {
    self.hostnames.get(&device_id).map(String::as_str)
  }

  pub fn node_count(&self) -> usize { self.adjacency.len() }

  pub fn edge_count(&self) -> usize { self.edges }

  /// Highest-degree devices, best connected first.
  pub fn core(&self) -> &[Uuid] { &self.core }

  pub fn is_core(&self, device_id: Uuid) -> bool { self.core.contains(&device_id) }

  pub fn neighbors(&self, device_id: Uuid) -> &[Uuid] {
    self
      .adjacency
      .get(&device_id)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Breadth-first search from `from` until `is_goal` holds. The returned
  /// path starts at `from` and ends at the goal.
  fn search(&self, from: Uuid, is_goal: impl Fn(Uuid) -> bool) -> Option<Vec<Uuid>> {
    if !self.contains(from) {
      return None;
    }
    if is_goal(from) {
      return Some(vec![from]);
    }

    let mut parent: HashMap<Uuid, Uuid> = HashMap::new();
    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
      for &next in self.neighbors(current) {
        if !visited.insert(next) {
          continue;
        }
        parent.insert(next, current);
        if is_goal(next) {
          let mut path = vec![next];
          let mut cursor = next;
          while let Some(&prev) = parent.get(&cursor) {
            path.push(prev);
            cursor = prev;
          }
          path.reverse();
          return Some(path);
        }
        queue.push_back(next);
      }
    }
    None
  }

  /// Shortest path by hop count, endpoints included.
  pub fn find_path(&self, from: Uuid, to: Uuid) -> Option<Vec<Uuid>> {
    if !self.contains(to) {
      return None;
    }
    self.search(from, |id| id == to)
  }

  /// Hops between two devices.
  pub fn distance(&self, from: Uuid, to: Uuid) -> Option<usize> {
    self.find_path(from, to).map(|p| p.len() - 1)
  }

  /// Path to the nearest core device.
  pub fn path_to_core(&self, from: Uuid) -> Option<Vec<Uuid>> {
    self.search(from, |id| self.is_core(id))
  }

  pub fn built_at(&self) -> Option<DateTime<Utc>> { self.built_at }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
  pub state:    GraphState,
  pub nodes:    usize,
  pub edges:    usize,
  pub core:     Vec<CoreDevice>,
  pub built_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreDevice {
  pub device_id: Uuid,
  pub hostname:  String,
  pub degree:    usize,
}

/// The shared, lazily rebuilt graph.
#[derive(Debug)]
pub struct TopologyGraph {
  snapshot:   RwLock<Arc<GraphSnapshot>>,
  state:      AtomicU8,
  rebuild:    tokio::sync::Mutex<()>,
  core_count: usize,
}

impl TopologyGraph {
  pub fn new(core_count: usize) -> Self {
    Self {
      snapshot: RwLock::new(Arc::new(GraphSnapshot::default())),
      state: AtomicU8::new(GraphState::Invalid as u8),
      rebuild: tokio::sync::Mutex::new(()),
      core_count,
    }
  }

  pub fn state(&self) -> GraphState { GraphState::from_u8(self.state.load(Ordering::Acquire)) }

  /// Mark the graph stale. The next [`ensure_valid`](Self::ensure_valid)
  /// rebuilds it.
  pub fn invalidate(&self) {
    self
      .state
      .store(GraphState::Invalid as u8, Ordering::Release);
    debug!("topology graph invalidated");
  }

  /// The last built snapshot, whatever the current state.
  pub fn snapshot(&self) -> Arc<GraphSnapshot> { Arc::clone(&self.snapshot.read()) }

  /// The current snapshot, rebuilt first if stale.
  pub async fn ensure_valid<S: NetworkStore>(&self, store: &S) -> Result<Arc<GraphSnapshot>> {
    if self.state() == GraphState::Valid {
      return Ok(self.snapshot());
    }
    let _guard = self.rebuild.lock().await;
    if self.state() == GraphState::Valid {
      return Ok(self.snapshot());
    }
    self.build_locked(store).await
  }

  /// Rebuild unconditionally.
  pub async fn rebuild<S: NetworkStore>(&self, store: &S) -> Result<Arc<GraphSnapshot>> {
    let _guard = self.rebuild.lock().await;
    self.build_locked(store).await
  }

  async fn build_locked<S: NetworkStore>(&self, store: &S) -> Result<Arc<GraphSnapshot>> {
    self
      .state
      .store(GraphState::Building as u8, Ordering::Release);

    let loaded = async {
      let devices = store.list_devices(true).await?;
      let links = store.list_links().await?;
      Ok::<_, S::Error>((devices, links))
    }
    .await;
    let (devices, links) = match loaded {
      Ok(loaded) => loaded,
      Err(e) => {
        self.invalidate();
        return Err(Error::store(Stage::Graph)(e));
      }
    };

    let snapshot = Arc::new(GraphSnapshot::build(&devices, &links, self.core_count, Utc::now()));
    *self.snapshot.write() = Arc::clone(&snapshot);

    // An invalidation that raced the build leaves the graph invalid.
    let _ = self.state.compare_exchange(
      GraphState::Building as u8,
      GraphState::Valid as u8,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
    info!(nodes = snapshot.node_count(), edges = snapshot.edge_count(), "topology graph built");
    Ok(snapshot)
  }

  pub fn stats(&self) -> GraphStats {
    let snapshot = self.snapshot();
    GraphStats {
      state:    self.state(),
      nodes:    snapshot.node_count(),
      edges:    snapshot.edge_count(),
      core:     snapshot
        .core()
        .iter()
        .map(|id| CoreDevice {
          device_id: *id,
          hostname:  snapshot.hostname(*id).unwrap_or_default().to_owned(),
          degree:    snapshot.neighbors(*id).len(),
        })
        .collect(),
      built_at: snapshot.built_at(),
    }
  }
}
