//! Matching collector output to stored ports.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use netloc_core::{naming, port::Port};
use uuid::Uuid;

/// One device's ports, with lazily created additions and a record of what
/// changed.
#[derive(Debug, Clone)]
pub struct PortMap {
  device_id: Uuid,
  ports:     Vec<Port>,
  changed:   HashSet<Uuid>,
}

impl PortMap {
  pub fn new(device_id: Uuid, ports: Vec<Port>) -> Self {
    Self { device_id, ports, changed: HashSet::new() }
  }

  pub fn device_id(&self) -> Uuid { self.device_id }

  pub fn ports(&self) -> &[Port] { &self.ports }

  pub fn get(&self, port_id: Uuid) -> Option<&Port> {
    self.ports.iter().find(|p| p.port_id == port_id)
  }

  /// Mutable access; the port will be written back.
  pub fn get_mut(&mut self, port_id: Uuid) -> Option<&mut Port> {
    let port = self.ports.iter_mut().find(|p| p.port_id == port_id)?;
    self.changed.insert(port_id);
    Some(port)
  }

  /// Interface index first, when known; normalized name second.
  pub fn find(&self, index: u32, name: Option<&str>) -> Option<&Port> {
    if index > 0
      && let Some(port) = self.ports.iter().find(|p| p.index == index)
    {
      return Some(port);
    }
    let key = naming::normalize_port_name(name?);
    self.ports.iter().find(|p| p.normalized_name() == key)
  }

  /// The port for `(index, name)`, created when unknown. A port found by
  /// name that had no index adopts `index`.
  pub fn resolve(&mut self, index: u32, name: &str, at: DateTime<Utc>) -> Uuid {
    if let Some(found) = self.find(index, Some(name)) {
      let port_id = found.port_id;
      if index > 0 && found.index == 0 {
        if let Some(port) = self.get_mut(port_id) {
          port.index = index;
          port.updated_at = at;
        }
      }
      return port_id;
    }

    let port = Port::new(self.device_id, name, index, at);
    let port_id = port.port_id;
    self.ports.push(port);
    self.changed.insert(port_id);
    port_id
  }

  /// Ports created or modified since construction.
  pub fn changed(&self) -> impl Iterator<Item = &Port> {
    self
      .ports
      .iter()
      .filter(|p| self.changed.contains(&p.port_id))
  }

  pub fn into_changed(self) -> Vec<Port> {
    let changed = self.changed;
    self
      .ports
      .into_iter()
      .filter(|p| changed.contains(&p.port_id))
      .collect()
  }
}
