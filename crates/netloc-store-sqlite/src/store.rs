//! [`SqliteStore`], the SQLite implementation of [`NetworkStore`].

use std::{net::IpAddr, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Transaction};
use uuid::Uuid;

use netloc_core::{
  MacAddr,
  address::{AddressRecord, HistoryEvent, Location},
  device::{Device, NewDevice},
  discovery::DiscoveryLog,
  plan::{DevicePass, DuplicatePortGroup, PortMerge, PortUsage},
  port::Port,
  store::NetworkStore,
  topology::TopologyLink,
};

use crate::{
  Error, Result,
  encode::{
    ADDRESS_COLUMNS, DEVICE_COLUMNS, HISTORY_COLUMNS, LINK_COLUMNS, LOCATION_COLUMNS,
    LOG_COLUMNS, PORT_COLUMNS, RawAddress, RawDevice, RawEvent, RawLink, RawLocation,
    RawLog, RawPort, decode_mac, encode_attachment, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// SQLite caps bound parameters per statement; batch lookups stay under it.
const IN_CHUNK: usize = 500;

/// Why a device pass was refused inside its transaction.
enum Rejection {
  Stale { mac: String, expected: Option<Uuid> },
  MultipleCurrent(String),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A netloc store backed by a single SQLite file.
///
/// Cloning shares the inner reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_devices(&self, sql: String, args: Vec<String>) -> Result<Vec<Device>> {
    let raws: Vec<RawDevice> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawDevice::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDevice::into_device).collect()
  }

  async fn query_locations(&self, sql: String, args: Vec<String>) -> Result<Vec<Location>> {
    let raws: Vec<RawLocation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawLocation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLocation::into_location).collect()
  }

  async fn query_links(&self, sql: String, args: Vec<String>) -> Result<Vec<TopologyLink>> {
    let raws: Vec<RawLink> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawLink::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLink::into_link).collect()
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

fn upsert_port(tx: &Transaction<'_>, port: &Port) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO ports (
       port_id, device_id, name, port_index, role, vlan,
       neighbor_name, neighbor_type, address_count, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
     ON CONFLICT(port_id) DO UPDATE SET
       name          = excluded.name,
       port_index    = excluded.port_index,
       role          = excluded.role,
       vlan          = excluded.vlan,
       neighbor_name = excluded.neighbor_name,
       neighbor_type = excluded.neighbor_type,
       updated_at    = excluded.updated_at",
    rusqlite::params![
      encode_uuid(port.port_id),
      encode_uuid(port.device_id),
      port.name,
      i64::from(port.index),
      port.role.as_ref(),
      port.vlan.map(i64::from),
      port.neighbor_name,
      port.neighbor_type.map(|t| t.as_ref().to_owned()),
      i64::from(port.address_count),
      encode_dt(port.updated_at),
    ],
  )?;
  Ok(())
}

/// One link per unordered device pair. An existing link keeps its id,
/// orientation and discovery time; ports are filled in from whichever side
/// reported them.
fn upsert_link(tx: &Transaction<'_>, link: &TopologyLink) -> rusqlite::Result<()> {
  let local = encode_uuid(link.local_device_id);
  let remote = encode_uuid(link.remote_device_id);
  let local_port = encode_uuid(link.local_port_id);
  let remote_port = link.remote_port_id.map(encode_uuid);
  let seen = encode_dt(link.last_seen);

  let existing: Option<(String, String)> = tx
    .query_row(
      "SELECT link_id, local_device_id FROM topology_links
       WHERE (local_device_id = ?1 AND remote_device_id = ?2)
          OR (local_device_id = ?2 AND remote_device_id = ?1)",
      rusqlite::params![local, remote],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()?;

  match existing {
    Some((link_id, existing_local)) if existing_local == local => {
      tx.execute(
        "UPDATE topology_links
         SET local_port_id  = ?2,
             remote_port_id = COALESCE(?3, remote_port_id),
             protocol       = ?4,
             last_seen      = ?5
         WHERE link_id = ?1",
        rusqlite::params![link_id, local_port, remote_port, link.protocol.as_ref(), seen],
      )?;
    }
    Some((link_id, _)) => {
      tx.execute(
        "UPDATE topology_links
         SET remote_port_id = ?2,
             local_port_id  = COALESCE(?3, local_port_id),
             protocol       = ?4,
             last_seen      = ?5
         WHERE link_id = ?1",
        rusqlite::params![link_id, local_port, remote_port, link.protocol.as_ref(), seen],
      )?;
    }
    None => {
      tx.execute(
        &format!("INSERT INTO topology_links ({LINK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        rusqlite::params![
          encode_uuid(link.link_id),
          local,
          local_port,
          remote,
          remote_port,
          link.protocol.as_ref(),
          encode_dt(link.discovered_at),
          seen,
        ],
      )?;
    }
  }
  Ok(())
}

fn upsert_address(tx: &Transaction<'_>, a: &AddressRecord) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO addresses (mac, vendor_hint, endpoint_class, is_active, first_seen, last_seen)
     VALUES (?1, ?2, ?3, 1, ?4, ?5)
     ON CONFLICT(mac) DO UPDATE SET
       vendor_hint    = COALESCE(vendor_hint, excluded.vendor_hint),
       endpoint_class = COALESCE(endpoint_class, excluded.endpoint_class),
       is_active      = 1,
       last_seen      = max(last_seen, excluded.last_seen)",
    rusqlite::params![
      a.mac.to_string(),
      a.vendor_hint,
      a.endpoint_class.map(|c| c.as_ref().to_owned()),
      encode_dt(a.first_seen),
      encode_dt(a.last_seen),
    ],
  )?;
  Ok(())
}

fn insert_location(tx: &Transaction<'_>, l: &Location) -> rusqlite::Result<()> {
  tx.execute(
    &format!("INSERT INTO locations ({LOCATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
    rusqlite::params![
      encode_uuid(l.location_id),
      l.mac.to_string(),
      encode_uuid(l.device_id),
      encode_uuid(l.port_id),
      i64::from(l.vlan),
      l.ip.map(|ip| ip.to_string()),
      l.hostname,
      l.is_current,
      encode_dt(l.first_seen),
      encode_dt(l.last_seen),
    ],
  )?;
  Ok(())
}

fn insert_event(tx: &Transaction<'_>, e: &HistoryEvent) -> rusqlite::Result<()> {
  let (from_device, from_port, from_vlan) = encode_attachment(e.from);
  let (to_device, to_port, to_vlan) = encode_attachment(e.to);
  tx.execute(
    &format!("INSERT INTO history ({HISTORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
    rusqlite::params![
      encode_uuid(e.event_id),
      e.mac.to_string(),
      e.kind.as_ref(),
      from_device,
      from_port,
      from_vlan,
      to_device,
      to_port,
      to_vlan,
      encode_dt(e.recorded_at),
    ],
  )?;
  Ok(())
}

fn current_location_id(tx: &Transaction<'_>, mac: &str) -> rusqlite::Result<Option<String>> {
  tx.query_row(
    "SELECT location_id FROM locations WHERE mac = ?1 AND is_current = 1",
    rusqlite::params![mac],
    |r| r.get(0),
  )
  .optional()
}

fn recount_port(tx: &Transaction<'_>, port_id: &str) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE ports SET address_count =
       (SELECT COUNT(*) FROM locations l WHERE l.port_id = ports.port_id AND l.is_current = 1)
     WHERE port_id = ?1",
    rusqlite::params![port_id],
  )?;
  Ok(())
}

/// Body of [`NetworkStore::commit_device_pass`]; runs inside one transaction.
fn apply_pass(
  tx: &Transaction<'_>,
  pass: &DevicePass,
  info_json: Option<&str>,
) -> rusqlite::Result<std::result::Result<(), Rejection>> {
  let device_id = encode_uuid(pass.device_id);
  let at = encode_dt(pass.observed_at);
  let c = &pass.classification;

  for port in &pass.ports {
    upsert_port(tx, port)?;
  }
  for link in &pass.links {
    upsert_link(tx, link)?;
  }
  for address in &c.addresses {
    upsert_address(tx, address)?;
  }

  // Retirements: still-current locations of vanished addresses.
  for r in &c.retirements {
    let flipped = tx.execute(
      "UPDATE locations SET is_current = 0 WHERE location_id = ?1 AND is_current = 1",
      rusqlite::params![encode_uuid(r.location_id)],
    )?;
    if flipped == 0 {
      return Ok(Err(Rejection::Stale {
        mac:      r.event.mac.to_string(),
        expected: Some(r.location_id),
      }));
    }
    insert_event(tx, &r.event)?;
  }

  for id in &c.refreshes {
    tx.execute(
      "UPDATE locations SET last_seen = ?2 WHERE location_id = ?1 AND is_current = 1",
      rusqlite::params![encode_uuid(*id), at],
    )?;
  }

  let mut recount: Vec<String> = Vec::new();
  for p in &c.placements {
    let mac = p.location.mac.to_string();
    let current = current_location_id(tx, &mac)?;
    if current != p.supersedes.map(encode_uuid) {
      return Ok(Err(Rejection::Stale { mac, expected: p.supersedes }));
    }
    if let Some(old) = current {
      let old_port: String = tx.query_row(
        "SELECT port_id FROM locations WHERE location_id = ?1",
        rusqlite::params![old],
        |r| r.get(0),
      )?;
      tx.execute(
        "UPDATE locations SET is_current = 0 WHERE location_id = ?1",
        rusqlite::params![old],
      )?;
      recount.push(old_port);
    }
    insert_location(tx, &p.location)?;
    if let Some(event) = &p.event {
      insert_event(tx, event)?;
    }
  }

  // Defence in depth next to the partial unique index.
  for mac in c.touched() {
    let mac = mac.to_string();
    let n: i64 = tx.query_row(
      "SELECT COUNT(*) FROM locations WHERE mac = ?1 AND is_current = 1",
      rusqlite::params![mac],
      |r| r.get(0),
    )?;
    if n > 1 {
      return Ok(Err(Rejection::MultipleCurrent(mac)));
    }
  }

  tx.execute(
    "UPDATE ports SET address_count =
       (SELECT COUNT(*) FROM locations l WHERE l.port_id = ports.port_id AND l.is_current = 1)
     WHERE device_id = ?1",
    rusqlite::params![device_id],
  )?;
  for port_id in &recount {
    recount_port(tx, port_id)?;
  }

  match info_json {
    Some(info) => tx.execute(
      "UPDATE devices SET info_json = ?2, last_seen = ?3, last_discovery = ?3
       WHERE device_id = ?1",
      rusqlite::params![device_id, info, at],
    )?,
    None => tx.execute(
      "UPDATE devices SET last_discovery = ?2 WHERE device_id = ?1",
      rusqlite::params![device_id, at],
    )?,
  };

  Ok(Ok(()))
}

// ─── NetworkStore impl ───────────────────────────────────────────────────────

impl NetworkStore for SqliteStore {
  type Error = Error;

  // ── Devices ───────────────────────────────────────────────────────────────

  async fn add_device(&self, input: NewDevice) -> Result<Device> {
    let device = input.into_device(Uuid::new_v4(), Utc::now());
    let info_json = serde_json::to_string(&device.info)?;

    let d = device.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO devices (
             device_id, hostname, address, dialect, credentials, community,
             is_active, ssh_fallback, site_code, info_json, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            encode_uuid(d.device_id),
            d.hostname,
            d.address.to_string(),
            d.dialect.as_ref(),
            d.credentials,
            d.community,
            d.is_active,
            d.ssh_fallback,
            d.site_code,
            info_json,
            encode_dt(d.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(device)
  }

  async fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1");
    Ok(self.query_devices(sql, vec![encode_uuid(id)]).await?.pop())
  }

  async fn list_devices(&self, active_only: bool) -> Result<Vec<Device>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices {filter} ORDER BY hostname");
    self.query_devices(sql, vec![]).await
  }

  async fn find_device_by_hostname(&self, hostname: String) -> Result<Option<Device>> {
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE hostname = ?1");
    Ok(self.query_devices(sql, vec![hostname]).await?.pop())
  }

  async fn find_device_by_address(&self, address: IpAddr) -> Result<Option<Device>> {
    let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE address = ?1 LIMIT 1");
    Ok(self.query_devices(sql, vec![address.to_string()]).await?.pop())
  }

  async fn set_device_active(&self, id: Uuid, active: bool) -> Result<()> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE devices SET is_active = ?2 WHERE device_id = ?1",
          rusqlite::params![id_str, active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::DeviceNotFound(id));
    }
    Ok(())
  }

  // ── Ports ─────────────────────────────────────────────────────────────────

  async fn list_ports(&self, device_id: Uuid) -> Result<Vec<Port>> {
    let id_str = encode_uuid(device_id);
    let sql = format!(
      "SELECT {PORT_COLUMNS} FROM ports WHERE device_id = ?1 ORDER BY port_index, name"
    );

    let raws: Vec<RawPort> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawPort::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPort::into_port).collect()
  }

  async fn get_port(&self, port_id: Uuid) -> Result<Option<Port>> {
    let id_str = encode_uuid(port_id);
    let sql = format!("SELECT {PORT_COLUMNS} FROM ports WHERE port_id = ?1");

    let raw: Option<RawPort> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawPort::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPort::into_port).transpose()
  }

  // ── Addresses and locations ───────────────────────────────────────────────

  async fn get_address(&self, mac: MacAddr) -> Result<Option<AddressRecord>> {
    let mac_str = mac.to_string();
    let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE mac = ?1");

    let raw: Option<RawAddress> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![mac_str], RawAddress::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAddress::into_address).transpose()
  }

  async fn current_locations_on_device(&self, device_id: Uuid) -> Result<Vec<Location>> {
    let sql = format!(
      "SELECT {LOCATION_COLUMNS} FROM locations WHERE device_id = ?1 AND is_current = 1"
    );
    self.query_locations(sql, vec![encode_uuid(device_id)]).await
  }

  async fn current_locations_for(&self, macs: Vec<MacAddr>) -> Result<Vec<Location>> {
    let mut out = Vec::with_capacity(macs.len());
    for chunk in macs.chunks(IN_CHUNK) {
      let placeholders = vec!["?"; chunk.len()].join(", ");
      let sql = format!(
        "SELECT {LOCATION_COLUMNS} FROM locations
         WHERE is_current = 1 AND mac IN ({placeholders})"
      );
      let args = chunk.iter().map(MacAddr::to_string).collect();
      out.extend(self.query_locations(sql, args).await?);
    }
    Ok(out)
  }

  async fn known_addresses(&self, macs: Vec<MacAddr>) -> Result<Vec<MacAddr>> {
    let mut out = Vec::new();
    for chunk in macs.chunks(IN_CHUNK) {
      let placeholders = vec!["?"; chunk.len()].join(", ");
      let sql = format!("SELECT mac FROM addresses WHERE mac IN ({placeholders})");
      let args: Vec<String> = chunk.iter().map(MacAddr::to_string).collect();
      let found: Vec<String> = self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(args), |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?;
      for raw in found {
        out.push(decode_mac(&raw)?);
      }
    }
    Ok(out)
  }

  async fn locations_of(&self, mac: MacAddr, current_only: bool) -> Result<Vec<Location>> {
    let filter = if current_only { "AND is_current = 1" } else { "" };
    let sql = format!(
      "SELECT {LOCATION_COLUMNS} FROM locations WHERE mac = ?1 {filter}
       ORDER BY last_seen DESC, location_id"
    );
    self.query_locations(sql, vec![mac.to_string()]).await
  }

  async fn distinct_addresses_on_port(&self, port_id: Uuid) -> Result<u32> {
    let id_str = encode_uuid(port_id);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(DISTINCT mac) FROM locations WHERE port_id = ?1",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(u32::try_from(n).unwrap_or(u32::MAX))
  }

  async fn history_of(&self, mac: MacAddr) -> Result<Vec<HistoryEvent>> {
    let mac_str = mac.to_string();
    let sql = format!(
      "SELECT {HISTORY_COLUMNS} FROM history WHERE mac = ?1 ORDER BY recorded_at, rowid"
    );

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![mac_str], RawEvent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn deactivate_addresses_before(&self, before: DateTime<Utc>) -> Result<usize> {
    let before_str = encode_dt(before);
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.execute(
            "UPDATE addresses SET is_active = 0 WHERE is_active = 1 AND last_seen < ?1",
            rusqlite::params![before_str],
          )?)
        })
        .await?,
    )
  }

  // ── Topology ──────────────────────────────────────────────────────────────

  async fn list_links(&self) -> Result<Vec<TopologyLink>> {
    let sql = format!("SELECT {LINK_COLUMNS} FROM topology_links ORDER BY discovered_at, link_id");
    self.query_links(sql, vec![]).await
  }

  async fn links_of_device(&self, device_id: Uuid) -> Result<Vec<TopologyLink>> {
    let sql = format!(
      "SELECT {LINK_COLUMNS} FROM topology_links
       WHERE local_device_id = ?1 OR remote_device_id = ?1
       ORDER BY discovered_at, link_id"
    );
    self.query_links(sql, vec![encode_uuid(device_id)]).await
  }

  // ── Atomic writes ─────────────────────────────────────────────────────────

  async fn commit_device_pass(&self, pass: DevicePass) -> Result<()> {
    let info_json = pass.info.as_ref().map(serde_json::to_string).transpose()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        match apply_pass(&tx, &pass, info_json.as_deref())? {
          Ok(()) => {
            tx.commit()?;
            Ok(Ok(()))
          }
          // Dropping the transaction rolls it back.
          Err(rejection) => Ok(Err(rejection)),
        }
      })
      .await?;

    outcome.map_err(|r| match r {
      Rejection::Stale { mac, expected } => Error::StaleSupersession { mac, expected },
      Rejection::MultipleCurrent(mac) => Error::MultipleCurrent(mac),
    })
  }

  async fn duplicate_ports(&self) -> Result<Vec<DuplicatePortGroup>> {
    let sql = format!(
      "SELECT {PORT_COLUMNS},
         (SELECT COUNT(*) FROM locations l WHERE l.port_id = ports.port_id)
       FROM ports
       WHERE port_index > 0 AND (device_id, port_index) IN (
         SELECT device_id, port_index FROM ports
         WHERE port_index > 0
         GROUP BY device_id, port_index
         HAVING COUNT(*) > 1
       )
       ORDER BY device_id, port_index, updated_at, port_id"
    );

    let raws: Vec<(RawPort, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| Ok((RawPort::from_row(row)?, row.get(10)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut groups: Vec<DuplicatePortGroup> = Vec::new();
    for (raw, count) in raws {
      let port = raw.into_port()?;
      let usage = PortUsage { location_count: u32::try_from(count).unwrap_or(0), port };
      match groups.last_mut() {
        Some(g) if g.device_id == usage.port.device_id && g.index == usage.port.index => {
          g.ports.push(usage);
        }
        _ => groups.push(DuplicatePortGroup {
          device_id: usage.port.device_id,
          index:     usage.port.index,
          ports:     vec![usage],
        }),
      }
    }
    Ok(groups)
  }

  async fn merge_ports(&self, merge: PortMerge) -> Result<()> {
    let keep = encode_uuid(merge.keep);
    let device = encode_uuid(merge.device_id);
    let remove: Vec<String> = merge.remove.iter().copied().map(encode_uuid).collect();
    let neighbor_name = merge.neighbor_name.clone();
    let neighbor_type = merge.neighbor_type.map(|t| t.as_ref().to_owned());

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM ports WHERE port_id = ?1 AND device_id = ?2",
            rusqlite::params![keep, device],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }

        for old in &remove {
          for sql in [
            "UPDATE locations      SET port_id        = ?1 WHERE port_id        = ?2",
            "UPDATE history        SET from_port_id   = ?1 WHERE from_port_id   = ?2",
            "UPDATE history        SET to_port_id     = ?1 WHERE to_port_id     = ?2",
            "UPDATE topology_links SET local_port_id  = ?1 WHERE local_port_id  = ?2",
            "UPDATE topology_links SET remote_port_id = ?1 WHERE remote_port_id = ?2",
          ] {
            tx.execute(sql, rusqlite::params![keep, old])?;
          }
          tx.execute("DELETE FROM ports WHERE port_id = ?1", rusqlite::params![old])?;
        }

        tx.execute(
          "UPDATE ports SET
             neighbor_name = COALESCE(neighbor_name, ?2),
             neighbor_type = COALESCE(neighbor_type, ?3)
           WHERE port_id = ?1",
          rusqlite::params![keep, neighbor_name, neighbor_type],
        )?;
        recount_port(&tx, &keep)?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::PortNotFound(merge.keep));
    }
    Ok(())
  }

  // ── Discovery log ─────────────────────────────────────────────────────────

  async fn record_discovery(&self, log: DiscoveryLog) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO discovery_logs ({LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
          rusqlite::params![
            encode_uuid(log.log_id),
            encode_uuid(log.device_id),
            log.method.as_ref(),
            log.status.as_ref(),
            i64::from(log.address_count),
            log.error,
            encode_dt(log.started_at),
            encode_dt(log.completed_at),
            log.duration_ms,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn recent_discoveries(&self, limit: usize) -> Result<Vec<DiscoveryLog>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);
    let sql = format!(
      "SELECT {LOG_COLUMNS} FROM discovery_logs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
    );

    let raws: Vec<RawLog> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val], RawLog::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLog::into_log).collect()
  }
}
