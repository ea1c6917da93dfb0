use std::{
  net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
  sync::atomic::{AtomicI32, Ordering},
  time::Duration,
};

use serde::Deserialize;
use tokio::{net::UdpSocket, time::Instant};
use tracing::debug;

use super::{
  Oid, Value,
  ber::{self, Request, RequestKind, Response},
};
use crate::{Error, Result};

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

fn next_request_id() -> i32 {
  // Wraps back into the positive range; agents echo it verbatim.
  NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
}

/// SNMP transport knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnmpSettings {
  pub port:            u16,
  pub timeout_secs:    u64,
  /// Extra attempts after the first one times out.
  pub retries:         u32,
  pub max_repetitions: u32,
}

impl Default for SnmpSettings {
  fn default() -> Self {
    Self { port: 161, timeout_secs: 5, retries: 2, max_repetitions: 25 }
  }
}

/// A connectionless SNMPv2c manager.
#[derive(Debug, Clone, Default)]
pub struct SnmpClient {
  settings: SnmpSettings,
}

impl SnmpClient {
  pub fn new(settings: SnmpSettings) -> Self { Self { settings } }

  /// Single-value GET. `Ok(None)` when the agent reports no such object or
  /// instance.
  pub async fn get(&self, address: IpAddr, community: &str, oid: &Oid) -> Result<Option<Value>> {
    let resp = self
      .exchange(address, community, RequestKind::Get, std::slice::from_ref(oid))
      .await?;
    check_status(address, oid, &resp)?;

    Ok(
      resp
        .varbinds
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .filter(|value| !value.is_exception()),
    )
  }

  /// Walk every instance under `root` with GETBULK.
  ///
  /// Stops at the first OID outside the subtree or at `endOfMibView`. An
  /// agent that returns OIDs out of order fails the walk rather than
  /// looping forever.
  pub async fn walk(
    &self,
    address: IpAddr,
    community: &str,
    root: &Oid,
  ) -> Result<Vec<(Oid, Value)>> {
    let kind = RequestKind::GetBulk {
      non_repeaters:   0,
      max_repetitions: self.settings.max_repetitions.max(1),
    };

    let mut rows = Vec::new();
    let mut cursor = root.clone();
    'walk: loop {
      let resp = self
        .exchange(address, community, kind, std::slice::from_ref(&cursor))
        .await?;
      check_status(address, root, &resp)?;
      if resp.varbinds.is_empty() {
        break;
      }

      for (oid, value) in resp.varbinds {
        if value == Value::EndOfMibView || !oid.starts_with(root) {
          break 'walk;
        }
        if oid <= cursor {
          return Err(Error::parse("walk order", oid.to_string()));
        }
        cursor = oid.clone();
        rows.push((oid, value));
      }
    }

    debug!(%address, %root, rows = rows.len(), "snmp walk complete");
    Ok(rows)
  }

  async fn exchange(
    &self,
    address: IpAddr,
    community: &str,
    kind: RequestKind,
    oids: &[Oid],
  ) -> Result<Response> {
    let transport = |e: std::io::Error| Error::Transport { address, message: e.to_string() };

    let local = match address {
      IpAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
      IpAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(local).await.map_err(transport)?;
    socket
      .connect((address, self.settings.port))
      .await
      .map_err(transport)?;

    let timeout = Duration::from_secs(self.settings.timeout_secs.max(1));
    let attempts = self.settings.retries + 1;
    let mut buf = vec![0u8; 65_535];

    // Socket errors and undecodable datagrams spend an attempt, never the
    // whole exchange.
    let mut last_error = None;
    for attempt in 1..=attempts {
      let request_id = next_request_id();
      let packet = ber::encode_request(&Request { community, request_id, kind, oids })?;
      if let Err(e) = socket.send(&packet).await {
        debug!(%address, attempt, error = %e, "snmp send failed");
        last_error = Some(transport(e));
        continue;
      }

      let deadline = Instant::now() + timeout;
      loop {
        let n = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
          Err(_) => {
            debug!(%address, attempt, attempts, "snmp request timed out");
            break;
          }
          Ok(Err(e)) => {
            debug!(%address, attempt, error = %e, "snmp receive failed");
            last_error = Some(transport(e));
            break;
          }
          Ok(Ok(n)) => n,
        };
        let resp = match ber::decode_response(&buf[..n]) {
          Ok(resp) => resp,
          Err(e) => {
            debug!(%address, attempt, error = %e, "discarding undecodable datagram");
            continue;
          }
        };
        if resp.request_id == request_id {
          return Ok(resp);
        }
        debug!(%address, expected = request_id, got = resp.request_id, "discarding stale response");
      }
    }

    Err(last_error.unwrap_or(Error::Timeout { address, attempts }))
  }
}

fn check_status(address: IpAddr, oid: &Oid, resp: &Response) -> Result<()> {
  if resp.error_status != 0 {
    return Err(Error::QueryFailed { address, oid: oid.to_string(), status: resp.error_status });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use bytes::Bytes;

  use super::*;

  /// What the loopback agent sends ahead of each real answer.
  #[derive(Clone, Copy, PartialEq)]
  enum Noise {
    Quiet,
    /// An answer carrying the wrong request id.
    Stale,
    /// Bytes that are not BER at all.
    Junk,
  }

  /// A loopback agent serving `table` with GET and GETBULK semantics,
  /// preceding every answer with `noise`.
  async fn spawn_agent(table: BTreeMap<Oid, Value>, noise: Noise) -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
      let mut buf = vec![0u8; 65_535];
      loop {
        let Ok((n, peer)) = socket.recv_from(&mut buf).await else { return };
        let (id, pdu, oids) = ber::decode_request(&buf[..n]).unwrap();
        let start = &oids[0];
        let varbinds: Vec<(Oid, Value)> = if pdu == ber::tag::GET_REQUEST {
          vec![(start.clone(), table.get(start).cloned().unwrap_or(Value::NoSuchObject))]
        } else {
          let mut next: Vec<_> = table
            .range(start.clone()..)
            .filter(|(oid, _)| *oid > start)
            .take(2)
            .map(|(o, v)| (o.clone(), v.clone()))
            .collect();
          if next.is_empty() {
            next.push((start.clone(), Value::EndOfMibView));
          }
          next
        };
        match noise {
          Noise::Quiet => {}
          Noise::Stale => {
            let stale = ber::encode_response(id.wrapping_add(1000), &varbinds);
            socket.send_to(&stale, peer).await.unwrap();
          }
          Noise::Junk => {
            socket.send_to(&[0xff, 0x00, 0x13, 0x37], peer).await.unwrap();
          }
        }
        let reply = ber::encode_response(id, &varbinds);
        socket.send_to(&reply, peer).await.unwrap();
      }
    });
    port
  }

  fn oid(s: &str) -> Oid { s.parse().unwrap() }

  fn client(port: u16) -> SnmpClient {
    SnmpClient::new(SnmpSettings { port, timeout_secs: 1, retries: 0, max_repetitions: 2 })
  }

  fn if_names() -> BTreeMap<Oid, Value> {
    let mut table = BTreeMap::new();
    for (i, name) in ["GE0/0/1", "GE0/0/2", "GE0/0/3"].iter().enumerate() {
      let key = oid("1.3.6.1.2.1.31.1.1.1.1").child(&[i as u32 + 1]);
      table.insert(key, Value::OctetString(Bytes::copy_from_slice(name.as_bytes())));
    }
    // A neighbouring column the walk must not spill into.
    table.insert(oid("1.3.6.1.2.1.31.1.1.1.2.1"), Value::Integer(0));
    table
  }

  #[tokio::test]
  async fn walk_stays_inside_subtree() {
    let port = spawn_agent(if_names(), Noise::Quiet).await;
    let rows = client(port)
      .walk(IpAddr::V4(Ipv4Addr::LOCALHOST), "public", &oid("1.3.6.1.2.1.31.1.1.1.1"))
      .await
      .unwrap();

    let names: Vec<_> = rows.iter().filter_map(|(_, v)| v.as_text()).collect();
    assert_eq!(names, vec!["GE0/0/1", "GE0/0/2", "GE0/0/3"]);
  }

  #[tokio::test]
  async fn stale_request_ids_are_ignored() {
    let port = spawn_agent(if_names(), Noise::Stale).await;
    let rows = client(port)
      .walk(IpAddr::V4(Ipv4Addr::LOCALHOST), "public", &oid("1.3.6.1.2.1.31.1.1.1.1"))
      .await
      .unwrap();
    assert_eq!(rows.len(), 3);
  }

  #[tokio::test]
  async fn undecodable_datagrams_are_skipped() {
    let port = spawn_agent(if_names(), Noise::Junk).await;
    let value = client(port)
      .get(IpAddr::V4(Ipv4Addr::LOCALHOST), "public", &oid("1.3.6.1.2.1.31.1.1.1.1.3"))
      .await
      .unwrap();
    assert_eq!(value.and_then(|v| v.as_text()).as_deref(), Some("GE0/0/3"));
  }

  #[tokio::test]
  async fn get_maps_no_such_object_to_none() {
    let port = spawn_agent(if_names(), Noise::Quiet).await;
    let snmp = client(port);
    let address = IpAddr::V4(Ipv4Addr::LOCALHOST);

    let hit = snmp
      .get(address, "public", &oid("1.3.6.1.2.1.31.1.1.1.1.2"))
      .await
      .unwrap();
    assert_eq!(hit.and_then(|v| v.as_text()).as_deref(), Some("GE0/0/2"));

    let miss = snmp.get(address, "public", &oid("1.3.6.1.2.1.1.5.0")).await.unwrap();
    assert!(miss.is_none());
  }

  #[tokio::test]
  async fn silent_agent_times_out() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    let err = client(port)
      .get(IpAddr::V4(Ipv4Addr::LOCALHOST), "public", &oid("1.3.6.1.2.1.1.5.0"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Timeout { attempts: 1, .. }));
    drop(socket);
  }
}
