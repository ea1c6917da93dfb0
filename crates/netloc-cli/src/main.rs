//! `netloc`: discover switches, then find where hardware addresses are
//! plugged in.
//!
//! # Usage
//!
//! ```
//! netloc device add --hostname 07_L3_CORE --address 10.7.0.1 --dialect huawei
//! netloc discover
//! netloc trace 00:18:6e:35:76:31 --live
//! netloc graph path 07_L3_CORE 07_L2_RACK01
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod settings;

use std::{collections::HashMap, net::IpAddr, path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use netloc_core::{
  MacAddr,
  device::{Dialect, NewDevice},
  discovery::DiscoveryLog,
  store::NetworkStore,
};
use netloc_device::NetworkClient;
use netloc_engine::Engine;
use netloc_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type NetEngine = Engine<SqliteStore, NetworkClient>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "netloc", author, version, about = "Locate endpoints on a switched network")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "netloc.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage the device inventory.
  Device {
    #[command(subcommand)]
    action: DeviceCommand,
  },

  /// Discover every active device, or one.
  Discover {
    #[arg(long, value_name = "HOSTNAME")]
    device: Option<String>,

    /// Read forwarding tables over SSH instead of SNMP.
    #[arg(long)]
    cli: bool,
  },

  /// Find the port an address is attached to.
  Trace {
    mac: MacAddr,

    /// Walk the network from a core switch instead of scoring history.
    #[arg(long)]
    live: bool,

    /// Start from this site's core switch.
    #[arg(long, value_name = "CODE")]
    site: Option<String>,
  },

  /// Every current endpoint placement of an address.
  Endpoints { mac: MacAddr },

  /// Query the switch topology.
  Graph {
    #[command(subcommand)]
    query: GraphCommand,
  },

  /// Recent discovery log entries.
  Logs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
}

#[derive(Subcommand)]
enum DeviceCommand {
  Add {
    #[arg(long)]
    hostname:     String,
    #[arg(long)]
    address:      IpAddr,
    #[arg(long, default_value = "generic")]
    dialect:      Dialect,
    /// Named credential set from the configuration file.
    #[arg(long)]
    credentials:  Option<String>,
    #[arg(long)]
    community:    Option<String>,
    /// Fall back to the CLI when SNMP returns no forwarding table.
    #[arg(long)]
    ssh_fallback: bool,
  },

  List {
    /// Include inactive devices.
    #[arg(long)]
    all: bool,
  },
}

#[derive(Subcommand)]
enum GraphCommand {
  Stats,
  Path { from: String, to: String },
  Neighbors { hostname: String },
  CorePath { hostname: String },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = settings::load(&cli.config)?;

  let store_path = settings::expand_tilde(&settings.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let client = NetworkClient::new(settings.engine.snmp.clone(), settings.engine.ssh.clone());
  let engine = Engine::new(Arc::new(store), Arc::new(client), settings.engine)
    .with_credentials(settings.credentials);

  run(&engine, cli.command).await
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn run(engine: &NetEngine, command: Command) -> anyhow::Result<()> {
  match command {
    Command::Device { action } => device(engine, action).await,

    Command::Discover { device: Some(hostname), cli } => {
      let outcome = engine.discover_device(&hostname, cli).await?;
      print(&outcome)?;
      if !outcome.succeeded() {
        bail!("discovery of {hostname} failed");
      }
      Ok(())
    }
    Command::Discover { device: None, cli } => print(&engine.discover_all(cli).await?),

    Command::Trace { mac, live, site } => print(&engine.trace(mac, live, site.as_deref()).await?),
    Command::Endpoints { mac } => print(&engine.all_endpoints(mac).await?),

    Command::Graph { query } => graph(engine, query).await,

    Command::Logs { limit } => logs(engine, limit).await,
  }
}

async fn device(engine: &NetEngine, action: DeviceCommand) -> anyhow::Result<()> {
  match action {
    DeviceCommand::Add { hostname, address, dialect, credentials, community, ssh_fallback } => {
      let mut input = NewDevice::new(hostname, address)
        .with_dialect(dialect)
        .with_ssh_fallback(ssh_fallback);
      input.credentials = credentials;
      input.community = community;
      let device = engine
        .store()
        .add_device(input)
        .await
        .context("failed to add device")?;
      print(&device)
    }
    DeviceCommand::List { all } => print(&engine.store().list_devices(!all).await?),
  }
}

async fn graph(engine: &NetEngine, query: GraphCommand) -> anyhow::Result<()> {
  match query {
    GraphCommand::Stats => print(&engine.graph_stats().await?),
    GraphCommand::Path { from, to } => match engine.path_with_ports(&from, &to).await? {
      Some(hops) => print(&hops),
      None => bail!("no path between {from} and {to}"),
    },
    GraphCommand::Neighbors { hostname } => print(&engine.neighbors(&hostname).await?),
    GraphCommand::CorePath { hostname } => match engine.path_to_core(&hostname).await? {
      Some(path) => print(&path),
      None => bail!("{hostname} has no path to a core device"),
    },
  }
}

#[derive(Serialize)]
struct LogLine {
  hostname: Option<String>,
  #[serde(flatten)]
  log:      DiscoveryLog,
}

async fn logs(engine: &NetEngine, limit: usize) -> anyhow::Result<()> {
  let store = engine.store();
  let hostnames: HashMap<_, _> = store
    .list_devices(false)
    .await?
    .into_iter()
    .map(|d| (d.device_id, d.hostname))
    .collect();
  let lines: Vec<LogLine> = store
    .recent_discoveries(limit)
    .await?
    .into_iter()
    .map(|log| LogLine { hostname: hostnames.get(&log.device_id).cloned(), log })
    .collect();
  print(&lines)
}
