//! Device protocol client for netloc.
//!
//! Talks to switches over SNMPv2c (table walks and single gets) and over an
//! interactive SSH command line, and turns what they return into the
//! normalized shapes in [`netloc_core::observation`]:
//!
//! - [`client`]: the [`DeviceClient`] / [`CommandSession`] seam and the
//!   networked implementation.
//! - [`dialect`]: per-vendor OIDs, commands and output grammars.
//! - [`fdb`], [`lldp`], [`system`]: collectors built on the client.

pub mod cli;
pub mod client;
pub mod dialect;
pub mod error;
pub mod fdb;
pub mod lldp;
pub mod oids;
pub mod snmp;
pub mod ssh;
pub mod system;

#[cfg(test)]
mod testing;

pub use client::{CommandSession, Credentials, DeviceClient, DeviceTarget, NetworkClient};
pub use error::{Error, Result};
