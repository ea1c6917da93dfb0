//! Core types and trait definitions for netloc.
//!
//! This crate is deliberately free of network and database dependencies.
//! Every other crate depends on it: the device layer produces its
//! observation types, the engine turns them into write plans, and storage
//! backends implement [`store::NetworkStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod address;
pub mod device;
pub mod discovery;
pub mod error;
pub mod mac;
pub mod naming;
pub mod observation;
pub mod oui;
pub mod plan;
pub mod port;
pub mod store;
pub mod topology;

pub use error::{Error, Result};
pub use mac::MacAddr;
