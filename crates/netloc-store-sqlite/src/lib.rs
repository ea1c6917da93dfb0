//! SQLite backend for the netloc store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. A device pass is applied as one
//! transaction; at most one current location per address is enforced both
//! by a partial unique index and by an in-transaction check.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
