//! Discovery, classification, topology and tracing for netloc.
//!
//! [`Engine`] ties a [`netloc_core::store::NetworkStore`] to a
//! [`netloc_device::DeviceClient`]. A discovery pass collects one device's
//! forwarding and neighbor tables, plans the resulting writes with the pure
//! functions in [`classifier`] and [`topology`], and hands the plan to the
//! store as one atomic commit. The [`graph`] is rebuilt from stored links on
//! demand, and [`tracer`] walks it to find where an address is plugged in.

pub mod classifier;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ports;
pub mod scoring;
pub mod topology;
pub mod tracer;

pub use config::{EngineConfig, ScoringConfig, TraceConfig};
pub use discovery::{FleetSummary, PassOutcome};
pub use engine::{DEFAULT_CREDENTIALS, Engine, PathNode, PortHop, RunState, RunStatus};
pub use error::{Error, Result, Stage};
pub use graph::{GraphState, GraphStats};
pub use tracer::{TraceMethod, TraceOutcome, TraceReason, TraceStep};
