//! GoL Core - Distributed Game of Life engine
//!
//! This crate provides:
//! - Row partitioning of a toroidal grid with halo exchange
//! - A coordinator driving barrier-synchronized turns across workers
//! - Save, quit, close and pause controls serviced between turns
//! - Periodic live cell telemetry to the client

pub mod client;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod protocol;
pub mod runtime;
pub mod worker;

pub use error::GolError;
pub use grid::{Cell, Grid, TurnState};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Default live cell report interval in seconds
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 2;

/// Default coordinator listen port
pub const DEFAULT_COORDINATOR_PORT: u16 = 8030;

/// Default worker listen port
pub const DEFAULT_WORKER_PORT: u16 = 8050;

/// Default metrics listen port
pub const DEFAULT_METRICS_PORT: u16 = 9100;
