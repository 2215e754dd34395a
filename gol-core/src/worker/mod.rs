//! Worker-side logic
//!
//! Segment state machine, its control loop, and the coordinator's handles
//! to workers.

pub mod client;
pub mod service;
pub mod state;

pub use client::{RemoteWorker, WorkerLink};
pub use service::{WorkerConfig, WorkerService};
pub use state::{SegmentWorker, WorkerPhase};
