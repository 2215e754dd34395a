//! Coordinator for distributed runs
//!
//! Handles worker pooling, row partitioning, barrier rounds, client controls
//! and live cell telemetry.

pub mod broker;
pub mod partition;
pub mod pool;
pub mod round;
pub mod run;
pub mod telemetry;

pub use broker::{Coordinator, CoordinatorConfig, RunRequest};
pub use partition::{partition_rows, Boundaries, Segment};
pub use pool::{Lease, WorkerInfo, WorkerPool, WorkerStatus};
pub use run::{RunControl, RunOutcome};
pub use telemetry::TelemetryReporter;
