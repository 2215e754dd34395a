//! Error types for the distributed Game of Life engine
//!
//! Covers capacity, connection, precondition, protocol and runtime errors
//! raised by the coordinator, the workers and the transport between them.

use thiserror::Error;
use uuid::Uuid;

/// Primary error type for all engine operations
#[derive(Debug, Error)]
pub enum GolError {
    // ========== Capacity Errors ==========

    /// Fewer idle workers than the run asked for
    #[error("Insufficient workers: requested {requested}, available {available}")]
    InsufficientWorkers { requested: usize, available: usize },

    /// Row partition cannot be built for this grid
    #[error("Cannot partition {height} rows among {workers} workers")]
    InvalidPartition { height: usize, workers: usize },

    // ========== Connection Errors ==========

    /// Dial to a worker or client failed
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Peer closed the connection mid-call
    #[error("Connection to {endpoint} closed")]
    ConnectionClosed { endpoint: String },

    /// Remote side answered with an error
    #[error("Remote error from {endpoint}: {message}")]
    Remote { endpoint: String, message: String },

    // ========== Precondition Errors ==========

    /// Worker received a request before Initialize
    #[error("Worker not initialized")]
    NotInitialized,

    /// Turn request arrived while the worker is paused
    #[error("Worker is paused, turn {turn} rejected")]
    WorkerPaused { turn: u64 },

    /// Worker already stopped computing for this run
    #[error("Worker has halted")]
    WorkerHalted,

    /// Worker is serving another run
    #[error("Worker is busy with an active run")]
    WorkerBusy,

    /// Worker process is closing
    #[error("Worker is closing")]
    WorkerClosed,

    /// Requested turn does not follow the worker's local counter
    #[error("Turn mismatch: expected {expected}, got {actual}")]
    TurnMismatch { expected: u64, actual: u64 },

    // ========== Run Errors ==========

    /// No active run with this id
    #[error("Run {run_id} not found")]
    RunNotFound { run_id: Uuid },

    /// A run with this id is already active
    #[error("Run {run_id} already active")]
    RunAlreadyActive { run_id: Uuid },

    /// Worker did not answer a barrier round in time
    #[error("Worker {worker} unresponsive at turn {turn}")]
    WorkerUnresponsive { worker: usize, turn: u64 },

    /// Worker not registered in the pool
    #[error("Worker {worker_id} not registered")]
    WorkerNotRegistered { worker_id: u32 },

    // ========== Protocol Errors ==========

    /// Message could not be decoded or violates the protocol
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// Frame larger than the configured maximum
    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Socket level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Runtime Errors ==========

    /// Shutdown in progress
    #[error("Shutdown in progress")]
    ShutdownInProgress,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GolError {
    /// Returns true if this error ends the run it occurred in
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            GolError::ConnectionFailed { .. }
                | GolError::ConnectionClosed { .. }
                | GolError::Remote { .. }
                | GolError::WorkerUnresponsive { .. }
                | GolError::TurnMismatch { .. }
                | GolError::InvalidMessage { .. }
                | GolError::FrameTooLarge { .. }
                | GolError::Io(_)
                | GolError::Internal { .. }
        )
    }

    /// Returns true if a request arrived in a state that cannot serve it
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GolError::NotInitialized
                | GolError::WorkerPaused { .. }
                | GolError::WorkerHalted
                | GolError::WorkerBusy
                | GolError::WorkerClosed
                | GolError::TurnMismatch { .. }
        )
    }
}

impl From<serde_json::Error> for GolError {
    fn from(e: serde_json::Error) -> Self {
        GolError::InvalidMessage { reason: e.to_string() }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(GolError::NotInitialized.is_precondition());
        assert!(!GolError::NotInitialized.is_fatal_to_run());

        let stall = GolError::WorkerUnresponsive { worker: 2, turn: 7 };
        assert!(stall.is_fatal_to_run());
        assert_eq!(stall.to_string(), "Worker 2 unresponsive at turn 7");

        let capacity = GolError::InsufficientWorkers { requested: 4, available: 1 };
        assert!(!capacity.is_fatal_to_run());
    }
}
