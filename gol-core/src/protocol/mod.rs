//! Wire protocol between client, coordinator and workers
//!
//! Every message is a serde enum carried in a length-prefixed JSON frame
//! (see [`codec`]). Each connection is strictly request/response.

pub mod codec;
pub mod rpc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinator::partition::Segment;
use crate::grid::{Cell, Grid, TurnState, TurnSummary};

pub use rpc::{serve, RpcConnection};

// ========== Coordinator → Worker ==========

/// Hands a worker its segment and the starting grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub segment: Segment,
    pub grid: Grid,
    pub total_turns: u64,
}

/// Halo rows for one barrier round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceTurnRequest {
    pub top: Vec<bool>,
    pub bottom: Vec<bool>,
    /// Completed turns before this round
    pub turn: u64,
}

/// A segment's contribution to one barrier round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceTurnResponse {
    pub live_cells: Vec<Cell>,
    pub next_turn: u64,
    /// True when the segment has at least one live cell
    pub alive: bool,
}

/// Control signal relayed to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerSignal {
    Pause,
    Resume,
    Snapshot,
    Quit,
    Close,
}

/// Worker reply to a control signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalReply {
    Ack,
    Snapshot(TurnState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerRequest {
    Initialize(InitializeRequest),
    AdvanceTurn(AdvanceTurnRequest),
    Signal(WorkerSignal),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkerResponse {
    Ack,
    Turn(AdvanceTurnResponse),
    Signal(SignalReply),
    Error { message: String },
}

// ========== Client → Coordinator ==========

/// Starts a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRunRequest {
    pub run_id: Uuid,
    pub grid: Grid,
    pub total_turns: u64,
    pub worker_count: usize,
    /// Where the client accepts live cell reports
    pub client_address: Option<String>,
}

/// Run control issued by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Save,
    Quit,
    Close,
    Pause,
    Resume,
    TogglePause,
}

impl Control {
    /// Decode a keypress: `s` save, `q` quit, `k` close, `p` pause/resume
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            's' => Some(Control::Save),
            'q' => Some(Control::Quit),
            'k' => Some(Control::Close),
            'p' => Some(Control::TogglePause),
            _ => None,
        }
    }
}

/// Coordinator reply to a control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlReply {
    Ack,
    State(TurnState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorRequest {
    RegisterWorker { address: String },
    StartRun(StartRunRequest),
    KeyPress { run_id: Uuid, control: Control },
    RunStatus { run_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoordinatorResponse {
    Registered { worker_id: u32 },
    RunFinished(TurnState),
    Control(ControlReply),
    Status(TurnSummary),
    Error { message: String },
}

// ========== Coordinator → Client ==========

/// Periodic telemetry pushed to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCellReport {
    pub turn: u64,
    pub live_cells: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientRequest {
    LiveCellReport(LiveCellReport),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientResponse {
    Ack,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_decoding() {
        assert_eq!(Control::from_key('s'), Some(Control::Save));
        assert_eq!(Control::from_key('p'), Some(Control::TogglePause));
        assert_eq!(Control::from_key('x'), None);

        assert_eq!(Control::from_key('q'), Some(Control::Quit));
        assert_eq!(Control::from_key('k'), Some(Control::Close));
    }
}
