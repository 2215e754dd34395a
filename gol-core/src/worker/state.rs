//! Worker state machine
//!
//! Holds one row segment plus its halo rows and advances it on request.
//! All methods are synchronous; the control loop in `service` serializes
//! access.

use tracing::{debug, info};

use crate::coordinator::partition::Segment;
use crate::engine;
use crate::error::{GolError, Result};
use crate::grid::{Cell, TurnState};
use crate::metrics::standard;
use crate::protocol::{
    AdvanceTurnRequest, AdvanceTurnResponse, InitializeRequest, SignalReply, WorkerSignal,
};

/// Worker phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Waiting for Initialize
    Uninitialized,
    /// Accepting turn requests
    Running,
    /// Turn requests rejected until resumed
    Paused,
    /// Run finished or quit; may be initialized again
    Halting,
    /// Process is shutting down
    Closing,
}

/// Segment rows with one halo row above and below
struct SegmentState {
    segment: Segment,
    width: usize,
    /// `segment.len() + 2` rows, row-major
    window: Vec<bool>,
    total_turns: u64,
    turn: u64,
}

impl SegmentState {
    fn own_rows(&self) -> &[bool] {
        &self.window[self.width..(self.segment.len() + 1) * self.width]
    }

    fn live_cells(&self) -> Vec<Cell> {
        self.own_rows()
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(idx, _)| Cell::new(idx % self.width, self.segment.top + idx / self.width))
            .collect()
    }
}

/// Local worker state
pub struct SegmentWorker {
    phase: WorkerPhase,
    state: Option<SegmentState>,
}

impl SegmentWorker {
    pub fn new() -> Self {
        Self {
            phase: WorkerPhase::Uninitialized,
            state: None,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Local turn counter, if initialized
    pub fn turn(&self) -> Option<u64> {
        self.state.as_ref().map(|s| s.turn)
    }

    /// Take ownership of a segment for a new run
    pub fn initialize(&mut self, request: InitializeRequest) -> Result<()> {
        match self.phase {
            WorkerPhase::Running | WorkerPhase::Paused => return Err(GolError::WorkerBusy),
            WorkerPhase::Closing => return Err(GolError::WorkerClosed),
            WorkerPhase::Uninitialized | WorkerPhase::Halting => {}
        }

        let InitializeRequest { segment, grid, total_turns } = request;
        if grid.width() == 0 || segment.is_empty() || segment.bottom > grid.height() {
            return Err(GolError::InvalidMessage {
                reason: format!(
                    "segment {}..{} does not fit a {}x{} grid",
                    segment.top,
                    segment.bottom,
                    grid.width(),
                    grid.height()
                ),
            });
        }

        let window = engine::window_for(&grid, segment.top, segment.bottom);
        self.state = Some(SegmentState {
            segment,
            width: grid.width(),
            window,
            total_turns,
            turn: 0,
        });
        self.phase = WorkerPhase::Running;

        info!(
            "Initialized segment {}..{} of {}x{} grid for {} turns",
            segment.top,
            segment.bottom,
            grid.width(),
            grid.height(),
            total_turns
        );
        Ok(())
    }

    /// Splice in the halo rows and compute the next generation of the segment
    pub fn advance_turn(&mut self, request: AdvanceTurnRequest) -> Result<AdvanceTurnResponse> {
        match self.phase {
            WorkerPhase::Uninitialized => return Err(GolError::NotInitialized),
            WorkerPhase::Paused => return Err(GolError::WorkerPaused { turn: request.turn }),
            WorkerPhase::Halting => return Err(GolError::WorkerHalted),
            WorkerPhase::Closing => return Err(GolError::WorkerClosed),
            WorkerPhase::Running => {}
        }
        let state = self.state.as_mut().ok_or(GolError::NotInitialized)?;

        if request.turn != state.turn {
            return Err(GolError::TurnMismatch {
                expected: state.turn,
                actual: request.turn,
            });
        }
        let width = state.width;
        if request.top.len() != width || request.bottom.len() != width {
            return Err(GolError::InvalidMessage {
                reason: format!(
                    "halo rows of width {}/{} for a grid of width {}",
                    request.top.len(),
                    request.bottom.len(),
                    width
                ),
            });
        }

        let rows = state.segment.len();
        state.window[..width].copy_from_slice(&request.top);
        state.window[(rows + 1) * width..].copy_from_slice(&request.bottom);

        let generation = standard::SEGMENT_STEP_DURATION
            .time(|| engine::next_generation(&state.window, width, state.segment.top));
        state.window[width..(rows + 1) * width].copy_from_slice(&generation.rows);
        state.turn = request.turn + 1;
        standard::SEGMENT_TURNS.inc();

        let next_turn = state.turn;
        if next_turn >= state.total_turns {
            debug!("Reached final turn {}, halting", next_turn);
            self.phase = WorkerPhase::Halting;
        }

        Ok(AdvanceTurnResponse {
            alive: !generation.live_cells.is_empty(),
            live_cells: generation.live_cells,
            next_turn,
        })
    }

    /// Apply a control signal
    pub fn signal(&mut self, signal: WorkerSignal) -> Result<SignalReply> {
        match signal {
            WorkerSignal::Pause | WorkerSignal::Resume => {
                let next = match (self.phase, signal) {
                    (WorkerPhase::Running | WorkerPhase::Paused, WorkerSignal::Pause) => {
                        WorkerPhase::Paused
                    }
                    (WorkerPhase::Running | WorkerPhase::Paused, _) => WorkerPhase::Running,
                    (WorkerPhase::Uninitialized, _) => return Err(GolError::NotInitialized),
                    (WorkerPhase::Halting, _) => return Err(GolError::WorkerHalted),
                    (WorkerPhase::Closing, _) => return Err(GolError::WorkerClosed),
                };
                if next != self.phase {
                    debug!("Worker {:?} -> {:?}", self.phase, next);
                    self.phase = next;
                }
                Ok(SignalReply::Ack)
            }
            WorkerSignal::Snapshot => {
                let state = self.state.as_ref().ok_or(GolError::NotInitialized)?;
                Ok(SignalReply::Snapshot(TurnState {
                    turn: state.turn,
                    live_cells: state.live_cells(),
                }))
            }
            WorkerSignal::Quit => {
                if self.phase != WorkerPhase::Closing {
                    self.phase = WorkerPhase::Halting;
                }
                Ok(SignalReply::Ack)
            }
            WorkerSignal::Close => {
                self.phase = WorkerPhase::Closing;
                Ok(SignalReply::Ack)
            }
        }
    }
}

impl Default for SegmentWorker {
    fn default() -> Self {
        Self::new()
    }
}
