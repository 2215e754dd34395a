//! Barrier rounds
//!
//! One round fans `AdvanceTurn` out to every worker at once, waits for all
//! of them, and merges their segments into the next authoritative grid.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::partition::Segment;
use crate::error::{GolError, Result};
use crate::grid::{Cell, Grid};
use crate::protocol::{AdvanceTurnRequest, AdvanceTurnResponse, WorkerSignal};
use crate::worker::WorkerLink;

/// A worker bound to the segment it computes
#[derive(Clone)]
pub struct Assignment {
    pub segment: Segment,
    pub link: Arc<dyn WorkerLink>,
}

/// Fan `AdvanceTurn` out to every worker and collect the responses in
/// worker order. Without a timeout the barrier waits indefinitely.
pub async fn fan_out(
    assignments: &[Assignment],
    grid: &Grid,
    turn: u64,
    timeout: Option<Duration>,
) -> Result<Vec<AdvanceTurnResponse>> {
    let mut tasks = JoinSet::new();
    for (idx, assignment) in assignments.iter().enumerate() {
        let bounds = assignment.segment.boundaries(grid.height());
        let request = AdvanceTurnRequest {
            top: grid.row(bounds.top).to_vec(),
            bottom: grid.row(bounds.bottom).to_vec(),
            turn,
        };
        let link = assignment.link.clone();
        tasks.spawn(async move { (idx, link.advance_turn(request).await) });
    }

    let deadline = timeout.map(|limit| Instant::now() + limit);
    let mut responses: Vec<Option<AdvanceTurnResponse>> = vec![None; assignments.len()];

    loop {
        let joined = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(joined) => joined,
                Err(_) => {
                    let worker = responses.iter().position(Option::is_none).unwrap_or(0);
                    warn!("Worker {} missed the turn {} deadline", worker, turn);
                    return Err(GolError::WorkerUnresponsive { worker, turn });
                }
            },
            None => tasks.join_next().await,
        };

        let Some(joined) = joined else { break };
        let (idx, result) = joined.map_err(|e| GolError::Internal {
            message: format!("turn task failed: {}", e),
        })?;
        responses[idx] = Some(result?);
    }

    Ok(responses.into_iter().flatten().collect())
}

/// Combine the segment results of round `turn` into the next grid.
///
/// Every response must report `turn + 1` and only cells of its own segment.
pub fn merge(
    assignments: &[Assignment],
    responses: Vec<AdvanceTurnResponse>,
    width: usize,
    height: usize,
    turn: u64,
) -> Result<(Grid, Vec<Cell>)> {
    if responses.len() != assignments.len() {
        return Err(GolError::Internal {
            message: format!(
                "{} responses for {} workers",
                responses.len(),
                assignments.len()
            ),
        });
    }

    let expected = turn + 1;
    let mut live_cells = Vec::new();
    for (assignment, response) in assignments.iter().zip(responses) {
        if response.next_turn != expected {
            return Err(GolError::TurnMismatch {
                expected,
                actual: response.next_turn,
            });
        }
        if !response.alive {
            continue;
        }
        if let Some(stray) = response
            .live_cells
            .iter()
            .find(|cell| !assignment.segment.contains(cell.y))
        {
            return Err(GolError::InvalidMessage {
                reason: format!(
                    "{} returned cell ({}, {}) outside rows {}..{}",
                    assignment.link.endpoint(),
                    stray.x,
                    stray.y,
                    assignment.segment.top,
                    assignment.segment.bottom
                ),
            });
        }
        live_cells.extend(response.live_cells);
    }

    let grid = Grid::from_live_cells(width, height, &live_cells)?;
    debug!("Merged turn {}: {} live cells", expected, live_cells.len());
    Ok((grid, live_cells))
}

/// Deliver `signal` to every worker concurrently; fails if any worker fails
pub async fn broadcast(assignments: &[Assignment], signal: WorkerSignal) -> Result<()> {
    let mut tasks = JoinSet::new();
    for assignment in assignments {
        let link = assignment.link.clone();
        tasks.spawn(async move { link.signal(signal).await });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| GolError::Internal {
                message: format!("signal task failed: {}", e),
            })
            .and_then(|result| result);
        if let Err(e) = outcome {
            warn!("Broadcasting {:?} failed: {}", signal, e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
