//! A single simulation run
//!
//! Owns the authoritative grid and drives the barrier-synchronized turn
//! loop, servicing client controls between rounds.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::round::{self, Assignment};
use super::telemetry::TelemetryReporter;
use crate::error::{GolError, Result};
use crate::grid::{Cell, Grid, TurnState, TurnSummary};
use crate::metrics::standard;
use crate::protocol::{Control, ControlReply, InitializeRequest, WorkerSignal};

/// Coordinator-side execution mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunControl {
    Running,
    Paused,
    /// Quit requested; no further rounds
    Halting,
    /// Close requested; no further rounds, process shuts down after the run
    Closing,
}

/// A client control waiting to be serviced by the run loop
pub struct RunCommand {
    pub control: Control,
    pub reply: oneshot::Sender<ControlReply>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub state: TurnState,
    /// Set when the client asked for full shutdown
    pub close_requested: bool,
}

/// Timing knobs for one run
#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub report_interval: Duration,
    pub round_timeout: Option<Duration>,
}

pub struct Run {
    id: Uuid,
    settings: RunSettings,
    assignments: Vec<Assignment>,
    grid: Grid,
    live_cells: Vec<Cell>,
    turn: u64,
    total_turns: u64,
    control: RunControl,
    /// Workers were already sent quit or close
    workers_stopped: bool,
    commands: mpsc::Receiver<RunCommand>,
    status: watch::Sender<TurnSummary>,
    telemetry: TelemetryReporter,
}

impl Run {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        settings: RunSettings,
        assignments: Vec<Assignment>,
        grid: Grid,
        total_turns: u64,
        commands: mpsc::Receiver<RunCommand>,
        status: watch::Sender<TurnSummary>,
        telemetry: TelemetryReporter,
    ) -> Self {
        let live_cells = grid.live_cells();
        Self {
            id,
            settings,
            assignments,
            grid,
            live_cells,
            turn: 0,
            total_turns,
            control: RunControl::Running,
            workers_stopped: false,
            commands,
            status,
            telemetry,
        }
    }

    /// Initialize the workers, run the turn loop, and stop the workers.
    pub async fn execute(mut self) -> Result<RunOutcome> {
        info!(
            "Run {} starting: {}x{} grid, {} turns, {} workers",
            self.id,
            self.grid.width(),
            self.grid.height(),
            self.total_turns,
            self.assignments.len()
        );

        let result = match self.initialize_workers().await {
            Ok(()) => self.turn_loop().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!("Run {} failed at turn {}: {}", self.id, self.turn, e);
            if !self.workers_stopped {
                let _ = round::broadcast(&self.assignments, WorkerSignal::Quit).await;
            }
            return Err(e);
        }

        if !self.workers_stopped {
            if let Err(e) = round::broadcast(&self.assignments, WorkerSignal::Quit).await {
                warn!("Run {} could not stop every worker: {}", self.id, e);
            }
        }

        info!(
            "Run {} finished at turn {} with {} live cells",
            self.id,
            self.turn,
            self.live_cells.len()
        );
        Ok(RunOutcome {
            close_requested: self.control == RunControl::Closing,
            state: self.state(),
        })
    }

    async fn initialize_workers(&self) -> Result<()> {
        for assignment in &self.assignments {
            assignment
                .link
                .initialize(InitializeRequest {
                    segment: assignment.segment,
                    grid: self.grid.clone(),
                    total_turns: self.total_turns,
                })
                .await?;
            debug!(
                "Worker {} owns rows {}..{}",
                assignment.link.endpoint(),
                assignment.segment.top,
                assignment.segment.bottom
            );
        }
        Ok(())
    }

    async fn turn_loop(&mut self) -> Result<()> {
        let period = self.settings.report_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.turn < self.total_turns
            && matches!(self.control, RunControl::Running | RunControl::Paused)
        {
            let paused = self.control == RunControl::Paused;

            // Controls first, then telemetry, then the next round.
            tokio::select! {
                biased;
                Some(command) = self.commands.recv() => self.handle_command(command).await?,
                Some(failure) = self.telemetry.failure() => return Err(failure),
                _ = ticker.tick(), if !paused => {
                    self.telemetry.report(self.summary());
                }
                _ = std::future::ready(()), if !paused => self.barrier_round().await?,
                else => {
                    return Err(GolError::Internal {
                        message: "control channel closed while paused".into(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn barrier_round(&mut self) -> Result<()> {
        let started = Instant::now();
        let responses = round::fan_out(
            &self.assignments,
            &self.grid,
            self.turn,
            self.settings.round_timeout,
        )
        .await?;
        let (grid, live_cells) = round::merge(
            &self.assignments,
            responses,
            self.grid.width(),
            self.grid.height(),
            self.turn,
        )?;

        self.grid = grid;
        self.live_cells = live_cells;
        self.turn += 1;

        standard::ROUND_DURATION.observe(started.elapsed().as_secs_f64());
        standard::TURNS_COMPLETED.inc();
        standard::LIVE_CELLS.set(self.live_cells.len() as i64);
        self.status.send_replace(self.summary());
        Ok(())
    }

    async fn handle_command(&mut self, command: RunCommand) -> Result<()> {
        standard::CONTROL_SIGNALS.inc();

        let control = match command.control {
            Control::TogglePause if self.control == RunControl::Paused => Control::Resume,
            Control::TogglePause => Control::Pause,
            other => other,
        };
        info!("Run {} servicing {:?} at turn {}", self.id, control, self.turn);

        let reply = match control {
            Control::Save => ControlReply::State(self.state()),
            Control::Quit => {
                self.stop(RunControl::Halting, WorkerSignal::Quit).await?;
                ControlReply::Ack
            }
            Control::Close => {
                let state = self.state();
                self.stop(RunControl::Closing, WorkerSignal::Close).await?;
                ControlReply::State(state)
            }
            Control::Pause => {
                if self.control == RunControl::Running {
                    round::broadcast(&self.assignments, WorkerSignal::Pause).await?;
                    self.control = RunControl::Paused;
                }
                ControlReply::State(self.state())
            }
            Control::Resume | Control::TogglePause => {
                if self.control == RunControl::Paused {
                    round::broadcast(&self.assignments, WorkerSignal::Resume).await?;
                    self.control = RunControl::Running;
                }
                ControlReply::Ack
            }
        };

        if command.reply.send(reply).is_err() {
            debug!("Run {}: control reply dropped by caller", self.id);
        }
        Ok(())
    }

    async fn stop(&mut self, mode: RunControl, signal: WorkerSignal) -> Result<()> {
        self.control = mode;
        self.workers_stopped = true;
        round::broadcast(&self.assignments, signal).await
    }

    fn state(&self) -> TurnState {
        TurnState {
            turn: self.turn,
            live_cells: self.live_cells.clone(),
        }
    }

    fn summary(&self) -> TurnSummary {
        TurnSummary {
            turn: self.turn,
            live_cells: self.live_cells.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::NullClient;
    use crate::coordinator::partition::partition_rows;
    use crate::runtime::ShutdownSignal;
    use crate::worker::{WorkerConfig, WorkerService};

    fn run_with(grid: Grid, workers: usize, total_turns: u64) -> (Run, mpsc::Sender<RunCommand>) {
        let assignments = partition_rows(grid.height(), workers)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(idx, segment)| {
                let (service, _) = WorkerService::spawn(
                    format!("w{}", idx),
                    &WorkerConfig::default(),
                    ShutdownSignal::new(),
                );
                Assignment {
                    segment,
                    link: Arc::new(service),
                }
            })
            .collect();

        let (commands_tx, commands) = mpsc::channel(4);
        let (status, _) = watch::channel(TurnSummary { turn: 0, live_cells: 0 });
        let run = Run::new(
            Uuid::new_v4(),
            RunSettings {
                report_interval: Duration::from_secs(60),
                round_timeout: None,
            },
            assignments,
            grid,
            total_turns,
            commands,
            status,
            TelemetryReporter::spawn(Arc::new(NullClient)),
        );
        (run, commands_tx)
    }

    #[tokio::test]
    async fn test_zero_turns_returns_initial_state() {
        let grid = Grid::from_live_cells(4, 4, &[Cell::new(1, 1)]).unwrap();
        let (run, _commands) = run_with(grid, 2, 0);

        let outcome = run.execute().await.unwrap();
        assert_eq!(outcome.state.turn, 0);
        assert_eq!(outcome.state.live_cells, vec![Cell::new(1, 1)]);
        assert!(!outcome.close_requested);
    }

    #[tokio::test]
    async fn test_queued_close_is_serviced_before_first_round() {
        let grid = Grid::from_live_cells(4, 4, &[Cell::new(1, 1)]).unwrap();
        let (run, commands) = run_with(grid, 2, 100);

        let (reply, replied) = oneshot::channel();
        commands
            .send(RunCommand { control: Control::Close, reply })
            .await
            .unwrap();

        let outcome = run.execute().await.unwrap();
        assert!(outcome.close_requested);
        assert_eq!(outcome.state.turn, 0);
        assert_eq!(replied.await.unwrap(), ControlReply::State(outcome.state));
    }
}
