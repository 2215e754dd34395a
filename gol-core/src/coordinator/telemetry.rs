//! Live cell telemetry
//!
//! Reports are delivered by a separate task so a slow client never holds up
//! the turn loop. At most one report waits behind the one in flight; later
//! ticks are skipped rather than queued.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ClientLink;
use crate::error::GolError;
use crate::grid::TurnSummary;
use crate::metrics::standard;
use crate::protocol::LiveCellReport;

pub struct TelemetryReporter {
    reports: mpsc::Sender<LiveCellReport>,
    failures: mpsc::Receiver<GolError>,
    task: JoinHandle<()>,
}

impl TelemetryReporter {
    /// Start delivering reports to `client`
    pub fn spawn(client: Arc<dyn ClientLink>) -> Self {
        let (reports, mut pending) = mpsc::channel::<LiveCellReport>(1);
        let (failed, failures) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            while let Some(report) = pending.recv().await {
                match client.report_live_cells(report).await {
                    Ok(()) => standard::LIVE_CELL_REPORTS.inc(),
                    Err(e) => {
                        warn!("Live cell report for turn {} failed: {}", report.turn, e);
                        let _ = failed.send(e).await;
                        break;
                    }
                }
            }
        });

        Self { reports, failures, task }
    }

    /// Queue a report. Returns false if it was skipped.
    pub fn report(&self, summary: TurnSummary) -> bool {
        let report = LiveCellReport {
            turn: summary.turn,
            live_cells: summary.live_cells,
        };
        match self.reports.try_send(report) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Client busy, skipping report for turn {}", summary.turn);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Resolves with the delivery error once a report fails
    pub async fn failure(&mut self) -> Option<GolError> {
        self.failures.recv().await
    }
}

impl Drop for TelemetryReporter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
