//! Worker control loop
//!
//! A single task owns the [`SegmentWorker`] and processes turn requests and
//! control signals one at a time, in arrival order.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::WorkerLink;
use super::state::{SegmentWorker, WorkerPhase};
use crate::error::{GolError, Result};
use crate::protocol::{self, WorkerRequest, WorkerResponse};
use crate::runtime::ShutdownSignal;

/// Configuration for a worker process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Depth of the control loop's request queue
    pub command_buffer: usize,
    /// Time given to in-flight replies after close before the process exits
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command_buffer: 16,
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

struct WorkerCommand {
    request: WorkerRequest,
    reply: oneshot::Sender<Result<WorkerResponse>>,
}

/// Handle to a running worker control loop
#[derive(Clone)]
pub struct WorkerService {
    name: String,
    commands: mpsc::Sender<WorkerCommand>,
}

impl WorkerService {
    /// Start the control loop. `shutdown` fires once the worker is closed.
    pub fn spawn(
        name: impl Into<String>,
        config: &WorkerConfig,
        shutdown: ShutdownSignal,
    ) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(config.command_buffer.max(1));
        let name = name.into();
        let handle = tokio::spawn(control_loop(name.clone(), receiver, shutdown));
        (Self { name, commands }, handle)
    }

    /// Submit a request to the control loop and wait for its outcome
    pub async fn submit(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(WorkerCommand { request, reply })
            .await
            .map_err(|_| GolError::WorkerClosed)?;
        response.await.map_err(|_| GolError::WorkerClosed)?
    }

    /// Answer coordinator connections on `listener` until `shutdown` fires
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<()> {
        protocol::serve(
            listener,
            move |request: WorkerRequest| {
                let service = self.clone();
                async move {
                    service
                        .submit(request)
                        .await
                        .unwrap_or_else(|e| WorkerResponse::Error { message: e.to_string() })
                }
            },
            shutdown,
        )
        .await
    }
}

#[async_trait]
impl WorkerLink for WorkerService {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn call(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        self.submit(request).await
    }
}

async fn control_loop(
    name: String,
    mut commands: mpsc::Receiver<WorkerCommand>,
    shutdown: ShutdownSignal,
) {
    let mut worker = SegmentWorker::new();

    while let Some(command) = commands.recv().await {
        let result = dispatch(&mut worker, command.request);
        match result {
            Err(ref e) if e.is_precondition() => debug!("Worker {} rejected request: {}", name, e),
            Err(ref e) => warn!("Worker {} failed request: {}", name, e),
            Ok(_) => {}
        }
        let closing = worker.phase() == WorkerPhase::Closing;
        if closing {
            info!("Worker {} closing", name);
            shutdown.shutdown();
        }
        let _ = command.reply.send(result);
        if closing {
            break;
        }
    }
}

fn dispatch(worker: &mut SegmentWorker, request: WorkerRequest) -> Result<WorkerResponse> {
    match request {
        WorkerRequest::Initialize(request) => worker.initialize(request).map(|_| WorkerResponse::Ack),
        WorkerRequest::AdvanceTurn(request) => worker.advance_turn(request).map(WorkerResponse::Turn),
        WorkerRequest::Signal(signal) => worker.signal(signal).map(WorkerResponse::Signal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::partition::Segment;
    use crate::grid::Grid;
    use crate::protocol::{AdvanceTurnRequest, InitializeRequest, WorkerSignal};

    #[tokio::test]
    async fn test_close_fires_shutdown() {
        let shutdown = ShutdownSignal::new();
        let (service, handle) = WorkerService::spawn("w0", &WorkerConfig::default(), shutdown.clone());

        service.signal(WorkerSignal::Close).await.unwrap();
        handle.await.unwrap();
        assert!(shutdown.is_shutdown());

        let err = service.signal(WorkerSignal::Quit).await.unwrap_err();
        assert!(matches!(err, GolError::WorkerClosed));
    }

    #[tokio::test]
    async fn test_requests_are_serialized() {
        let (service, _handle) =
            WorkerService::spawn("w0", &WorkerConfig::default(), ShutdownSignal::new());
        let grid = Grid::new(4, 4);

        service
            .initialize(InitializeRequest {
                segment: Segment::new(0, 4),
                grid,
                total_turns: 3,
            })
            .await
            .unwrap();

        service.signal(WorkerSignal::Pause).await.unwrap();
        let err = service
            .advance_turn(AdvanceTurnRequest {
                top: vec![false; 4],
                bottom: vec![false; 4],
                turn: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GolError::WorkerPaused { .. }));
    }
}
