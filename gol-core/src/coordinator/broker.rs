//! Coordinator
//!
//! Owns the worker pool and every active run. Client requests arrive through
//! [`Coordinator::handle`]; each `StartRun` executes on the connection that
//! issued it while keypresses for the run are routed to its control queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::partition::partition_rows;
use super::pool::{Lease, WorkerInfo, WorkerPool};
use super::round::Assignment;
use super::run::{Run, RunCommand, RunSettings};
use super::telemetry::TelemetryReporter;
use crate::client::{ClientLink, NullClient, RemoteClient};
use crate::error::{GolError, Result};
use crate::grid::{Grid, TurnState, TurnSummary};
use crate::metrics::standard;
use crate::protocol::{
    self, Control, ControlReply, CoordinatorRequest, CoordinatorResponse, StartRunRequest,
    WorkerSignal,
};
use crate::runtime::ShutdownSignal;
use crate::worker::{RemoteWorker, WorkerLink};

/// Configuration for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Period of live cell reports to the client
    pub report_interval: Duration,
    /// Longest a barrier round may wait for its slowest worker; `None` waits forever
    pub round_timeout: Option<Duration>,
    /// Dial timeout for workers and client callbacks
    pub connect_timeout: Duration,
    /// Controls that may queue for a run before senders wait
    pub command_buffer: usize,
    /// Time given to in-flight replies after close before the process exits
    pub shutdown_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(crate::DEFAULT_REPORT_INTERVAL_SECS),
            round_timeout: None,
            connect_timeout: Duration::from_secs(5),
            command_buffer: 8,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: Uuid,
    pub grid: Grid,
    pub total_turns: u64,
    pub worker_count: usize,
}

struct RunHandle {
    commands: mpsc::Sender<RunCommand>,
    status: watch::Receiver<TurnSummary>,
}

/// Main coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    pool: WorkerPool,
    runs: Mutex<HashMap<Uuid, RunHandle>>,
    shutdown: ShutdownSignal,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            config,
            pool: WorkerPool::new(),
            runs: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Fires once a client closes the system
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Dial a worker process and add it to the pool
    pub async fn register_worker(&self, address: &str) -> Result<u32> {
        let worker = RemoteWorker::connect(address, self.config.connect_timeout).await?;
        Ok(self.register_link(Arc::new(worker)).await)
    }

    /// Add an already connected worker to the pool
    pub async fn register_link(&self, link: Arc<dyn WorkerLink>) -> u32 {
        self.pool.register(link).await
    }

    /// Registered workers and their status
    pub async fn workers(&self) -> Vec<WorkerInfo> {
        self.pool.workers().await
    }

    /// Ids of the runs currently executing
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.runs.lock().keys().copied().collect()
    }

    /// Execute a run to completion and return its final state.
    ///
    /// Live cell reports go to `client` every report interval. The leased
    /// workers return to the pool afterwards unless the run was closed. After
    /// a fatal error each worker is stopped again and dropped from the pool
    /// if it does not answer.
    pub async fn start_run(
        &self,
        request: RunRequest,
        client: Arc<dyn ClientLink>,
    ) -> Result<TurnState> {
        if self.shutdown.is_shutdown() {
            return Err(GolError::ShutdownInProgress);
        }
        let run_id = request.run_id;
        let segments = partition_rows(request.grid.height(), request.worker_count)?;
        let lease = self.pool.acquire(request.worker_count).await?;

        let (commands, command_queue) = mpsc::channel(self.config.command_buffer.max(1));
        let (status_tx, status) = watch::channel(TurnSummary {
            turn: 0,
            live_cells: request.grid.live_count(),
        });

        let registered = {
            let mut runs = self.runs.lock();
            if runs.contains_key(&run_id) {
                false
            } else {
                runs.insert(run_id, RunHandle { commands, status });
                true
            }
        };
        if !registered {
            self.pool.release(lease, false).await;
            return Err(GolError::RunAlreadyActive { run_id });
        }

        info!(
            "Run {} leased workers {:?} for a {}x{} grid",
            run_id,
            lease.worker_ids(),
            request.grid.width(),
            request.grid.height()
        );
        standard::ACTIVE_RUNS.add(1);

        let assignments = segments
            .into_iter()
            .zip(lease.links())
            .map(|(segment, link)| Assignment { segment, link })
            .collect();
        let settings = RunSettings {
            report_interval: self.config.report_interval,
            round_timeout: self.config.round_timeout,
        };
        let run = Run::new(
            run_id,
            settings,
            assignments,
            request.grid,
            request.total_turns,
            command_queue,
            status_tx,
            TelemetryReporter::spawn(client),
        );
        let result = run.execute().await;

        self.runs.lock().remove(&run_id);
        standard::ACTIVE_RUNS.add(-1);

        match result {
            Ok(ref outcome) if outcome.close_requested => {
                self.pool.release(lease, true).await;
                info!("Run {} closed the system", run_id);
                self.shutdown.shutdown();
            }
            Err(ref e) if e.is_fatal_to_run() => {
                let unresponsive = self.verify_workers(&lease).await;
                self.pool.release_retiring(lease, &unresponsive).await;
                for worker_id in unresponsive {
                    if let Err(e) = self.pool.deregister(worker_id).await {
                        warn!("Could not drop worker {}: {}", worker_id, e);
                    }
                }
            }
            _ => self.pool.release(lease, false).await,
        }

        result.map(|outcome| outcome.state)
    }

    /// Stop every leased worker again after a failed run.
    ///
    /// Returns the ids of workers that did not acknowledge within the
    /// connect timeout; they must not be leased again.
    async fn verify_workers(&self, lease: &Lease) -> Vec<u32> {
        let timeout = self.config.connect_timeout;
        let checks: Vec<_> = lease
            .worker_ids()
            .into_iter()
            .zip(lease.links())
            .map(|(worker_id, link)| {
                let check = tokio::spawn(async move {
                    tokio::time::timeout(timeout, link.signal(WorkerSignal::Quit)).await
                });
                (worker_id, check)
            })
            .collect();

        let mut unresponsive = Vec::new();
        for (worker_id, check) in checks {
            match check.await {
                Ok(Ok(Ok(_))) => debug!("Worker {} verified", worker_id),
                Ok(Ok(Err(e))) => {
                    warn!("Worker {} failed verification: {}", worker_id, e);
                    unresponsive.push(worker_id);
                }
                Ok(Err(_)) => {
                    warn!("Worker {} did not answer within {:?}", worker_id, timeout);
                    unresponsive.push(worker_id);
                }
                Err(e) => {
                    warn!("Verification of worker {} aborted: {}", worker_id, e);
                    unresponsive.push(worker_id);
                }
            }
        }
        unresponsive
    }

    /// Deliver a control to an active run and wait for its reply
    pub async fn control(&self, run_id: Uuid, control: Control) -> Result<ControlReply> {
        let commands = self
            .runs
            .lock()
            .get(&run_id)
            .map(|handle| handle.commands.clone())
            .ok_or(GolError::RunNotFound { run_id })?;

        let (reply, response) = oneshot::channel();
        commands
            .send(RunCommand { control, reply })
            .await
            .map_err(|_| GolError::RunNotFound { run_id })?;
        // The run may finish with the command still queued.
        response.await.map_err(|_| GolError::RunNotFound { run_id })
    }

    /// Latest completed turn of an active run
    pub fn run_status(&self, run_id: Uuid) -> Result<TurnSummary> {
        self.runs
            .lock()
            .get(&run_id)
            .map(|handle| *handle.status.borrow())
            .ok_or(GolError::RunNotFound { run_id })
    }

    /// Answer one client request
    pub async fn handle(&self, request: CoordinatorRequest) -> CoordinatorResponse {
        let result = match request {
            CoordinatorRequest::RegisterWorker { address } => self
                .register_worker(&address)
                .await
                .map(|worker_id| CoordinatorResponse::Registered { worker_id }),
            CoordinatorRequest::StartRun(request) => self
                .handle_start_run(request)
                .await
                .map(CoordinatorResponse::RunFinished),
            CoordinatorRequest::KeyPress { run_id, control } => self
                .control(run_id, control)
                .await
                .map(CoordinatorResponse::Control),
            CoordinatorRequest::RunStatus { run_id } => {
                self.run_status(run_id).map(CoordinatorResponse::Status)
            }
        };

        result.unwrap_or_else(|e| {
            warn!("Request failed: {}", e);
            CoordinatorResponse::Error { message: e.to_string() }
        })
    }

    async fn handle_start_run(&self, request: StartRunRequest) -> Result<TurnState> {
        let client: Arc<dyn ClientLink> = match request.client_address.as_deref() {
            Some(address) => {
                Arc::new(RemoteClient::connect(address, self.config.connect_timeout).await?)
            }
            None => {
                debug!("Run {} has no callback address", request.run_id);
                Arc::new(NullClient)
            }
        };

        self.start_run(
            RunRequest {
                run_id: request.run_id,
                grid: request.grid,
                total_turns: request.total_turns,
                worker_count: request.worker_count,
            },
            client,
        )
        .await
    }

    /// Answer client connections on `listener` until the system is closed
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let shutdown = self.shutdown.clone();
        protocol::serve(
            listener,
            move |request: CoordinatorRequest| {
                let coordinator = self.clone();
                async move { coordinator.handle(request).await }
            },
            shutdown,
        )
        .await
    }
}
