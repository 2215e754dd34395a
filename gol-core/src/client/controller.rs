//! Controller client for the coordinator
//!
//! Thin RPC wrapper used by the client process (and operator tooling) to
//! register workers, start runs and relay keypresses.

use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GolError, Result};
use crate::grid::{TurnState, TurnSummary};
use crate::protocol::{
    Control, ControlReply, CoordinatorRequest, CoordinatorResponse, RpcConnection,
    StartRunRequest,
};

/// Client for a coordinator at a fixed address
pub struct ControllerClient {
    endpoint: String,
    timeout: Duration,
    /// Shared by the short calls; `start_run` dials its own connection
    control: RpcConnection,
}

impl ControllerClient {
    /// Connect to the coordinator
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        let control = RpcConnection::connect(endpoint, timeout).await?;
        info!("Connected to coordinator at {}", endpoint);
        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout,
            control,
        })
    }

    /// Ask the coordinator to dial and pool a worker
    pub async fn register_worker(&self, address: &str) -> Result<u32> {
        let request = CoordinatorRequest::RegisterWorker {
            address: address.to_string(),
        };
        match self.control.call(&request).await? {
            CoordinatorResponse::Registered { worker_id } => Ok(worker_id),
            other => Err(self.unexpected(other)),
        }
    }

    /// Run a simulation to completion and return its final state.
    ///
    /// Blocks for the whole run, so it uses a dedicated connection and
    /// keypresses can still be sent through this client meanwhile.
    pub async fn start_run(&self, request: StartRunRequest) -> Result<TurnState> {
        let connection = RpcConnection::connect(&self.endpoint, self.timeout).await?;
        debug!("Starting run {} for {} turns", request.run_id, request.total_turns);

        match connection.call(&CoordinatorRequest::StartRun(request)).await? {
            CoordinatorResponse::RunFinished(state) => Ok(state),
            other => Err(self.unexpected(other)),
        }
    }

    /// Relay a control to an active run
    pub async fn control(&self, run_id: Uuid, control: Control) -> Result<ControlReply> {
        match self
            .control
            .call(&CoordinatorRequest::KeyPress { run_id, control })
            .await?
        {
            CoordinatorResponse::Control(reply) => Ok(reply),
            other => Err(self.unexpected(other)),
        }
    }

    /// Relay a single-character keypress (`s`, `q`, `k`, `p`)
    pub async fn key_press(&self, run_id: Uuid, key: char) -> Result<ControlReply> {
        let control = Control::from_key(key).ok_or_else(|| GolError::InvalidMessage {
            reason: format!("unknown key {:?}", key),
        })?;
        self.control(run_id, control).await
    }

    /// Current turn and live cell count of an active run
    pub async fn run_status(&self, run_id: Uuid) -> Result<TurnSummary> {
        match self.control.call(&CoordinatorRequest::RunStatus { run_id }).await? {
            CoordinatorResponse::Status(summary) => Ok(summary),
            other => Err(self.unexpected(other)),
        }
    }

    fn unexpected(&self, response: CoordinatorResponse) -> GolError {
        match response {
            CoordinatorResponse::Error { message } => GolError::Remote {
                endpoint: self.endpoint.clone(),
                message,
            },
            other => GolError::InvalidMessage {
                reason: format!("unexpected response from {}: {:?}", self.endpoint, other),
            },
        }
    }
}
