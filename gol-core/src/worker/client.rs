//! Coordinator-side handles to workers
//!
//! [`WorkerLink`] is the seam between the coordinator and a worker. It is
//! implemented by [`RemoteWorker`] for workers in other processes and by the
//! in-process [`WorkerService`](super::WorkerService).

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{GolError, Result};
use crate::protocol::{
    AdvanceTurnRequest, AdvanceTurnResponse, InitializeRequest, RpcConnection, SignalReply,
    WorkerRequest, WorkerResponse, WorkerSignal,
};

/// Request/response channel to one worker
#[async_trait]
pub trait WorkerLink: Send + Sync {
    /// Address or name used in logs and errors
    fn endpoint(&self) -> &str;

    /// Send a raw request
    async fn call(&self, request: WorkerRequest) -> Result<WorkerResponse>;

    async fn initialize(&self, request: InitializeRequest) -> Result<()> {
        match self.call(WorkerRequest::Initialize(request)).await? {
            WorkerResponse::Ack => Ok(()),
            other => Err(unexpected(self.endpoint(), other)),
        }
    }

    async fn advance_turn(&self, request: AdvanceTurnRequest) -> Result<AdvanceTurnResponse> {
        match self.call(WorkerRequest::AdvanceTurn(request)).await? {
            WorkerResponse::Turn(response) => Ok(response),
            other => Err(unexpected(self.endpoint(), other)),
        }
    }

    async fn signal(&self, signal: WorkerSignal) -> Result<SignalReply> {
        match self.call(WorkerRequest::Signal(signal)).await? {
            WorkerResponse::Signal(reply) => Ok(reply),
            other => Err(unexpected(self.endpoint(), other)),
        }
    }
}

fn unexpected(endpoint: &str, response: WorkerResponse) -> GolError {
    match response {
        WorkerResponse::Error { message } => GolError::Remote {
            endpoint: endpoint.to_string(),
            message,
        },
        other => GolError::InvalidMessage {
            reason: format!("unexpected response from {}: {:?}", endpoint, other),
        },
    }
}

/// Worker reached over TCP
pub struct RemoteWorker {
    connection: RpcConnection,
}

impl RemoteWorker {
    /// Dial a worker process
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let connection = RpcConnection::connect(address, timeout).await?;
        info!("Connected to worker at {}", address);
        Ok(Self { connection })
    }
}

#[async_trait]
impl WorkerLink for RemoteWorker {
    fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }

    async fn call(&self, request: WorkerRequest) -> Result<WorkerResponse> {
        self.connection.call(&request).await
    }
}
