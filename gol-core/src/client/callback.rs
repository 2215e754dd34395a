//! Live cell report delivery
//!
//! Coordinator-side [`RemoteClient`] dials the address a client supplied at
//! `StartRun`; [`serve_callbacks`] is the matching endpoint on the client.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::ClientLink;
use crate::error::{GolError, Result};
use crate::protocol::{self, ClientRequest, ClientResponse, LiveCellReport, RpcConnection};
use crate::runtime::ShutdownSignal;

/// Client reached over TCP
pub struct RemoteClient {
    connection: RpcConnection,
}

impl RemoteClient {
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let connection = RpcConnection::connect(address, timeout).await?;
        info!("Opened callback channel to client at {}", address);
        Ok(Self { connection })
    }
}

#[async_trait]
impl ClientLink for RemoteClient {
    async fn report_live_cells(&self, report: LiveCellReport) -> Result<()> {
        match self.connection.call(&ClientRequest::LiveCellReport(report)).await? {
            ClientResponse::Ack => Ok(()),
            ClientResponse::Error { message } => Err(GolError::Remote {
                endpoint: self.connection.endpoint().to_string(),
                message,
            }),
        }
    }
}

/// In-process client forwarding reports into a channel
#[derive(Clone)]
pub struct ChannelClient {
    sender: mpsc::UnboundedSender<LiveCellReport>,
}

impl ChannelClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LiveCellReport>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ClientLink for ChannelClient {
    async fn report_live_cells(&self, report: LiveCellReport) -> Result<()> {
        self.sender.send(report).map_err(|_| GolError::ConnectionClosed {
            endpoint: "client channel".into(),
        })
    }
}

/// Client that discards reports, for runs started without a callback address
pub struct NullClient;

#[async_trait]
impl ClientLink for NullClient {
    async fn report_live_cells(&self, report: LiveCellReport) -> Result<()> {
        debug!("Dropping report for turn {}", report.turn);
        Ok(())
    }
}

/// Accept live cell reports on `listener`, forwarding them to `reports`
pub async fn serve_callbacks(
    listener: TcpListener,
    reports: mpsc::UnboundedSender<LiveCellReport>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    protocol::serve(
        listener,
        move |request: ClientRequest| {
            let reports = reports.clone();
            async move {
                match request {
                    ClientRequest::LiveCellReport(report) => match reports.send(report) {
                        Ok(()) => ClientResponse::Ack,
                        Err(_) => ClientResponse::Error {
                            message: "report consumer gone".into(),
                        },
                    },
                }
            }
        },
        shutdown,
    )
    .await
}
