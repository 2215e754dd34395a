//! Request/response RPC over TCP
//!
//! One outstanding call per connection. Callers that need concurrent calls
//! to the same peer open separate connections.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::codec::{read_frame, write_frame};
use crate::error::{GolError, Result};
use crate::runtime::ShutdownSignal;

/// Client side of an RPC connection
///
/// A call takes the stream out of its slot and only puts it back after a
/// complete response. A call that fails or is cancelled mid-flight leaves
/// the slot empty, and the next call dials a fresh connection instead of
/// reading the abandoned reply.
pub struct RpcConnection {
    endpoint: String,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl RpcConnection {
    /// Dial `endpoint`, failing if it does not answer within `timeout`
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self> {
        let stream = dial(endpoint, timeout).await?;
        debug!("Connected to {}", endpoint);
        Ok(Self {
            endpoint: endpoint.to_string(),
            timeout,
            stream: Mutex::new(Some(stream)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one request and wait for its response
    pub async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut slot = self.stream.lock().await;
        let mut stream = match slot.take() {
            Some(stream) => stream,
            None => {
                debug!("Redialing {}", self.endpoint);
                dial(&self.endpoint, self.timeout).await?
            }
        };

        write_frame(&mut stream, request).await?;
        let response = read_frame(&mut stream)
            .await?
            .ok_or_else(|| GolError::ConnectionClosed {
                endpoint: self.endpoint.clone(),
            })?;
        *slot = Some(stream);
        Ok(response)
    }
}

async fn dial(endpoint: &str, timeout: Duration) -> Result<TcpStream> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| GolError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: format!("timed out after {:?}", timeout),
        })?
        .map_err(|e| GolError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Accept connections on `listener` and answer each request with `handler`
/// until `shutdown` fires.
pub async fn serve<Req, Resp, H, Fut>(
    listener: TcpListener,
    handler: H,
    shutdown: ShutdownSignal,
) -> Result<()>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + Sync + 'static,
    H: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Resp> + Send + 'static,
{
    info!("Serving on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("Listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                debug!("Accepted connection from {}", peer);

                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler).await {
                        warn!("Connection from {} failed: {}", peer, e);
                    }
                });
            }
        }
    }
}

async fn handle_connection<Req, Resp, H, Fut>(mut stream: TcpStream, handler: H) -> Result<()>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    H: Fn(Req) -> Fut,
    Fut: Future<Output = Resp>,
{
    stream.set_nodelay(true)?;
    while let Some(request) = read_frame::<_, Req>(&mut stream).await? {
        let response = handler(request).await;
        write_frame(&mut stream, &response).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientRequest, ClientResponse, LiveCellReport};

    #[tokio::test]
    async fn test_call_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let shutdown = ShutdownSignal::new();

        let server = tokio::spawn(serve(
            listener,
            |request: ClientRequest| async move {
                match request {
                    ClientRequest::LiveCellReport(report) if report.turn > 0 => ClientResponse::Ack,
                    ClientRequest::LiveCellReport(_) => ClientResponse::Error {
                        message: "turn zero".into(),
                    },
                }
            },
            shutdown.clone(),
        ));

        let conn = RpcConnection::connect(&addr, Duration::from_secs(1)).await.unwrap();
        let ok: ClientResponse = conn
            .call(&ClientRequest::LiveCellReport(LiveCellReport { turn: 1, live_cells: 5 }))
            .await
            .unwrap();
        assert!(matches!(ok, ClientResponse::Ack));

        let err: ClientResponse = conn
            .call(&ClientRequest::LiveCellReport(LiveCellReport { turn: 0, live_cells: 5 }))
            .await
            .unwrap();
        assert!(matches!(err, ClientResponse::Error { .. }));

        shutdown.shutdown();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = RpcConnection::connect(&addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(GolError::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_call_does_not_leak_its_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let shutdown = ShutdownSignal::new();

        // Turn 1 is answered late; every reply names the turn it answers.
        tokio::spawn(serve(
            listener,
            |request: ClientRequest| async move {
                let ClientRequest::LiveCellReport(report) = request;
                if report.turn == 1 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                ClientResponse::Error {
                    message: format!("turn {}", report.turn),
                }
            },
            shutdown.clone(),
        ));

        let conn = RpcConnection::connect(&addr, Duration::from_secs(1)).await.unwrap();
        let report = |turn| ClientRequest::LiveCellReport(LiveCellReport { turn, live_cells: 0 });

        let slow = tokio::time::timeout(
            Duration::from_millis(50),
            conn.call::<_, ClientResponse>(&report(1)),
        )
        .await;
        assert!(slow.is_err());

        for turn in 2..4 {
            match conn.call::<_, ClientResponse>(&report(turn)).await.unwrap() {
                ClientResponse::Error { message } => assert_eq!(message, format!("turn {}", turn)),
                other => panic!("Unexpected response: {:?}", other),
            }
        }
        shutdown.shutdown();
    }
}
