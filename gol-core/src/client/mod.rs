//! Client side of the protocol
//!
//! The coordinator pushes telemetry through a [`ClientLink`]; the controller
//! library drives runs and hosts the callback endpoint receiving it.

pub mod callback;
pub mod controller;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::LiveCellReport;

pub use callback::{serve_callbacks, ChannelClient, NullClient, RemoteClient};
pub use controller::ControllerClient;

/// Destination for a run's live cell reports
#[async_trait]
pub trait ClientLink: Send + Sync {
    async fn report_live_cells(&self, report: LiveCellReport) -> Result<()>;
}
