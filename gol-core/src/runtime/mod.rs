//! Process lifecycle helpers
//!
//! Shutdown signalling shared by the coordinator and worker servers.

pub mod shutdown;

pub use shutdown::ShutdownSignal;
