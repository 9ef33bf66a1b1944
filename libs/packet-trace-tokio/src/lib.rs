//! # packet-trace-tokio
//!
//! Tokio runtime support for the packet trace fan-out service.
//!
//! Binds the rendezvous Unix socket, watches it and every client with a
//! Tokio-backed reactor, and exposes a [`PacketTraceService`] that the
//! forwarding task drives.
//!
//! ## Example
//!
//! ```no_run
//! use packet_trace_tokio::{PacketTraceService, ServiceConfig, TraceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let trace = TraceConfig::new("switch0");
//!     let mut service = PacketTraceService::start(ServiceConfig::new(trace))?;
//!     service.run().await;
//!     Ok(())
//! }
//! ```

// Re-export core types for convenience
pub use packet_trace_core::{
    trace_emit, BroadcastReport, ClientId, PortNumber, SocketId, TraceConfig, TraceCycle,
    TraceError, SEPARATOR,
};

pub mod network;
pub mod reactor;
pub mod server;

pub use network::{UnixTraceListener, UnixTraceStream};
pub use reactor::{ReactorEvent, TokioReactor};
pub use server::{PacketTraceService, ServiceConfig};
