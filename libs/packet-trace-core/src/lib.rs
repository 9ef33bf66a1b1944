//! # packet-trace-core
//!
//! Runtime-agnostic core of the packet trace fan-out service.
//!
//! Debug clients connect to a per-instance Unix socket and subscribe to
//! ingress ports with a small line protocol (`add port N`, `add all`). The
//! forwarding pipeline brackets each packet with `begin(in_port)` and
//! `end()`, emitting trace text in between; at `end` the text is written to
//! every client subscribed to that port.
//!
//! This crate holds the protocol, the client registry and the trace
//! session. Sockets and the event loop are abstracted behind
//! [`TraceListener`], [`TraceStream`] and [`Reactor`] so any runtime can
//! drive the [`PacketTraceServer`].
//!
//! ## Limitations
//!
//! - Subscriptions are additive, there is no `remove`
//! - No backpressure: slow clients lose output
//! - Single-threaded dispatch only

pub mod broadcast;
pub mod command;
pub mod config;
pub mod error;
pub mod port_filter;
pub mod server;
pub mod session;
pub mod trace;
pub mod traits;

#[cfg(test)]
mod test_utils;

pub use broadcast::{BroadcastReport, WriteOutcome};
pub use command::{Command, CommandError};
pub use config::TraceConfig;
pub use error::{NetworkError, ReactorError, TraceError};
pub use port_filter::{PortFilter, PortNumber};
pub use server::PacketTraceServer;
pub use trace::{TraceCycle, TraceSession, SEPARATOR};
pub use traits::{
    ClientId, Reactor, Readiness, ReadinessEvent, SocketId, Target, TraceListener, TraceStream,
};
