use std::path::Path;

use crate::error::{NetworkError, ReactorError};

/// Identifier of an OS-level socket (a raw file descriptor on Unix)
pub type SocketId = i32;

/// Stable identifier of an accepted client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub u64);

impl core::fmt::Display for ClientId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connected stream to a debug client
///
/// All operations are non-blocking from the caller's point of view: an
/// implementation that cannot make progress returns
/// [`NetworkError::WouldBlock`]. Dropping the stream closes the connection.
pub trait TraceStream {
    /// Read available bytes into `buf`, returning 0 once the peer has
    /// shut down its write side
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError>;

    /// Write a prefix of `buf`, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, NetworkError>;

    /// Fetch and clear the pending socket error, if any
    fn take_error(&mut self) -> Result<Option<std::io::Error>, NetworkError>;

    /// OS-level identifier used for fd enumeration and logging
    fn socket_id(&self) -> SocketId;
}

/// Rendezvous socket that produces [`TraceStream`]s
pub trait TraceListener: Sized {
    /// The stream type produced by this listener
    type Stream: TraceStream;

    /// Create, bind and start listening on `path`
    fn bind(path: &Path, backlog: u32) -> Result<Self, NetworkError>;

    /// Accept one pending connection
    ///
    /// Returns [`NetworkError::WouldBlock`] when nothing is pending.
    fn accept(&mut self) -> Result<Self::Stream, NetworkError>;

    /// OS-level identifier of the listening socket
    fn socket_id(&self) -> SocketId;
}

/// Which registration a readiness event belongs to
///
/// Plays the role of the opaque cookie handed to the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Listener,
    Client(ClientId),
}

/// Readiness flags delivered with an event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub read_ready: bool,
    pub write_ready: bool,
    pub error_seen: bool,
}

impl Readiness {
    pub const fn readable() -> Self {
        Self {
            read_ready: true,
            write_ready: false,
            error_seen: false,
        }
    }

    pub const fn error() -> Self {
        Self {
            read_ready: false,
            write_ready: false,
            error_seen: true,
        }
    }
}

/// A tagged readiness notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessEvent {
    pub target: Target,
    pub readiness: Readiness,
}

impl ReadinessEvent {
    pub const fn new(target: Target, readiness: Readiness) -> Self {
        Self { target, readiness }
    }
}

/// Event-loop facility that watches sockets on behalf of the server
///
/// Implementations deliver [`ReadinessEvent`]s to the dispatcher, which
/// hands them to [`crate::server::PacketTraceServer::handle_event`]. Events
/// for one target must be delivered in order, one at a time.
pub trait Reactor<L: TraceListener> {
    /// Start watching the rendezvous socket
    fn register_listener(&mut self, listener: &mut L) -> Result<(), ReactorError>;

    /// Start watching a freshly accepted client connection
    fn register_client(&mut self, id: ClientId, stream: &L::Stream) -> Result<(), ReactorError>;

    /// Stop delivering events for `target`
    fn unregister(&mut self, target: Target);
}
