//! Client session: one debug client connection and its subscriptions

use log::{debug, error, trace, warn};

use crate::command::{self, CommandError};
use crate::port_filter::{PortFilter, PortNumber};
use crate::traits::{ClientId, Readiness, SocketId, TraceStream};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer shut down its write side
    PeerClosed,
    /// The reactor reported an error on the socket
    SocketError(String),
    /// A line filled the whole inbound buffer without a newline
    LineTooLong,
}

impl core::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed connection"),
            DisconnectReason::SocketError(error) => write!(f, "socket error: {}", error),
            DisconnectReason::LineTooLong => write!(f, "line too long"),
        }
    }
}

/// Result of handling a readiness notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Disconnect(DisconnectReason),
}

/// Fixed-capacity inbound buffer with a write offset
#[derive(Debug)]
pub struct LineBuffer {
    data: Box<[u8]>,
    offset: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            offset: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub fn is_full(&self) -> bool {
        self.offset == self.data.len()
    }

    /// Unfilled tail of the buffer
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..]
    }

    pub fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.data.len());
    }

    /// Hand every complete line to `f`, then move the trailing partial line
    /// to the front. Returns the number of complete lines found.
    pub fn drain_lines<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let mut start = 0;
        let mut lines = 0;
        while let Some(pos) = self.data[start..self.offset].iter().position(|&b| b == b'\n') {
            f(&self.data[start..start + pos]);
            start += pos + 1;
            lines += 1;
        }

        if start > 0 {
            self.data.copy_within(start..self.offset, 0);
            self.offset -= start;
        }
        lines
    }
}

/// A connected debug client
pub struct ClientSession<S: TraceStream> {
    id: ClientId,
    stream: S,
    inbound: LineBuffer,
    filter: PortFilter,
}

impl<S: TraceStream> ClientSession<S> {
    pub fn new(id: ClientId, stream: S, max_ports: usize, read_buffer_size: usize) -> Self {
        Self {
            id,
            stream,
            inbound: LineBuffer::new(read_buffer_size),
            filter: PortFilter::new(max_ports),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn socket_id(&self) -> SocketId {
        self.stream.socket_id()
    }

    pub fn filter(&self) -> &PortFilter {
        &self.filter
    }

    pub fn is_subscribed(&self, port: PortNumber) -> bool {
        self.filter.contains(port)
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Drive the protocol state machine for one readiness notification
    pub fn on_ready(&mut self, readiness: Readiness) -> SessionStatus {
        if readiness.error_seen {
            return self.on_error();
        }
        if readiness.read_ready {
            return self.on_readable();
        }
        SessionStatus::Open
    }

    fn on_error(&mut self) -> SessionStatus {
        let reason = match self.stream.take_error() {
            Ok(Some(e)) => e.to_string(),
            Ok(None) => "unknown error".to_string(),
            Err(e) => e.to_string(),
        };
        debug!("Error seen on packet trace client {}: {}", self.id, reason);
        SessionStatus::Disconnect(DisconnectReason::SocketError(reason))
    }

    fn on_readable(&mut self) -> SessionStatus {
        let n = match self.stream.read(self.inbound.spare_mut()) {
            Ok(0) => return SessionStatus::Disconnect(DisconnectReason::PeerClosed),
            Ok(n) => n,
            Err(e) if e.is_would_block() => {
                trace!("Spurious read readiness on client {}", self.id);
                return SessionStatus::Open;
            }
            Err(e) => {
                error!("Read failed on packet trace client {}: {}", self.id, e);
                return SessionStatus::Open;
            }
        };
        self.inbound.advance(n);
        trace!("Client {}: read {} bytes", self.id, n);

        let Self {
            id,
            stream,
            inbound,
            filter,
        } = self;
        let lines = inbound.drain_lines(|line| {
            if let Some(reply) = command::process_line(line, filter) {
                debug!("Client {}: rejected command: {}", id, reply);
                send_reply(stream, reply);
            }
        });

        if lines == 0 && inbound.is_full() {
            warn!("Disconnecting packet trace client {} due to too-long line", id);
            return SessionStatus::Disconnect(DisconnectReason::LineTooLong);
        }
        SessionStatus::Open
    }
}

/// Single best-effort write of an error reply; failures are ignored
fn send_reply<S: TraceStream>(stream: &mut S, reply: CommandError) {
    let _ = stream.write(reply.reply().as_bytes());
}
