//! Per-packet trace session
//!
//! The forwarding pipeline brackets each traced packet with
//! `begin(in_port)` ... `end()`, recording text with `emit` in between.
//! `begin` decides up front whether any client wants this packet so the
//! pipeline can skip formatting work entirely when nobody is listening.

use core::fmt::{self, Write as _};

use bytes::{BufMut, BytesMut};
use log::warn;

use crate::broadcast::{broadcast, BroadcastReport};
use crate::port_filter::PortNumber;
use crate::server::registry::ClientRegistry;
use crate::traits::TraceStream;

/// Delimiter written at the start of every packet's trace text
pub const SEPARATOR: &str = "--------------------------------------------------------------";

const INITIAL_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Idle,
    Open,
}

/// Trace state of the packet currently moving through the pipeline
///
/// There is one per server. Cycles must not interleave: a `begin` while a
/// cycle is already open discards the open cycle and logs a warning.
#[derive(Debug)]
pub struct TraceSession {
    in_port: PortNumber,
    enabled: bool,
    buffer: BytesMut,
    state: CycleState,
}

impl TraceSession {
    pub fn new() -> Self {
        Self {
            in_port: 0,
            enabled: false,
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            state: CycleState::Idle,
        }
    }

    /// Start a cycle for a packet received on `in_port`
    ///
    /// Returns whether any registered client subscribes to `in_port`.
    pub fn begin<S: TraceStream>(&mut self, registry: &ClientRegistry<S>, in_port: PortNumber) -> bool {
        if self.state == CycleState::Open {
            warn!(
                "Packet trace cycle for port {} restarted before end",
                self.in_port
            );
        }
        self.state = CycleState::Open;
        self.in_port = in_port;
        self.enabled = registry.any_subscribed(in_port);

        self.buffer.clear();
        self.buffer.put_slice(SEPARATOR.as_bytes());
        self.buffer.put_u8(b'\n');
        self.enabled
    }

    /// Append `text` and a newline
    pub fn emit(&mut self, text: &str) {
        self.buffer.put_slice(text.as_bytes());
        self.buffer.put_u8(b'\n');
    }

    /// Append formatted text and a newline
    pub fn emit_fmt(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a BytesMut cannot fail.
        let _ = self.buffer.write_fmt(args);
        self.buffer.put_u8(b'\n');
    }

    /// Finish the cycle, sending the buffer to every subscribed client
    pub fn end<S: TraceStream>(&mut self, registry: &mut ClientRegistry<S>) -> BroadcastReport {
        self.state = CycleState::Idle;
        if !self.enabled {
            return BroadcastReport::default();
        }
        self.enabled = false;

        let payload = self.buffer.split().freeze();
        broadcast(registry, self.in_port, &payload)
    }

    /// Whether the open cycle has at least one subscriber
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn in_port(&self) -> PortNumber {
        self.in_port
    }

    pub fn is_open(&self) -> bool {
        self.state == CycleState::Open
    }

    /// Text accumulated so far in this cycle
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// An open trace cycle
///
/// Borrows the trace session and the client registry for the lifetime of
/// the cycle, so a second cycle cannot start until this one is over.
/// Dropping the guard ends the cycle.
pub struct TraceCycle<'a, S: TraceStream> {
    session: &'a mut TraceSession,
    registry: &'a mut ClientRegistry<S>,
    finished: bool,
}

impl<'a, S: TraceStream> TraceCycle<'a, S> {
    pub fn begin(
        session: &'a mut TraceSession,
        registry: &'a mut ClientRegistry<S>,
        in_port: PortNumber,
    ) -> Self {
        session.begin(registry, in_port);
        Self {
            session,
            registry,
            finished: false,
        }
    }

    /// Cheap check callers use to skip formatting when nobody listens
    pub fn enabled(&self) -> bool {
        self.session.enabled()
    }

    pub fn in_port(&self) -> PortNumber {
        self.session.in_port()
    }

    pub fn emit(&mut self, text: &str) {
        self.session.emit(text);
    }

    pub fn emit_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.session.emit_fmt(args);
    }

    pub fn end(mut self) -> BroadcastReport {
        self.finish()
    }

    fn finish(&mut self) -> BroadcastReport {
        self.finished = true;
        self.session.end(self.registry)
    }
}

impl<S: TraceStream> Drop for TraceCycle<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}

/// Emit formatted trace text into a [`TraceCycle`] or [`TraceSession`]
///
/// ```ignore
/// trace_emit!(cycle, "ingress port {} vlan {}", port, vlan);
/// ```
#[macro_export]
macro_rules! trace_emit {
    ($cycle:expr, $($arg:tt)*) => {
        $cycle.emit_fmt(::core::format_args!($($arg)*))
    };
}
