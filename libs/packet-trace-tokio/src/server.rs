//! Packet trace service running on Tokio

use std::path::Path;

use log::info;
use packet_trace_core::{
    ClientId, PacketTraceServer, PortNumber, SocketId, TraceConfig, TraceCycle, TraceError,
};
use tokio::sync::mpsc;

use crate::network::{UnixTraceListener, UnixTraceStream};
use crate::reactor::{ReactorEvent, TokioReactor};

/// Default depth of the reactor event queue
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub trace: TraceConfig,
    /// How many readiness events may wait for the dispatcher
    pub event_channel_capacity: usize,
}

impl ServiceConfig {
    pub fn new(trace: TraceConfig) -> Self {
        Self {
            trace,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

/// Packet trace server wired to a Tokio reactor
///
/// The service is driven by calling [`dispatch`](Self::dispatch) from a
/// single task. Trace cycles run on the same task, between dispatches.
pub struct PacketTraceService {
    server: PacketTraceServer<UnixTraceListener, TokioReactor>,
    events: mpsc::Receiver<ReactorEvent>,
}

impl PacketTraceService {
    /// Bind the rendezvous socket and start watching it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: ServiceConfig) -> Result<Self, TraceError> {
        if config.event_channel_capacity == 0 {
            return Err(TraceError::InvalidConfig {
                reason: "event channel capacity must be non-zero",
            });
        }
        let (reactor, events) = TokioReactor::new(config.event_channel_capacity);
        let server = PacketTraceServer::start(config.trace, reactor)?;
        Ok(Self { server, events })
    }

    /// Wait for the next readiness event and handle it
    ///
    /// Returns false once the reactor has stopped. Cancel safe: dropping
    /// the future before it completes loses no event.
    pub async fn dispatch(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.server.handle_event(event.event);
                event.ack();
                true
            }
            None => false,
        }
    }

    /// Dispatch events until the reactor stops
    pub async fn run(&mut self) {
        while self.dispatch().await {}
    }

    /// Start tracing a packet received on `in_port`
    pub fn begin(&mut self, in_port: PortNumber) -> TraceCycle<'_, UnixTraceStream> {
        self.server.begin(in_port)
    }

    pub fn client_fds(&self) -> Vec<SocketId> {
        self.server.client_fds()
    }

    pub fn client_count(&self) -> usize {
        self.server.client_count()
    }

    pub fn subscriber_count(&self, port: PortNumber) -> usize {
        self.server.subscriber_count(port)
    }

    pub fn is_subscribed(&self, id: ClientId, port: PortNumber) -> bool {
        self.server.is_subscribed(id, port)
    }

    pub fn rendezvous_path(&self) -> &Path {
        self.server.rendezvous_path()
    }

    pub fn config(&self) -> &TraceConfig {
        self.server.config()
    }

    /// Disconnect all clients and remove the rendezvous socket
    pub fn shutdown(mut self) {
        self.server.shutdown();
        info!("Packet trace service stopped");
    }
}
