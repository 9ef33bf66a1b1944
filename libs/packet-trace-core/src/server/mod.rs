//! Packet trace server
//!
//! Ties the listener, the client registry and the trace session together
//! and dispatches reactor events to them. Everything here runs on the
//! dispatcher: no locking is needed because nothing is shared across
//! threads.

use std::path::Path;

use log::{debug, error, info};

use crate::config::TraceConfig;
use crate::error::TraceError;
use crate::port_filter::PortNumber;
use crate::session::{ClientSession, DisconnectReason, SessionStatus};
use crate::trace::{TraceCycle, TraceSession};
use crate::traits::{ClientId, Reactor, Readiness, ReadinessEvent, SocketId, Target, TraceListener};

pub mod listener;
pub mod registry;

pub use listener::Listener;
pub use registry::{ClientIdGenerator, ClientRegistry};

pub struct PacketTraceServer<L: TraceListener, R: Reactor<L>> {
    config: TraceConfig,
    listener: Listener<L>,
    reactor: R,
    registry: ClientRegistry<L::Stream>,
    trace: TraceSession,
}

impl<L: TraceListener, R: Reactor<L>> PacketTraceServer<L, R> {
    /// Bind the rendezvous socket and start accepting clients
    pub fn start(config: TraceConfig, mut reactor: R) -> Result<Self, TraceError> {
        let listener = Listener::start(&config, &mut reactor)?;
        Ok(Self::from_parts(config, listener, reactor))
    }

    /// Start with a listener that is already bound
    pub fn with_listener(config: TraceConfig, listener: L, mut reactor: R) -> Result<Self, TraceError> {
        config.validate()?;
        let listener = Listener::with_listener(listener, config.rendezvous_path(), &mut reactor)?;
        Ok(Self::from_parts(config, listener, reactor))
    }

    fn from_parts(config: TraceConfig, listener: Listener<L>, reactor: R) -> Self {
        Self {
            config,
            listener,
            reactor,
            registry: ClientRegistry::new(),
            trace: TraceSession::new(),
        }
    }

    /// Dispatch one readiness notification
    pub fn handle_event(&mut self, event: ReadinessEvent) {
        match event.target {
            Target::Listener => self.on_listener_ready(),
            Target::Client(id) => self.on_client_ready(id, event.readiness),
        }
    }

    fn on_listener_ready(&mut self) {
        if let Some(stream) = self.listener.accept() {
            self.add_client(stream);
        }
    }

    fn add_client(&mut self, stream: L::Stream) {
        let id = self.registry.next_id();
        if let Err(e) = self.reactor.register_client(id, &stream) {
            error!("Failed to register packet trace client socket: {}", e);
            return;
        }

        let session = ClientSession::new(id, stream, self.config.max_ports, self.config.read_buffer_size);
        let fd = session.socket_id();
        if self.registry.insert(session).is_err() {
            error!("Packet trace client {} already registered", id);
            self.reactor.unregister(Target::Client(id));
            return;
        }
        info!("New packet trace client {} (fd {})", id, fd);
    }

    fn on_client_ready(&mut self, id: ClientId, readiness: Readiness) {
        let Some(session) = self.registry.get_mut(id) else {
            debug!("Readiness for unknown packet trace client {}", id);
            return;
        };
        if let SessionStatus::Disconnect(reason) = session.on_ready(readiness) {
            self.disconnect(id, reason);
        }
    }

    fn disconnect(&mut self, id: ClientId, reason: DisconnectReason) {
        self.reactor.unregister(Target::Client(id));
        if self.registry.remove(id).is_some() {
            info!("Packet trace client {} disconnected: {}", id, reason);
        }
    }

    /// Start tracing a packet received on `in_port`
    pub fn begin(&mut self, in_port: PortNumber) -> TraceCycle<'_, L::Stream> {
        TraceCycle::begin(&mut self.trace, &mut self.registry, in_port)
    }

    /// Raw trace session and registry, for callers that cannot hold a
    /// [`TraceCycle`] across their call path
    pub fn trace_parts(&mut self) -> (&mut TraceSession, &mut ClientRegistry<L::Stream>) {
        (&mut self.trace, &mut self.registry)
    }

    /// File descriptors of all connected clients, in connection order
    pub fn client_fds(&self) -> Vec<SocketId> {
        self.registry.socket_ids()
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscriber_count(&self, port: PortNumber) -> usize {
        self.registry.subscriber_count(port)
    }

    pub fn is_subscribed(&self, id: ClientId, port: PortNumber) -> bool {
        self.registry.get(id).is_some_and(|s| s.is_subscribed(port))
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.registry.iter().map(|s| s.id()).collect()
    }

    pub fn rendezvous_path(&self) -> &Path {
        self.listener.path()
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Disconnect every client and stop watching the listener
    pub fn shutdown(&mut self) {
        for id in self.client_ids() {
            self.reactor.unregister(Target::Client(id));
            self.registry.remove(id);
        }
        self.reactor.unregister(Target::Listener);
        info!("Packet trace on {} shut down", self.listener.path().display());
    }
}
