//! Tokio-backed reactor
//!
//! Every registered socket gets a watcher task that waits for readiness and
//! forwards a tagged [`ReadinessEvent`] to the dispatcher. A watcher waits
//! for its event to be acknowledged before polling again, so each target has
//! at most one event in flight and the dispatcher sees them in order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use packet_trace_core::{
    ClientId, Reactor, ReactorError, Readiness, ReadinessEvent, Target,
};
use tokio::io::{Interest, Ready};
use tokio::net::{UnixListener, UnixStream};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::network::{AcceptResult, UnixTraceListener, UnixTraceStream};

/// Pause after a failed accept before trying again
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A readiness event waiting to be handled by the dispatcher
#[derive(Debug)]
pub struct ReactorEvent {
    pub event: ReadinessEvent,
    ack: oneshot::Sender<()>,
}

impl ReactorEvent {
    /// Let the watcher poll its socket again
    pub fn ack(self) {
        let _ = self.ack.send(());
    }
}

pub struct TokioReactor {
    events_tx: mpsc::Sender<ReactorEvent>,
    watchers: HashMap<Target, JoinHandle<()>>,
}

impl TokioReactor {
    /// Create a reactor and the receiving end of its event queue
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReactorEvent>) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let reactor = Self {
            events_tx,
            watchers: HashMap::new(),
        };
        (reactor, events_rx)
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    fn spawn<F>(&mut self, target: Target, task: F) -> Result<(), ReactorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.watchers.contains_key(&target) {
            return Err(ReactorError::AlreadyRegistered);
        }
        if self.events_tx.is_closed() {
            return Err(ReactorError::Shutdown);
        }
        let handle = Handle::try_current().map_err(|_| ReactorError::Shutdown)?;
        self.watchers.insert(target, handle.spawn(task));
        Ok(())
    }
}

impl Reactor<UnixTraceListener> for TokioReactor {
    fn register_listener(&mut self, listener: &mut UnixTraceListener) -> Result<(), ReactorError> {
        if self.watchers.contains_key(&Target::Listener) {
            return Err(ReactorError::AlreadyRegistered);
        }
        let (socket, accepted) = listener.take_acceptor().ok_or(ReactorError::InvalidSource {
            reason: "listener socket already handed out",
        })?;
        let events = self.events_tx.clone();
        self.spawn(Target::Listener, watch_listener(socket, accepted, events))
    }

    fn register_client(&mut self, id: ClientId, stream: &UnixTraceStream) -> Result<(), ReactorError> {
        let events = self.events_tx.clone();
        self.spawn(Target::Client(id), watch_client(id, stream.shared(), events))
    }

    fn unregister(&mut self, target: Target) {
        if let Some(handle) = self.watchers.remove(&target) {
            handle.abort();
            debug!("Stopped watching {:?}", target);
        }
    }
}

impl Drop for TokioReactor {
    fn drop(&mut self) {
        for (_, handle) in self.watchers.drain() {
            handle.abort();
        }
    }
}

/// Send `event` and wait until the dispatcher is done with it
///
/// Returns false once the dispatcher has gone away.
async fn deliver(events: &mpsc::Sender<ReactorEvent>, event: ReadinessEvent) -> bool {
    let (ack, done) = oneshot::channel();
    if events.send(ReactorEvent { event, ack }).await.is_err() {
        return false;
    }
    let _ = done.await;
    true
}

async fn watch_listener(
    socket: UnixListener,
    accepted: mpsc::UnboundedSender<AcceptResult>,
    events: mpsc::Sender<ReactorEvent>,
) {
    let socket = &socket;
    accept_loop(
        move || async move { socket.accept().await.map(|(stream, _)| stream) },
        accepted,
        events,
    )
    .await;
}

/// Queue every accept result and raise a listener event for it, backing off
/// after a failure
async fn accept_loop<F, Fut>(
    mut accept: F,
    accepted: mpsc::UnboundedSender<AcceptResult>,
    events: mpsc::Sender<ReactorEvent>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = AcceptResult>,
{
    loop {
        let result = accept().await;
        let failed = result.is_err();
        if accepted.send(result).is_err() {
            break;
        }
        if !deliver(&events, ReadinessEvent::new(Target::Listener, Readiness::readable())).await {
            break;
        }
        if failed {
            tokio::time::sleep(ACCEPT_BACKOFF).await;
        }
    }
    trace!("Listener watcher exiting");
}

async fn watch_client(id: ClientId, stream: Arc<UnixStream>, events: mpsc::Sender<ReactorEvent>) {
    loop {
        let ready = match stream.ready(Interest::READABLE | Interest::ERROR).await {
            Ok(ready) => ready,
            Err(e) => {
                error!("Failed to poll packet trace client {}: {}", id, e);
                deliver(&events, ReadinessEvent::new(Target::Client(id), Readiness::error())).await;
                break;
            }
        };
        if !deliver(&events, ReadinessEvent::new(Target::Client(id), to_readiness(ready))).await {
            break;
        }
    }
    trace!("Watcher for client {} exiting", id);
}

fn to_readiness(ready: Ready) -> Readiness {
    Readiness {
        read_ready: ready.is_readable() || ready.is_read_closed(),
        write_ready: ready.is_writable(),
        error_seen: ready.is_error(),
    }
}
