//! In-memory stand-ins for sockets and the reactor

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::error::{NetworkError, ReactorError};
use crate::traits::{ClientId, Reactor, SocketId, Target, TraceListener, TraceStream};

enum ReadStep {
    Data(Vec<u8>),
    Error(io::ErrorKind),
    Eof,
}

#[derive(Default)]
struct StreamState {
    inbound: VecDeque<ReadStep>,
    written: Vec<u8>,
    fail_writes: bool,
    max_write: Option<usize>,
    zero_writes: bool,
    socket_error: Option<io::ErrorKind>,
}

/// Scriptable stream; clones share state so tests can inspect it after one
/// copy has been handed to the code under test
#[derive(Clone)]
pub struct MockStream {
    socket_id: SocketId,
    state: Rc<RefCell<StreamState>>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::with_socket_id(10)
    }

    pub fn with_socket_id(socket_id: SocketId) -> Self {
        Self {
            socket_id,
            state: Rc::new(RefCell::new(StreamState::default())),
        }
    }

    pub fn push_inbound(&self, data: &[u8]) {
        self.state
            .borrow_mut()
            .inbound
            .push_back(ReadStep::Data(data.to_vec()));
    }

    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().inbound.push_back(ReadStep::Error(kind));
    }

    pub fn close_inbound(&self) {
        self.state.borrow_mut().inbound.push_back(ReadStep::Eof);
    }

    pub fn fail_writes(&self) {
        self.state.borrow_mut().fail_writes = true;
    }

    pub fn limit_writes(&self, max_write: usize) {
        self.state.borrow_mut().max_write = Some(max_write);
    }

    pub fn zero_writes(&self) {
        self.state.borrow_mut().zero_writes = true;
    }

    pub fn set_socket_error(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().socket_error = Some(kind);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().written).into_owned()
    }
}

impl TraceStream for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        let mut state = self.state.borrow_mut();
        match state.inbound.pop_front() {
            None => Err(NetworkError::WouldBlock),
            Some(ReadStep::Eof) => Ok(0),
            Some(ReadStep::Error(kind)) => Err(NetworkError::from(io::Error::from(kind))),
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.inbound.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, NetworkError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(NetworkError::from(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        if state.zero_writes {
            return Ok(0);
        }
        let n = state.max_write.map_or(buf.len(), |max| max.min(buf.len()));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn take_error(&mut self) -> Result<Option<io::Error>, NetworkError> {
        Ok(self.state.borrow_mut().socket_error.take().map(io::Error::from))
    }

    fn socket_id(&self) -> SocketId {
        self.socket_id
    }
}

#[derive(Default)]
struct ListenerState {
    pending: VecDeque<Result<MockStream, io::ErrorKind>>,
}

/// Listener whose pending connections are queued by the test
#[derive(Clone, Default)]
pub struct MockListener {
    state: Rc<RefCell<ListenerState>>,
}

impl MockListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connection(&self, stream: MockStream) {
        self.state.borrow_mut().pending.push_back(Ok(stream));
    }

    pub fn push_accept_error(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().pending.push_back(Err(kind));
    }
}

impl TraceListener for MockListener {
    type Stream = MockStream;

    fn bind(_path: &Path, _backlog: u32) -> Result<Self, NetworkError> {
        Ok(Self::new())
    }

    fn accept(&mut self) -> Result<Self::Stream, NetworkError> {
        match self.state.borrow_mut().pending.pop_front() {
            None => Err(NetworkError::WouldBlock),
            Some(Ok(stream)) => Ok(stream),
            Some(Err(kind)) => Err(NetworkError::from(io::Error::from(kind))),
        }
    }

    fn socket_id(&self) -> SocketId {
        3
    }
}

#[derive(Default)]
struct ReactorState {
    registered: Vec<Target>,
    refuse_clients: bool,
}

/// Reactor that only records registrations
#[derive(Clone, Default)]
pub struct MockReactor {
    state: Rc<RefCell<ReactorState>>,
}

impl MockReactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_clients(&self) {
        self.state.borrow_mut().refuse_clients = true;
    }

    pub fn registered(&self) -> Vec<Target> {
        self.state.borrow().registered.clone()
    }
}

impl Reactor<MockListener> for MockReactor {
    fn register_listener(&mut self, _listener: &mut MockListener) -> Result<(), ReactorError> {
        self.state.borrow_mut().registered.push(Target::Listener);
        Ok(())
    }

    fn register_client(&mut self, id: ClientId, _stream: &MockStream) -> Result<(), ReactorError> {
        let mut state = self.state.borrow_mut();
        if state.refuse_clients {
            return Err(ReactorError::Shutdown);
        }
        state.registered.push(Target::Client(id));
        Ok(())
    }

    fn unregister(&mut self, target: Target) {
        self.state.borrow_mut().registered.retain(|t| *t != target);
    }
}
