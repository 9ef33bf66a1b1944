//! Tokio networking implementation

use std::fs;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use packet_trace_core::{NetworkError, SocketId, TraceListener, TraceStream};
use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

pub(crate) type AcceptResult = io::Result<UnixStream>;

/// Tokio Unix stream wrapper
///
/// Reads and writes never wait: they map to `try_read`/`try_write` and
/// report [`NetworkError::WouldBlock`] when the socket is not ready. The
/// underlying stream is shared with the reactor task watching it.
#[derive(Debug)]
pub struct UnixTraceStream {
    inner: Arc<UnixStream>,
    fd: SocketId,
}

impl UnixTraceStream {
    pub fn from_unix_stream(stream: UnixStream) -> Self {
        let fd = stream.as_raw_fd();
        Self {
            inner: Arc::new(stream),
            fd,
        }
    }

    pub fn inner(&self) -> &UnixStream {
        &self.inner
    }

    pub(crate) fn shared(&self) -> Arc<UnixStream> {
        Arc::clone(&self.inner)
    }
}

impl TraceStream for UnixTraceStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        self.inner.try_read(buf).map_err(NetworkError::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, NetworkError> {
        self.inner.try_write(buf).map_err(NetworkError::from)
    }

    fn take_error(&mut self) -> Result<Option<io::Error>, NetworkError> {
        self.inner.take_error().map_err(NetworkError::from)
    }

    fn socket_id(&self) -> SocketId {
        self.fd
    }
}

/// Tokio Unix listener wrapper
///
/// Tokio listeners only offer an async `accept`, so the reactor runs the
/// accept loop and queues connections here; [`TraceListener::accept`]
/// drains that queue. Once the accepting task is gone, `accept` reports
/// [`NetworkError::ConnectionClosed`]. Dropping the listener removes the
/// socket file.
pub struct UnixTraceListener {
    acceptor: Option<(UnixListener, mpsc::UnboundedSender<AcceptResult>)>,
    accepted_rx: mpsc::UnboundedReceiver<AcceptResult>,
    path: PathBuf,
    fd: SocketId,
}

impl UnixTraceListener {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the socket, and the queue feeding [`TraceListener::accept`], to
    /// the task that will accept on it
    pub(crate) fn take_acceptor(
        &mut self,
    ) -> Option<(UnixListener, mpsc::UnboundedSender<AcceptResult>)> {
        self.acceptor.take()
    }
}

impl TraceListener for UnixTraceListener {
    type Stream = UnixTraceStream;

    /// Must be called from within a Tokio runtime
    fn bind(path: &Path, backlog: u32) -> Result<Self, NetworkError> {
        let bind_error = |source| NetworkError::Bind {
            path: path.to_path_buf(),
            source,
        };

        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(bind_error)?;
        let addr = SockAddr::unix(path).map_err(bind_error)?;
        socket.bind(&addr).map_err(bind_error)?;
        socket
            .listen(backlog.min(i32::MAX as u32) as i32)
            .map_err(|source| NetworkError::Listen {
                path: path.to_path_buf(),
                source,
            })?;
        socket.set_nonblocking(true)?;

        let std_listener = std::os::unix::net::UnixListener::from(OwnedFd::from(socket));
        let fd = std_listener.as_raw_fd();
        let listener = UnixListener::from_std(std_listener)?;
        debug!("Bound {} (fd {}, backlog {})", path.display(), fd, backlog);

        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Ok(Self {
            acceptor: Some((listener, accepted_tx)),
            accepted_rx,
            path: path.to_path_buf(),
            fd,
        })
    }

    fn accept(&mut self) -> Result<Self::Stream, NetworkError> {
        match self.accepted_rx.try_recv() {
            Ok(Ok(stream)) => Ok(UnixTraceStream::from_unix_stream(stream)),
            Ok(Err(e)) => Err(NetworkError::Io(e)),
            Err(TryRecvError::Empty) => Err(NetworkError::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(NetworkError::ConnectionClosed),
        }
    }

    fn socket_id(&self) -> SocketId {
        self.fd
    }
}

impl Drop for UnixTraceListener {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove socket {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_creates_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bind.sock");

        let listener = UnixTraceListener::bind(&path, 5).unwrap();
        assert!(path.exists());
        assert!(listener.socket_id() > 0);
        assert_eq!(listener.path(), path.as_path());

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_bind_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("bind.sock");

        match UnixTraceListener::bind(&path, 5) {
            Err(NetworkError::Bind { path: failed, .. }) => assert_eq!(failed, path),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("bind should fail"),
        }
    }

    #[tokio::test]
    async fn test_accept_without_connections() {
        let dir = tempfile::tempdir().unwrap();
        let mut listener = UnixTraceListener::bind(&dir.path().join("idle.sock"), 5).unwrap();
        assert!(listener.accept().unwrap_err().is_would_block());
    }

    #[tokio::test]
    async fn test_accept_after_acceptor_gone() {
        let dir = tempfile::tempdir().unwrap();
        let mut listener = UnixTraceListener::bind(&dir.path().join("gone.sock"), 5).unwrap();

        let (socket, accepted) = listener.take_acceptor().unwrap();
        assert!(listener.take_acceptor().is_none());
        let (stream, _peer) = UnixStream::pair().unwrap();
        accepted.send(Ok(stream)).unwrap();
        drop(accepted);
        drop(socket);

        assert!(listener.accept().is_ok());
        assert!(matches!(listener.accept(), Err(NetworkError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_stream_io() {
        let (local, mut remote) = UnixStream::pair().unwrap();
        let mut stream = UnixTraceStream::from_unix_stream(local);
        let mut buf = [0u8; 16];

        assert!(stream.read(&mut buf).unwrap_err().is_would_block());

        remote.write_all(b"add all\n").await.unwrap();
        stream.inner().readable().await.unwrap();
        assert_eq!(stream.read(&mut buf).unwrap(), 8);
        assert_eq!(&buf[..8], b"add all\n");

        stream.inner().writable().await.unwrap();
        assert_eq!(stream.write(b"ok\n").unwrap(), 3);
        let mut reply = [0u8; 3];
        remote.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ok\n");

        assert!(stream.take_error().unwrap().is_none());
        assert_eq!(stream.socket_id(), stream.inner().as_raw_fd());
    }
}
