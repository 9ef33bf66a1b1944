use std::io;
use std::path::PathBuf;

/// Socket-level failure
#[derive(Debug)]
pub enum NetworkError {
    /// The operation would block; retry on the next readiness notification
    WouldBlock,

    /// The peer or the local end is gone
    ConnectionClosed,

    /// Failed to create or bind the rendezvous socket
    Bind { path: PathBuf, source: io::Error },

    /// Failed to start listening on the rendezvous socket
    Listen { path: PathBuf, source: io::Error },

    /// Any other I/O error
    Io(io::Error),
}

impl NetworkError {
    pub fn is_would_block(&self) -> bool {
        matches!(self, NetworkError::WouldBlock)
    }
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NetworkError::WouldBlock => write!(f, "Operation would block"),
            NetworkError::ConnectionClosed => write!(f, "Connection closed"),
            NetworkError::Bind { path, source } => {
                write!(f, "Failed to bind {}: {}", path.display(), source)
            }
            NetworkError::Listen { path, source } => {
                write!(f, "Failed to listen on {}: {}", path.display(), source)
            }
            NetworkError::Io(error) => write!(f, "I/O error: {}", error),
        }
    }
}

impl core::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            NetworkError::Bind { source, .. } | NetworkError::Listen { source, .. } => Some(source),
            NetworkError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock => NetworkError::WouldBlock,
            _ => NetworkError::Io(error),
        }
    }
}

/// Failure to (un)register a socket with the reactor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactorError {
    /// The target is already being watched
    AlreadyRegistered,

    /// The reactor's event loop is no longer running
    Shutdown,

    /// The source handed to the reactor cannot be watched
    InvalidSource { reason: &'static str },
}

impl core::fmt::Display for ReactorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReactorError::AlreadyRegistered => write!(f, "Target already registered"),
            ReactorError::Shutdown => write!(f, "Reactor is shut down"),
            ReactorError::InvalidSource { reason } => write!(f, "Invalid source: {}", reason),
        }
    }
}

impl core::error::Error for ReactorError {}

/// Top-level error of the packet trace subsystem
#[derive(Debug)]
pub enum TraceError {
    Network(NetworkError),

    Reactor(ReactorError),

    InvalidConfig { reason: &'static str },

    PortOutOfRange { port: u32, max_ports: usize },
}

impl core::fmt::Display for TraceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TraceError::Network(error) => write!(f, "Network error: {}", error),
            TraceError::Reactor(error) => write!(f, "Reactor error: {}", error),
            TraceError::InvalidConfig { reason } => write!(f, "Invalid configuration: {}", reason),
            TraceError::PortOutOfRange { port, max_ports } => {
                write!(f, "Port {} out of range (max: {})", port, max_ports)
            }
        }
    }
}

impl core::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            TraceError::Network(error) => Some(error),
            TraceError::Reactor(error) => Some(error),
            _ => None,
        }
    }
}

impl From<NetworkError> for TraceError {
    fn from(error: NetworkError) -> Self {
        TraceError::Network(error)
    }
}

impl From<ReactorError> for TraceError {
    fn from(error: ReactorError) -> Self {
        TraceError::Reactor(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_conversion() {
        let error = NetworkError::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(error.is_would_block());

        let error = NetworkError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(error, NetworkError::Io(_)));
    }

    #[test]
    fn test_display() {
        let error = TraceError::PortOutOfRange {
            port: 9999,
            max_ports: 1024,
        };
        assert_eq!(error.to_string(), "Port 9999 out of range (max: 1024)");

        let error = TraceError::from(ReactorError::Shutdown);
        assert_eq!(error.to_string(), "Reactor error: Reactor is shut down");
    }
}
