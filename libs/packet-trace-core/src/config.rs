//! Subsystem configuration

use std::path::{Path, PathBuf};

use crate::error::TraceError;

/// Size of the port domain a filter can express
pub const MAX_PORTS: usize = 1024;

/// Per-client inbound buffer size, and therefore the longest accepted line
pub const READ_BUFFER_SIZE: usize = 1024;

/// Backlog of the rendezvous socket
pub const LISTEN_BACKLOG: u32 = 5;

/// Directory the rendezvous socket is created in
pub const DEFAULT_RUNTIME_DIR: &str = "/var/run";

const SOCKET_PREFIX: &str = "ivs-packet-trace";

/// Configuration of the packet trace subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Instance name, part of the rendezvous address
    pub name: String,
    pub runtime_dir: PathBuf,
    pub max_ports: usize,
    pub read_buffer_size: usize,
    pub listen_backlog: u32,
}

impl TraceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime_dir: PathBuf::from(DEFAULT_RUNTIME_DIR),
            max_ports: MAX_PORTS,
            read_buffer_size: READ_BUFFER_SIZE,
            listen_backlog: LISTEN_BACKLOG,
        }
    }

    pub fn with_runtime_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.runtime_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_ports(mut self, max_ports: usize) -> Self {
        self.max_ports = max_ports;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn with_listen_backlog(mut self, backlog: u32) -> Self {
        self.listen_backlog = backlog;
        self
    }

    /// `<runtime_dir>/ivs-packet-trace.<name>.sock`
    pub fn rendezvous_path(&self) -> PathBuf {
        self.runtime_dir
            .join(format!("{}.{}.sock", SOCKET_PREFIX, self.name))
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        if self.name.is_empty() {
            return Err(TraceError::InvalidConfig {
                reason: "name must not be empty",
            });
        }
        if self.name.contains('/') {
            return Err(TraceError::InvalidConfig {
                reason: "name must not contain '/'",
            });
        }
        if self.max_ports == 0 {
            return Err(TraceError::InvalidConfig {
                reason: "max_ports must be positive",
            });
        }
        if self.read_buffer_size == 0 {
            return Err(TraceError::InvalidConfig {
                reason: "read_buffer_size must be positive",
            });
        }
        Ok(())
    }
}
