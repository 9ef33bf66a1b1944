//! Rendezvous socket management

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info, trace, warn};

use crate::config::TraceConfig;
use crate::error::{NetworkError, TraceError};
use crate::traits::{Reactor, TraceListener};

pub struct Listener<L: TraceListener> {
    inner: L,
    path: PathBuf,
}

impl<L: TraceListener> Listener<L> {
    /// Bind the rendezvous socket derived from `config` and register it
    ///
    /// Any stale file at the rendezvous path is removed first.
    pub fn start<R: Reactor<L>>(config: &TraceConfig, reactor: &mut R) -> Result<Self, TraceError> {
        config.validate()?;
        let path = config.rendezvous_path();
        remove_stale_socket(&path);

        let inner = L::bind(&path, config.listen_backlog)?;
        Self::with_listener(inner, path, reactor)
    }

    /// Register an already bound listener
    pub fn with_listener<R: Reactor<L>>(
        mut inner: L,
        path: PathBuf,
        reactor: &mut R,
    ) -> Result<Self, TraceError> {
        reactor.register_listener(&mut inner)?;
        info!("Packet trace listening on {}", path.display());
        Ok(Self { inner, path })
    }

    /// Accept one pending connection
    ///
    /// Failures are logged and leave the listener running.
    pub fn accept(&mut self) -> Option<L::Stream> {
        trace!("Accepting packet trace client");
        match self.inner.accept() {
            Ok(stream) => Some(stream),
            Err(NetworkError::WouldBlock) => None,
            Err(e) => {
                error!("Failed to accept on packet trace socket: {}", e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn remove_stale_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed stale socket {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove stale socket {}: {}", path.display(), e),
    }
}
