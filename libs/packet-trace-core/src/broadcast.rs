//! Best-effort fan-out of a finished trace buffer

use log::{debug, trace};

use crate::port_filter::PortNumber;
use crate::server::registry::ClientRegistry;
use crate::traits::{ClientId, TraceStream};

/// How a single client write loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Complete,
    /// The stream reported an error (including would-block)
    Failed { written: usize },
    /// The stream accepted zero bytes
    Stalled { written: usize },
}

/// Summary of one broadcast pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients whose filter matched
    pub matched: usize,
    /// Clients that accepted the whole buffer
    pub delivered: usize,
    /// Clients whose write loop was cut short
    pub truncated: Vec<ClientId>,
}

impl BroadcastReport {
    pub fn is_empty(&self) -> bool {
        self.matched == 0
    }
}

/// Write `buf` to `stream`, retrying partial writes until done or the
/// stream refuses more
pub fn write_best_effort<S: TraceStream>(stream: &mut S, buf: &[u8]) -> WriteOutcome {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => return WriteOutcome::Stalled { written },
            Ok(n) => written += n,
            Err(_) => return WriteOutcome::Failed { written },
        }
    }
    WriteOutcome::Complete
}

/// Send `payload` to every client subscribed to `in_port`
///
/// Failures only affect the failing client: it is neither retried nor
/// disconnected.
pub fn broadcast<S: TraceStream>(
    registry: &mut ClientRegistry<S>,
    in_port: PortNumber,
    payload: &[u8],
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for session in registry.subscribed_mut(in_port) {
        report.matched += 1;
        trace!(
            "Writing to client {} (fd {}, {} bytes)",
            session.id(),
            session.socket_id(),
            payload.len()
        );
        match write_best_effort(session.stream_mut(), payload) {
            WriteOutcome::Complete => report.delivered += 1,
            outcome => {
                debug!(
                    "Dropped trace output for client {}: {:?} of {} bytes",
                    session.id(),
                    outcome,
                    payload.len()
                );
                report.truncated.push(session.id());
            }
        }
    }
    report
}
