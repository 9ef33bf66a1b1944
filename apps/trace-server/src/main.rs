//! Packet trace daemon
//!
//! Starts the trace service and feeds it a synthetic packet stream so the
//! subsystem can be exercised by hand:
//!
//! ```text
//! trace-server --name demo --runtime-dir /tmp
//! echo "add port 1" | socat - UNIX-CONNECT:/tmp/ivs-packet-trace.demo.sock
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info};
use packet_trace_tokio::{trace_emit, PacketTraceService, PortNumber, ServiceConfig, TraceConfig};

#[derive(Debug, Parser)]
#[command(name = "trace-server", about = "Packet trace fan-out daemon")]
struct Args {
    /// Instance name, part of the socket path
    #[arg(long, default_value = "demo")]
    name: String,

    /// Directory holding the rendezvous socket
    #[arg(long, default_value = "/var/run")]
    runtime_dir: PathBuf,

    /// Number of ingress ports the synthetic pipeline rotates through
    #[arg(long, default_value_t = 4)]
    ports: PortNumber,

    /// Delay between synthetic packets
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
}

enum Step {
    Dispatched { running: bool },
    Tick,
    Interrupted,
}

struct SyntheticPipeline {
    ports: PortNumber,
    next_port: PortNumber,
    seq: u64,
}

impl SyntheticPipeline {
    fn new(ports: PortNumber) -> Self {
        Self {
            ports: ports.max(1),
            next_port: 0,
            seq: 0,
        }
    }

    /// Push one packet through the trace cycle
    fn forward(&mut self, service: &mut PacketTraceService) {
        let in_port = self.next_port;
        self.next_port = (self.next_port + 1) % self.ports;
        self.seq += 1;

        let mut cycle = service.begin(in_port);
        if cycle.enabled() {
            trace_emit!(cycle, "packet {} in_port={}", self.seq, in_port);
            trace_emit!(cycle, "eth_type=0x0800 len={}", 64 + self.seq % 1400);
            cycle.emit("action: flood");
        }
        let report = cycle.end();
        if !report.is_empty() {
            debug!(
                "Packet {} on port {}: {}/{} clients",
                self.seq, in_port, report.delivered, report.matched
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let trace = TraceConfig::new(args.name).with_runtime_dir(args.runtime_dir);
    let mut service = match PacketTraceService::start(ServiceConfig::new(trace)) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start packet trace: {}", e);
            return Err(e.into());
        }
    };
    info!("Clients connect to {}", service.rendezvous_path().display());

    let mut pipeline = SyntheticPipeline::new(args.ports);
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let step = tokio::select! {
            running = service.dispatch() => Step::Dispatched { running },
            _ = ticker.tick() => Step::Tick,
            _ = &mut shutdown => Step::Interrupted,
        };
        match step {
            Step::Dispatched { running: true } => {}
            Step::Dispatched { running: false } => break,
            Step::Tick => pipeline.forward(&mut service),
            Step::Interrupted => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    service.shutdown();
    Ok(())
}
