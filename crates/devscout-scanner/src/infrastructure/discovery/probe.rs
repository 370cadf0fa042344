//! Local-network probing backend boundary and the UDP announce prober.
//!
//! [`NetworkProber`] is the seam the
//! [`super::local_network::LocalNetworkSource`] consumes: an
//! attachment probe plus a stream of sweep updates.
//!
//! The shipped implementation, [`UdpAnnounceProber`], broadcasts an
//! announce datagram on the attached network and reports every host
//! that answers:
//!
//! 1. A UDP socket is bound to an ephemeral port with broadcast
//!    enabled and a short read timeout.
//! 2. For each sweep round, the announce payload is broadcast and the
//!    socket is drained until the round interval elapses. Every reply
//!    yields a [`ProbeUpdate::Host`]; a reply payload that is printable
//!    UTF-8 is taken as the responder's hostname.
//! 3. After each round the sweep progress is reported; after the last
//!    round the sweep completes.
//!
//! The receive loop runs as a blocking task on a dedicated thread so
//! synchronous socket I/O never stalls the Tokio runtime. The
//! 500 ms read timeout bounds how long the loop can go without
//! checking the `running` flag, which is what makes `stop_sweep`
//! responsive.
//!
//! Only the announce payload is fixed here; no further wire format is
//! defined. Hosts answer because they run a companion responder or any
//! service that echoes the probe.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Payload broadcast to solicit replies.
pub const ANNOUNCE_PAYLOAD: &[u8] = b"DEVSCOUT/1 ANNOUNCE";

/// How long a blocking `recv_from` may sit before the running flag is
/// re-checked.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// A host that answered a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply {
    pub address: IpAddr,
    /// Hardware address, when the backend can resolve one.
    pub hardware_address: Option<String>,
    /// Name the host reported, if any.
    pub hostname: Option<String>,
}

/// An update from a running sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeUpdate {
    Host(HostReply),
    /// Sweep progress in `[0, 1]`.
    Progress(f64),
    /// The sweep ran to completion.
    Complete,
    /// The sweep died mid-flight.
    Failed(String),
}

/// Error starting a sweep.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe socket could not be bound.
    #[error("failed to bind probe socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The socket could not be configured.
    #[error("failed to configure probe socket: {0}")]
    Configure(std::io::Error),
    /// The sweep thread could not be spawned.
    #[error("failed to spawn probe thread: {0}")]
    Spawn(std::io::Error),
}

/// The local-network probing backend.
pub trait NetworkProber: Send + Sync {
    /// Whether the machine currently has a usable local-network
    /// attachment.
    fn is_attached(&self) -> bool;

    /// Begins a sweep, returning the update stream.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] when the socket cannot be prepared or
    /// the sweep thread cannot start.
    fn start_sweep(&self) -> Result<mpsc::UnboundedReceiver<ProbeUpdate>, ProbeError>;

    /// Halts the sweep. Idempotent.
    fn stop_sweep(&self);
}

/// UDP broadcast announce prober.
pub struct UdpAnnounceProber {
    probe_port: u16,
    rounds: u32,
    round_interval: Duration,
    running: Arc<AtomicBool>,
}

impl UdpAnnounceProber {
    pub fn new(probe_port: u16, rounds: u32, round_interval: Duration) -> Self {
        Self {
            probe_port,
            rounds: rounds.max(1),
            round_interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl NetworkProber for UdpAnnounceProber {
    fn is_attached(&self) -> bool {
        local_ipv4().is_some()
    }

    fn start_sweep(&self) -> Result<mpsc::UnboundedReceiver<ProbeUpdate>, ProbeError> {
        let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, 0).into();
        let socket = UdpSocket::bind(bind_addr).map_err(|source| ProbeError::BindFailed {
            addr: bind_addr,
            source,
        })?;
        socket.set_broadcast(true).map_err(ProbeError::Configure)?;
        socket
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(ProbeError::Configure)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let destination: SocketAddr = (Ipv4Addr::BROADCAST, self.probe_port).into();
        let rounds = self.rounds;
        let round_interval = self.round_interval;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::SeqCst);

        std::thread::Builder::new()
            .name("devscout-probe".to_string())
            .spawn(move || {
                sweep_loop(socket, destination, rounds, round_interval, tx, running);
            })
            .map_err(ProbeError::Spawn)?;

        info!("announce sweep started towards {destination}");
        Ok(rx)
    }

    fn stop_sweep(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// The blocking sweep loop executed on the probe thread.
fn sweep_loop(
    socket: UdpSocket,
    destination: SocketAddr,
    rounds: u32,
    round_interval: Duration,
    tx: mpsc::UnboundedSender<ProbeUpdate>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; 1024];
    let mut completed = true;

    'sweep: for round in 0..rounds {
        if !running.load(Ordering::Relaxed) {
            completed = false;
            break;
        }

        if let Err(e) = socket.send_to(ANNOUNCE_PAYLOAD, destination) {
            error!("announce broadcast failed: {e}");
            let _ = tx.send(ProbeUpdate::Failed(e.to_string()));
            running.store(false, Ordering::SeqCst);
            return;
        }

        let round_deadline = Instant::now() + round_interval;
        while Instant::now() < round_deadline {
            if !running.load(Ordering::Relaxed) {
                completed = false;
                break 'sweep;
            }

            let (len, src) = match socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(e) if is_timeout_error(&e) => continue,
                Err(e) => {
                    error!("probe recv error: {e}");
                    continue;
                }
            };

            let payload = &buf[..len];
            if payload == ANNOUNCE_PAYLOAD {
                // Our own broadcast looped back.
                continue;
            }

            debug!("probe reply from {src}");
            let reply = HostReply {
                address: src.ip(),
                hardware_address: None,
                hostname: parse_hostname(payload),
            };
            if tx.send(ProbeUpdate::Host(reply)).is_err() {
                // Receiver dropped – the source is shutting down.
                running.store(false, Ordering::SeqCst);
                return;
            }
        }

        let progress = f64::from(round + 1) / f64::from(rounds);
        let _ = tx.send(ProbeUpdate::Progress(progress));
    }

    if completed {
        let _ = tx.send(ProbeUpdate::Complete);
        info!("announce sweep finished");
    }
    running.store(false, Ordering::SeqCst);
}

/// Interprets a reply payload as the responder's hostname, when it is
/// plain printable text.
fn parse_hostname(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if text.is_empty() || text.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(text.to_string())
}

/// Returns `true` for OS timeout / would-block errors that should be
/// retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// The local IPv4 address of the default route interface, if any.
///
/// Connecting a UDP socket sends no packets; it only asks the OS to
/// pick a route, which is enough to learn whether the machine is
/// attached to a network at all.
fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("8.8.8.8", 53)).ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(addr) if !addr.ip().is_loopback() && !addr.ip().is_unspecified() => {
            Some(*addr.ip())
        }
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
