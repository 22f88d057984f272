//! Dialing side of the pile.
//!
//! `pile_targets` spawns one detached task per target. A task dials, signals
//! its completion, then parks on a single one-byte read for as long as the
//! connection lives. Failed dials are logged and still signal, so the caller's
//! wait always resolves after every worker has had exactly one attempt.

use crate::engine::endpoint::Endpoint;
use crate::engine::waitgroup::WaitGroup;
use crate::error::DialError;
use pile_common::{Config, Transport};
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

/// Linux rejects TCP_KEEPIDLE/TCP_KEEPINTVL values above this.
const MAX_KEEPALIVE_SECS: u64 = 32_767;

/// Outcome of one pile-up: every worker lands in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PileReport {
    pub connected: usize,
    pub failed: usize,
}

impl PileReport {
    pub fn total(&self) -> usize {
        self.connected + self.failed
    }
}

/// A dialed connection owned by exactly one worker.
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Udp(UdpSocket),
}

impl Connection {
    /// Block on one read. Data, EOF and errors all end the hold the same way.
    pub async fn hold(self) {
        let mut one = [0u8; 1];
        match self {
            Connection::Tcp(mut stream) => {
                let _ = stream.read(&mut one).await;
            }
            #[cfg(unix)]
            Connection::Unix(mut stream) => {
                let _ = stream.read(&mut one).await;
            }
            Connection::Udp(socket) => {
                let _ = socket.recv(&mut one).await;
            }
        }
    }
}

fn keepalive_params(period: Duration) -> TcpKeepalive {
    let params = TcpKeepalive::new();
    if period.is_zero() {
        return params;
    }
    let period = period.clamp(
        Duration::from_secs(1),
        Duration::from_secs(MAX_KEEPALIVE_SECS),
    );
    params.with_time(period).with_interval(period)
}

async fn dial_tcp(addr: SocketAddr, keepalive: Duration) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    SockRef::from(&socket).set_tcp_keepalive(&keepalive_params(keepalive))?;
    socket.connect(addr).await
}

async fn dial_udp(addr: SocketAddr) -> io::Result<UdpSocket> {
    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    Ok(socket)
}

/// Open one connection to `target`.
///
/// Stream transports enable TCP keep-alive with `keepalive` as both the idle
/// time and the probe interval. A zero period keeps the OS defaults.
pub async fn dial(
    transport: Transport,
    target: &Endpoint,
    keepalive: Duration,
) -> Result<Connection, DialError> {
    let res = match target {
        Endpoint::Inet(addr) if transport.is_stream() => {
            dial_tcp(*addr, keepalive).await.map(Connection::Tcp)
        }
        Endpoint::Inet(addr) => dial_udp(*addr).await.map(Connection::Udp),
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixStream::connect(path).await.map(Connection::Unix),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
    };
    res.map_err(|source| DialError {
        transport,
        target: target.to_string(),
        source,
    })
}

/// Pile `config.workers` connections onto `target`.
pub async fn pile_up(config: &Config, target: &Endpoint) -> PileReport {
    let targets = std::iter::repeat(target.clone()).take(config.workers);
    pile_targets(config.transport, config.duration, targets).await
}

/// Spawn one worker per target and wait until every dial has resolved.
pub async fn pile_targets<I>(transport: Transport, keepalive: Duration, targets: I) -> PileReport
where
    I: IntoIterator<Item = Endpoint>,
{
    let wg = WaitGroup::new();
    let connected = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    for (worker, target) in targets.into_iter().enumerate() {
        let completion = wg.completion();
        let connected = Arc::clone(&connected);
        let failed = Arc::clone(&failed);

        tokio::spawn(async move {
            match dial(transport, &target, keepalive).await {
                Ok(conn) => {
                    connected.fetch_add(1, Ordering::SeqCst);
                    completion.done();
                    debug!(worker, "Connected");
                    conn.hold().await;
                }
                Err(e) => {
                    failed.fetch_add(1, Ordering::SeqCst);
                    warn!(worker, error = %e, "Dial failed");
                    completion.done();
                }
            }
        });
    }

    wg.wait().await;

    PileReport {
        connected: connected.load(Ordering::SeqCst),
        failed: failed.load(Ordering::SeqCst),
    }
}
