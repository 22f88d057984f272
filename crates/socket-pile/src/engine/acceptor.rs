//! Listening side of the pile.
//!
//! The acceptor binds once and then accepts without limit. Each accepted
//! connection is handed to a detached task that performs a single one-byte
//! read and then lets the connection go. Nothing is ever written back, so in
//! practice the handler parks until the peer disappears or the process exits.

use crate::engine::endpoint::{resolve_bind, Endpoint};
use crate::error::BindError;
use pile_common::{Config, Transport};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpSocket, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixListener;

/// Pause after a failed accept so fd exhaustion does not turn into a busy loop.
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(10);

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
    Udp(UdpSocket),
}

pub struct Acceptor {
    transport: Transport,
    local: Endpoint,
    token: CancellationToken,
    accepted: Arc<AtomicUsize>,
    task: Option<JoinHandle<()>>,
    unix_path: Option<PathBuf>,
}

fn bind_tcp(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

async fn bind_listener(
    transport: Transport,
    endpoint: &Endpoint,
    backlog: u32,
) -> io::Result<(Listener, Endpoint)> {
    match endpoint {
        Endpoint::Inet(addr) if transport.is_stream() => {
            let listener = bind_tcp(*addr, backlog)?;
            let local = Endpoint::Inet(listener.local_addr()?);
            Ok((Listener::Tcp(listener), local))
        }
        Endpoint::Inet(addr) => {
            let socket = UdpSocket::bind(*addr).await?;
            let local = Endpoint::Inet(socket.local_addr()?);
            Ok((Listener::Udp(socket), local))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let listener = UnixListener::bind(path)?;
            Ok((Listener::Unix(listener), Endpoint::Unix(path.clone())))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
    }
}

/// Read once into a one-byte buffer and discard whatever happened.
async fn hold_accepted<S>(mut stream: S)
where
    S: AsyncRead + Unpin,
{
    let mut one = [0u8; 1];
    let _ = stream.read(&mut one).await;
}

async fn accept_loop(listener: Listener, token: CancellationToken, accepted: Arc<AtomicUsize>) {
    match listener {
        Listener::Tcp(listener) => loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = listener.accept() => match res {
                    Ok((stream, peer)) => {
                        accepted.fetch_add(1, Ordering::SeqCst);
                        debug!(peer = %peer, "Accepted connection");
                        tokio::spawn(hold_accepted(stream));
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                }
            }
        },
        #[cfg(unix)]
        Listener::Unix(listener) => loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = listener.accept() => match res {
                    Ok((stream, _)) => {
                        accepted.fetch_add(1, Ordering::SeqCst);
                        debug!("Accepted unix connection");
                        tokio::spawn(hold_accepted(stream));
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                }
            }
        },
        Listener::Udp(socket) => {
            // No accept step for datagrams: drain and discard.
            let mut one = [0u8; 1];
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = socket.recv_from(&mut one) => match res {
                        Ok((_, peer)) => debug!(peer = %peer, "Discarded datagram"),
                        Err(e) => {
                            warn!(error = %e, "Receive failed");
                            tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                        }
                    }
                }
            }
        }
    }
    debug!("Accept loop stopped");
}

impl Acceptor {
    /// Resolve the configured address, bind it and start accepting.
    pub async fn start(config: &Config) -> Result<Self, BindError> {
        let endpoint = resolve_bind(config.transport, &config.address).await?;
        Self::bind(config.transport, &endpoint, config.backlog).await
    }

    pub async fn bind(
        transport: Transport,
        endpoint: &Endpoint,
        backlog: u32,
    ) -> Result<Self, BindError> {
        let (listener, local) = bind_listener(transport, endpoint, backlog)
            .await
            .map_err(|source| BindError::Io {
                transport,
                address: endpoint.to_string(),
                source,
            })?;

        let unix_path = match &local {
            Endpoint::Unix(path) => Some(path.clone()),
            Endpoint::Inet(_) => None,
        };

        let token = CancellationToken::new();
        let accepted = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(accept_loop(listener, token.clone(), Arc::clone(&accepted)));
        info!(transport = %transport, address = %local, "Listening");

        Ok(Self {
            transport,
            local,
            token,
            accepted,
            task: Some(task),
            unix_path,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// The endpoint actually bound, with any ephemeral port resolved.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Connections accepted so far. Always zero for datagram transports.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop accepting and wait until the listening socket has been closed.
    ///
    /// Connections that were already accepted are left alone.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(address = %self.local, accepted = self.accepted(), "Listener closed");
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(path) = self.unix_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Could not remove unix socket file");
            }
        }
    }
}
