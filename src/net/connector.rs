use crate::assets::KEEPALIVE_BYTE;
use crate::config::Config;
use crate::error::{HandshakePhase, Result, SessionError};
use crate::pipeline::ConnectionState;
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Discovery;

/// Drives the session from `Idle` to `Streaming`.
///
/// Publishes every state change on a watch channel. Each attempt is bounded
/// by a tick budget and interrupted by the session token.
pub struct Connector {
    config: Config,
    cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl Connector {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            cancel,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn transition(&self, next: ConnectionState) {
        let current = self.state();
        if current == next {
            return;
        }
        if !current.can_transition_to(&next) {
            warn!("Connector: ignoring transition {} -> {}", current, next);
            return;
        }
        info!("Connector: {} -> {}", current, next);
        self.state.send_replace(next);
    }

    /// Find the sender and open the stream.
    ///
    /// Returns `Ok(None)` when the session was cancelled first.
    pub async fn establish(&self) -> Result<Option<TcpStream>> {
        let ip = match self.config.ip {
            Some(ip) => IpAddr::V4(ip),
            None => {
                self.transition(ConnectionState::Discovering);
                let discovery = Discovery::bind(self.config.broadcast_port).await?;
                match discovery
                    .wait_for_sender(
                        self.config.discovery_ticks,
                        self.config.tick_interval,
                        &self.cancel,
                    )
                    .await?
                {
                    Some(ip) => ip,
                    None => return Ok(None),
                }
            }
        };

        self.transition(ConnectionState::Connecting);
        let stream = self.connect(SocketAddr::new(ip, self.config.port)).await?;
        if stream.is_some() {
            self.transition(ConnectionState::Streaming);
        }
        Ok(stream)
    }

    async fn connect(&self, remote: SocketAddr) -> Result<Option<TcpStream>> {
        let (socket, unspecified) = if remote.is_ipv4() {
            (TcpSocket::new_v4()?, IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        } else {
            (TcpSocket::new_v6()?, IpAddr::V6(Ipv6Addr::UNSPECIFIED))
        };
        socket.set_reuseaddr(true)?;
        socket.bind(SocketAddr::new(unspecified, self.config.local_port))?;

        info!("Connector: connecting to {}", remote);
        let connecting = socket.connect(remote);
        tokio::pin!(connecting);

        let interval = self.config.tick_interval;
        let ticks = self.config.connect_ticks;
        let mut ticker = tokio::time::interval(interval);
        let mut remaining = ticks;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                connected = &mut connecting => {
                    let stream = connected?;
                    info!("Connector: connected to {}", remote);
                    return Ok(Some(stream));
                }
                _ = ticker.tick() => {
                    if remaining == 0 {
                        info!("connect timeout");
                        return Err(SessionError::Timeout {
                            phase: HandshakePhase::Connect,
                            after: interval * ticks,
                        });
                    }
                    remaining -= 1;
                }
            }
        }
    }

    /// Mark the session closed. Observers see `Closed` exactly once.
    pub fn close(&self) {
        self.transition(ConnectionState::Closed);
    }
}

/// Write the keepalive byte now and again `interval` after every write.
///
/// Only returns on a write failure.
pub async fn keepalive<W>(mut writer: W, interval: Duration, debug: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        writer.write_all(&[KEEPALIVE_BYTE]).await?;
        if debug {
            info!("write 1 byte");
        }
        tokio::time::sleep(interval).await;
    }
}
