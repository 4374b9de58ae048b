use crate::assets::DISCOVERY_MAGIC;
use crate::error::{HandshakePhase, Result, SessionError};
use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// True only for a datagram that is exactly the advertisement token.
pub fn is_advertisement(payload: &[u8]) -> bool {
    payload == DISCOVERY_MAGIC
}

/// UDP listener waiting for the sender's periodic broadcast.
pub struct Discovery {
    socket: UdpSocket,
}

impl Discovery {
    /// Listen on `port` on every interface.
    ///
    /// The port is shared: another listener already bound to it (a second
    /// receiver on the same host) does not make this fail.
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for an advertisement and return the address it came from.
    ///
    /// Gives up with `Timeout` after `ticks` intervals without a match.
    /// Returns `Ok(None)` if cancelled first. Datagrams that are not the
    /// advertisement are ignored.
    pub async fn wait_for_sender(
        &self,
        ticks: u32,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<IpAddr>> {
        let mut ticker = tokio::time::interval(interval);
        let mut remaining = ticks;
        // larger than the token so longer payloads are not truncated into a match
        let mut buf = [0u8; 64];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = ticker.tick() => {
                    if remaining == 0 {
                        info!("broadcast timeout");
                        return Err(SessionError::Timeout {
                            phase: HandshakePhase::Discovery,
                            after: interval * ticks,
                        });
                    }
                    remaining -= 1;
                    info!("broadcast receiving...");
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (n, from) = received?;
                    if is_advertisement(&buf[..n]) {
                        info!("get udp packet, remote address: {}", from.ip());
                        return Ok(Some(from.ip()));
                    }
                    debug!("Discovery: ignoring {} byte datagram from {}", n, from);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertisement_must_match_exactly() {
        assert!(is_advertisement(b"1314"));
        assert!(!is_advertisement(b"1313"));
        assert!(!is_advertisement(b"13140"));
        assert!(!is_advertisement(b"131"));
        assert!(!is_advertisement(b""));
    }

    #[tokio::test]
    async fn test_accepts_advertisement_source() {
        let discovery = Discovery::bind(0).await.unwrap();
        let port = discovery.local_addr().unwrap().port();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"1313", ("127.0.0.1", port)).await.unwrap();
        sender.send_to(b"1314", ("127.0.0.1", port)).await.unwrap();

        let cancel = CancellationToken::new();
        let found = discovery
            .wait_for_sender(5, Duration::from_secs(1), &cancel)
            .await
            .unwrap();
        assert_eq!(found, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn test_second_listener_shares_port() {
        let first = Discovery::bind(0).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = Discovery::bind(port).await.unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"1314", ("127.0.0.1", port)).await.unwrap();

        // unicast lands on one of the two sockets
        let cancel = CancellationToken::new();
        let found = tokio::select! {
            found = first.wait_for_sender(5, Duration::from_secs(1), &cancel) => found,
            found = second.wait_for_sender(5, Duration::from_secs(1), &cancel) => found,
        };
        assert_eq!(found.unwrap(), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn test_times_out_on_foreign_payloads() {
        let discovery = Discovery::bind(0).await.unwrap();
        let port = discovery.local_addr().unwrap().port();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello", ("127.0.0.1", port)).await.unwrap();

        let cancel = CancellationToken::new();
        let err = discovery
            .wait_for_sender(2, Duration::from_millis(20), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Timeout {
                phase: HandshakePhase::Discovery,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_waiting() {
        let discovery = Discovery::bind(0).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let found = discovery
            .wait_for_sender(5, Duration::from_secs(1), &cancel)
            .await
            .unwrap();
        assert_eq!(found, None);
    }
}
