use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Which interfaces a listening endpoint binds.
///
/// Services that are only ever consumed by co-located processes (the
/// peripheral service in the default deployment) bind loopback; the
/// supervisor binds all interfaces so a remote gateway can reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindScope {
    /// Bind 127.0.0.1 only.
    Loopback,
    /// Bind 0.0.0.0.
    All,
}

impl BindScope {
    fn ip(self) -> IpAddr {
        match self {
            BindScope::Loopback => IpAddr::V4(Ipv4Addr::LOCALHOST),
            BindScope::All => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// A bound, listening TCP endpoint.
pub struct TcpEndpoint {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on the given scope and port.
    ///
    /// Port 0 asks the OS for an ephemeral port; [`TcpEndpoint::local_addr`]
    /// reports the one actually bound.
    pub fn bind(scope: BindScope, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(scope.ip(), port);
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;
        let addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;

        info!(%addr, "listening");

        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    ///
    /// Returns the stream together with the peer address, which the RPC
    /// layer hands to handlers.
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(target: impl ToSocketAddrs + std::fmt::Display) -> Result<TcpStream> {
        let addr = target.to_string();
        let stream = TcpStream::connect(&target).map_err(|e| TransportError::Connect {
            addr: addr.clone(),
            source: e,
        })?;
        debug!(%addr, "connected");
        Ok(stream)
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Try to clone the underlying listener (shares the accept queue).
    pub fn try_clone(&self) -> Result<Self> {
        let listener = self.listener.try_clone()?;
        Ok(Self {
            listener,
            addr: self.addr,
        })
    }
}

impl std::fmt::Debug for TcpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpEndpoint").field("addr", &self.addr).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::thread;

    use super::*;

    #[test]
    fn bind_loopback_reports_local_addr() {
        let endpoint = TcpEndpoint::bind(BindScope::Loopback, 0).expect("bind should succeed");
        let addr = endpoint.local_addr();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn accept_and_connect_roundtrip() {
        let endpoint = TcpEndpoint::bind(BindScope::Loopback, 0).expect("bind should succeed");
        let addr = endpoint.local_addr();

        let server = thread::spawn(move || {
            let (mut stream, peer) = endpoint.accept().expect("accept should succeed");
            assert!(peer.ip().is_loopback());
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).expect("read should succeed");
            stream.write_all(&buf).expect("write should succeed");
        });

        let mut client = TcpEndpoint::connect(addr).expect("connect should succeed");
        client.write_all(b"ping").expect("write should succeed");
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).expect("read should succeed");
        assert_eq!(&buf, b"ping");

        server.join().expect("server thread should finish");
    }

    #[test]
    fn connect_to_unbound_port_fails() {
        // Bind then drop to get a port that is very likely unbound.
        let port = {
            let endpoint = TcpEndpoint::bind(BindScope::Loopback, 0).expect("bind should succeed");
            endpoint.local_addr().port()
        };

        let err = TcpEndpoint::connect(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
        ))
        .expect_err("connect should fail");
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[test]
    fn try_clone_shares_accept_queue() {
        let endpoint = TcpEndpoint::bind(BindScope::Loopback, 0).expect("bind should succeed");
        let clone = endpoint.try_clone().expect("clone should succeed");
        assert_eq!(endpoint.local_addr(), clone.local_addr());

        let addr = endpoint.local_addr();
        let server = thread::spawn(move || {
            clone.accept().expect("clone should accept");
        });

        let _client = TcpEndpoint::connect(addr).expect("connect should succeed");
        server.join().expect("server thread should finish");
    }
}
