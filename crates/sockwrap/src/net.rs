#![forbid(unsafe_code)]

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Duration;

use crate::connection::Connection;
use crate::error::ConnError;
use crate::stream::Stream;
use crate::tls::{TlsAcceptor, TlsConfig};

/// Thin TCP listener handing out [`Connection`]s.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn listen<A: ToSocketAddrs>(addr: A) -> std::io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn accept(&self) -> Result<Connection, ConnError> {
        let (stream, peer) = self.inner.accept().map_err(ConnError::Accept)?;
        stream.set_nodelay(true).ok();
        tracing::debug!(%peer, "accepted connection");
        Ok(Connection::open(Stream::Plain(stream)))
    }

    /// Accept a connection and complete a TLS handshake on it before returning.
    pub fn accept_tls(&self, acceptor: &TlsAcceptor) -> Result<Connection, ConnError> {
        let (stream, peer) = self.inner.accept().map_err(ConnError::Accept)?;
        stream.set_nodelay(true).ok();
        tracing::debug!(%peer, "accepted connection, starting tls");
        Connection::from_tls_stream(stream, acceptor)
    }
}

/// How [`Connection::connect_with`] opens a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Per-address connect timeout; `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Read timeout applied once connected, in milliseconds; `0` blocks indefinitely.
    pub read_timeout_ms: u64,
    pub nodelay: bool,
    /// Negotiate TLS before returning.
    pub tls: Option<TlsConfig>,
    /// Name to verify the server certificate against. Defaults to the host.
    pub server_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout_ms: 0,
            nodelay: true,
            tls: None,
            server_name: None,
        }
    }
}

impl ConnectOptions {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn tls(config: TlsConfig) -> Self {
        Self {
            tls: Some(config),
            ..Self::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout_ms(mut self, millis: u64) -> Self {
        self.read_timeout_ms = millis;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}
