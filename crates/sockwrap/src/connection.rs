#![forbid(unsafe_code)]

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::ConnError;
use crate::net::ConnectOptions;
use crate::stream::Stream;
use crate::tls::{TlsAcceptor, TlsConfig};

/// Outcome of a single bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received<T> {
    /// Between one and `max_len` bytes arrived.
    Data(T),
    /// The read timeout elapsed before any byte arrived.
    Empty,
    /// The peer closed the stream, or the read failed.
    Closed,
}

impl<T> Received<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Received::Data(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Received::Empty)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Received::Closed)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Received::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Received::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Received<U> {
        match self {
            Received::Data(d) => Received::Data(f(d)),
            Received::Empty => Received::Empty,
            Received::Closed => Received::Closed,
        }
    }
}

/// A blocking stream connection with sentinel-style reads and writes.
///
/// Construction either returns an open connection or an error. Once
/// [`close`](Connection::close) has run, reads report [`Received::Closed`],
/// writes report `false` and endpoint queries fail with
/// [`ConnError::NotConnected`].
#[derive(Debug)]
pub struct Connection {
    stream: Option<Stream>,
    timeout_ms: u64,
}

impl Connection {
    /// Adopt an already connected socket.
    pub fn from_stream(stream: TcpStream) -> Result<Self, ConnError> {
        stream.peer_addr().map_err(ConnError::Init)?;
        Ok(Self::open(Stream::Plain(stream)))
    }

    /// Adopt an accepted socket and run the server side of a TLS handshake on it.
    pub fn from_tls_stream(
        stream: TcpStream,
        acceptor: &TlsAcceptor,
    ) -> Result<Self, ConnError> {
        stream.peer_addr().map_err(ConnError::Init)?;
        Ok(Self::open(acceptor.accept(stream)?))
    }

    /// Connect to `host:port`, negotiating TLS against the platform roots when `tls` is set.
    pub fn connect(host: &str, port: u16, tls: bool) -> Result<Self, ConnError> {
        let options = if tls {
            ConnectOptions::tls(TlsConfig::client_default()?)
        } else {
            ConnectOptions::plain()
        };
        Self::connect_with(host, port, &options)
    }

    pub fn connect_with(
        host: &str,
        port: u16,
        options: &ConnectOptions,
    ) -> Result<Self, ConnError> {
        let addr = format!("{host}:{port}");
        let tcp = dial(host, port, options.connect_timeout).map_err(|source| ConnError::Connect {
            addr: addr.clone(),
            source,
        })?;
        if options.nodelay {
            tcp.set_nodelay(true).ok();
        }

        let stream = match &options.tls {
            Some(tls) => {
                let server_name = options.server_name.as_deref().unwrap_or(host);
                tls.connect(tcp, server_name)?
            }
            None => Stream::Plain(tcp),
        };
        tracing::debug!(%addr, tls = stream.is_tls(), "connected");

        let mut conn = Self::open(stream);
        if options.read_timeout_ms > 0 {
            conn.set_timeout(options.read_timeout_ms);
        }
        Ok(conn)
    }

    pub(crate) fn open(stream: Stream) -> Self {
        Self {
            stream: Some(stream),
            timeout_ms: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Set how long a read may block, in milliseconds; `0` blocks indefinitely.
    ///
    /// Best effort: a failure leaves the previous timeout in place.
    pub fn set_timeout(&mut self, millis: u64) {
        let Some(stream) = &self.stream else {
            return;
        };
        let timeout = (millis > 0).then(|| Duration::from_millis(millis));
        match stream.tcp().set_read_timeout(timeout) {
            Ok(()) => self.timeout_ms = millis,
            Err(e) => tracing::debug!(millis, error = %e, "ignoring set_timeout failure"),
        }
    }

    /// The read timeout last applied, in milliseconds.
    pub fn timeout(&self) -> u64 {
        self.timeout_ms
    }

    /// Release the socket. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown() {
                tracing::debug!(error = %e, "ignoring close failure");
            }
            tracing::debug!("connection closed");
        }
    }

    /// Read up to `max_len` bytes and decode them as UTF-8, replacing invalid sequences.
    pub fn read(&mut self, max_len: usize) -> Received<String> {
        self.read_bytes(max_len)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read up to `max_len` bytes. Whatever is available is returned; the buffer is not filled.
    pub fn read_bytes(&mut self, max_len: usize) -> Received<Vec<u8>> {
        match self.try_read_bytes(max_len) {
            Ok(received) => received,
            Err(e) => {
                tracing::debug!(error = %e, "read failed, reporting closed");
                Received::Closed
            }
        }
    }

    /// Like [`read_bytes`](Connection::read_bytes), but I/O failures other than a
    /// timeout come back as `Err` instead of being folded into `Closed`.
    pub fn try_read_bytes(&mut self, max_len: usize) -> io::Result<Received<Vec<u8>>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Received::Closed);
        };
        if max_len == 0 {
            return Ok(Received::Empty);
        }

        let mut buf = vec![0u8; max_len];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(Received::Closed),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Received::Data(buf));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => return Ok(Received::Empty),
                Err(e) => return Err(e),
            }
        }
    }

    /// Write all of `text` and flush.
    pub fn write(&mut self, text: &str) -> bool {
        let data = text.as_bytes();
        self.write_bytes(data, 0, data.len())
    }

    /// Write exactly `len` bytes of `buf` starting at `offset`, then flush.
    pub fn write_bytes(&mut self, buf: &[u8], offset: usize, len: usize) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        let Some(data) = offset.checked_add(len).and_then(|end| buf.get(offset..end)) else {
            tracing::debug!(offset, len, buf_len = buf.len(), "write range out of bounds");
            return false;
        };
        match stream.write_all(data).and_then(|()| stream.flush()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "write failed");
                false
            }
        }
    }

    pub fn remote_endpoint(&self) -> Result<Endpoint, ConnError> {
        self.tcp()?
            .peer_addr()
            .map(Endpoint::from)
            .map_err(|_| ConnError::NotConnected)
    }

    pub fn local_endpoint(&self) -> Result<Endpoint, ConnError> {
        self.tcp()?
            .local_addr()
            .map(Endpoint::from)
            .map_err(|_| ConnError::NotConnected)
    }

    pub fn remote_host(&self) -> Result<String, ConnError> {
        self.remote_endpoint().map(|ep| ep.host)
    }

    pub fn remote_port(&self) -> Result<u16, ConnError> {
        self.remote_endpoint().map(|ep| ep.port)
    }

    pub fn local_host(&self) -> Result<String, ConnError> {
        self.local_endpoint().map(|ep| ep.host)
    }

    pub fn local_port(&self) -> Result<u16, ConnError> {
        self.local_endpoint().map(|ep| ep.port)
    }

    /// The underlying stream, or `None` once closed.
    pub fn get_ref(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut Stream> {
        self.stream.as_mut()
    }

    fn tcp(&self) -> Result<&TcpStream, ConnError> {
        self.stream
            .as_ref()
            .map(Stream::tcp)
            .ok_or(ConnError::NotConnected)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

// Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut.
fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn dial(host: &str, port: u16, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port));
    };
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any address",
        )
    }))
}
