#![forbid(unsafe_code)]

use std::io;
use thiserror::Error;

/// Errors raised while opening a connection or querying its endpoints.
///
/// Steady-state reads and writes never produce these; they report through
/// [`crate::Received`] and `bool` instead.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("socket is not connected: {0}")]
    Init(#[source] io::Error),
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("tls handshake with {server_name} failed: {source}")]
    Handshake {
        server_name: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid tls server name: {0}")]
    InvalidServerName(String),
    #[error("tls configuration error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("invalid pem data: {0}")]
    Pem(#[source] io::Error),
    #[error("failed to load platform root certificates: {0}")]
    RootStore(#[source] io::Error),
    #[error("connection is closed")]
    NotConnected,
}

/// Errors from parsing a textual socket address such as `localhost/127.0.0.1:5555`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointParseError {
    #[error("address has no port separator: {0}")]
    MissingPort(String),
    #[error("invalid port {port:?} in address {addr}")]
    InvalidPort { addr: String, port: String },
    #[error("invalid host {host:?} in address {addr}")]
    InvalidHost { addr: String, host: String },
}
