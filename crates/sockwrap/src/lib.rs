#![forbid(unsafe_code)]

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod net;
pub mod stream;
pub mod tls;

pub use connection::{Connection, Received};
pub use endpoint::Endpoint;
pub use error::{ConnError, EndpointParseError};
pub use net::{ConnectOptions, Listener};
pub use stream::Stream;
pub use tls::{TlsAcceptor, TlsConfig};
