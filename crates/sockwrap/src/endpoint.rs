#![forbid(unsafe_code)]

use std::fmt;
use std::net::{Ipv6Addr, SocketAddr};
use std::str::FromStr;

use crate::error::EndpointParseError;

/// Host and port of one side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    /// Parse the textual form `[name/]ip:port`.
    ///
    /// Anything up to the last `/` is a reverse-DNS name and is dropped. The
    /// port follows the last `:`, so bracketed and bare IPv6 literals both work.
    /// A bare host containing `:` must be a whole IPv6 literal; otherwise a
    /// port-less `::1` would split into host `:` and port `1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = s.rsplit('/').next().unwrap_or(s);
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError::InvalidPort {
                addr: s.to_string(),
                port: port.to_string(),
            })?;
        let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            Some(bracketed) => bracketed,
            None if host.contains(':') && host.parse::<Ipv6Addr>().is_err() => {
                return Err(EndpointParseError::InvalidHost {
                    addr: s.to_string(),
                    host: host.to_string(),
                });
            }
            None => host,
        };
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
