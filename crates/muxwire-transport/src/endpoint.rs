use std::fmt;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{Result, TransportError};
#[cfg(unix)]
use crate::uds::UnixSocketListener;

/// Where to listen or dial.
///
/// Parsed from `unix:<path>`, `tcp:<host:port>`, or a bare socket path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix("tcp:") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Endpoint::Tcp(addr.trim_start_matches("//").to_string()));
        }
        let path = s.strip_prefix("unix:").unwrap_or(s);
        if path.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Endpoint::Unix(PathBuf::from(path)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl Endpoint {
    /// Dial the endpoint (blocking).
    pub fn connect(&self) -> Result<Connection> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => UnixSocketListener::connect(path),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::Connect {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).map_err(|source| {
                    TransportError::Connect {
                        addr: addr.clone(),
                        source,
                    }
                })?;
                debug!(%addr, "connected over tcp");
                Ok(stream.into())
            }
        }
    }

    /// Bind a listener at the endpoint.
    pub fn bind(&self) -> Result<Listener> {
        match self {
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Listener::Unix(UnixSocketListener::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::Bind {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
            Endpoint::Tcp(addr) => {
                let listener =
                    TcpListener::bind(addr.as_str()).map_err(|source| TransportError::Bind {
                        addr: addr.clone(),
                        source,
                    })?;
                info!(%addr, "listening on tcp");
                Ok(Listener::Tcp(listener))
            }
        }
    }
}

/// A bound listener for either transport.
pub enum Listener {
    #[cfg(unix)]
    Unix(UnixSocketListener),
    Tcp(TcpListener),
}

impl Listener {
    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => listener.accept(),
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp connection");
                Ok(stream.into())
            }
        }
    }

    /// The address actually bound, as an endpoint.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener) => Ok(Endpoint::Unix(listener.path().to_path_buf())),
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
        }
    }
}
