use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::closed::is_already_closed;
use crate::error::Result;

/// Tears down a connection on behalf of its owner.
///
/// `close` is invoked at most once by the packer. `is_benign` decides whether
/// an error from `close` is ordinary shutdown noise (the peer already hung up,
/// the handle is already gone) rather than a real failure; the representation
/// of those conditions is platform specific, so connections may override it.
pub trait Closer: Send + Sync {
    /// Close the underlying connection.
    fn close(&self) -> std::io::Result<()>;

    /// Whether `err` only says the connection was already closed.
    fn is_benign(&self, err: &std::io::Error) -> bool {
        is_already_closed(err)
    }
}

/// A connected duplex byte stream.
///
/// Implements `Read + Write`. Cloning via [`Connection::try_clone`] yields a
/// second handle on the same socket, which is how a read half and a write half
/// are obtained. Closing any handle shuts down both directions for all of them,
/// waking a reader that is blocked on another handle.
pub struct Connection {
    inner: ConnectionInner,
}

enum ConnectionInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.read(buf),
            ConnectionInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.write(buf),
            ConnectionInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.flush(),
            ConnectionInner::Tcp(stream) => stream.flush(),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for Connection {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: ConnectionInner::Unix(stream),
        }
    }
}

impl From<TcpStream> for Connection {
    fn from(stream: TcpStream) -> Self {
        // Packets are written whole; Nagle only adds latency.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(%err, "could not disable nagle on tcp stream");
        }
        Self {
            inner: ConnectionInner::Tcp(stream),
        }
    }
}

impl Connection {
    /// A connected pair of Unix sockets, handy for loopback use.
    #[cfg(unix)]
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = std::os::unix::net::UnixStream::pair()?;
        Ok((left.into(), right.into()))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.set_read_timeout(timeout)?,
            ConnectionInner::Tcp(stream) => stream.set_read_timeout(timeout)?,
        }
        Ok(())
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.set_write_timeout(timeout)?,
            ConnectionInner::Tcp(stream) => stream.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Create a second handle on the same socket.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => ConnectionInner::Unix(stream.try_clone()?),
            ConnectionInner::Tcp(stream) => ConnectionInner::Tcp(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Shut down both directions of the socket.
    pub fn shutdown(&self) -> std::io::Result<()> {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            ConnectionInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(_) => "unix",
            ConnectionInner::Tcp(_) => "tcp",
        }
    }
}

impl Closer for Connection {
    fn close(&self) -> std::io::Result<()> {
        self.shutdown()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            ConnectionInner::Unix(_) => f.debug_struct("Connection").field("type", &"unix").finish(),
            ConnectionInner::Tcp(stream) => f
                .debug_struct("Connection")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pair_carries_bytes_both_ways() {
        let (mut left, mut right) = Connection::pair().unwrap();

        left.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        right.write_all(b"pong").unwrap();
        left.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn shutdown_wakes_reader_on_cloned_handle() {
        let (left, _right) = Connection::pair().unwrap();
        let mut reader = left.try_clone().unwrap();

        let blocked = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf)
        });

        std::thread::sleep(Duration::from_millis(20));
        left.close().unwrap();

        let read = blocked.join().unwrap().unwrap();
        assert_eq!(read, 0);
    }

    #[test]
    fn write_after_shutdown_is_benign() {
        let (mut left, _right) = Connection::pair().unwrap();
        left.close().unwrap();

        let err = left.write_all(b"late").unwrap_err();
        assert!(left.is_benign(&err), "unexpected error: {err:?}");
    }

    #[test]
    fn default_benign_check_unwraps_payloads() {
        let (conn, _peer) = Connection::pair().unwrap();
        let wrapped = std::io::Error::other(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(conn.is_benign(&wrapped));
        assert!(!conn.is_benign(&std::io::Error::other("disk full")));
    }

    #[test]
    fn tcp_loopback_reports_transport_name() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server, _) = listener.accept().unwrap();
        let client = Connection::from(client.join().unwrap());

        assert_eq!(client.transport_name(), "tcp");
        assert_eq!(Connection::from(server).transport_name(), "tcp");
    }
}
