//! Duplex byte connections for muxwire.
//!
//! This is the lowest layer. It provides:
//! - [`Connection`], an ordered, reliable, closable byte stream (Unix domain
//!   socket or TCP)
//! - [`Listener`] and [`Endpoint`] to accept and dial connections
//! - the [`Closer`] seam the packer uses to tear a connection down
//! - [`is_already_closed`], which separates shutdown noise from real failures

pub mod closed;
pub mod connection;
pub mod endpoint;
pub mod error;

#[cfg(unix)]
pub mod uds;

pub use closed::{is_already_closed, is_closed_io};
pub use connection::{Closer, Connection};
pub use endpoint::{Endpoint, Listener};
pub use error::{Result, TransportError};

#[cfg(unix)]
pub use uds::UnixSocketListener;
