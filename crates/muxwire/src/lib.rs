//! muxrpc transport framing.
//!
//! Many logical request/response streams share one byte connection. This
//! crate re-exports the three layers that make that work:
//!
//! - [`transport`]: Unix socket and TCP connections, and the classifier for
//!   "connection already gone" errors
//! - [`codec`]: the 9-byte packet header and packet reader/writer
//! - [`mux`]: the connection [`Packer`](mux::Packer) and per-stream
//!   [`ByteSink`](mux::ByteSink)

/// Re-export transport types.
pub mod transport {
    pub use muxwire_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use muxwire_codec::*;
}

/// Re-export multiplexing types.
pub mod mux {
    pub use muxwire_mux::*;
}
