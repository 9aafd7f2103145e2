//! Many logical streams over one connection.
//!
//! - [`Packer`] owns the connection: one header read at a time, and a close
//!   that happens exactly once and wakes any blocked reader.
//! - [`SharedWriter`] is the single write lock every stream goes through, so
//!   packets from different streams never interleave on the wire.
//! - [`ByteSink`] turns writes for one request id into correctly flagged
//!   packets and ends the stream with exactly one end packet.
//!
//! Request ids are normalized on read: ids of streams this side opened come
//! back positive, ids of streams the peer opened come back negative.

pub mod closed;
pub mod encoding;
pub mod end;
pub mod error;
pub mod packer;
pub mod shared;
pub mod sink;

pub use closed::is_already_closed;
pub use encoding::RequestEncoding;
pub use end::{end_err_packet, end_okay_packet, end_reason};
pub use error::{CallError, MuxError, Result};
pub use packer::Packer;
pub use shared::{PacketWrite, SharedWriter};
pub use sink::ByteSink;

/// The cancellable context accepted by [`Packer::next_header`].
pub use tokio_util::sync::CancellationToken;
