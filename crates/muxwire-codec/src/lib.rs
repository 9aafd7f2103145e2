//! Header and packet framing for the muxrpc wire format.
//!
//! Every packet is a fixed 9-byte header followed by its body:
//! - 1 flag byte: stream bit, end/error bit, and a 2-bit body encoding
//! - a 4-byte big-endian body length
//! - a 4-byte big-endian signed request id
//!
//! An all-zero header is the goodbye marker that ends a connection.

pub mod codec;
pub mod error;
pub mod flags;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod framed;

pub use codec::{
    decode_packet, encode_packet, peek_header, CodecConfig, Header, Packet, DEFAULT_MAX_BODY,
    HEADER_SIZE, MAX_BODY_LEN,
};
pub use error::{CodecError, Result};
pub use flags::{Encoding, Flags};
#[cfg(feature = "async")]
pub use framed::PacketCodec;
pub use reader::PacketReader;
pub use writer::PacketWriter;
