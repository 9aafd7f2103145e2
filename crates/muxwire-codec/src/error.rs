/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoding bits of a flag byte hold the unassigned value `0b11`.
    #[error("invalid body encoding in flag byte {0:#04x}")]
    InvalidEncoding(u8),

    /// The body exceeds the configured maximum size.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly on a packet boundary.
    #[error("end of stream")]
    Eof,

    /// The connection was closed in the middle of a packet.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,
}

impl CodecError {
    /// Whether this is a clean end of stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, CodecError::Eof)
    }

    /// Whether this error only says the connection went away.
    pub fn is_closed(&self) -> bool {
        match self {
            CodecError::Eof | CodecError::ConnectionClosed => true,
            CodecError::Io(err) => muxwire_transport::is_already_closed(err),
            CodecError::InvalidEncoding(_) | CodecError::BodyTooLarge { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
