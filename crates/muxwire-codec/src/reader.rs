use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use muxwire_transport::Connection;
use tracing::debug;

use crate::codec::{peek_header, CodecConfig, Header, Packet, HEADER_SIZE};
use crate::error::{CodecError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads headers and bodies from any `Read` stream.
///
/// Handles partial reads internally. A header and its body can be read
/// separately, so a dispatcher can look at the header before deciding where
/// the body goes; every header must be followed by a read of its body.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next header (blocking).
    ///
    /// Returns `Err(CodecError::Eof)` when the stream ends on a packet
    /// boundary and `Err(CodecError::ConnectionClosed)` when it ends inside one.
    pub fn read_header(&mut self) -> Result<Header> {
        loop {
            if let Some(header) = peek_header(&self.buf)? {
                if header.body_len() > self.config.max_body_size {
                    debug!(
                        req = header.req,
                        size = header.body_len(),
                        max = self.config.max_body_size,
                        "rejecting oversized packet body"
                    );
                    return Err(CodecError::BodyTooLarge {
                        size: header.body_len(),
                        max: self.config.max_body_size,
                    });
                }
                self.buf.advance(HEADER_SIZE);
                return Ok(header);
            }

            if self.fill()? == 0 {
                if self.buf.is_empty() {
                    return Err(CodecError::Eof);
                }
                debug!(buffered = self.buf.len(), "stream ended inside a header");
                return Err(CodecError::ConnectionClosed);
            }
        }
    }

    /// Read the `len` body bytes following a header (blocking).
    pub fn read_body(&mut self, len: usize) -> Result<Bytes> {
        self.buf.reserve(len.saturating_sub(self.buf.len()));
        while self.buf.len() < len {
            if self.fill()? == 0 {
                debug!(have = self.buf.len(), want = len, "stream ended inside a body");
                return Err(CodecError::ConnectionClosed);
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Read a complete packet (blocking).
    pub fn read_packet(&mut self) -> Result<Packet> {
        let header = self.read_header()?;
        let body = self.read_body(header.body_len())?;
        Ok(Packet {
            req: header.req,
            flags: header.flags,
            body,
        })
    }

    fn fill(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl PacketReader<Connection> {
    /// Create a reader for a connection and apply the read timeout from config.
    pub fn with_config_stream(inner: Connection, config: CodecConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_codec_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_codec_error(err: muxwire_transport::TransportError) -> CodecError {
    match err {
        muxwire_transport::TransportError::Io(io)
        | muxwire_transport::TransportError::Accept(io) => CodecError::Io(io),
        muxwire_transport::TransportError::Bind { source, .. }
        | muxwire_transport::TransportError::Connect { source, .. } => CodecError::Io(source),
        other => CodecError::Io(std::io::Error::other(other.to_string())),
    }
}
