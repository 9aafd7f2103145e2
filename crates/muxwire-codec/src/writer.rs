use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use muxwire_transport::Connection;
use tracing::debug;

use crate::codec::{encode_packet, CodecConfig, Packet};
use crate::error::{CodecError, Result};
use crate::reader::transport_to_codec_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete packets to any `Write` stream.
///
/// Each packet is encoded into one buffer and pushed out before the call
/// returns, so a header is never separated from its body by another write
/// through the same writer. The writer is not synchronized; share it behind a
/// lock when several streams write to one connection.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete packet (blocking).
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.body.len() > self.config.max_body_size {
            debug!(
                req = packet.req,
                size = packet.body.len(),
                max = self.config.max_body_size,
                "refusing to write oversized packet body"
            );
            return Err(CodecError::BodyTooLarge {
                size: packet.body.len(),
                max: self.config.max_body_size,
            });
        }

        self.buf.clear();
        encode_packet(packet, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    debug!(written = offset, total = self.buf.len(), "stream accepted no bytes");
                    return Err(CodecError::ConnectionClosed);
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        self.flush()
    }

    /// Write the goodbye marker that tells the peer no more packets follow.
    pub fn write_goodbye(&mut self) -> Result<()> {
        self.write_packet(&Packet::goodbye())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl PacketWriter<Connection> {
    /// Create a writer for a connection and apply the write timeout from config.
    pub fn with_config_stream(inner: Connection, config: CodecConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_codec_error)?;
        Ok(Self::with_config(inner, config))
    }
}
