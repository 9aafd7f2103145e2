use std::io::{Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use bytes::Bytes;
use muxwire_codec::{CodecConfig, CodecError, Header, Packet, PacketReader, PacketWriter};
use muxwire_transport::{Closer, Connection, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MuxError, Result};
use crate::shared::{lock, SharedWriter};
use crate::sink::ByteSink;

/// Where a packer is in its close lifecycle.
#[derive(Debug)]
enum CloseState {
    Open,
    /// The first `close` call is tearing the connection down.
    Closing,
    /// Torn down. Holds the close error, if it was a real failure.
    Closed(Option<Arc<std::io::Error>>),
}

/// Owns one connection: serialized header reads, shared packet writes, and a
/// close that runs exactly once.
pub struct Packer<R, W> {
    reader: Mutex<PacketReader<R>>,
    writer: SharedWriter<W>,
    closer: Box<dyn Closer>,
    state: Mutex<CloseState>,
    state_changed: Condvar,
}

impl Packer<Connection, Connection> {
    /// Wrap a connection with default configuration.
    pub fn new(conn: Connection) -> std::result::Result<Self, TransportError> {
        Self::with_config(conn, CodecConfig::default())
    }

    /// Wrap a connection, applying the timeouts and body limit from `config`.
    pub fn with_config(
        conn: Connection,
        config: CodecConfig,
    ) -> std::result::Result<Self, TransportError> {
        let read_half = conn.try_clone()?;
        let write_half = conn.try_clone()?;
        read_half.set_read_timeout(config.read_timeout)?;
        write_half.set_write_timeout(config.write_timeout)?;
        debug!(transport = conn.transport_name(), "packer attached");

        Ok(Self::from_parts(read_half, write_half, conn, config))
    }
}

impl<R: Read, W: Write> Packer<R, W> {
    /// Assemble a packer from a read half, a write half, and whatever closes them.
    ///
    /// Closing must make a read blocked on `reader` return, or `close` cannot
    /// interrupt a pending [`next_header`](Self::next_header).
    pub fn from_parts(
        reader: R,
        writer: W,
        closer: impl Closer + 'static,
        config: CodecConfig,
    ) -> Self {
        Self {
            reader: Mutex::new(PacketReader::with_config(reader, config.clone())),
            writer: SharedWriter::new(PacketWriter::with_config(writer, config)),
            closer: Box::new(closer),
            state: Mutex::new(CloseState::Open),
            state_changed: Condvar::new(),
        }
    }

    /// Read the next header (blocking).
    ///
    /// Only one read runs at a time; concurrent callers queue. Returns
    /// `Ok(None)` once the stream has ended, either because the peer finished
    /// cleanly or because this packer is being closed. If `cancel` fired while
    /// the read was in progress, returns [`MuxError::Cancelled`]. The request
    /// id of the returned header is negated, so streams opened by this side
    /// read back positive and streams opened by the peer read back negative.
    ///
    /// Cancellation is only observed once the underlying read returns; use a
    /// read timeout or [`close`](Self::close) to unblock a pending read.
    pub fn next_header(&self, cancel: &CancellationToken) -> Result<Option<Header>> {
        let mut reader = lock(&self.reader);
        let result = reader.read_header();
        self.finish_header(result, cancel)
    }

    /// Read the body belonging to the header just returned by `next_header`.
    pub fn read_body(&self, header: &Header) -> Result<Bytes> {
        let mut reader = lock(&self.reader);
        self.read_body_locked(&mut reader, header)
    }

    /// Read a header and its body as one unit.
    pub fn next_packet(&self, cancel: &CancellationToken) -> Result<Option<Packet>> {
        let mut reader = lock(&self.reader);
        let result = reader.read_header();
        let Some(header) = self.finish_header(result, cancel)? else {
            return Ok(None);
        };
        let body = self.read_body_locked(&mut reader, &header)?;
        Ok(Some(Packet {
            req: header.req,
            flags: header.flags,
            body,
        }))
    }

    fn finish_header(
        &self,
        result: std::result::Result<Header, CodecError>,
        cancel: &CancellationToken,
    ) -> Result<Option<Header>> {
        if self.is_closing() {
            if let Err(err) = &result {
                debug!(%err, "header read ended by close");
                return Ok(None);
            }
        } else if cancel.is_cancelled() {
            return Err(MuxError::Cancelled);
        }

        match result {
            Ok(mut header) => {
                header.req = header.req.wrapping_neg();
                Ok(Some(header))
            }
            Err(CodecError::Eof) => Ok(None),
            Err(err) => Err(MuxError::read(err)),
        }
    }

    fn read_body_locked(
        &self,
        reader: &mut MutexGuard<'_, PacketReader<R>>,
        header: &Header,
    ) -> Result<Bytes> {
        match reader.read_body(header.body_len()) {
            Ok(body) => Ok(body),
            Err(err) if self.is_closing() => {
                debug!(%err, "body read ended by close");
                Err(MuxError::EndOfStream)
            }
            Err(err) => Err(MuxError::read(err)),
        }
    }
}

impl<R, W: Write + Send + 'static> Packer<R, W> {
    /// A new sink writing through this connection.
    pub fn sink(&self) -> ByteSink {
        ByteSink::new(Arc::new(self.writer.clone()))
    }
}

impl<R, W: Write> Packer<R, W> {
    /// Handle to the shared writer. Every outgoing packet must go through it.
    pub fn writer(&self) -> SharedWriter<W> {
        self.writer.clone()
    }

    /// Tell the peer no more packets follow.
    pub fn write_goodbye(&self) -> Result<()> {
        self.writer.write_goodbye().map_err(MuxError::write)
    }
}

impl<R, W> Packer<R, W> {
    /// Close the connection.
    ///
    /// Safe to call repeatedly and from many threads; the connection is closed
    /// exactly once. Closing makes pending and future `next_header` calls report
    /// the end of the stream. Errors that only say the connection was already
    /// gone count as a clean close. Later calls return `Ok(())` after a clean
    /// close and [`MuxError::AlreadyClosed`] otherwise.
    pub fn close(&self) -> Result<()> {
        let mut state = lock(&self.state);
        loop {
            match &*state {
                CloseState::Open => break,
                CloseState::Closing => {
                    state = self
                        .state_changed
                        .wait(state)
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                }
                CloseState::Closed(None) => return Ok(()),
                CloseState::Closed(Some(err)) => {
                    return Err(MuxError::AlreadyClosed(Box::new(MuxError::Close(
                        Arc::clone(err),
                    ))));
                }
            }
        }
        *state = CloseState::Closing;
        drop(state);

        let recorded = match self.closer.close() {
            Ok(()) => None,
            Err(err) if self.closer.is_benign(&err) => {
                debug!(%err, "connection was already closed");
                None
            }
            Err(err) => {
                warn!(%err, "closing connection failed");
                Some(Arc::new(err))
            }
        };

        let mut state = lock(&self.state);
        *state = CloseState::Closed(recorded.clone());
        self.state_changed.notify_all();
        debug!("packer closed");

        match recorded {
            None => Ok(()),
            Some(err) => Err(MuxError::Close(err)),
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.is_closing()
    }

    fn is_closing(&self) -> bool {
        !matches!(*lock(&self.state), CloseState::Open)
    }
}
