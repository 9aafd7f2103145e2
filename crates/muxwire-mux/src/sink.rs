use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use muxwire_codec::{Flags, Packet};
use tracing::{debug, trace};

use crate::encoding::RequestEncoding;
use crate::end::{end_err_packet, end_okay_packet};
use crate::error::{MuxError, Result};
use crate::shared::{lock, PacketWrite};

#[derive(Debug, Default)]
struct SinkState {
    /// Zero until bound.
    req: i32,
    flags: Flags,
    encoding_set: bool,
    written: bool,
    /// `Some` once closed; `EndOfStream` for a graceful close.
    closed: Option<MuxError>,
}

/// Write half of one logical stream.
///
/// Each [`write`](Self::write) becomes one packet carrying the sink's request
/// id and flags. The stream is ended by exactly one end packet, sent by the
/// first call to [`close`](Self::close) or
/// [`close_with_error`](Self::close_with_error). The sink never closes the
/// connection it writes to.
pub struct ByteSink {
    writer: Arc<dyn PacketWrite>,
    state: Mutex<SinkState>,
}

impl ByteSink {
    /// An unbound sink writing through `writer`.
    pub fn new(writer: Arc<dyn PacketWrite>) -> Self {
        Self {
            writer,
            state: Mutex::new(SinkState::default()),
        }
    }

    /// Bind the sink to its request id. `stream` marks every packet as part
    /// of an open-ended stream.
    pub fn bind(&self, req: i32, stream: bool) -> Result<()> {
        if req == 0 {
            return Err(MuxError::InvalidRequestId(req));
        }
        let mut state = lock(&self.state);
        if state.req != 0 {
            return Err(MuxError::RequestIdAlreadySet(state.req));
        }
        state.req = req;
        state.flags = state.flags.with_stream(stream);
        debug!(req, stream, "sink bound");
        Ok(())
    }

    /// Choose the body encoding. Allowed once, before the first write.
    pub fn set_encoding(&self, encoding: RequestEncoding) -> Result<()> {
        let mut state = lock(&self.state);
        if state.encoding_set || state.written || state.closed.is_some() {
            return Err(MuxError::EncodingLocked);
        }
        state.flags = state.flags.with_encoding(encoding.into());
        state.encoding_set = true;
        Ok(())
    }

    /// The bound request id, if any.
    pub fn request_id(&self) -> Option<i32> {
        match lock(&self.state).req {
            0 => None,
            req => Some(req),
        }
    }

    /// Flags stamped on every data packet.
    pub fn flags(&self) -> Flags {
        lock(&self.state).flags
    }

    /// Why the sink closed, if it has. `EndOfStream` means a graceful close.
    pub fn closed_reason(&self) -> Option<MuxError> {
        lock(&self.state).closed.clone()
    }

    /// Send `data` as one packet.
    ///
    /// Fails with the stored reason once the sink is closed, and with
    /// [`MuxError::RequestIdNotSet`] before it is bound; neither touches the
    /// connection. A failed send closes the sink with that error.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        if let Some(err) = &state.closed {
            return Err(err.clone());
        }
        if state.req == 0 {
            return Err(MuxError::RequestIdNotSet(state.flags));
        }

        let packet = Packet::new(state.req, state.flags, bytes::Bytes::copy_from_slice(data));
        state.written = true;
        match self.writer.write_packet(&packet) {
            Ok(()) => {
                trace!(req = state.req, len = data.len(), "sink wrote packet");
                Ok(data.len())
            }
            Err(err) => {
                let err = MuxError::write(err);
                debug!(req = state.req, %err, "sink write failed, closing");
                state.closed = Some(err.clone());
                Err(err)
            }
        }
    }

    /// End the stream, with `reason` as the error the peer sees.
    ///
    /// `None` or [`MuxError::EndOfStream`] ends it gracefully. Only the first
    /// call sends an end packet; later calls return `Ok(())` if the first was
    /// graceful and the original error otherwise. The sink counts as closed
    /// even if sending the end packet fails.
    pub fn close_with_error(&self, reason: Option<MuxError>) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(prior) = &state.closed {
            return if prior.is_graceful() {
                Ok(())
            } else {
                Err(prior.clone())
            };
        }

        let reason = reason.unwrap_or(MuxError::EndOfStream);
        state.closed = Some(reason.clone());
        if state.req == 0 {
            return Err(MuxError::RequestIdNotSet(state.flags));
        }

        let stream = state.flags.is_stream();
        let packet = if reason.is_graceful() {
            end_okay_packet(state.req, stream)
        } else {
            end_err_packet(state.req, stream, &reason)?
        };
        debug!(req = state.req, graceful = reason.is_graceful(), "sink closing");
        self.writer.write_packet(&packet).map_err(MuxError::write)
    }

    /// End the stream gracefully.
    pub fn close(&self) -> Result<()> {
        self.close_with_error(None)
    }
}

impl fmt::Debug for ByteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ByteSink")
            .field("req", &state.req)
            .field("flags", &state.flags)
            .field("closed", &state.closed)
            .finish()
    }
}

fn to_io_error(err: MuxError) -> io::Error {
    let kind = if err.is_closed() {
        io::ErrorKind::BrokenPipe
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

impl io::Write for &ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ByteSink::write(*self, buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ByteSink::write(self, buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
