//! End packets: the last packet of a logical stream.

use std::sync::Arc;

use muxwire_codec::{Encoding, Flags, Packet};

use crate::error::{CallError, MuxError, Result};

/// The end packet for a stream that finished without error.
///
/// Body is empty; `END_ERR` is set, plus `STREAM` when the stream was one.
pub fn end_okay_packet(req: i32, stream: bool) -> Packet {
    Packet::new(req, Flags::END_ERR.with_stream(stream), bytes::Bytes::new())
}

/// The end packet carrying `err` to the peer as a JSON [`CallError`].
pub fn end_err_packet(req: i32, stream: bool, err: &MuxError) -> Result<Packet> {
    let call_error = match err {
        MuxError::Call(call_error) => call_error.clone(),
        other => CallError::new(other.to_string()),
    };
    let body = serde_json::to_vec(&call_error).map_err(|source| MuxError::EndPacket {
        reason: err.to_string(),
        source: Arc::new(source),
    })?;
    let flags = (Flags::END_ERR | Flags::from(Encoding::Json)).with_stream(stream);
    Ok(Packet::new(req, flags, body))
}

/// How the stream ended, given its end packet.
///
/// An empty body, or the JSON literal `true`, means it ended gracefully. A
/// JSON error object becomes [`MuxError::Call`]; any other body is passed on as
/// the error message.
pub fn end_reason(packet: &Packet) -> Result<()> {
    let body = packet.body.as_ref();
    if body.is_empty() {
        return Ok(());
    }
    if packet.flags.encoding() == Encoding::Json {
        let value = serde_json::from_slice::<serde_json::Value>(body);
        if matches!(value, Ok(serde_json::Value::Bool(true))) {
            return Ok(());
        }
        if let Ok(call_error) = serde_json::from_slice::<CallError>(body) {
            return Err(MuxError::Call(call_error));
        }
    }
    Err(MuxError::Call(CallError::new(
        String::from_utf8_lossy(body).into_owned(),
    )))
}
