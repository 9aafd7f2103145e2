use std::fmt;
use std::sync::Arc;

use muxwire_codec::{CodecError, Flags};
use serde::{Deserialize, Serialize};

/// An error that travels inside an end packet.
///
/// Serialized as the JSON body `{"name": ..., "message": ..., "stack": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl CallError {
    /// A plain `Error` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.into(),
            stack: None,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for CallError {}

/// Errors raised by the packer and byte sinks.
///
/// Cloneable: a sink keeps its terminal error and hands the same value to every
/// later caller, so I/O sources are shared behind `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MuxError {
    /// The stream ended gracefully.
    #[error("end of stream")]
    EndOfStream,

    /// The caller gave up waiting for the next header.
    #[error("read packet canceled: operation was cancelled")]
    Cancelled,

    /// Reading from the connection failed.
    #[error("error reading packet: {0}")]
    Read(#[source] Arc<CodecError>),

    /// Writing to the connection failed.
    #[error("error writing packet: {0}")]
    Write(#[source] Arc<CodecError>),

    /// Closing the underlying connection failed.
    #[error("error closing underlying connection: {0}")]
    Close(#[source] Arc<std::io::Error>),

    /// The packer was closed before, and that close failed.
    #[error("packer already closed: {0}")]
    AlreadyClosed(#[source] Box<MuxError>),

    /// A sink was written to before its request id was bound.
    #[error("request id not set (flags: {0})")]
    RequestIdNotSet(Flags),

    /// Zero is not a usable request id.
    #[error("request id {0} is not valid for a stream")]
    InvalidRequestId(i32),

    /// The sink is already bound to a request id.
    #[error("request id already set to {0}")]
    RequestIdAlreadySet(i32),

    /// A raw encoding selector outside the known set.
    #[error("unknown request encoding {0:?}")]
    UnknownEncoding(String),

    /// The encoding was already chosen, or data was already written.
    #[error("encoding can only be set once, before the first write")]
    EncodingLocked,

    /// The error description could not be serialized into an end packet.
    #[error("building error packet for {reason}: {source}")]
    EndPacket {
        reason: String,
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// An error received from, or sent to, the peer.
    #[error(transparent)]
    Call(#[from] CallError),

    /// Data was poured into a sink that is already closed.
    #[error("pour to closed sink")]
    SinkClosed,

    /// The session above this layer has shut down.
    #[error("session terminated")]
    SessionTerminated,
}

impl MuxError {
    /// Whether this is a graceful end rather than a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, MuxError::EndOfStream)
    }

    /// Whether this error only says the stream or connection is already closed.
    pub fn is_closed(&self) -> bool {
        match self {
            MuxError::EndOfStream | MuxError::SinkClosed | MuxError::SessionTerminated => true,
            MuxError::Read(err) | MuxError::Write(err) => err.is_closed(),
            MuxError::Close(err) => muxwire_transport::is_already_closed(&**err),
            MuxError::AlreadyClosed(inner) => inner.is_closed(),
            _ => false,
        }
    }

    pub(crate) fn read(err: CodecError) -> Self {
        MuxError::Read(Arc::new(err))
    }

    pub(crate) fn write(err: CodecError) -> Self {
        MuxError::Write(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
