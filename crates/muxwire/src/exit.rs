use std::fmt;
use std::io;

use muxwire_codec::CodecError;
use muxwire_mux::MuxError;
use muxwire_transport::TransportError;

// Exit codes follow the sysexits-style layout used across our tools.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const REMOTE_ERROR: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(err.kind()), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match (&err, err.io_source()) {
        (TransportError::InvalidEndpoint(_), _) => USAGE,
        (_, Some(source)) => io_code(source.kind()),
        (_, None) => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: &CodecError) -> CliError {
    match err {
        CodecError::Io(source) if source.kind() != io::ErrorKind::UnexpectedEof => {
            CliError::new(io_code(source.kind()), format!("{context}: {err}"))
        }
        CodecError::InvalidEncoding(_) | CodecError::BodyTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        CodecError::Io(_) | CodecError::Eof | CodecError::ConnectionClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn mux_error(context: &str, err: MuxError) -> CliError {
    match &err {
        MuxError::Read(codec) | MuxError::Write(codec) => codec_error(context, codec),
        MuxError::Close(source) => {
            CliError::new(io_code(source.kind()), format!("{context}: {err}"))
        }
        MuxError::Call(_) => CliError::new(REMOTE_ERROR, format!("{context}: {err}")),
        MuxError::Cancelled => CliError::new(TIMEOUT, format!("{context}: {err}")),
        MuxError::UnknownEncoding(_)
        | MuxError::InvalidRequestId(_)
        | MuxError::RequestIdNotSet(_) => CliError::new(USAGE, format!("{context}: {err}")),
        MuxError::EndPacket { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        _ if err.is_closed() => CliError::new(FAILURE, format!("{context}: {err}")),
        _ => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use muxwire_mux::CallError;

    use super::*;

    #[test]
    fn read_timeout_maps_to_timeout_code() {
        let err = MuxError::Read(Arc::new(CodecError::Io(io::ErrorKind::WouldBlock.into())));
        assert_eq!(mux_error("receive failed", err).code, TIMEOUT);
    }

    #[test]
    fn remote_error_has_its_own_code() {
        let err = mux_error("stream ended", CallError::new("nope").into());
        assert_eq!(err.code, REMOTE_ERROR);
        assert_eq!(err.message, "stream ended: Error: nope");
    }

    #[test]
    fn transport_errors_use_their_io_kind() {
        let refused = TransportError::Connect {
            addr: "/tmp/nobody.sock".into(),
            source: io::ErrorKind::ConnectionRefused.into(),
        };
        let err = transport_error("connect failed", refused);
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect failed: failed to connect to /tmp/nobody.sock"));

        let denied = TransportError::Bind {
            addr: "/root/x.sock".into(),
            source: io::ErrorKind::PermissionDenied.into(),
        };
        assert_eq!(transport_error("bind failed", denied).code, PERMISSION_DENIED);

        let long = TransportError::PathTooLong {
            path: "/tmp/deep".into(),
            len: 200,
            max: 107,
        };
        assert_eq!(transport_error("bind failed", long).code, TRANSPORT_ERROR);

        let bad = TransportError::InvalidEndpoint("ftp://x".into());
        assert_eq!(transport_error("bind failed", bad).code, USAGE);
    }

    #[test]
    fn oversized_body_is_invalid_data() {
        let err = codec_error("decode failed", &CodecError::BodyTooLarge { size: 9, max: 1 });
        assert_eq!(err.code, DATA_INVALID);
    }
}
