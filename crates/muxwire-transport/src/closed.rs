use std::error::Error as StdError;
use std::io::{self, ErrorKind};

/// Whether `err`, or anything it wraps, only says the connection is gone.
///
/// Clean EOF, a closed handle, a broken pipe, and a reset by the peer are the
/// expected symptoms of a connection that one side tore down on purpose. They
/// are reported here regardless of how deeply they are wrapped: the source
/// chain is walked, and custom payloads inside `io::Error` are unwrapped.
pub fn is_already_closed(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_closed_io(io_err) {
                return true;
            }
            if let Some(inner) = io_err.get_ref() {
                if is_already_closed(inner) {
                    return true;
                }
            }
        }
        current = err.source();
    }
    false
}

/// The single-level check behind [`is_already_closed`].
pub fn is_closed_io(err: &io::Error) -> bool {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected => true,
        _ => is_closed_errno(err.raw_os_error()),
    }
}

#[cfg(unix)]
fn is_closed_errno(code: Option<i32>) -> bool {
    matches!(
        code,
        Some(libc::EBADF) | Some(libc::EPIPE) | Some(libc::ECONNRESET)
    )
}

#[cfg(not(unix))]
fn is_closed_errno(_code: Option<i32>) -> bool {
    false
}
