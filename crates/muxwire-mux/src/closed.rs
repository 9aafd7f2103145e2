use std::error::Error;

use muxwire_codec::CodecError;

use crate::error::MuxError;

/// Whether `err` only reports that the connection or stream is already gone.
///
/// Understands errors from every layer of this workspace: [`MuxError`],
/// [`CodecError`], and the transport's I/O errors, however deeply they are
/// wrapped. Use it to keep shutdown noise out of error reports.
pub fn is_already_closed(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(mux) = err.downcast_ref::<MuxError>() {
            if mux.is_closed() {
                return true;
            }
        } else if let Some(codec) = err.downcast_ref::<CodecError>() {
            if codec.is_closed() {
                return true;
            }
        } else if let Some(inner) = err
            .downcast_ref::<std::io::Error>()
            .and_then(|io_err| io_err.get_ref())
        {
            if is_already_closed(inner) {
                return true;
            }
        }
        current = err.source();
    }
    muxwire_transport::is_already_closed(err)
}
