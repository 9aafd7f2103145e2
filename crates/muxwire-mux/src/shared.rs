use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use muxwire_codec::{CodecError, Packet, PacketWriter};

/// Where a [`ByteSink`](crate::ByteSink) sends its packets.
///
/// Implementations must write each packet as one unit, even when called from
/// many threads at once.
pub trait PacketWrite: Send + Sync {
    fn write_packet(&self, packet: &Packet) -> Result<(), CodecError>;
}

/// Cloneable handle to the one writer of a connection.
///
/// All clones share one lock, which is the only place outgoing packets are
/// serialized; every sink on the connection writes through it.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<PacketWriter<W>>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> SharedWriter<W> {
    pub fn new(writer: PacketWriter<W>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one packet while holding the connection's write lock.
    pub fn write_packet(&self, packet: &Packet) -> Result<(), CodecError> {
        lock(&self.inner).write_packet(packet)
    }

    /// Write the goodbye marker.
    pub fn write_goodbye(&self) -> Result<(), CodecError> {
        lock(&self.inner).write_goodbye()
    }
}

impl<W: Write + Send> PacketWrite for SharedWriter<W> {
    fn write_packet(&self, packet: &Packet) -> Result<(), CodecError> {
        SharedWriter::write_packet(self, packet)
    }
}

/// Lock a mutex, taking over the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its data consistent before it
/// can panic, so a poisoned lock carries no broken invariant.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use muxwire_codec::{decode_packet, Flags, DEFAULT_MAX_BODY};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    /// Accepts at most 3 bytes per call so an unlocked writer would interleave.
    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            lock(&self.0).extend_from_slice(&buf[..n]);
            std::thread::yield_now();
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn concurrent_writers_never_interleave_packets() {
        let buffer = SharedBuffer::default();
        let writer = SharedWriter::new(PacketWriter::new(buffer.clone()));

        let threads: Vec<_> = (1..=8)
            .map(|req| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let body = format!("stream-{req}-chunk-{i}");
                        writer
                            .write_packet(&Packet::new(req, Flags::STREAM, body))
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let mut wire = BytesMut::from(lock(&buffer.0).as_slice());
        let mut next_chunk = [0usize; 9];
        let mut total = 0;
        while let Some(packet) = decode_packet(&mut wire, DEFAULT_MAX_BODY).unwrap() {
            let req = packet.req as usize;
            let expected = format!("stream-{req}-chunk-{}", next_chunk[req]);
            assert_eq!(packet.body.as_ref(), expected.as_bytes());
            next_chunk[req] += 1;
            total += 1;
        }
        assert_eq!(total, 8 * 50);
        assert!(wire.is_empty());
    }

    #[test]
    fn goodbye_goes_through_shared_lock() {
        let writer = SharedWriter::new(PacketWriter::new(Cursor::new(Vec::new())));
        writer.clone().write_goodbye().unwrap();
        let bytes = lock(&writer.inner).get_ref().get_ref().clone();
        assert_eq!(bytes, vec![0u8; 9]);
    }
}
