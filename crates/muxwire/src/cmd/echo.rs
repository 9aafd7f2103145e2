use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use muxwire_codec::Packet;
use muxwire_mux::{end_reason, ByteSink, CancellationToken, MuxError, PacketWrite, Packer};

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{mux_error, transport_error, CliResult, SUCCESS};

/// Echo state for one connection: an open sink per stream the peer started.
struct EchoSession {
    writer: Arc<dyn PacketWrite>,
    sinks: HashMap<i32, ByteSink>,
}

impl EchoSession {
    fn new(writer: Arc<dyn PacketWrite>) -> Self {
        Self {
            writer,
            sinks: HashMap::new(),
        }
    }

    fn handle(&mut self, packet: &Packet) -> Result<(), MuxError> {
        if !packet.flags.is_stream() && !packet.flags.is_end_err() {
            return self
                .writer
                .write_packet(&Packet::new(packet.req, packet.flags, packet.body.clone()))
                .map_err(|err| MuxError::Write(Arc::new(err)));
        }

        let sink = self.sink_for(packet)?;
        if !packet.flags.is_end_err() {
            sink.write(&packet.body)?;
            return Ok(());
        }

        let result = match end_reason(packet) {
            Ok(()) => sink.close(),
            Err(err) => sink.close_with_error(Some(err)),
        };
        self.sinks.remove(&packet.req);
        result
    }

    fn sink_for(&mut self, packet: &Packet) -> Result<&ByteSink, MuxError> {
        match self.sinks.entry(packet.req) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let sink = ByteSink::new(Arc::clone(&self.writer));
                sink.bind(packet.req, packet.flags.is_stream())?;
                if !packet.flags.is_end_err() {
                    sink.set_encoding(packet.flags.encoding().into())?;
                }
                tracing::debug!(req = packet.req, "echo stream opened");
                Ok(entry.insert(sink))
            }
        }
    }

    /// End every stream the peer left open.
    fn finish(self) {
        for (req, sink) in self.sinks {
            if let Err(err) = sink.close_with_error(Some(MuxError::SessionTerminated)) {
                if !err.is_closed() {
                    tracing::warn!(req, error = %err, "failed ending stream");
                }
            }
        }
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let listener = args
        .endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let cancel = CancellationToken::new();

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        let conn = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let packer = Packer::new(conn).map_err(|err| transport_error("accept failed", err))?;
        let mut session = EchoSession::new(Arc::new(packer.writer()));

        while running.load(Ordering::SeqCst) {
            let packet = match packer.next_packet(&cancel) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(err) if err.is_closed() => break,
                Err(err) => return Err(mux_error("receive failed", err)),
            };
            if packet.is_goodbye() {
                tracing::debug!("peer said goodbye");
                let _ = packer.write_goodbye();
                break;
            }

            tracing::info!(
                req = packet.req,
                flags = %packet.flags,
                size = packet.body.len(),
                "echoing packet"
            );
            if let Err(err) = session.handle(&packet) {
                if err.is_closed() {
                    break;
                }
                return Err(mux_error("echo failed", err));
            }
        }

        session.finish();
        if let Err(err) = packer.close() {
            tracing::warn!(error = %err, "closing connection failed");
        }

        served = served.saturating_add(1);
        if args.connections.is_some_and(|limit| served >= limit) {
            break;
        }
    }

    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use muxwire_codec::{CodecError, Encoding, Flags};
    use muxwire_mux::{end_err_packet, end_okay_packet, CallError};

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Packet>>);

    impl PacketWrite for Recorder {
        fn write_packet(&self, packet: &Packet) -> Result<(), CodecError> {
            self.0.lock().unwrap().push(packet.clone());
            Ok(())
        }
    }

    fn session() -> (Arc<Recorder>, EchoSession) {
        let recorder = Arc::new(Recorder::default());
        let session = EchoSession::new(recorder.clone());
        (recorder, session)
    }

    #[test]
    fn echoes_stream_and_graceful_end() {
        let (recorder, mut session) = session();
        let flags = Flags::STREAM | Flags::from(Encoding::String);

        session.handle(&Packet::new(-3, flags, "one")).unwrap();
        session.handle(&Packet::new(-3, flags, "two")).unwrap();
        session.handle(&end_okay_packet(-3, true)).unwrap();

        let packets = recorder.0.lock().unwrap().clone();
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p.req == -3 && p.flags.is_stream()));
        assert_eq!(packets[0].flags.encoding(), Encoding::String);
        assert_eq!(packets[1].body.as_ref(), b"two");
        assert!(packets[2].flags.is_end_err());
        assert!(packets[2].body.is_empty());
        assert!(session.sinks.is_empty());
    }

    #[test]
    fn echoes_error_end() {
        let (recorder, mut session) = session();
        let end = end_err_packet(-1, true, &CallError::new("bad input").into()).unwrap();

        session.handle(&end).unwrap();

        let packets = recorder.0.lock().unwrap().clone();
        assert_eq!(packets.len(), 1);
        match end_reason(&packets[0]) {
            Err(MuxError::Call(err)) => assert_eq!(err.message, "bad input"),
            other => panic!("unexpected end reason: {other:?}"),
        }
    }

    #[test]
    fn single_packets_are_echoed_as_is() {
        let (recorder, mut session) = session();
        let packet = Packet::new(-9, Flags::from(Encoding::Json), "[1,2]");
        session.handle(&packet).unwrap();
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[packet]);
        assert!(session.sinks.is_empty());
    }

    #[test]
    fn finish_terminates_open_streams() {
        let (recorder, mut session) = session();
        session
            .handle(&Packet::new(-2, Flags::STREAM, "dangling"))
            .unwrap();
        session.finish();

        let packets = recorder.0.lock().unwrap().clone();
        let end = packets.last().unwrap();
        assert!(end.flags.is_end_err());
        match end_reason(end) {
            Err(MuxError::Call(err)) => assert_eq!(err.message, "session terminated"),
            other => panic!("unexpected end reason: {other:?}"),
        }
    }
}
