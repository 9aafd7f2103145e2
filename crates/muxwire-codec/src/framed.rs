use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_packet, encode_packet, Packet, DEFAULT_MAX_BODY};
use crate::error::{CodecError, Result};

/// `tokio_util` codec for use with `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_body_size: usize,
}

impl PacketCodec {
    pub fn new(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        decode_packet(src, self.max_body_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::ConnectionClosed),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.body.len() > self.max_body_size {
            return Err(CodecError::BodyTooLarge {
                size: packet.body.len(),
                max: self.max_body_size,
            });
        }
        encode_packet(&packet, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::flags::{Encoding, Flags};

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, PacketCodec::default());
        let mut stream = FramedRead::new(server, PacketCodec::default());

        let first = Packet::new(1, Flags::STREAM | Flags::from(Encoding::Json), "{\"a\":1}");
        let last = Packet::new(1, Flags::STREAM | Flags::END_ERR, "");
        sink.send(first.clone()).await.unwrap();
        sink.send(last.clone()).await.unwrap();
        drop(sink);

        assert_eq!(stream.next().await.unwrap().unwrap(), first);
        assert_eq!(stream.next().await.unwrap().unwrap(), last);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn truncated_packet_is_connection_closed() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut stream = FramedRead::new(server, PacketCodec::default());

        tokio::io::AsyncWriteExt::write_all(&mut client, &[0, 0, 0, 0, 4, 0, 0, 0, 1, b'x'])
            .await
            .unwrap();
        drop(client);

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[test]
    fn encoder_enforces_limit() {
        let mut codec = PacketCodec::new(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Packet::new(1, Flags::empty(), "abc"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, CodecError::BodyTooLarge { .. }));
        assert!(dst.is_empty());
    }
}
