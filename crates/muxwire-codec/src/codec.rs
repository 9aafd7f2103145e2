use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::flags::Flags;

/// Packet header: flags (1) + body length (4) + request id (4) = 9 bytes.
pub const HEADER_SIZE: usize = 9;

/// Largest body length the header can describe.
pub const MAX_BODY_LEN: usize = u32::MAX as usize;

/// Default maximum body size accepted by readers and writers: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Describes one packet without its body.
///
/// `req` is signed: the sign tells which peer opened the stream. Zero is never
/// a real stream; an all-zero header is the goodbye marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header {
    pub flags: Flags,
    pub len: u32,
    pub req: i32,
}

impl Header {
    /// Serialize into the 9 wire bytes.
    ///
    /// ```text
    /// ┌───────┬─────────────┬──────────────┐
    /// │ Flags │ Body length │ Request id   │
    /// │ (1B)  │ (4B BE u32) │ (4B BE i32)  │
    /// └───────┴─────────────┴──────────────┘
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.flags.bits();
        out[1..5].copy_from_slice(&self.len.to_be_bytes());
        out[5..9].copy_from_slice(&self.req.to_be_bytes());
        out
    }

    /// Parse the 9 wire bytes.
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Result<Self> {
        let flags = Flags::from_bits(raw[0])?;
        let len = u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]);
        let req = i32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]]);
        Ok(Self { flags, len, req })
    }

    /// Whether this is the all-zero goodbye marker.
    pub fn is_goodbye(&self) -> bool {
        *self == Header::default()
    }

    pub fn body_len(&self) -> usize {
        self.len as usize
    }
}

/// One framed unit on the wire: a header plus its body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub req: i32,
    pub flags: Flags,
    pub body: Bytes,
}

impl Packet {
    pub fn new(req: i32, flags: Flags, body: impl Into<Bytes>) -> Self {
        Self {
            req,
            flags,
            body: body.into(),
        }
    }

    /// The goodbye marker: no flags, no body, request id zero.
    pub fn goodbye() -> Self {
        Self::default()
    }

    pub fn is_goodbye(&self) -> bool {
        *self == Self::default()
    }

    /// The header describing this packet.
    pub fn header(&self) -> Result<Header> {
        let len = u32::try_from(self.body.len()).map_err(|_| CodecError::BodyTooLarge {
            size: self.body.len(),
            max: MAX_BODY_LEN,
        })?;
        Ok(Header {
            flags: self.flags,
            len,
            req: self.req,
        })
    }

    /// The total wire size of this packet (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }
}

/// Append the wire form of `packet` to `dst`.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) -> Result<()> {
    let header = packet.header()?;
    dst.reserve(packet.wire_size());
    dst.put_slice(&header.encode());
    dst.put_slice(&packet.body);
    Ok(())
}

/// Decode the header at the front of `src` without consuming anything.
///
/// Returns `Ok(None)` until all 9 header bytes are buffered.
pub fn peek_header(src: &[u8]) -> Result<Option<Header>> {
    match src.get(..HEADER_SIZE) {
        Some(raw) => {
            let mut fixed = [0u8; HEADER_SIZE];
            fixed.copy_from_slice(raw);
            Header::decode(&fixed).map(Some)
        }
        None => Ok(None),
    }
}

/// Decode one packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut, max_body: usize) -> Result<Option<Packet>> {
    let Some(header) = peek_header(src)? else {
        return Ok(None);
    };

    if header.body_len() > max_body {
        return Err(CodecError::BodyTooLarge {
            size: header.body_len(),
            max: max_body,
        });
    }

    if src.len() < HEADER_SIZE + header.body_len() {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(header.body_len()).freeze();

    Ok(Some(Packet {
        req: header.req,
        flags: header.flags,
        body,
    }))
}

/// Configuration for packet readers and writers.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_body_size: usize,
    /// Read timeout applied to connections by `with_config_stream`.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout applied to connections by `with_config_stream`.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Encoding;

    fn all_flag_combinations() -> Vec<Flags> {
        let mut out = Vec::new();
        for encoding in [Encoding::Binary, Encoding::String, Encoding::Json] {
            for stream in [false, true] {
                for end in [false, true] {
                    let mut flags = Flags::from(encoding).with_stream(stream);
                    if end {
                        flags |= Flags::END_ERR;
                    }
                    out.push(flags);
                }
            }
        }
        out
    }

    #[test]
    fn header_wire_layout() {
        let header = Header {
            flags: Flags::STREAM | Flags::from(Encoding::Json),
            len: 0x0102_0304,
            req: -2,
        };
        assert_eq!(
            header.encode(),
            [0x09, 0x01, 0x02, 0x03, 0x04, 0xFF, 0xFF, 0xFF, 0xFE]
        );
        assert_eq!(Header::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn packets_survive_every_flag_combination() {
        let bodies: [&[u8]; 3] = [b"", b"x", b"{\"hello\":\"world\"}"];
        for flags in all_flag_combinations() {
            for body in bodies {
                for req in [1, -1, 7, i32::MAX, i32::MIN] {
                    let packet = Packet::new(req, flags, Bytes::copy_from_slice(body));
                    let mut buf = BytesMut::new();
                    encode_packet(&packet, &mut buf).unwrap();
                    assert_eq!(buf.len(), packet.wire_size());

                    let decoded = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
                    assert_eq!(decoded, packet);
                    assert!(buf.is_empty());
                }
            }
        }
    }

    #[test]
    fn header_carries_maximum_length() {
        let header = Header {
            flags: Flags::empty(),
            len: u32::MAX,
            req: 3,
        };
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded.body_len(), MAX_BODY_LEN);
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        assert!(decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::new(1, Flags::empty(), "hello"), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn decode_body_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u32(1024);
        buf.put_i32(1);

        let result = decode_packet(&mut buf, 16);
        assert!(matches!(
            result,
            Err(CodecError::BodyTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn decode_invalid_encoding() {
        let mut buf = BytesMut::from(&[0x0C, 0, 0, 0, 0, 0, 0, 0, 1][..]);
        let result = decode_packet(&mut buf, DEFAULT_MAX_BODY);
        assert!(matches!(result, Err(CodecError::InvalidEncoding(0x0C))));
    }

    #[test]
    fn multiple_packets_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::new(1, Flags::STREAM, "first"), &mut buf).unwrap();
        encode_packet(&Packet::new(-2, Flags::END_ERR, "second"), &mut buf).unwrap();

        let p1 = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();
        let p2 = decode_packet(&mut buf, DEFAULT_MAX_BODY).unwrap().unwrap();

        assert_eq!((p1.req, p1.body.as_ref()), (1, b"first".as_ref()));
        assert_eq!((p2.req, p2.body.as_ref()), (-2, b"second".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn goodbye_is_nine_zero_bytes() {
        let mut buf = BytesMut::new();
        encode_packet(&Packet::goodbye(), &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0u8; HEADER_SIZE]);

        let header = peek_header(&buf).unwrap().unwrap();
        assert!(header.is_goodbye());
        assert!(!Header { req: 1, ..header }.is_goodbye());
    }
}
