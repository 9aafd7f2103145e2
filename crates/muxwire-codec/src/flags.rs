use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{CodecError, Result};

const STREAM_BIT: u8 = 0b0000_0001;
const END_ERR_BIT: u8 = 0b0000_0010;
const ENCODING_MASK: u8 = 0b0000_1100;
const ENCODING_SHIFT: u8 = 2;
const KNOWN_BITS: u8 = STREAM_BIT | END_ERR_BIT | ENCODING_MASK;

/// How a packet body is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Opaque bytes.
    #[default]
    Binary,
    /// UTF-8 text.
    String,
    /// A JSON document.
    Json,
}

impl Encoding {
    /// Decode the 2-bit encoding field. `0b11` is unassigned.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b00 => Some(Encoding::Binary),
            0b01 => Some(Encoding::String),
            0b10 => Some(Encoding::Json),
            _ => None,
        }
    }

    /// The 2-bit encoding field.
    pub fn bits(self) -> u8 {
        match self {
            Encoding::Binary => 0b00,
            Encoding::String => 0b01,
            Encoding::Json => 0b10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::String => "string",
            Encoding::Json => "json",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The flag byte of a packet header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// The packet belongs to an open-ended stream.
    pub const STREAM: Flags = Flags(STREAM_BIT);
    /// The packet terminates its stream, gracefully or with an error.
    pub const END_ERR: Flags = Flags(END_ERR_BIT);

    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Parse a flag byte read off the wire.
    ///
    /// Reserved high bits are dropped; an unassigned encoding is rejected.
    pub fn from_bits(byte: u8) -> Result<Self> {
        let flags = Flags(byte & KNOWN_BITS);
        if Encoding::from_bits(flags.encoding_bits()).is_none() {
            return Err(CodecError::InvalidEncoding(byte));
        }
        Ok(flags)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_stream(self) -> bool {
        self.0 & STREAM_BIT != 0
    }

    pub const fn is_end_err(self) -> bool {
        self.0 & END_ERR_BIT != 0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The body encoding. Flags built through this API always carry a valid one.
    pub fn encoding(self) -> Encoding {
        Encoding::from_bits(self.encoding_bits()).unwrap_or_default()
    }

    /// A copy with the encoding field replaced.
    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Flags((self.0 & !ENCODING_MASK) | (encoding.bits() << ENCODING_SHIFT))
    }

    /// A copy with the stream bit set or cleared.
    pub fn with_stream(self, stream: bool) -> Self {
        if stream {
            Flags(self.0 | STREAM_BIT)
        } else {
            Flags(self.0 & !STREAM_BIT)
        }
    }

    fn encoding_bits(self) -> u8 {
        (self.0 & ENCODING_MASK) >> ENCODING_SHIFT
    }
}

impl From<Encoding> for Flags {
    fn from(encoding: Encoding) -> Self {
        Flags::empty().with_encoding(encoding)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        let mut out = Flags(self.0 | (rhs.0 & !ENCODING_MASK));
        if rhs.encoding_bits() != 0 {
            out = out.with_encoding(rhs.encoding());
        }
        out
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        *self = *self | rhs;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stream() {
            f.write_str("stream|")?;
        }
        if self.is_end_err() {
            f.write_str("end|")?;
        }
        f.write_str(self.encoding().name())
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({self})")
    }
}
