use std::fmt;
use std::str::FromStr;

use muxwire_codec::{Encoding, Flags};
use serde::{Deserialize, Serialize};

use crate::error::MuxError;

/// The body encoding a caller selects for a stream.
///
/// Raw selectors coming from outside (config, the command line, a numeric
/// field) go through `TryFrom<u8>` or `FromStr`, which reject anything unknown
/// instead of falling back to binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestEncoding {
    Binary,
    String,
    Json,
}

impl RequestEncoding {
    /// The flag bits this encoding sets.
    pub fn as_flags(self) -> Flags {
        Flags::from(Encoding::from(self))
    }
}

impl From<RequestEncoding> for Encoding {
    fn from(encoding: RequestEncoding) -> Self {
        match encoding {
            RequestEncoding::Binary => Encoding::Binary,
            RequestEncoding::String => Encoding::String,
            RequestEncoding::Json => Encoding::Json,
        }
    }
}

impl From<Encoding> for RequestEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => RequestEncoding::Binary,
            Encoding::String => RequestEncoding::String,
            Encoding::Json => RequestEncoding::Json,
        }
    }
}

impl TryFrom<u8> for RequestEncoding {
    type Error = MuxError;

    fn try_from(raw: u8) -> Result<Self, MuxError> {
        Encoding::from_bits(raw)
            .map(Into::into)
            .ok_or_else(|| MuxError::UnknownEncoding(format!("{raw:#04x}")))
    }
}

impl FromStr for RequestEncoding {
    type Err = MuxError;

    fn from_str(s: &str) -> Result<Self, MuxError> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(RequestEncoding::Binary),
            "string" | "utf8" | "utf-8" => Ok(RequestEncoding::String),
            "json" => Ok(RequestEncoding::Json),
            _ => Err(MuxError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for RequestEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Encoding::from(*self).name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_codec_flags() {
        assert_eq!(RequestEncoding::Binary.as_flags().bits(), 0b0000);
        assert_eq!(RequestEncoding::String.as_flags().bits(), 0b0100);
        assert_eq!(RequestEncoding::Json.as_flags().bits(), 0b1000);
    }

    #[test]
    fn raw_selector_outside_known_set_is_rejected() {
        assert_eq!(RequestEncoding::try_from(2).unwrap(), RequestEncoding::Json);
        let err = RequestEncoding::try_from(3).unwrap_err();
        assert!(matches!(err, MuxError::UnknownEncoding(ref s) if s == "0x03"));
    }

    #[test]
    fn parses_names() {
        assert_eq!("JSON".parse::<RequestEncoding>().unwrap(), RequestEncoding::Json);
        assert_eq!("utf8".parse::<RequestEncoding>().unwrap(), RequestEncoding::String);
        assert!("msgpack".parse::<RequestEncoding>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&RequestEncoding::String).unwrap();
        assert_eq!(json, "\"string\"");
    }
}
