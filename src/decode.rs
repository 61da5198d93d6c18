// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Character encoding of file content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Encoding {
    /// Raw bytes, no decoding
    #[serde(rename = "nop")]
    Nop,
    /// UTF-8, invalid sequences replaced with U+FFFD
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    /// UTF-8, invalid sequences are a decode error
    #[serde(rename = "utf-8-strict", alias = "utf8-strict")]
    Utf8Strict,
    /// 7-bit ASCII, anything else is a decode error
    #[serde(rename = "ascii")]
    Ascii,
}

impl Encoding {
    /// Decode one record. A failure drops only this record.
    pub fn decode(&self, raw: &[u8]) -> Result<Bytes> {
        match self {
            Encoding::Nop => Ok(Bytes::copy_from_slice(raw)),
            Encoding::Utf8 => Ok(match String::from_utf8_lossy(raw) {
                std::borrow::Cow::Borrowed(_) => Bytes::copy_from_slice(raw),
                std::borrow::Cow::Owned(s) => Bytes::from(s),
            }),
            Encoding::Utf8Strict => std::str::from_utf8(raw)
                .map(|_| Bytes::copy_from_slice(raw))
                .map_err(|e| Error::Decode(e.to_string())),
            Encoding::Ascii => match raw.iter().position(|b| !b.is_ascii()) {
                None => Ok(Bytes::copy_from_slice(raw)),
                Some(i) => Err(Error::Decode(format!(
                    "non-ascii byte 0x{:02x} at position {}",
                    raw[i], i
                ))),
            },
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nop" | "" => Ok(Encoding::Nop),
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-strict" | "utf8-strict" => Ok(Encoding::Utf8Strict),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            other => Err(Error::Config(format!("unsupported encoding '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_replaces_invalid() {
        let decoded = Encoding::Utf8.decode(b"ok \xff end").unwrap();
        assert_eq!(&decoded[..], "ok \u{FFFD} end".as_bytes());
    }

    #[test]
    fn test_utf8_strict_rejects_invalid() {
        assert!(Encoding::Utf8Strict.decode(b"fine").is_ok());
        assert!(matches!(
            Encoding::Utf8Strict.decode(b"bad \xc3\x28"),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_ascii() {
        assert!(Encoding::Ascii.decode(b"plain").is_ok());
        assert!(Encoding::Ascii.decode("caf\u{e9}".as_bytes()).is_err());
    }

    #[test]
    fn test_nop_keeps_bytes() {
        let decoded = Encoding::Nop.decode(b"\x00\xff").unwrap();
        assert_eq!(&decoded[..], b"\x00\xff");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("nop".parse::<Encoding>().unwrap(), Encoding::Nop);
        assert!("latin-9".parse::<Encoding>().is_err());

        let enc: Encoding = serde_json::from_str("\"utf8-strict\"").unwrap();
        assert_eq!(enc, Encoding::Utf8Strict);
    }
}
