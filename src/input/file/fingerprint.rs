// SPDX-License-Identifier: Apache-2.0

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A fingerprint identifies a file by the first N bytes of its content.
///
/// Two fingerprints refer to the same file when one is a byte prefix of the
/// other, which lets a file be recognised after it grows, is renamed, or is
/// reopened through a different path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    first_bytes: Vec<u8>,
}

impl Fingerprint {
    /// Read up to `size` bytes from the start of `file`.
    ///
    /// When `decompress_if_needed` is set and the file starts with the gzip
    /// magic bytes, the fingerprint is taken from the decompressed stream
    /// instead. A corrupt stream yields whatever decompressed cleanly.
    pub fn new_from_file(file: &File, size: usize, decompress_if_needed: bool) -> io::Result<Self> {
        let mut source = file;
        let mut first_bytes = Vec::with_capacity(size);

        if decompress_if_needed && is_gzip(file)? {
            source.seek(SeekFrom::Start(0))?;
            let decoder = MultiGzDecoder::new(source);
            match decoder.take(size as u64).read_to_end(&mut first_bytes) {
                Ok(_) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::InvalidData
                            | io::ErrorKind::InvalidInput
                            | io::ErrorKind::UnexpectedEof
                    ) => {}
                Err(e) => return Err(e),
            }
            return Ok(Self { first_bytes });
        }

        source.seek(SeekFrom::Start(0))?;
        source.take(size as u64).read_to_end(&mut first_bytes)?;

        Ok(Self { first_bytes })
    }

    /// Create a fingerprint from raw bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { first_bytes: bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.first_bytes
    }

    pub fn len(&self) -> usize {
        self.first_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_bytes.is_empty()
    }

    /// Hex encoding of at most the first `n` bytes, for log fields.
    pub fn hex_head(&self, n: usize) -> String {
        hex::encode(&self.first_bytes[..n.min(self.first_bytes.len())])
    }

    /// Check if this fingerprint starts with another fingerprint.
    ///
    /// An empty `other` never matches, so an empty file is never mistaken
    /// for any other file.
    pub fn starts_with(&self, other: &Fingerprint) -> bool {
        let other_len = other.first_bytes.len();

        if other_len == 0 || other_len > self.first_bytes.len() {
            return false;
        }

        self.first_bytes[..other_len] == other.first_bytes[..]
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprint")
            .field("len", &self.first_bytes.len())
            .field("head", &self.hex_head(16))
            .finish()
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.first_bytes))
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Fingerprint::from_bytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Whether the file content begins with the gzip magic bytes.
pub(crate) fn is_gzip(file: &File) -> io::Result<bool> {
    let mut source = file;
    let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
    source.seek(SeekFrom::Start(0))?;
    source
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut magic)?;
    Ok(magic == GZIP_MAGIC)
}
