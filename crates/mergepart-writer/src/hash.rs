//! Content hashing for part files
//!
//! Every file is hashed in the same pass that writes it; nothing is re-read.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{self, Write};

/// 128-bit content hash (BLAKE3 output truncated to 16 bytes)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHash([u8; 16]);

impl FileHash {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        Self::from_hasher(&hasher)
    }

    pub(crate) fn from_hasher(hasher: &blake3::Hasher) -> Self {
        let mut out = [0u8; 16];
        hasher.finalize_xof().fill(&mut out);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for FileHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FileHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FileHash::from_hex(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid 128-bit hex hash '{}'", raw)))
    }
}

/// Write adapter that counts and hashes every byte passed to the inner writer
pub struct HashingWriter<W> {
    inner: W,
    hasher: blake3::Hasher,
    count: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: blake3::Hasher::new(),
            count: 0,
        }
    }

    /// Bytes accepted so far
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn hash(&self) -> FileHash {
        FileHash::from_hasher(&self.hasher)
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_writer_matches_one_shot_hash() {
        let mut writer = HashingWriter::new(Vec::new());
        writer.write_all(b"hello ").unwrap();
        writer.write_all(b"part").unwrap();

        assert_eq!(writer.count(), 10);
        assert_eq!(writer.hash(), FileHash::of(b"hello part"));
        assert_eq!(writer.into_inner(), b"hello part".to_vec());
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = FileHash::of(b"columns");
        assert_eq!(hash.to_hex().len(), 32);
        assert_eq!(FileHash::from_hex(&hash.to_hex()), Some(hash));
        assert_eq!(FileHash::from_hex("abc"), None);
    }
}
