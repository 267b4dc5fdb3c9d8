//! Checksum ledger for part files
//!
//! Maps every file of a part to its size and content hash. The ledger only
//! grows while a part is written; claiming a name twice is a logic bug and is
//! rejected instead of overwritten.

use crate::error::{PartWriterError, Result};
use crate::hash::FileHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};

const CHECKSUMS_FORMAT_HEADER: &str = "checksums format version: 1\n";

/// Size and hash of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumEntry {
    pub size: u64,
    pub hash: FileHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checksums {
    files: BTreeMap<String, ChecksumEntry>,
}

impl Checksums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, size: u64, hash: FileHash) -> Result<()> {
        let name = name.into();
        if self.files.contains_key(&name) {
            return Err(PartWriterError::logical(format!(
                "checksum for '{}' is already registered; two writers claimed the same file",
                name
            )));
        }
        self.files.insert(name, ChecksumEntry { size, hash });
        Ok(())
    }

    pub fn remove_file(&mut self, name: &str) -> Option<ChecksumEntry> {
        self.files.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ChecksumEntry> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChecksumEntry)> {
        self.files.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn total_size_on_disk(&self) -> u64 {
        self.files.values().map(|entry| entry.size).sum()
    }

    /// Single hash summarizing every entry, used when a nested part is
    /// recorded in its parent's ledger.
    pub fn total_hash(&self) -> FileHash {
        let mut hasher = blake3::Hasher::new();
        for (name, entry) in &self.files {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&entry.size.to_le_bytes());
            hasher.update(entry.hash.as_bytes());
        }
        FileHash::from_hasher(&hasher)
    }

    /// Serialize in the `checksums.txt` format
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(CHECKSUMS_FORMAT_HEADER.as_bytes())?;
        serde_json::to_writer_pretty(&mut *out, &self.files)?;
        out.write_all(b"\n")
    }

    /// Parse the `checksums.txt` format
    pub fn read(data: &[u8]) -> Result<Self> {
        let body = data
            .strip_prefix(CHECKSUMS_FORMAT_HEADER.as_bytes())
            .ok_or_else(|| {
                PartWriterError::encoding("checksums.txt", "missing format version header")
            })?;
        let files: BTreeMap<String, ChecksumEntry> = serde_json::from_slice(body)
            .map_err(|e| PartWriterError::encoding("checksums.txt", e))?;
        Ok(Self { files })
    }
}
