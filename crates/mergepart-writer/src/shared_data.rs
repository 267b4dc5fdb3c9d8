//! Registration of finished parts with shared (zero-copy) storage

use crate::error::{PartWriterError, Result};
use crate::hash::FileHash;
use crate::part::DataPart;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

/// Called once a part is durable so other replicas may reference its files
pub trait SharedDataLock: Send + Sync {
    fn lock_shared_data(&self, part: &DataPart) -> Result<()>;
}

/// For parts on local storage nobody else reads
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSharedDataLock;

impl SharedDataLock for NoopSharedDataLock {
    fn lock_shared_data(&self, _part: &DataPart) -> Result<()> {
        Ok(())
    }
}

/// What the registry remembers about a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedPartRecord {
    pub rows: u64,
    pub bytes_on_disk: u64,
    pub checksum: FileHash,
}

/// Process-local registry keyed by part path
#[derive(Debug, Default)]
pub struct InMemorySharedDataRegistry {
    parts: Mutex<BTreeMap<String, SharedPartRecord>>,
}

impl InMemorySharedDataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<SharedPartRecord> {
        self.parts.lock().get(path).copied()
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.parts.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.parts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.lock().is_empty()
    }
}

impl SharedDataLock for InMemorySharedDataRegistry {
    /// Registering the same content twice is accepted; different content under
    /// an already registered path is not.
    fn lock_shared_data(&self, part: &DataPart) -> Result<()> {
        let key = part.relative_path.display().to_string();
        let record = SharedPartRecord {
            rows: part.rows_count,
            bytes_on_disk: part.bytes_on_disk,
            checksum: part.checksums.total_hash(),
        };

        let mut parts = self.parts.lock();
        if let Some(existing) = parts.get(&key) {
            if *existing != record {
                return Err(PartWriterError::logical(format!(
                    "part '{}' is already registered with different content",
                    key
                )));
            }
            return Ok(());
        }
        parts.insert(key.clone(), record);
        debug!(part = %key, "registered shared part data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::FormatVersion;

    #[test]
    fn test_registry_records_parts() {
        let registry = InMemorySharedDataRegistry::new();
        let mut part = DataPart::plain("all_1_1_0", FormatVersion::V1, "store");
        part.rows_count = 8;

        registry.lock_shared_data(&part).unwrap();
        registry.lock_shared_data(&part).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("store/all_1_1_0").unwrap().rows, 8);

        part.rows_count = 9;
        assert!(registry.lock_shared_data(&part).unwrap_err().is_logical());
    }

    #[test]
    fn test_noop_lock_accepts_everything() {
        let part = DataPart::plain("all_1_1_0", FormatVersion::V0, "store");
        NoopSharedDataLock.lock_shared_data(&part).unwrap();
    }
}
