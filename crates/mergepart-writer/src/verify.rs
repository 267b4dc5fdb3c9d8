//! Offline verification of a finished part directory
//!
//! Re-reads `checksums.txt`, rescans the directory and recomputes every hash.
//! Projection directories are verified recursively and compared against the
//! rolled-up entry their parent recorded.

use crate::checksums::Checksums;
use crate::disk::Disk;
use crate::error::{PartWriterError, Result};
use crate::hash::FileHash;
use crate::metadata::CHECKSUMS_FILE_NAME;
use crate::part::PROJECTION_DIRECTORY_SUFFIX;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Verify the part at `part_dir` and return its complete ledger, including
/// the entry for `checksums.txt` itself.
pub fn verify_part_directory(disk: &dyn Disk, part_dir: &Path) -> Result<Checksums> {
    let raw = disk.read_file(&part_dir.join(CHECKSUMS_FILE_NAME))?;
    let stored = Checksums::read(&raw)?;
    let mut seen = BTreeSet::new();

    for entry in disk.list_dir(part_dir)? {
        if entry.name == CHECKSUMS_FILE_NAME {
            continue;
        }
        let expected = stored.get(&entry.name).ok_or_else(|| {
            PartWriterError::checksum_mismatch(
                &entry.name,
                "present on disk but not in checksums.txt",
            )
        })?;

        let (size, hash) = if entry.is_dir {
            if !entry.name.ends_with(PROJECTION_DIRECTORY_SUFFIX) {
                return Err(PartWriterError::checksum_mismatch(
                    &entry.name,
                    "unexpected directory inside part",
                ));
            }
            let nested = verify_part_directory(disk, &part_dir.join(&entry.name))?;
            (nested.total_size_on_disk(), nested.total_hash())
        } else {
            let data = disk.read_file(&part_dir.join(&entry.name))?;
            (data.len() as u64, FileHash::of(&data))
        };

        if size != expected.size {
            return Err(PartWriterError::checksum_mismatch(
                &entry.name,
                format!("size {} on disk, {} in checksums.txt", size, expected.size),
            ));
        }
        if hash != expected.hash {
            return Err(PartWriterError::checksum_mismatch(
                &entry.name,
                format!("hash {} on disk, {} in checksums.txt", hash, expected.hash),
            ));
        }
        seen.insert(entry.name);
    }

    if let Some(missing) = stored.names().find(|name| !seen.contains(*name)) {
        return Err(PartWriterError::checksum_mismatch(
            missing,
            "listed in checksums.txt but missing on disk",
        ));
    }

    let mut ledger = stored;
    ledger.add_file(CHECKSUMS_FILE_NAME, raw.len() as u64, FileHash::of(&raw))?;
    debug!(part = %part_dir.display(), files = ledger.len(), "verified part");
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{LocalDisk, PendingFile};
    use crate::error::ErrorCode;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn put(disk: &LocalDisk, path: &str, data: &[u8]) {
        let mut file = disk.write_file(Path::new(path)).unwrap();
        file.write_all(data).unwrap();
        PendingFile::new(PathBuf::from(path), file)
            .finish(false)
            .unwrap();
    }

    fn ledger_text(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut checksums = Checksums::new();
        for (name, data) in files {
            checksums
                .add_file(*name, data.len() as u64, FileHash::of(data))
                .unwrap();
        }
        let mut out = Vec::new();
        checksums.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_consistent_part_verifies() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());
        disk.create_dir_all(Path::new("part")).unwrap();
        put(&disk, "part/count.txt", b"8");
        let ledger = ledger_text(&[("count.txt", &b"8"[..])]);
        put(&disk, "part/checksums.txt", &ledger);

        let ledger = verify_part_directory(&disk, Path::new("part")).unwrap();
        assert_eq!(
            ledger.names().collect::<Vec<_>>(),
            vec!["checksums.txt", "count.txt"]
        );
    }

    #[test]
    fn test_detects_tampering_and_strays() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());
        disk.create_dir_all(Path::new("part")).unwrap();
        put(&disk, "part/count.txt", b"9");
        let ledger = ledger_text(&[("count.txt", &b"8"[..])]);
        put(&disk, "part/checksums.txt", &ledger);

        let err = verify_part_directory(&disk, Path::new("part")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E006ChecksumMismatch);

        put(&disk, "part/count.txt", b"8");
        put(&disk, "part/stray.bin", b"x");
        let err = verify_part_directory(&disk, Path::new("part")).unwrap_err();
        assert!(err.to_string().contains("stray.bin"));

        disk.remove_file(Path::new("part/stray.bin")).unwrap();
        disk.remove_file(Path::new("part/count.txt")).unwrap();
        let err = verify_part_directory(&disk, Path::new("part")).unwrap_err();
        assert!(err.to_string().contains("missing on disk"));
    }
}
