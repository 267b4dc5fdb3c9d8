//! Removal of columns that only ever received default values

use crate::checksums::Checksums;
use crate::column_writer::{data_file_name, marks_file_name};
use crate::disk::Disk;
use crate::error::Result;
use crate::serialization::SerializationInfoByName;
use arrow::datatypes::FieldRef;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Pick which empty columns may go.
///
/// Only names still present in `columns` qualify. Columns in `keep` (sort,
/// partition and min/max keys) are never selected, since the indexes of the
/// part refer to them. At least one column always survives: if every
/// remaining column is empty, the first is kept.
pub fn select_columns_to_remove(
    empty: &[String],
    columns: &[FieldRef],
    keep: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut selected: BTreeSet<String> = empty
        .iter()
        .filter(|name| !keep.contains(*name))
        .filter(|name| columns.iter().any(|field| field.name() == *name))
        .cloned()
        .collect();

    if !columns.is_empty() && selected.len() == columns.len() {
        selected.remove(columns[0].name());
    }
    selected
}

/// Drop the named columns from the directory, the ledger, the serialization
/// infos and the column list.
///
/// Files are deleted only while the ledger still lists them, so calling this
/// again with the same names changes nothing.
pub fn remove_empty_columns(
    disk: &dyn Disk,
    part_dir: &Path,
    names: &BTreeSet<String>,
    checksums: &mut Checksums,
    columns: &mut Vec<FieldRef>,
    serialization_infos: &mut SerializationInfoByName,
) -> Result<()> {
    for name in names {
        for file in [data_file_name(name), marks_file_name(name)] {
            if checksums.remove_file(&file).is_some() {
                disk.remove_file(&part_dir.join(&file))?;
            }
        }
        serialization_infos.remove(name);
        debug!(column = %name, "removed empty column from part");
    }
    columns.retain(|field| !names.contains(field.name()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{LocalDisk, PendingFile};
    use crate::hash::FileHash;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fields(names: &[&str]) -> Vec<FieldRef> {
        names
            .iter()
            .map(|name| Arc::new(Field::new(*name, DataType::Int64, false)))
            .collect()
    }

    #[test]
    fn test_selection_keeps_one_column() {
        let columns = fields(&["a", "b"]);
        let empty = vec!["a".to_string(), "b".to_string(), "gone".to_string()];
        let keep = BTreeSet::new();
        assert_eq!(
            select_columns_to_remove(&empty, &columns, &keep),
            BTreeSet::from(["b".to_string()])
        );

        let only_b = vec!["b".to_string()];
        assert_eq!(
            select_columns_to_remove(&only_b, &columns, &keep),
            BTreeSet::from(["b".to_string()])
        );
    }

    #[test]
    fn test_key_columns_are_never_selected() {
        let columns = fields(&["key", "value", "day"]);
        let empty = vec!["key".to_string(), "value".to_string(), "day".to_string()];
        let keep = BTreeSet::from(["key".to_string(), "day".to_string()]);

        assert_eq!(
            select_columns_to_remove(&empty, &columns, &keep),
            BTreeSet::from(["value".to_string()])
        );

        let keep_all = BTreeSet::from(["key".to_string(), "value".to_string(), "day".to_string()]);
        assert!(select_columns_to_remove(&empty, &columns, &keep_all).is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let disk = LocalDisk::new(temp_dir.path());
        disk.create_dir_all(Path::new("part")).unwrap();

        let mut checksums = Checksums::new();
        for name in ["a.bin", "a.mrk2", "b.bin", "b.mrk2"] {
            let mut file = disk.write_file(&Path::new("part").join(name)).unwrap();
            file.write_all(name.as_bytes()).unwrap();
            PendingFile::new(PathBuf::from(name), file)
                .finish(false)
                .unwrap();
            checksums
                .add_file(name, name.len() as u64, FileHash::of(name.as_bytes()))
                .unwrap();
        }

        let mut columns = fields(&["a", "b"]);
        let mut infos = SerializationInfoByName::new(&Schema::new(columns.clone()));
        let names = BTreeSet::from(["b".to_string()]);

        for _ in 0..2 {
            remove_empty_columns(
                &disk,
                Path::new("part"),
                &names,
                &mut checksums,
                &mut columns,
                &mut infos,
            )
            .unwrap();

            assert_eq!(checksums.names().collect::<Vec<_>>(), vec!["a.bin", "a.mrk2"]);
            assert_eq!(columns.len(), 1);
            assert!(infos.get("b").is_none());
            let listed: Vec<_> = disk
                .list_dir(Path::new("part"))
                .unwrap()
                .into_iter()
                .map(|entry| entry.name)
                .collect();
            assert_eq!(listed, vec!["a.bin", "a.mrk2"]);
        }
    }
}
