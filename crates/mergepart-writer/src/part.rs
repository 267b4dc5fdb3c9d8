//! The part being produced and the per-kind auxiliary file dispatch

use crate::checksums::Checksums;
use crate::codec::CompressionCodec;
use crate::granularity::IndexGranularity;
use crate::metadata::{MinMaxIndex, PartitionValue, TtlInfos};
use crate::serialization::SerializationInfoByName;
use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Suffix of the directory holding a projection part inside its parent
pub const PROJECTION_DIRECTORY_SUFFIX: &str = ".proj";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Plain,
    Projection,
}

/// On-disk layout generation of the table the part belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Partitioning by month only; no partition or min/max files
    V0,
    /// Custom partitioning keys
    V1,
}

impl FormatVersion {
    pub fn has_custom_partitioning(self) -> bool {
        self >= FormatVersion::V1
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::V0 => f.write_str("0"),
            FormatVersion::V1 => f.write_str("1"),
        }
    }
}

/// Which header files precede `count.txt` for a kind of part.
///
/// `ttl.txt`, `serialization.json`, `columns.txt`, the codec file and
/// `checksums.txt` follow for every part and are not part of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxiliaryFileSet {
    pub uuid: bool,
    pub partition: bool,
    pub minmax: bool,
    pub count: bool,
}

impl AuxiliaryFileSet {
    pub fn for_part(kind: PartKind, version: FormatVersion) -> Self {
        match (kind, version) {
            (PartKind::Projection, FormatVersion::V0) => Self {
                uuid: false,
                partition: false,
                minmax: false,
                count: false,
            },
            (PartKind::Projection, FormatVersion::V1) => Self {
                uuid: false,
                partition: false,
                minmax: false,
                count: true,
            },
            (PartKind::Plain, FormatVersion::V0) => Self {
                uuid: true,
                partition: false,
                minmax: false,
                count: true,
            },
            (PartKind::Plain, FormatVersion::V1) => Self {
                uuid: true,
                partition: true,
                minmax: true,
                count: true,
            },
        }
    }
}

/// A data part.
///
/// Created empty by the caller, filled in by
/// [`MergedPartWriter::finalize_part`](crate::MergedPartWriter::finalize_part)
/// and frozen behind an `Arc` once finished.
#[derive(Debug, Clone)]
pub struct DataPart {
    pub name: String,
    pub kind: PartKind,
    pub format_version: FormatVersion,
    /// Directory relative to the disk root
    pub relative_path: PathBuf,
    pub rows_count: u64,
    pub bytes_on_disk: u64,
    /// Nil when the table does not assign part UUIDs
    pub uuid: Uuid,
    pub partition: PartitionValue,
    pub minmax_idx: MinMaxIndex,
    pub ttl_infos: TtlInfos,
    pub default_codec: Option<CompressionCodec>,
    pub serialization_infos: SerializationInfoByName,
    pub columns: SchemaRef,
    pub index_granularity: IndexGranularity,
    pub primary_index: Option<RecordBatch>,
    pub projection_parts: BTreeMap<String, Arc<DataPart>>,
    pub checksums: Checksums,
    pub modification_time: DateTime<Utc>,
}

impl DataPart {
    pub fn new(
        name: impl Into<String>,
        kind: PartKind,
        format_version: FormatVersion,
        relative_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            format_version,
            relative_path: relative_path.into(),
            rows_count: 0,
            bytes_on_disk: 0,
            uuid: Uuid::nil(),
            partition: PartitionValue::empty(),
            minmax_idx: MinMaxIndex::default(),
            ttl_infos: TtlInfos::default(),
            default_codec: None,
            serialization_infos: SerializationInfoByName::default(),
            columns: Arc::new(Schema::empty()),
            index_granularity: IndexGranularity::default(),
            primary_index: None,
            projection_parts: BTreeMap::new(),
            checksums: Checksums::new(),
            modification_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Plain part at `<parent>/<name>`
    pub fn plain(
        name: impl Into<String>,
        format_version: FormatVersion,
        parent: impl AsRef<Path>,
    ) -> Self {
        let name = name.into();
        let relative_path = parent.as_ref().join(&name);
        Self::new(name, PartKind::Plain, format_version, relative_path)
    }

    /// Projection part nested in `parent` at `<parent>/<name>.proj`
    pub fn projection(name: impl Into<String>, parent: &DataPart) -> Self {
        let name = name.into();
        let relative_path = parent
            .relative_path
            .join(format!("{}{}", name, PROJECTION_DIRECTORY_SUFFIX));
        Self::new(
            name,
            PartKind::Projection,
            parent.format_version,
            relative_path,
        )
    }

    pub fn auxiliary_files(&self) -> AuxiliaryFileSet {
        AuxiliaryFileSet::for_part(self.kind, self.format_version)
    }

    /// Attach a finished projection part. It is recorded in this part's
    /// ledger when this part is finalized.
    pub fn add_projection_part(&mut self, name: impl Into<String>, part: Arc<DataPart>) {
        self.projection_parts.insert(name.into(), part);
    }

    pub fn is_projection(&self) -> bool {
        self.kind == PartKind::Projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auxiliary_file_dispatch() {
        let none = AuxiliaryFileSet::for_part(PartKind::Projection, FormatVersion::V0);
        assert!(!none.uuid && !none.partition && !none.minmax && !none.count);

        let projection = AuxiliaryFileSet::for_part(PartKind::Projection, FormatVersion::V1);
        assert!(projection.count && !projection.uuid && !projection.minmax);

        let legacy = AuxiliaryFileSet::for_part(PartKind::Plain, FormatVersion::V0);
        assert!(legacy.uuid && legacy.count && !legacy.partition && !legacy.minmax);

        let full = AuxiliaryFileSet::for_part(PartKind::Plain, FormatVersion::V1);
        assert!(full.uuid && full.partition && full.minmax && full.count);
    }

    #[test]
    fn test_projection_path_nests_under_parent() {
        let parent = DataPart::plain("all_1_1_0", FormatVersion::V1, "store");
        let projection = DataPart::projection("by_user", &parent);

        assert_eq!(parent.relative_path, PathBuf::from("store/all_1_1_0"));
        assert_eq!(
            projection.relative_path,
            PathBuf::from("store/all_1_1_0/by_user.proj")
        );
        assert!(projection.is_projection());
        assert_eq!(projection.format_version, FormatVersion::V1);
    }
}
