// mergepart-writer - Write path for immutable columnar data parts
//
// Turns a stream of sorted Arrow blocks into a self-describing part directory:
// one Parquet-encoded data file and one mark file per column, a primary index,
// small metadata files and a checksum ledger covering all of them.
//
// Writing is single-threaded and bounded to one block at a time. Durability is
// paid once, in `MergedPartWriter::finish`.

pub mod block;
pub mod checksums;
pub mod codec;
pub mod column_writer;
pub mod data_writer;
pub mod disk;
pub mod error;
pub mod granularity;
pub mod hash;
pub mod metadata;
pub mod output;
pub mod part;
pub mod prune;
pub mod serialization;
pub mod shared_data;
pub mod verify;

// Re-export commonly used types
pub use block::{Block, BlockColumn};
pub use checksums::{ChecksumEntry, Checksums};
pub use codec::CompressionCodec;
pub use disk::{DirEntry, Disk, LocalDisk, PendingFile, WriteFile};
pub use error::{ErrorCode, PartWriterError, Result};
pub use granularity::{IndexGranularity, IndexGranularityPolicy};
pub use hash::FileHash;
pub use metadata::{MinMaxIndex, PartitionValue, TtlInfos, TtlInterval};
pub use output::{Finalizer, MergedPartWriter, PartWriterOptions, WriterState};
pub use part::{AuxiliaryFileSet, DataPart, FormatVersion, PartKind};
pub use serialization::{SerializationInfo, SerializationInfoByName, SerializationKind};
pub use shared_data::{InMemorySharedDataRegistry, NoopSharedDataLock, SharedDataLock};
pub use verify::verify_part_directory;
