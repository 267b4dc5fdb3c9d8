//! Part output orchestrator
//!
//! Lifecycle:
//! 1. `write` / `write_with_permutation` any number of blocks
//! 2. `finalize_part` once: flush column data, write the metadata files and
//!    `checksums.txt`, stamp the part. Nothing is synced yet.
//! 3. `finish` with the returned [`Finalizer`]: close and optionally fsync
//!    every file, then register the part with shared storage.
//!
//! Any error leaves the writer in [`WriterState::Failed`] and the directory
//! must be discarded.

use crate::block::Block;
use crate::checksums::Checksums;
use crate::codec::{column_writer_properties, CompressionCodec};
use crate::data_writer::DataPartWriter;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use crate::granularity::IndexGranularityPolicy;
use crate::metadata::{
    write_columns, write_count, write_default_codec, write_hashed_file, write_uuid,
    CHECKSUMS_FILE_NAME, SERIALIZATION_FILE_NAME,
};
use crate::part::{DataPart, PROJECTION_DIRECTORY_SUFFIX};
use crate::prune::{remove_empty_columns, select_columns_to_remove};
use crate::serialization::SerializationInfoByName;
use crate::shared_data::{NoopSharedDataLock, SharedDataLock};
use arrow::array::UInt32Array;
use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use chrono::Utc;
use mergepart_config::WriterSettings;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Writing,
    Finalizing,
    Finished,
    Failed,
}

/// Knobs of one part writer
#[derive(Clone)]
pub struct PartWriterOptions {
    pub settings: WriterSettings,
    /// Recompute serialization infos from the written data and replace the
    /// part's column list. When false the part's own infos are persisted as is.
    pub reset_columns: bool,
    /// Columns sampled into `primary.idx`
    pub sort_key: Vec<String>,
    /// Codec recorded in the part; finalizing without one fails
    pub default_codec: Option<CompressionCodec>,
    pub shared_data_lock: Arc<dyn SharedDataLock>,
}

impl PartWriterOptions {
    pub fn new(settings: WriterSettings) -> Self {
        Self {
            default_codec: Some(settings.default_codec),
            settings,
            reset_columns: true,
            sort_key: Vec::new(),
            shared_data_lock: Arc::new(NoopSharedDataLock),
        }
    }

    pub fn with_sort_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reset_columns(mut self, reset_columns: bool) -> Self {
        self.reset_columns = reset_columns;
        self
    }

    pub fn with_default_codec(mut self, codec: Option<CompressionCodec>) -> Self {
        self.default_codec = codec;
        self
    }

    pub fn with_shared_data_lock(mut self, lock: Arc<dyn SharedDataLock>) -> Self {
        self.shared_data_lock = lock;
        self
    }
}

impl Default for PartWriterOptions {
    fn default() -> Self {
        Self::new(WriterSettings::default())
    }
}

impl std::fmt::Debug for PartWriterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartWriterOptions")
            .field("settings", &self.settings)
            .field("reset_columns", &self.reset_columns)
            .field("sort_key", &self.sort_key)
            .field("default_codec", &self.default_codec)
            .finish_non_exhaustive()
    }
}

/// A finalized part whose files are complete but not yet durable
#[derive(Debug)]
pub struct Finalizer {
    part: DataPart,
    files: Vec<PendingFile>,
    sync: bool,
}

impl Finalizer {
    pub fn part(&self) -> &DataPart {
        &self.part
    }

    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Metadata files in the order they were opened
    pub fn pending_files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PendingFile::path)
    }
}

/// Writes one part directory from a stream of blocks
pub struct MergedPartWriter {
    disk: Arc<dyn Disk>,
    part_dir: PathBuf,
    part_name: String,
    options: PartWriterOptions,
    writer: DataPartWriter,
    serialization_infos: SerializationInfoByName,
    rows_count: u64,
    state: WriterState,
}

impl MergedPartWriter {
    /// Create the part directory and prepare one writer per declared column
    pub fn new(
        disk: Arc<dyn Disk>,
        part: &DataPart,
        columns: SchemaRef,
        options: PartWriterOptions,
    ) -> Result<Self> {
        let codec = options.default_codec.unwrap_or_default();
        let properties = column_writer_properties(codec, &options.settings)?;
        disk.create_dir_all(&part.relative_path)?;

        let writer = DataPartWriter::new(
            disk.clone(),
            part.relative_path.clone(),
            &columns,
            &options.sort_key,
            IndexGranularityPolicy::from_settings(&options.settings),
            properties,
        )?;

        debug!(
            part = %part.name,
            path = %part.relative_path.display(),
            columns = columns.fields().len(),
            "opened part writer"
        );

        Ok(Self {
            disk,
            part_dir: part.relative_path.clone(),
            part_name: part.name.clone(),
            serialization_infos: SerializationInfoByName::new(&columns),
            options,
            writer,
            rows_count: 0,
            state: WriterState::Open,
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn rows_count(&self) -> u64 {
        self.rows_count
    }

    pub fn write(&mut self, block: &Block) -> Result<()> {
        let result = self.write_block(block, None);
        self.track(result)
    }

    /// Write `block` with its rows consumed in `permutation` order
    pub fn write_with_permutation(
        &mut self,
        block: &Block,
        permutation: &UInt32Array,
    ) -> Result<()> {
        let result = self.write_block(block, Some(permutation));
        self.track(result)
    }

    /// Flush all column data, write every metadata file and stamp `part`.
    ///
    /// `total_columns` replaces the declared column list in `columns.txt`; it
    /// must contain every column this writer was created with.
    /// `extra_checksums` seeds the ledger with files written by someone else.
    pub fn finalize_part(
        &mut self,
        part: DataPart,
        sync: bool,
        total_columns: Option<SchemaRef>,
        extra_checksums: Option<Checksums>,
    ) -> Result<Finalizer> {
        let result = self.finalize(part, sync, total_columns, extra_checksums);
        self.track(result)
    }

    /// Close every file, fsync when the finalizer asks for it, and register
    /// the part with shared storage
    pub fn finish(&mut self, finalizer: Finalizer) -> Result<Arc<DataPart>> {
        let result = self.finish_part(finalizer);
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = WriterState::Failed;
        }
        result
    }

    fn expect_state(&self, operation: &str, allowed: &[WriterState]) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(PartWriterError::logical(format!(
            "cannot {} part '{}' in state {:?}",
            operation, self.part_name, self.state
        )))
    }

    fn write_block(&mut self, block: &Block, permutation: Option<&UInt32Array>) -> Result<()> {
        self.expect_state("write", &[WriterState::Open, WriterState::Writing])?;
        block.check_number_of_rows()?;

        let rows = block.rows();
        if rows == 0 {
            return Ok(());
        }

        self.writer.write(block, permutation)?;
        if self.options.reset_columns {
            self.serialization_infos.add(block);
        }
        self.rows_count += rows as u64;
        self.state = WriterState::Writing;
        trace!(part = %self.part_name, rows, total = self.rows_count, "wrote block");
        Ok(())
    }

    fn check_total_columns(&self, total: &Schema) -> Result<()> {
        for field in self.writer.fields() {
            if total.field_with_name(field.name()).is_err() {
                return Err(PartWriterError::logical(format!(
                    "total columns of part '{}' do not include written column '{}'",
                    self.part_name,
                    field.name()
                )));
            }
        }
        Ok(())
    }

    fn finalize(
        &mut self,
        mut part: DataPart,
        sync: bool,
        total_columns: Option<SchemaRef>,
        extra_checksums: Option<Checksums>,
    ) -> Result<Finalizer> {
        self.expect_state("finalize", &[WriterState::Open, WriterState::Writing])?;
        if part.relative_path != self.part_dir {
            return Err(PartWriterError::logical(format!(
                "part '{}' lives at '{}', writer was opened for '{}'",
                part.name,
                part.relative_path.display(),
                self.part_dir.display()
            )));
        }
        self.state = WriterState::Finalizing;

        let mut checksums = extra_checksums.unwrap_or_default();
        self.writer.fill_checksums(&mut checksums)?;

        for (name, projection) in &part.projection_parts {
            checksums.add_file(
                format!("{}{}", name, PROJECTION_DIRECTORY_SUFFIX),
                projection.checksums.total_size_on_disk(),
                projection.checksums.total_hash(),
            )?;
        }

        let mut columns: Vec<FieldRef> = match &total_columns {
            Some(total) => {
                self.check_total_columns(total)?;
                total.fields().iter().cloned().collect()
            }
            None => self.writer.fields().to_vec(),
        };

        let mut serialization_infos = if self.options.reset_columns {
            let mut infos = std::mem::take(&mut self.serialization_infos);
            infos.choose_kinds(self.options.settings.ratio_of_defaults_for_sparse_serialization);
            infos
        } else {
            part.serialization_infos.clone()
        };

        let (files, codec) = self.write_auxiliary_files(
            &part,
            &mut checksums,
            &mut columns,
            &mut serialization_infos,
        )?;

        part.rows_count = self.rows_count;
        part.modification_time = Utc::now();
        part.bytes_on_disk = checksums.total_size_on_disk();
        part.index_granularity = self.writer.index_granularity().clone();
        part.primary_index = self.writer.release_index_columns();
        part.default_codec = Some(codec);
        if self.options.reset_columns {
            part.columns = Arc::new(Schema::new(columns));
            part.serialization_infos = serialization_infos;
        }
        part.checksums = checksums;

        debug!(
            part = %part.name,
            rows = part.rows_count,
            files = part.checksums.len(),
            "finalized part"
        );

        Ok(Finalizer { part, files, sync })
    }

    fn write_auxiliary_files(
        &mut self,
        part: &DataPart,
        checksums: &mut Checksums,
        columns: &mut Vec<FieldRef>,
        serialization_infos: &mut SerializationInfoByName,
    ) -> Result<(Vec<PendingFile>, CompressionCodec)> {
        let disk = self.disk.clone();
        let disk = disk.as_ref();
        let dir = self.part_dir.clone();
        let dir = dir.as_path();
        let aux = part.auxiliary_files();
        let mut files = Vec::new();

        if aux.uuid && !part.uuid.is_nil() {
            files.push(write_uuid(disk, dir, &part.uuid, checksums)?);
        }
        if aux.partition {
            files.extend(part.partition.store(disk, dir, checksums)?);
        }
        if aux.minmax {
            if part.minmax_idx.is_initialized() {
                files.extend(part.minmax_idx.store(disk, dir, checksums)?);
            } else if self.rows_count > 0 {
                return Err(PartWriterError::logical(format!(
                    "min/max index of part '{}' is not initialized but the part has {} rows",
                    part.name, self.rows_count
                )));
            }
        }
        if aux.count {
            files.push(write_count(disk, dir, self.rows_count, checksums)?);
        }

        if !part.ttl_infos.is_empty() {
            files.push(part.ttl_infos.store(disk, dir, checksums)?);
        }

        if self.options.settings.remove_empty_columns && self.rows_count > 0 {
            let mut keep: BTreeSet<String> = self.options.sort_key.iter().cloned().collect();
            keep.extend(part.minmax_idx.columns().iter().map(|f| f.name().clone()));
            if let Some(partition) = part.partition.value() {
                keep.extend(partition.schema().fields().iter().map(|f| f.name().clone()));
            }
            let removable =
                select_columns_to_remove(&self.writer.empty_columns(), columns, &keep);
            if !removable.is_empty() {
                self.writer.drop_columns(&removable);
                remove_empty_columns(
                    disk,
                    dir,
                    &removable,
                    checksums,
                    columns,
                    serialization_infos,
                )?;
                debug!(part = %part.name, removed = ?removable, "pruned empty columns");
            }
        }

        if !serialization_infos.is_empty() {
            files.push(write_hashed_file(
                disk,
                dir,
                SERIALIZATION_FILE_NAME,
                checksums,
                |out| serialization_infos.write_json(out),
            )?);
        }

        files.push(write_columns(disk, dir, columns, checksums)?);

        let codec = self.options.default_codec.ok_or_else(|| {
            PartWriterError::missing_metadata(&part.name, "default compression codec is not set")
        })?;
        files.push(write_default_codec(disk, dir, codec, checksums)?);

        // checksums.txt lists every file but itself
        let listing = checksums.clone();
        files.push(write_hashed_file(
            disk,
            dir,
            CHECKSUMS_FILE_NAME,
            checksums,
            |out| listing.write(out),
        )?);

        Ok((files, codec))
    }

    fn finish_part(&mut self, finalizer: Finalizer) -> Result<Arc<DataPart>> {
        self.expect_state("finish", &[WriterState::Finalizing])?;
        let Finalizer { part, files, sync } = finalizer;
        if part.relative_path != self.part_dir {
            return Err(PartWriterError::logical(format!(
                "finalizer for '{}' handed to the writer of '{}'",
                part.relative_path.display(),
                self.part_dir.display()
            )));
        }

        self.writer.finish(sync)?;
        for file in files {
            file.finish(sync)?;
        }
        if sync && self.options.settings.fsync_part_directory {
            self.disk.sync_dir(&self.part_dir)?;
        }
        self.options.shared_data_lock.lock_shared_data(&part)?;
        self.state = WriterState::Finished;

        info!(
            part = %part.name,
            rows = part.rows_count,
            bytes = part.bytes_on_disk,
            files = part.checksums.len(),
            sync,
            "finished part"
        );
        Ok(Arc::new(part))
    }
}

impl std::fmt::Debug for MergedPartWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedPartWriter")
            .field("part", &self.part_name)
            .field("path", &self.part_dir)
            .field("rows", &self.rows_count)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
