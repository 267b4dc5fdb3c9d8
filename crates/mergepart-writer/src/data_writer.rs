//! Fan-out of blocks to the per-column writers of a part
//!
//! Applies the permutation, plans granules once per block, feeds every column
//! writer the same slices and samples the sort key at each granule start for
//! the primary index.

use crate::block::Block;
use crate::checksums::Checksums;
use crate::column_writer::ColumnWriter;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use crate::granularity::{GranulePlanner, IndexGranularity, IndexGranularityPolicy};
use crate::metadata::{ipc_stream_bytes, write_hashed_file, PRIMARY_INDEX_FILE_NAME};
use arrow::array::{Array, ArrayRef, RecordBatch, UInt32Array};
use arrow::compute::{concat, take};
use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use parquet::file::properties::WriterProperties;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::trace;

pub struct DataPartWriter {
    disk: Arc<dyn Disk>,
    part_dir: PathBuf,
    columns: Vec<ColumnWriter>,
    fields: Vec<FieldRef>,
    sort_key: SchemaRef,
    index_samples: Vec<Vec<ArrayRef>>,
    primary_index: Option<RecordBatch>,
    primary_file: Option<PendingFile>,
    planner: GranulePlanner,
}

impl DataPartWriter {
    pub fn new(
        disk: Arc<dyn Disk>,
        part_dir: PathBuf,
        columns: &Schema,
        sort_key: &[String],
        policy: IndexGranularityPolicy,
        properties: WriterProperties,
    ) -> Result<Self> {
        let fields: Vec<FieldRef> = columns.fields().iter().cloned().collect();

        let mut key_fields = Vec::with_capacity(sort_key.len());
        for name in sort_key {
            let field = fields
                .iter()
                .find(|field| field.name() == name)
                .ok_or_else(|| {
                    PartWriterError::logical(format!(
                        "sort key column '{}' is not a declared column",
                        name
                    ))
                })?;
            key_fields.push(field.clone());
        }

        let writers = fields
            .iter()
            .map(|field| {
                ColumnWriter::new(
                    field.clone(),
                    disk.clone(),
                    part_dir.clone(),
                    properties.clone(),
                )
            })
            .collect();

        Ok(Self {
            disk,
            part_dir,
            columns: writers,
            index_samples: vec![Vec::new(); key_fields.len()],
            sort_key: Arc::new(Schema::new(key_fields)),
            fields,
            primary_index: None,
            primary_file: None,
            planner: GranulePlanner::new(policy),
        })
    }

    /// Declared columns, in declaration order
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    /// Pull every declared column out of the block, reordered by `permutation`
    fn collect_columns(
        &self,
        block: &Block,
        permutation: Option<&UInt32Array>,
    ) -> Result<Vec<ArrayRef>> {
        if let Some(permutation) = permutation {
            check_permutation(permutation, block.rows())?;
        }

        let mut arrays = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let array = block.column_by_name(field.name()).ok_or_else(|| {
                PartWriterError::logical(format!(
                    "block has no column '{}' declared for the part",
                    field.name()
                ))
            })?;
            if array.data_type() != field.data_type() {
                return Err(PartWriterError::logical(format!(
                    "column '{}' has type {}, declared {}",
                    field.name(),
                    array.data_type(),
                    field.data_type()
                )));
            }
            let array = match permutation {
                Some(permutation) => take(array.as_ref(), permutation, None)
                    .map_err(|e| PartWriterError::encoding(field.name(), e))?,
                None => array.clone(),
            };
            arrays.push(array);
        }
        Ok(arrays)
    }

    pub fn write(&mut self, block: &Block, permutation: Option<&UInt32Array>) -> Result<()> {
        let arrays = self.collect_columns(block, permutation)?;
        let slices = self.planner.plan(block.rows(), block.allocated_bytes());

        for (writer, array) in self.columns.iter_mut().zip(&arrays) {
            for slice in &slices {
                writer.write(array, slice)?;
            }
        }

        for slice in slices.iter().filter(|slice| slice.starts_granule) {
            for (samples, key) in self.index_samples.iter_mut().zip(self.sort_key.fields()) {
                let position = self
                    .fields
                    .iter()
                    .position(|field| field.name() == key.name())
                    .ok_or_else(|| {
                        PartWriterError::logical(format!("sort key '{}' vanished", key.name()))
                    })?;
                samples.push(arrays[position].slice(slice.offset, 1));
            }
        }

        trace!(
            rows = block.rows(),
            granules = slices.iter().filter(|s| s.closes_granule).count(),
            "wrote block to column writers"
        );
        Ok(())
    }

    /// Close the trailing granule and record every column file plus
    /// `primary.idx` in the ledger
    pub fn fill_checksums(&mut self, checksums: &mut Checksums) -> Result<()> {
        self.planner.finish();
        for writer in &mut self.columns {
            writer.fill_checksums(checksums)?;
        }

        if self.sort_key.fields().is_empty() || self.index_samples[0].is_empty() {
            return Ok(());
        }

        let mut key_columns = Vec::with_capacity(self.index_samples.len());
        for (samples, key) in self.index_samples.iter().zip(self.sort_key.fields()) {
            let refs: Vec<&dyn Array> = samples.iter().map(|a| a.as_ref()).collect();
            key_columns.push(concat(&refs).map_err(|e| PartWriterError::encoding(key.name(), e))?);
        }
        let index = RecordBatch::try_new(self.sort_key.clone(), key_columns)
            .map_err(|e| PartWriterError::encoding(PRIMARY_INDEX_FILE_NAME, e))?;
        let bytes = ipc_stream_bytes(&index, PRIMARY_INDEX_FILE_NAME)?;
        self.primary_file = Some(write_hashed_file(
            self.disk.as_ref(),
            &self.part_dir,
            PRIMARY_INDEX_FILE_NAME,
            checksums,
            |out| out.write_all(&bytes),
        )?);
        self.primary_index = Some(index);
        self.index_samples.iter_mut().for_each(Vec::clear);
        Ok(())
    }

    /// Columns that received rows, all of them default values
    pub fn empty_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|writer| writer.is_all_defaults())
            .map(|writer| writer.name().to_string())
            .collect()
    }

    /// Stop tracking the named columns. Their files stay on disk until the
    /// pruner removes them.
    pub fn drop_columns(&mut self, names: &BTreeSet<String>) {
        self.columns.retain(|writer| !names.contains(writer.name()));
    }

    pub fn index_granularity(&self) -> &IndexGranularity {
        self.planner.granularity()
    }

    /// Hand the primary index over to the part
    pub fn release_index_columns(&mut self) -> Option<RecordBatch> {
        self.primary_index.take()
    }

    pub fn finish(&mut self, sync: bool) -> Result<()> {
        for writer in &mut self.columns {
            writer.finish(sync)?;
        }
        if let Some(file) = self.primary_file.take() {
            file.finish(sync)?;
        }
        Ok(())
    }
}

/// A permutation must name every row of the block exactly once
fn check_permutation(permutation: &UInt32Array, rows: usize) -> Result<()> {
    if permutation.len() != rows {
        return Err(PartWriterError::logical(format!(
            "permutation has {} entries, block has {} rows",
            permutation.len(),
            rows
        )));
    }
    if permutation.null_count() > 0 {
        return Err(PartWriterError::logical("permutation contains nulls"));
    }

    let mut seen = vec![false; rows];
    for index in permutation.values().iter().map(|&i| i as usize) {
        match seen.get_mut(index) {
            None => {
                return Err(PartWriterError::logical(format!(
                    "permutation index {} is out of range for a block of {} rows",
                    index, rows
                )))
            }
            Some(true) => {
                return Err(PartWriterError::logical(format!(
                    "permutation repeats row {}",
                    index
                )))
            }
            Some(slot) => *slot = true,
        }
    }
    Ok(())
}
