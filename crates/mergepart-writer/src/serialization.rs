//! Per-column serialization statistics
//!
//! Counts default values across every block written to a part and picks a
//! dense or sparse encoding hint per column when the part is finalized.

use crate::block::{count_default_values, Block};
use crate::error::{PartWriterError, Result};
use arrow::datatypes::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};

const SERIALIZATION_INFO_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializationKind {
    #[default]
    Default,
    Sparse,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializationInfo {
    pub kind: SerializationKind,
    pub num_rows: u64,
    pub num_defaults: u64,
}

impl SerializationInfo {
    pub fn add(&mut self, rows: usize, defaults: usize) {
        self.num_rows += rows as u64;
        self.num_defaults += defaults as u64;
    }

    /// Every row holds the default value
    pub fn is_all_defaults(&self) -> bool {
        self.num_defaults == self.num_rows
    }

    /// Sparse once the share of defaults reaches `ratio`. A ratio of 1.0 or
    /// above disables sparse encoding.
    pub fn choose_kind(&mut self, ratio: f64) {
        self.kind = if ratio < 1.0
            && self.num_rows > 0
            && self.num_defaults as f64 / self.num_rows as f64 >= ratio
        {
            SerializationKind::Sparse
        } else {
            SerializationKind::Default
        };
    }
}

#[derive(Serialize, Deserialize)]
struct SerializedColumn {
    name: String,
    kind: SerializationKind,
    num_defaults: u64,
    num_rows: u64,
}

#[derive(Serialize, Deserialize)]
struct SerializedInfos {
    columns: Vec<SerializedColumn>,
    version: u32,
}

/// Serialization infos keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerializationInfoByName {
    infos: BTreeMap<String, SerializationInfo>,
    nullable: BTreeMap<String, bool>,
}

impl SerializationInfoByName {
    /// One empty accumulator per declared column
    pub fn new(schema: &Schema) -> Self {
        let mut infos = BTreeMap::new();
        let mut nullable = BTreeMap::new();
        for field in schema.fields() {
            infos.insert(field.name().clone(), SerializationInfo::default());
            nullable.insert(field.name().clone(), field.is_nullable());
        }
        Self { infos, nullable }
    }

    /// Accumulate statistics from every tracked column present in the block
    pub fn add(&mut self, block: &Block) {
        for column in block.columns() {
            let Some(info) = self.infos.get_mut(&column.name) else {
                continue;
            };
            let nullable = self.nullable.get(&column.name).copied().unwrap_or(true);
            info.add(
                column.array.len(),
                count_default_values(column.array.as_ref(), nullable),
            );
        }
    }

    /// Settle the kind of every column
    pub fn choose_kinds(&mut self, ratio: f64) {
        for info in self.infos.values_mut() {
            info.choose_kind(ratio);
        }
    }

    pub fn get(&self, name: &str) -> Option<&SerializationInfo> {
        self.infos.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<SerializationInfo> {
        self.nullable.remove(name);
        self.infos.remove(name)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SerializationInfo)> {
        self.infos.iter().map(|(name, info)| (name.as_str(), info))
    }

    /// Serialize in the `serialization.json` format
    pub fn write_json<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let serialized = SerializedInfos {
            columns: self
                .infos
                .iter()
                .map(|(name, info)| SerializedColumn {
                    name: name.clone(),
                    kind: info.kind,
                    num_defaults: info.num_defaults,
                    num_rows: info.num_rows,
                })
                .collect(),
            version: SERIALIZATION_INFO_VERSION,
        };
        serde_json::to_writer(&mut *out, &serialized)?;
        Ok(())
    }

    pub fn read_json(data: &[u8]) -> Result<Self> {
        let serialized: SerializedInfos = serde_json::from_slice(data)
            .map_err(|e| PartWriterError::encoding("serialization.json", e))?;
        if serialized.version != SERIALIZATION_INFO_VERSION {
            return Err(PartWriterError::encoding(
                "serialization.json",
                format!("unsupported version {}", serialized.version),
            ));
        }
        let infos = serialized
            .columns
            .into_iter()
            .map(|column| {
                (
                    column.name,
                    SerializationInfo {
                        kind: column.kind,
                        num_rows: column.num_rows,
                        num_defaults: column.num_defaults,
                    },
                )
            })
            .collect();
        Ok(Self {
            infos,
            nullable: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use std::sync::Arc;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("note", DataType::Utf8, true),
        ])
    }

    #[test]
    fn test_accumulates_across_blocks() {
        let mut infos = SerializationInfoByName::new(&schema());

        infos.add(
            &Block::default()
                .with_column("id", Arc::new(Int64Array::from(vec![0, 1, 2])))
                .with_column("note", Arc::new(StringArray::from(vec![None::<&str>; 3]))),
        );
        infos.add(
            &Block::default()
                .with_column("id", Arc::new(Int64Array::from(vec![3, 4])))
                .with_column("note", Arc::new(StringArray::from(vec![None, Some("x")]))),
        );

        let id = infos.get("id").unwrap();
        assert_eq!((id.num_rows, id.num_defaults), (5, 1));
        let note = infos.get("note").unwrap();
        assert_eq!((note.num_rows, note.num_defaults), (5, 4));
        assert!(!note.is_all_defaults());
    }

    #[test]
    fn test_choose_kind_threshold() {
        let mut info = SerializationInfo {
            num_rows: 16,
            num_defaults: 15,
            ..Default::default()
        };
        info.choose_kind(0.9375);
        assert_eq!(info.kind, SerializationKind::Sparse);

        info.num_defaults = 14;
        info.choose_kind(0.9375);
        assert_eq!(info.kind, SerializationKind::Default);

        info.num_defaults = 16;
        info.choose_kind(1.0);
        assert_eq!(info.kind, SerializationKind::Default);
    }

    #[test]
    fn test_json_layout() {
        let mut infos = SerializationInfoByName::new(&schema());
        infos.remove("note");
        infos.add(&Block::default().with_column("id", Arc::new(Int64Array::from(vec![0, 0]))));
        infos.choose_kinds(0.5);

        let mut buffer = Vec::new();
        infos.write_json(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer.clone()).unwrap(),
            r#"{"columns":[{"name":"id","kind":"Sparse","num_defaults":2,"num_rows":2}],"version":1}"#
        );

        let parsed = SerializationInfoByName::read_json(&buffer).unwrap();
        assert_eq!(parsed.get("id").unwrap().kind, SerializationKind::Sparse);
    }
}
