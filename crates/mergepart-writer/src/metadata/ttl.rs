use super::{write_hashed_file, TTL_FILE_NAME};
use crate::checksums::Checksums;
use crate::disk::{Disk, PendingFile};
use crate::error::{PartWriterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

const TTL_FORMAT_HEADER: &str = "ttl format version: 1\n";

/// Earliest and latest expiry time seen for one TTL rule, in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlInterval {
    pub min: i64,
    pub max: i64,
}

impl TtlInterval {
    pub fn at(time: DateTime<Utc>) -> Self {
        let ts = time.timestamp();
        Self { min: ts, max: ts }
    }

    fn widen(&mut self, time: DateTime<Utc>) {
        let ts = time.timestamp();
        self.min = self.min.min(ts);
        self.max = self.max.max(ts);
    }
}

fn widen(slot: &mut Option<TtlInterval>, time: DateTime<Utc>) {
    match slot {
        Some(interval) => interval.widen(time),
        None => *slot = Some(TtlInterval::at(time)),
    }
}

fn widen_named(map: &mut BTreeMap<String, TtlInterval>, name: &str, time: DateTime<Utc>) {
    map.entry(name.to_string())
        .and_modify(|interval| interval.widen(time))
        .or_insert_with(|| TtlInterval::at(time));
}

/// Expiry ranges of every TTL rule that applies to a part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlInfos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TtlInterval>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, TtlInterval>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rows_where: BTreeMap<String, TtlInterval>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub group_by: BTreeMap<String, TtlInterval>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub moves: BTreeMap<String, TtlInterval>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub recompression: BTreeMap<String, TtlInterval>,
}

impl TtlInfos {
    pub fn update_table(&mut self, time: DateTime<Utc>) {
        widen(&mut self.table, time);
    }

    pub fn update_column(&mut self, column: &str, time: DateTime<Utc>) {
        widen_named(&mut self.columns, column, time);
    }

    pub fn update_rows_where(&mut self, expression: &str, time: DateTime<Utc>) {
        widen_named(&mut self.rows_where, expression, time);
    }

    pub fn update_group_by(&mut self, expression: &str, time: DateTime<Utc>) {
        widen_named(&mut self.group_by, expression, time);
    }

    pub fn update_move(&mut self, expression: &str, time: DateTime<Utc>) {
        widen_named(&mut self.moves, expression, time);
    }

    pub fn update_recompression(&mut self, expression: &str, time: DateTime<Utc>) {
        widen_named(&mut self.recompression, expression, time);
    }

    /// No TTL interval of any kind is present
    pub fn is_empty(&self) -> bool {
        self.table.is_none()
            && self.columns.is_empty()
            && self.rows_where.is_empty()
            && self.group_by.is_empty()
            && self.moves.is_empty()
            && self.recompression.is_empty()
    }

    /// Serialize in the `ttl.txt` format
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(TTL_FORMAT_HEADER.as_bytes())?;
        serde_json::to_writer(&mut *out, self)?;
        Ok(())
    }

    pub fn read(data: &[u8]) -> Result<Self> {
        let body = data
            .strip_prefix(TTL_FORMAT_HEADER.as_bytes())
            .ok_or_else(|| PartWriterError::encoding(TTL_FILE_NAME, "missing format version header"))?;
        serde_json::from_slice(body).map_err(|e| PartWriterError::encoding(TTL_FILE_NAME, e))
    }

    pub(crate) fn store(
        &self,
        disk: &dyn Disk,
        dir: &Path,
        checksums: &mut Checksums,
    ) -> Result<PendingFile> {
        write_hashed_file(disk, dir, TTL_FILE_NAME, checksums, |out| self.write(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_intervals_widen() {
        let mut infos = TtlInfos::default();
        assert!(infos.is_empty());

        infos.update_table(Utc.timestamp_opt(200, 0).unwrap());
        infos.update_table(Utc.timestamp_opt(100, 0).unwrap());
        infos.update_move("d + INTERVAL 1 DAY", Utc.timestamp_opt(500, 0).unwrap());

        assert!(!infos.is_empty());
        assert_eq!(infos.table, Some(TtlInterval { min: 100, max: 200 }));
        assert_eq!(infos.moves.len(), 1);
    }

    #[test]
    fn test_text_format() {
        let mut infos = TtlInfos::default();
        infos.update_column("payload", Utc.timestamp_opt(42, 0).unwrap());

        let mut buffer = Vec::new();
        infos.write(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer.clone()).unwrap(),
            "ttl format version: 1\n{\"columns\":{\"payload\":{\"min\":42,\"max\":42}}}"
        );
        assert_eq!(TtlInfos::read(&buffer).unwrap(), infos);
    }
}
