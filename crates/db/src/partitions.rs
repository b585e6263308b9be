use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use honey_core::{LEDGER_EXTENSION, LedgerRecord};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::Db;
use crate::error::{DbError, Result};

/// A ledger object found under `year=/month=/day=` partition directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub source_key: String,
    pub path: PathBuf,
    pub year: String,
    pub month: String,
    pub day: String,
    pub size: u64,
    pub modified: Option<String>,
}

/// Summary of one partition repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionLoad {
    pub files_seen: usize,
    pub files_loaded: usize,
    pub rows_loaded: usize,
    pub rows_rejected: usize,
}

pub fn discover_partition_files(table_root: &Path) -> Result<Vec<PartitionFile>> {
    let mut files = Vec::new();
    if !table_root.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(table_root)
        .min_depth(4)
        .max_depth(4)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|value| value.to_str()) != Some(LEDGER_EXTENSION)
        {
            continue;
        }
        let Ok(relative) = path.strip_prefix(table_root) else {
            continue;
        };
        let parts: Vec<&str> = relative
            .iter()
            .filter_map(|segment| segment.to_str())
            .collect();
        let [year, month, day, _] = parts.as_slice() else {
            continue;
        };
        let (Some(year), Some(month), Some(day)) = (
            year.strip_prefix("year="),
            month.strip_prefix("month="),
            day.strip_prefix("day="),
        ) else {
            debug!(path = %path.display(), "ignoring file outside a date partition");
            continue;
        };
        let metadata = entry.metadata().map_err(io::Error::from)?;
        let modified = metadata
            .modified()
            .ok()
            .map(|time| DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Nanos, true));
        files.push(PartitionFile {
            source_key: parts.join("/"),
            path: path.to_path_buf(),
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
            size: metadata.len(),
            modified,
        });
    }
    Ok(files)
}

impl Db {
    /// Scans `table_root` and (re)loads every new or changed partition file.
    pub fn repair_partitions(&mut self, table_root: &Path) -> Result<PartitionLoad> {
        let mut load = PartitionLoad::default();
        for file in discover_partition_files(table_root)? {
            load.files_seen += 1;
            if self.partition_file_unchanged(&file)? {
                continue;
            }
            let bytes = fs::read(&file.path)?;
            let contents = String::from_utf8_lossy(&bytes);
            let (loaded, rejected) = self.load_partition_file(&file, &contents)?;
            load.files_loaded += 1;
            load.rows_loaded += loaded;
            load.rows_rejected += rejected;
        }
        info!(
            files_seen = load.files_seen,
            files_loaded = load.files_loaded,
            rows_loaded = load.rows_loaded,
            rows_rejected = load.rows_rejected,
            "repaired partitions"
        );
        Ok(load)
    }

    /// Replaces every row previously loaded from `file.source_key`.
    pub fn load_partition_file(
        &mut self,
        file: &PartitionFile,
        contents: &str,
    ) -> Result<(usize, usize)> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM rotation_row WHERE source_key = ?1",
            params![file.source_key],
        )?;
        let mut loaded = 0usize;
        let mut rejected = 0usize;
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO rotation_row (source_key, ts, count, year, month, day)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for line in contents.lines().filter(|line| !line.trim().is_empty()) {
                let Some((record, count)) = LedgerRecord::parse_line(line)
                    .and_then(|record| Some((record, i64::try_from(record.count).ok()?)))
                else {
                    rejected += 1;
                    continue;
                };
                insert.execute(params![
                    file.source_key,
                    record.ts_string(),
                    count,
                    file.year,
                    file.month,
                    file.day,
                ])?;
                loaded += 1;
            }
        }
        tx.execute(
            r#"
            INSERT INTO partition_file (source_key, size, modified, row_count, rejected_rows, loaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(source_key) DO UPDATE SET
              size = excluded.size,
              modified = excluded.modified,
              row_count = excluded.row_count,
              rejected_rows = excluded.rejected_rows,
              loaded_at = excluded.loaded_at
            "#,
            params![
                file.source_key,
                file.size as i64,
                file.modified,
                loaded as i64,
                rejected as i64,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ],
        )?;
        tx.commit()?;
        if rejected > 0 {
            debug!(source_key = %file.source_key, rejected, "rejected malformed ledger lines");
        }
        Ok((loaded, rejected))
    }

    pub fn rotation_total(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(count), 0) FROM rotation_row",
            [],
            |row| row.get(0),
        )?;
        u64::try_from(total).map_err(|_| {
            DbError::InvalidInput(format!("rotation total {} is negative", total))
        })
    }

    fn partition_file_unchanged(&self, file: &PartitionFile) -> Result<bool> {
        let stored = self
            .conn
            .query_row(
                "SELECT size, modified FROM partition_file WHERE source_key = ?1",
                params![file.source_key],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        Ok(matches!(
            stored,
            Some((size, modified)) if size as u64 == file.size && modified.is_some() && modified == file.modified
        ))
    }
}
