use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use honey_core::{HourBucket, LEDGER_EXTENSION, LedgerRecord, is_safe_to_consume};
use tracing::debug;
use walkdir::WalkDir;

use crate::types::Result;

/// A ledger file and the hour bucket parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFile {
    pub path: PathBuf,
    pub bucket: HourBucket,
}

impl LedgerFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.bucket.file_name())
    }
}

pub fn ledger_path(data_path: &Path, bucket: HourBucket) -> PathBuf {
    data_path.join(bucket.file_name())
}

/// Lists `{YYYY-MM-DD-HH}.csv` files directly inside `data_path`, oldest first.
pub fn list_ledger_files(data_path: &Path) -> Result<Vec<LedgerFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(data_path).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|value| value.to_str()) != Some(LEDGER_EXTENSION)
        {
            continue;
        }
        let Some(bucket) = path
            .file_stem()
            .and_then(|value| value.to_str())
            .and_then(HourBucket::parse)
        else {
            debug!(path = %path.display(), "ignoring file without an hour bucket name");
            continue;
        };
        files.push(LedgerFile {
            path: path.to_path_buf(),
            bucket,
        });
    }
    files.sort_by(|a, b| a.bucket.cmp(&b.bucket).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

/// Splits files into those safe to consume under `marker` and those still
/// being written.
pub fn split_eligible(
    files: Vec<LedgerFile>,
    marker: HourBucket,
) -> (Vec<LedgerFile>, Vec<LedgerFile>) {
    files
        .into_iter()
        .partition(|file| is_safe_to_consume(marker, file.bucket))
}

/// Appends one record to its bucket's ledger file, creating the file if needed.
pub fn append_record(data_path: &Path, record: &LedgerRecord) -> Result<PathBuf> {
    let path = ledger_path(data_path, record.bucket());
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(record.to_line().as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;

    fn bucket(value: &str) -> HourBucket {
        HourBucket::parse(value).expect("bucket")
    }

    #[test]
    fn list_parses_names_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "2024-01-01-05.csv",
            "2024-01-01-03.csv",
            "MARKER",
            "notes.csv",
            "2024-01-01T04.csv",
            "2024-01-01-04.txt",
        ] {
            fs::write(dir.path().join(name), "").expect("write");
        }
        fs::create_dir(dir.path().join("2024-01-01-01.csv")).expect("dir");

        let files = list_ledger_files(dir.path()).expect("list");
        let buckets: Vec<String> = files.iter().map(|file| file.bucket.to_string()).collect();
        assert_eq!(buckets, vec!["2024-01-01-03", "2024-01-01-05"]);
        assert_eq!(files[0].file_name(), "2024-01-01-03.csv");
    }

    #[test]
    fn list_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(list_ledger_files(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn split_selects_only_buckets_before_marker() {
        let files = ["2024-01-01-03", "2024-01-01-04", "2024-01-01-05", "2024-01-01-06"]
            .into_iter()
            .map(|value| LedgerFile {
                path: PathBuf::from(format!("{value}.csv")),
                bucket: bucket(value),
            })
            .collect();
        let (eligible, pending) = split_eligible(files, bucket("2024-01-01-05"));
        let eligible: Vec<String> = eligible.iter().map(|f| f.bucket.to_string()).collect();
        let pending: Vec<String> = pending.iter().map(|f| f.bucket.to_string()).collect();
        assert_eq!(eligible, vec!["2024-01-01-03", "2024-01-01-04"]);
        assert_eq!(pending, vec!["2024-01-01-05", "2024-01-01-06"]);
    }

    #[test]
    fn append_record_writes_bucket_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = LedgerRecord::new(Utc.with_ymd_and_hms(2024, 1, 1, 3, 1, 0).unwrap(), 7);
        let second = LedgerRecord::new(Utc.with_ymd_and_hms(2024, 1, 1, 3, 2, 0).unwrap(), 9);
        let path = append_record(dir.path(), &first).expect("append");
        append_record(dir.path(), &second).expect("append");
        assert_eq!(path, dir.path().join("2024-01-01-03.csv"));
        assert_eq!(
            fs::read_to_string(path).expect("read"),
            "2024-01-01T03:01:00Z,7\n2024-01-01T03:02:00Z,9\n"
        );
    }
}
