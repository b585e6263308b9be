use std::path::Path;

use honey_core::{HourBucket, ObjectStore};
use tracing::{debug, info, warn};

use crate::ledger::{list_ledger_files, split_eligible};
use crate::publish::{PublishOutcome, publish_file};
use crate::repair::{RepairOutcome, repair_file};
use crate::types::{Result, SyncIssue, SyncStats};

/// Repairs and publishes every ledger file whose bucket is before `marker`.
///
/// Per-file failures are recorded as issues and never stop the pass.
pub fn sync_ledger<S: ObjectStore>(
    store: &S,
    data_path: &Path,
    marker: HourBucket,
    bucket: &str,
    prefix: &str,
) -> Result<SyncStats> {
    sync_ledger_with(store, data_path, marker, bucket, prefix, repair_file)
}

pub(crate) fn sync_ledger_with<S, R>(
    store: &S,
    data_path: &Path,
    marker: HourBucket,
    bucket: &str,
    prefix: &str,
    mut repair: R,
) -> Result<SyncStats>
where
    S: ObjectStore,
    R: FnMut(&Path) -> Result<RepairOutcome>,
{
    let files = list_ledger_files(data_path)?;
    let mut stats = SyncStats {
        files_scanned: files.len(),
        ..SyncStats::default()
    };
    let (eligible, pending) = split_eligible(files, marker);
    stats.files_skipped = pending.len();
    for file in &pending {
        debug!(path = %file.path.display(), %marker, "ledger file not yet eligible");
    }

    for file in eligible {
        let path_label = file.path.display().to_string();
        match repair(&file.path) {
            Ok(repair) => {
                if repair.nul_bytes_removed > 0 {
                    info!(path = %path_label, removed = repair.nul_bytes_removed, "repaired ledger file");
                }
                stats.nul_bytes_removed += repair.nul_bytes_removed;
            }
            Err(err) => {
                warn!(path = %path_label, error = %err, "ledger repair failed");
                stats.files_failed += 1;
                stats
                    .issues
                    .push(SyncIssue::new(path_label, format!("repair failed: {err}")));
                continue;
            }
        }

        match publish_file(store, &file, bucket, prefix) {
            PublishOutcome::Published { delete_error, .. } => {
                stats.files_published += 1;
                if let Some(reason) = delete_error {
                    stats.issues.push(SyncIssue::new(
                        path_label,
                        format!("published but not removed: {reason}"),
                    ));
                }
            }
            PublishOutcome::Failed { reason } => {
                stats.files_failed += 1;
                stats
                    .issues
                    .push(SyncIssue::new(path_label, format!("publish failed: {reason}")));
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{marker_path, write_marker};
    use crate::repair::repair_file_with;
    use crate::store::MemoryObjectStore;
    use chrono::{TimeZone, Utc};
    use honey_core::ObjectLocation;
    use std::fs;
    use std::io;

    #[test]
    fn repair_failure_skips_only_that_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker_ts = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        write_marker(&marker_path(dir.path()), marker_ts).expect("marker");
        let broken = dir.path().join("2024-01-01-02.csv");
        let healthy = dir.path().join("2024-01-01-03.csv");
        fs::write(&broken, "2024-01-01T02:00:00Z,1\n\0").expect("seed broken");
        fs::write(&healthy, "2024-01-01T03:00:00Z,2\n").expect("seed healthy");
        let store = MemoryObjectStore::new();

        let stats = sync_ledger_with(
            &store,
            dir.path(),
            HourBucket::from_datetime(marker_ts),
            "honey-data",
            "rotations",
            |path| {
                if path.ends_with("2024-01-01-02.csv") {
                    repair_file_with(path, |_, _| Err(io::Error::other("disk full")))
                } else {
                    repair_file(path)
                }
            },
        )
        .expect("sync");

        assert_eq!(stats.files_published, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.issues.len(), 1);
        assert!(stats.issues[0].file_path.ends_with("2024-01-01-02.csv"));
        assert!(stats.issues[0].message.contains("repair failed"));

        assert_eq!(
            fs::read(&broken).expect("broken kept"),
            b"2024-01-01T02:00:00Z,1\n\0"
        );
        assert!(!healthy.exists());
        let prefix = "rotations/year=2024/month=01/day=01";
        assert_eq!(
            store
                .get(&ObjectLocation::new("honey-data", format!("{prefix}/2024-01-01-02.csv")))
                .expect("get"),
            None
        );
        assert_eq!(
            store
                .get(&ObjectLocation::new("honey-data", format!("{prefix}/2024-01-01-03.csv")))
                .expect("get"),
            Some(b"2024-01-01T03:00:00Z,2\n".to_vec())
        );
    }
}
