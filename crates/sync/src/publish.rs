use std::fs;

use honey_core::{ObjectLocation, ObjectStore, partition_key};
use tracing::{info, warn};

use crate::ledger::LedgerFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Uploaded. `delete_error` is set when the local copy could not be removed;
    /// the file is uploaded again next tick.
    Published {
        location: ObjectLocation,
        delete_error: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Uploads one ledger file under its date partition, then deletes it locally.
/// Failures leave the local file in place for the next tick.
pub fn publish_file<S: ObjectStore>(
    store: &S,
    file: &LedgerFile,
    bucket: &str,
    prefix: &str,
) -> PublishOutcome {
    let location = ObjectLocation::new(bucket, partition_key(prefix, file.bucket, &file.file_name()));
    if let Err(err) = store.put_file(&location, &file.path) {
        warn!(path = %file.path.display(), location = %location, error = %err, "publish failed");
        return PublishOutcome::Failed {
            reason: err.to_string(),
        };
    }
    let delete_error = match fs::remove_file(&file.path) {
        Ok(()) => None,
        Err(err) => {
            warn!(path = %file.path.display(), error = %err, "published file could not be removed");
            Some(err.to_string())
        }
    };
    info!(path = %file.path.display(), location = %location, "published ledger file");
    PublishOutcome::Published {
        location,
        delete_error,
    }
}
