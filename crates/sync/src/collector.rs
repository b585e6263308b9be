use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use honey_core::LedgerRecord;
use tracing::{debug, warn};

use crate::ledger::{append_record, ledger_path};
use crate::marker::{marker_path, write_marker};
use crate::types::Result;

/// Pulse count accumulated between save ticks.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: Mutex<u64>,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn add(&self, pulses: u64) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_add(pulses);
    }

    pub fn peek(&self) -> u64 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the count and resets it to zero.
    pub fn take(&self) -> u64 {
        std::mem::take(&mut *self.count.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub marker: String,
    pub appended: Option<LedgerRecord>,
    pub path: PathBuf,
}

/// One collector save: advance the marker, then append the pending count to
/// the current bucket's ledger file. A zero count only advances the marker.
/// If the append fails the count is put back for the next tick.
pub fn save_tick(data_path: &Path, now: DateTime<Utc>, counter: &PulseCounter) -> Result<SaveOutcome> {
    let marker = write_marker(&marker_path(data_path), now)?;
    let record = LedgerRecord::new(now, counter.take());
    if record.count == 0 {
        debug!(%marker, "no pulses since last save");
        return Ok(SaveOutcome {
            marker,
            appended: None,
            path: ledger_path(data_path, record.bucket()),
        });
    }
    match append_record(data_path, &record) {
        Ok(path) => {
            debug!(%marker, count = record.count, path = %path.display(), "saved pulse count");
            Ok(SaveOutcome {
                marker,
                appended: Some(record),
                path,
            })
        }
        Err(err) => {
            warn!(count = record.count, error = %err, "failed to save pulse count");
            counter.add(record.count);
            Err(err)
        }
    }
}
