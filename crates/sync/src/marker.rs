use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use honey_core::HourBucket;
use tracing::{debug, warn};

use crate::types::Result;

/// Name of the cursor marker file inside the data directory.
pub const MARKER_FILE_NAME: &str = "MARKER";

pub fn marker_path(data_path: &Path) -> PathBuf {
    data_path.join(MARKER_FILE_NAME)
}

/// Writes `ts` truncated to the hour as the whole content of the marker file.
///
/// The content goes out in one bounded write; readers racing it see the old
/// value, the new value, or something that does not parse.
pub fn write_marker(path: &Path, ts: DateTime<Utc>) -> Result<String> {
    let value = HourBucket::from_datetime(ts).to_string();
    let mut file = fs::File::create(path)?;
    file.write_all(value.as_bytes())?;
    Ok(value)
}

/// Reads the marker. Missing, unreadable, or unparsable content is `None`.
pub fn read_marker(path: &Path) -> Option<HourBucket> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cursor marker");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read cursor marker");
            return None;
        }
    };
    let value = std::str::from_utf8(&bytes).ok()?.trim();
    let marker = HourBucket::parse(value);
    if marker.is_none() {
        debug!(path = %path.display(), value, "cursor marker does not parse");
    }
    marker
}
