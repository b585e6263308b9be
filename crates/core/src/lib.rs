mod services;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize, Serializer};

pub use services::{ObjectAcl, ObjectMeta, ObjectStore, QueryService, ServiceError};

/// Length of a rendered hour bucket, `YYYY-MM-DD-HH`.
pub const HOUR_BUCKET_LEN: usize = 13;

/// Extension used by ledger files and partitioned objects.
pub const LEDGER_EXTENSION: &str = "csv";

/// A UTC timestamp truncated to the hour.
///
/// Rendered and parsed as `YYYY-MM-DD-HH`. The same format names ledger files
/// and fills the cursor marker, so ordering buckets is ordering hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourBucket(DateTime<Utc>);

impl HourBucket {
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        let naive = ts.naive_utc();
        let hour = NaiveTime::from_hms_opt(naive.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
        Self(Utc.from_utc_datetime(&naive.date().and_time(hour)))
    }

    /// Strict parse: exactly 13 characters, zero padded, dash separated.
    pub fn parse(value: &str) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.len() != HOUR_BUCKET_LEN || bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'-'
        {
            return None;
        }
        let field = |start: usize, end: usize| -> Option<u32> {
            let digits = value.get(start..end)?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()
        };
        let year = i32::try_from(field(0, 4)?).ok()?;
        let month = field(5, 7)?;
        let day = field(8, 10)?;
        let hour = field(11, 13)?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
        Some(Self(Utc.from_utc_datetime(&naive)))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Ledger file name for this bucket, e.g. `2024-01-01-03.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self, LEDGER_EXTENSION)
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d-%H"))
    }
}

impl Serialize for HourBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A bucket is safe to consume once the writer's marker has moved past it.
pub fn is_safe_to_consume(marker: HourBucket, bucket: HourBucket) -> bool {
    bucket < marker
}

/// One `(timestamp, count)` line of a ledger file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRecord {
    pub ts: DateTime<Utc>,
    pub count: u64,
}

impl LedgerRecord {
    pub fn new(ts: DateTime<Utc>, count: u64) -> Self {
        let ts = ts.with_nanosecond(0).unwrap_or(ts);
        Self { ts, count }
    }

    pub fn bucket(&self) -> HourBucket {
        HourBucket::from_datetime(self.ts)
    }

    pub fn ts_string(&self) -> String {
        self.ts.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn to_line(&self) -> String {
        format!("{},{}\n", self.ts_string(), self.count)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        let (ts, count) = line.split_once(',')?;
        let ts = DateTime::parse_from_rfc3339(ts.trim()).ok()?;
        let count = count.trim().parse::<u64>().ok()?;
        Some(Self::new(ts.with_timezone(&Utc), count))
    }
}

/// Object store address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_start_matches('/').to_string(),
        }
    }

    /// Parses `s3://bucket/key`. The key may be empty.
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri.trim().strip_prefix("s3://")?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }

    /// Appends `name` below this location's key.
    pub fn join(&self, name: &str) -> Self {
        let prefix = self.key.trim_end_matches('/');
        let name = name.trim_start_matches('/');
        if prefix.is_empty() {
            Self::new(self.bucket.clone(), name)
        } else {
            Self::new(self.bucket.clone(), format!("{prefix}/{name}"))
        }
    }

    /// Maps the location onto a directory tree rooted at `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.join(&self.bucket);
        for segment in self.key.split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl TryFrom<String> for ObjectLocation {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid object location {value:?}"))
    }
}

impl From<ObjectLocation> for String {
    fn from(value: ObjectLocation) -> Self {
        value.to_string()
    }
}

/// Key for a ledger file under `{prefix}/year=YYYY/month=MM/day=DD/`.
///
/// Partitioned by the bucket's own date, not by upload time.
pub fn partition_key(prefix: &str, bucket: HourBucket, file_name: &str) -> String {
    let partition = format!(
        "year={:04}/month={:02}/day={:02}/{}",
        bucket.year(),
        bucket.month(),
        bucket.day(),
        file_name
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        partition
    } else {
        format!("{prefix}/{partition}")
    }
}

/// States reported by the analytical query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub state: QueryState,
    pub reason: Option<String>,
}

impl QueryStatus {
    pub fn new(state: QueryState) -> Self {
        Self {
            state,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: QueryState::Failed,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(value: &str) -> HourBucket {
        HourBucket::parse(value).expect("bucket")
    }

    #[test]
    fn hour_bucket_truncates_and_renders() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 5, 42, 17).unwrap();
        let bucket = HourBucket::from_datetime(ts);
        assert_eq!(bucket.to_string(), "2024-01-01-05");
        assert_eq!(bucket.file_name(), "2024-01-01-05.csv");
        assert_eq!(
            bucket.start(),
            Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn hour_bucket_parse_is_strict() {
        assert!(HourBucket::parse("2024-01-01-05").is_some());
        assert!(HourBucket::parse("2024-01-01T05").is_none());
        assert!(HourBucket::parse("2024-01-01-5").is_none());
        assert!(HourBucket::parse("2024-01-01-05 ").is_none());
        assert!(HourBucket::parse("2024-13-01-05").is_none());
        assert!(HourBucket::parse("2024-01-01-24").is_none());
        assert!(HourBucket::parse("+024-01-01-05").is_none());
    }

    #[test]
    fn truncated_prefixes_never_parse() {
        let full = "2024-01-01-05";
        for len in 0..full.len() {
            assert!(HourBucket::parse(&full[..len]).is_none(), "prefix {len}");
        }
    }

    #[test]
    fn safe_to_consume_only_strictly_older_buckets() {
        let marker = bucket("2024-01-01-05");
        assert!(is_safe_to_consume(marker, bucket("2024-01-01-04")));
        assert!(is_safe_to_consume(marker, bucket("2023-12-31-23")));
        assert!(!is_safe_to_consume(marker, bucket("2024-01-01-05")));
        assert!(!is_safe_to_consume(marker, bucket("2024-01-01-06")));
    }

    #[test]
    fn ledger_record_line_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 3, 15, 0).unwrap();
        let record = LedgerRecord::new(ts, 42);
        assert_eq!(record.to_line(), "2024-01-01T03:15:00Z,42\n");
        assert_eq!(LedgerRecord::parse_line("2024-01-01T03:15:00Z,42\r\n"), Some(record));
        assert_eq!(record.bucket().to_string(), "2024-01-01-03");
        assert!(LedgerRecord::parse_line("2024-01-01T03:15:00Z").is_none());
        assert!(LedgerRecord::parse_line("2024-01-01T03:15:00Z,-1").is_none());
    }

    #[test]
    fn partition_key_uses_bucket_date() {
        let bucket = bucket("2024-01-01-03");
        assert_eq!(
            partition_key("rotations/", bucket, "2024-01-01-03.csv"),
            "rotations/year=2024/month=01/day=01/2024-01-01-03.csv"
        );
        assert_eq!(
            partition_key("", bucket, "2024-01-01-03.csv"),
            "year=2024/month=01/day=01/2024-01-01-03.csv"
        );
    }

    #[test]
    fn object_location_parse_and_join() {
        let location = ObjectLocation::parse("s3://honey-results/athena/").expect("location");
        assert_eq!(location.bucket, "honey-results");
        assert_eq!(
            location.join("abc.csv").to_string(),
            "s3://honey-results/athena/abc.csv"
        );
        let bare = ObjectLocation::parse("s3://public").expect("bare");
        assert_eq!(bare.join("total-rotations.csv").key, "total-rotations.csv");
        assert!(ObjectLocation::parse("honey/key").is_none());
        assert!(ObjectLocation::parse("s3:///key").is_none());
        assert_eq!(
            location.join("x/y.csv").to_path(Path::new("/srv")),
            PathBuf::from("/srv/honey-results/athena/x/y.csv")
        );
    }

    #[test]
    fn query_state_round_trips_names() {
        for state in [
            QueryState::Queued,
            QueryState::Running,
            QueryState::Succeeded,
            QueryState::Failed,
            QueryState::Cancelled,
        ] {
            assert_eq!(QueryState::parse(state.as_str()), Some(state));
        }
        assert!(QueryState::parse("unknown").is_none());
        assert!(!QueryState::Running.is_terminal());
    }
}
