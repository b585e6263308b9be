#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use honey_core::{
    ObjectLocation, QueryService, QueryState, QueryStatus, ServiceError,
};
use honey_sync::{
    AggregationPlan, AggregationSettings, MemoryObjectStore, PollPolicy, SyncSettings,
    marker_path, write_marker,
};
use tempfile::TempDir;

pub const BUCKET: &str = "honey-data";
pub const PREFIX: &str = "rotations";
pub const DATABASE: &str = "honey";
pub const TABLE: &str = "rotations";

pub fn results_location() -> ObjectLocation {
    ObjectLocation::new(BUCKET, "query-results")
}

pub fn public_location() -> ObjectLocation {
    ObjectLocation::new("honey-public", "")
}

pub fn plan() -> AggregationPlan {
    AggregationPlan::rotations(AggregationSettings {
        database: DATABASE.to_string(),
        workgroup: "primary".to_string(),
        table: TABLE.to_string(),
        results_location: results_location(),
        public_location: public_location(),
    })
}

pub fn settings(data_path: &Path) -> SyncSettings {
    SyncSettings {
        data_path: data_path.to_path_buf(),
        bucket: BUCKET.to_string(),
        prefix: PREFIX.to_string(),
        interval: Duration::from_secs(600),
        poll: PollPolicy::new(Duration::from_secs(10), 3),
        plan: plan(),
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub struct DataDir {
    pub dir: TempDir,
}

impl DataDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn set_marker(&self, ts: DateTime<Utc>) {
        write_marker(&marker_path(self.path()), ts).expect("write marker");
    }

    pub fn write_ledger(&self, stem: &str, contents: &[u8]) -> PathBuf {
        let path = self.path().join(format!("{stem}.csv"));
        fs::write(&path, contents).expect("write ledger");
        path
    }
}

/// Query service fake. Every submission succeeds on its first status check
/// (unless its text matches a failure rule) and drops a result object into
/// the shared store.
pub struct ScriptedQueryService {
    store: Arc<MemoryObjectStore>,
    results_location: ObjectLocation,
    submissions: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, QueryStatus>>,
    failures: Mutex<Vec<(String, String)>>,
    rejections: Mutex<Vec<(String, String)>>,
    stalls: Mutex<Vec<String>>,
}

impl ScriptedQueryService {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            results_location: results_location(),
            submissions: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            rejections: Mutex::new(Vec::new()),
            stalls: Mutex::new(Vec::new()),
        }
    }

    /// Queries containing `fragment` end in `FAILED` with `reason`.
    pub fn fail_when(&self, fragment: &str, reason: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((fragment.to_string(), reason.to_string()));
    }

    /// Submitting a query containing `fragment` fails with `reason`.
    pub fn reject_when(&self, fragment: &str, reason: &str) {
        self.rejections
            .lock()
            .unwrap()
            .push((fragment.to_string(), reason.to_string()));
    }

    /// Queries containing `fragment` stay `RUNNING` forever.
    pub fn stall_when(&self, fragment: &str) {
        self.stalls.lock().unwrap().push(fragment.to_string());
    }

    pub fn submissions(&self) -> Vec<String> {
        self.submissions.lock().unwrap().clone()
    }
}

impl QueryService for ScriptedQueryService {
    fn submit(&self, query: &str, database: &str, _workgroup: &str) -> Result<String, ServiceError> {
        if database != DATABASE {
            return Err(ServiceError::new(format!("unknown database {database}")));
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(query.to_string());
        let rejection = self
            .rejections
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, reason)| reason.clone());
        if let Some(reason) = rejection {
            return Err(ServiceError::new(reason));
        }
        let execution_id = format!("exec-{}", submissions.len());
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, reason)| reason.clone());
        let stalled = self
            .stalls
            .lock()
            .unwrap()
            .iter()
            .any(|fragment| query.contains(fragment.as_str()));
        let status = match failure {
            Some(reason) => QueryStatus::failed(reason),
            None if stalled => QueryStatus::new(QueryState::Running),
            None => {
                self.store.insert(
                    self.results_location.join(&format!("{execution_id}.csv")),
                    format!("\"query\"\n\"{execution_id}\"\n"),
                );
                QueryStatus::new(QueryState::Succeeded)
            }
        };
        self.statuses
            .lock()
            .unwrap()
            .insert(execution_id.clone(), status);
        Ok(execution_id)
    }

    fn get_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError> {
        self.statuses
            .lock()
            .unwrap()
            .get(execution_id)
            .cloned()
            .ok_or_else(|| ServiceError::new(format!("unknown execution {execution_id}")))
    }
}
