use std::fs;
use std::path::PathBuf;

use honey_core::{ObjectLocation, QueryService, QueryState, QueryStatus, ServiceError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Db;
use crate::error::Result;
use crate::executions::QueryExecution;
use crate::results::{QueryResult, validate_table_name};

/// Statement prefix that triggers partition discovery instead of SQL.
pub const PARTITION_REPAIR_PREFIX: &str = "MSCK REPAIR TABLE";

/// Settings for the local analytical query service.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub db_path: PathBuf,
    pub database: String,
    pub table: String,
    /// Directory that object locations resolve against.
    pub store_root: PathBuf,
    /// Partitioned ledger objects backing `table`.
    pub table_location: ObjectLocation,
    /// Where `{execution_id}.csv` results are written.
    pub results_location: ObjectLocation,
}

/// SQLite-backed implementation of the query service contract.
///
/// Submissions are queued; the first status check runs the query to
/// completion and records the terminal state.
#[derive(Debug, Clone)]
pub struct WarehouseQueryService {
    config: WarehouseConfig,
}

impl WarehouseQueryService {
    pub fn open(config: WarehouseConfig) -> Result<Self> {
        validate_table_name(&config.table)?;
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut db = Db::open(&config.db_path)?;
        db.migrate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn execution(&self, execution_id: &str) -> Result<Option<QueryExecution>> {
        self.db()?.get_execution(execution_id)
    }

    fn db(&self) -> Result<Db> {
        Db::open(&self.config.db_path)
    }

    fn run_execution(&self, db: &mut Db, execution: &QueryExecution) -> Result<QueryStatus> {
        db.update_execution_state(&execution.id, QueryState::Running, None, None)?;
        let output = self.config.results_location.join(&format!("{}.csv", execution.id));
        let outcome = self
            .execute(db, execution)
            .and_then(|result| self.write_result(&output, &result));
        let status = match outcome {
            Ok(()) => {
                let location = output.to_string();
                db.update_execution_state(
                    &execution.id,
                    QueryState::Succeeded,
                    None,
                    Some(&location),
                )?;
                info!(execution_id = %execution.id, output = %location, "query succeeded");
                QueryStatus::new(QueryState::Succeeded)
            }
            Err(reason) => {
                db.update_execution_state(&execution.id, QueryState::Failed, Some(&reason), None)?;
                warn!(execution_id = %execution.id, %reason, "query failed");
                QueryStatus::failed(reason)
            }
        };
        Ok(status)
    }

    fn execute(
        &self,
        db: &mut Db,
        execution: &QueryExecution,
    ) -> std::result::Result<QueryResult, String> {
        if execution.database != self.config.database {
            return Err(format!("database {} does not exist", execution.database));
        }
        let statement = execution.query.trim().trim_end_matches(';').trim();
        if let Some(table) = partition_repair_target(statement) {
            if !table.eq_ignore_ascii_case(&self.config.table) {
                return Err(format!("table {} does not exist", table));
            }
            let root = self.config.table_location.to_path(&self.config.store_root);
            let load = db.repair_partitions(&root).map_err(|err| err.to_string())?;
            return Ok(QueryResult {
                columns: vec![
                    "files_seen".to_string(),
                    "files_loaded".to_string(),
                    "rows_loaded".to_string(),
                    "rows_rejected".to_string(),
                ],
                rows: vec![vec![
                    load.files_seen.to_string(),
                    load.files_loaded.to_string(),
                    load.rows_loaded.to_string(),
                    load.rows_rejected.to_string(),
                ]],
            });
        }
        db.ensure_table_view(&self.config.table)
            .map_err(|err| err.to_string())?;
        db.run_select(statement).map_err(|err| err.to_string())
    }

    fn write_result(
        &self,
        output: &ObjectLocation,
        result: &QueryResult,
    ) -> std::result::Result<(), String> {
        let path = output.to_path(&self.config.store_root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("create results dir {}: {}", parent.display(), err))?;
        }
        fs::write(&path, result.to_csv())
            .map_err(|err| format!("write result {}: {}", path.display(), err))
    }
}

impl QueryService for WarehouseQueryService {
    fn submit(
        &self,
        query: &str,
        database: &str,
        workgroup: &str,
    ) -> std::result::Result<String, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::new("query string must not be empty"));
        }
        let db = self.db().map_err(service_error)?;
        let execution =
            QueryExecution::queued(Uuid::new_v4().to_string(), query, database, workgroup);
        db.insert_execution(&execution).map_err(service_error)?;
        debug!(execution_id = %execution.id, database, workgroup, "query submitted");
        Ok(execution.id)
    }

    fn get_status(&self, execution_id: &str) -> std::result::Result<QueryStatus, ServiceError> {
        let mut db = self.db().map_err(service_error)?;
        let Some(execution) = db.get_execution(execution_id).map_err(service_error)? else {
            return Err(ServiceError::new(format!(
                "query execution {} not found",
                execution_id
            )));
        };
        if execution.state == QueryState::Queued {
            return self
                .run_execution(&mut db, &execution)
                .map_err(service_error);
        }
        Ok(execution.status())
    }
}

/// Table named by `MSCK REPAIR TABLE <name>`, if `statement` is one.
fn partition_repair_target(statement: &str) -> Option<&str> {
    let head = statement.get(..PARTITION_REPAIR_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(PARTITION_REPAIR_PREFIX) {
        return None;
    }
    let table = statement[PARTITION_REPAIR_PREFIX.len()..]
        .trim()
        .trim_matches(|value: char| value == '`' || value == '"');
    if table.is_empty() { None } else { Some(table) }
}

fn service_error(err: crate::DbError) -> ServiceError {
    ServiceError::new(err.to_string())
}
