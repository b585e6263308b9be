use chrono::{SecondsFormat, Utc};
use honey_core::{QueryState, QueryStatus};
use rusqlite::{OptionalExtension, Row, params};

use crate::Db;
use crate::error::{DbError, Result};

/// One submitted query as recorded by the local query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecution {
    pub id: String,
    pub query: String,
    pub database: String,
    pub workgroup: String,
    pub state: QueryState,
    pub reason: Option<String>,
    pub output_location: Option<String>,
    pub submitted_at: String,
    pub completed_at: Option<String>,
}

impl QueryExecution {
    pub fn queued(id: String, query: &str, database: &str, workgroup: &str) -> Self {
        Self {
            id,
            query: query.to_string(),
            database: database.to_string(),
            workgroup: workgroup.to_string(),
            state: QueryState::Queued,
            reason: None,
            output_location: None,
            submitted_at: now_rfc3339(),
            completed_at: None,
        }
    }

    pub fn status(&self) -> QueryStatus {
        QueryStatus {
            state: self.state,
            reason: self.reason.clone(),
        }
    }
}

impl Db {
    pub fn insert_execution(&self, execution: &QueryExecution) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO query_execution (
              id, query, database_name, workgroup, state, reason, output_location,
              submitted_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                execution.id,
                execution.query,
                execution.database,
                execution.workgroup,
                execution.state.as_str(),
                execution.reason,
                execution.output_location,
                execution.submitted_at,
                execution.completed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_execution(&self, id: &str) -> Result<Option<QueryExecution>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT id, query, database_name, workgroup, state, reason, output_location,
                       submitted_at, completed_at
                FROM query_execution
                WHERE id = ?1
                "#,
                params![id],
                row_to_raw_execution,
            )
            .optional()?;
        row.map(RawExecution::into_execution).transpose()
    }

    pub fn update_execution_state(
        &self,
        id: &str,
        state: QueryState,
        reason: Option<&str>,
        output_location: Option<&str>,
    ) -> Result<()> {
        let completed_at = state.is_terminal().then(now_rfc3339);
        let updated = self.conn.execute(
            r#"
            UPDATE query_execution
            SET state = ?2, reason = ?3, output_location = COALESCE(?4, output_location),
                completed_at = ?5
            WHERE id = ?1
            "#,
            params![id, state.as_str(), reason, output_location, completed_at],
        )?;
        if updated == 0 {
            return Err(DbError::InvalidInput(format!(
                "query execution {} not found",
                id
            )));
        }
        Ok(())
    }
}

struct RawExecution {
    id: String,
    query: String,
    database: String,
    workgroup: String,
    state: String,
    reason: Option<String>,
    output_location: Option<String>,
    submitted_at: String,
    completed_at: Option<String>,
}

impl RawExecution {
    fn into_execution(self) -> Result<QueryExecution> {
        let state = QueryState::parse(&self.state).ok_or(DbError::UnknownState(self.state))?;
        Ok(QueryExecution {
            id: self.id,
            query: self.query,
            database: self.database,
            workgroup: self.workgroup,
            state,
            reason: self.reason,
            output_location: self.output_location,
            submitted_at: self.submitted_at,
            completed_at: self.completed_at,
        })
    }
}

fn row_to_raw_execution(row: &Row<'_>) -> rusqlite::Result<RawExecution> {
    Ok(RawExecution {
        id: row.get(0)?,
        query: row.get(1)?,
        database: row.get(2)?,
        workgroup: row.get(3)?,
        state: row.get(4)?,
        reason: row.get(5)?,
        output_location: row.get(6)?,
        submitted_at: row.get(7)?,
        completed_at: row.get(8)?,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
