use rusqlite::types::ValueRef;

use crate::error::{DbError, Result};
use crate::{Db, ROTATION_TABLE};

const RESERVED_TABLES: &[&str] = &[ROTATION_TABLE, "partition_file", "query_execution"];

/// Tabular result of a read-only query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// Renders the result the way the query service stores it: a header row,
    /// then one line per row, every field double-quoted.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_line(&mut out, &self.columns);
        for row in &self.rows {
            push_csv_line(&mut out, row);
        }
        out
    }
}

fn push_csv_line(out: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && table
            .chars()
            .all(|value| value.is_ascii_alphanumeric() || value == '_');
    if !valid {
        return Err(DbError::InvalidInput(format!(
            "invalid table name {:?}",
            table
        )));
    }
    if RESERVED_TABLES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(table))
    {
        return Err(DbError::InvalidInput(format!(
            "table name {} is reserved",
            table
        )));
    }
    Ok(())
}

impl Db {
    /// Exposes loaded rows under the table name queries use.
    pub fn ensure_table_view(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        self.conn.execute_batch(&format!(
            "CREATE TEMP VIEW IF NOT EXISTS {table} AS \
             SELECT ts, count, year, month, day FROM {ROTATION_TABLE}"
        ))?;
        Ok(())
    }

    pub fn run_select(&self, sql: &str) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(DbError::InvalidInput(
                "only read-only statements are supported".to_string(),
            ));
        }
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let column_count = columns.len();
        let mut rows = stmt.query([])?;
        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(value_to_string(row.get_ref(index)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(value) => value.to_string(),
        ValueRef::Real(value) => value.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quotes_every_field() {
        let result = QueryResult {
            columns: vec!["hour".to_string(), "rotations".to_string()],
            rows: vec![vec!["2024-01-01T03:00:00Z".to_string(), "4\"2".to_string()]],
        };
        assert_eq!(
            result.to_csv(),
            "\"hour\",\"rotations\"\n\"2024-01-01T03:00:00Z\",\"4\"\"2\"\n"
        );
    }

    #[test]
    fn table_names_are_plain_identifiers() {
        assert!(validate_table_name("rotations").is_ok());
        assert!(validate_table_name("_rotations_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2rotations").is_err());
        assert!(validate_table_name("rotations; DROP TABLE x").is_err());
        assert!(validate_table_name("Rotation_Row").is_err());
    }
}
