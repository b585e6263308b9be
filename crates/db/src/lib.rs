mod error;
mod executions;
mod migrations;
mod partitions;
mod results;
mod warehouse;

use std::path::Path;

use rusqlite::Connection;

pub use error::{DbError, Result};
pub use executions::QueryExecution;
pub use partitions::{PartitionFile, PartitionLoad, discover_partition_files};
pub use results::QueryResult;
pub use warehouse::{PARTITION_REPAIR_PREFIX, WarehouseConfig, WarehouseQueryService};

/// Physical table holding loaded ledger rows. Queries see it through a view
/// named after the configured table.
pub const ROTATION_TABLE: &str = "rotation_row";

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }
}
