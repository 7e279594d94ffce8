//! SQLite catalog holding one record per tracked media file.
//!
//! The catalog is the only source of truth for checksum and validation state.
//! Every mutation is a single auto-committed statement, so a run that is
//! killed halfway leaves each record in a consistent state.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod read;
mod schema;
mod util;
mod write;

pub use read::CatalogStats;

/// Validation state of a tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    /// Never validated, or the checksum changed since the last validation.
    Pending,
    /// The validator printed nothing.
    Valid,
    /// The validator reported a problem.
    Invalid,
}

impl Validity {
    /// Column value: NULL for pending, 1/0 otherwise.
    pub fn as_sql(self) -> Option<bool> {
        match self {
            Validity::Pending => None,
            Validity::Valid => Some(true),
            Validity::Invalid => Some(false),
        }
    }

    /// Parse the nullable `is_valid` column.
    pub fn from_sql(value: Option<i64>) -> Self {
        match value {
            None => Validity::Pending,
            Some(0) => Validity::Invalid,
            Some(_) => Validity::Valid,
        }
    }

    /// Map a validator verdict onto the stored state.
    pub fn from_verdict(valid: bool) -> Self {
        if valid {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Absolute path; the record's identity.
    pub filename: String,
    /// Hex content digest, absent until first computed.
    pub checksum: Option<String>,
    /// Unix seconds of the last checksum computation.
    pub checksummed_on: Option<i64>,
    /// File modification time (unix nanoseconds) captured with the checksum.
    pub last_modified_on: i64,
    /// Unix seconds of the last completed validation.
    pub validated_on: Option<i64>,
    pub validity: Validity,
}

/// Errors returned by the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The configured table name cannot be used as an SQL identifier.
    #[error("Invalid catalog table name: {0}")]
    InvalidTableName(String),
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to create the database's parent directory.
    #[error("Could not create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The table is still missing after bootstrap.
    #[error("Catalog table `{0}` could not be created; check permissions")]
    Bootstrap(String),
    /// An update targeted a filename that has no record.
    #[error("No catalog record for {0}")]
    MissingRecord(String),
    /// A delete ran but the record is still there.
    #[error("Record for {0} is still present after delete")]
    DeleteNotApplied(String),
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

/// SQLite-backed catalog for a single table.
pub struct CatalogStore {
    connection: Connection,
    table: String,
}

impl CatalogStore {
    /// Open (or create) the catalog database and bootstrap the table.
    pub fn open(db_path: impl AsRef<Path>, table: &str) -> Result<Self, CatalogError> {
        let db_path = db_path.as_ref();
        util::create_parent_if_needed(db_path)?;
        let connection = Connection::open(db_path)?;
        Self::with_connection(connection, table)
    }

    /// Open a private in-memory catalog.
    pub fn open_in_memory(table: &str) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(connection: Connection, table: &str) -> Result<Self, CatalogError> {
        let table = util::quote_table_name(table)?;
        let store = Self { connection, table };
        store.apply_pragmas()?;
        schema::apply_schema(&store.connection, &store.table)?;
        Ok(store)
    }

    /// Quoted table name used in statements.
    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }

    fn apply_pragmas(&self) -> Result<(), CatalogError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
            )
            .map_err(util::map_sql_error)
    }
}
