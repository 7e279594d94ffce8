use rusqlite::{Connection, params};

use super::CatalogError;
use super::util::map_sql_error;

/// Create the catalog table and its indices if absent, then confirm it exists.
///
/// Existing tables are never altered.
pub(super) fn apply_schema(connection: &Connection, table: &str) -> Result<(), CatalogError> {
    let bare = table.trim_matches('"');
    connection
        .execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                filename TEXT PRIMARY KEY,
                checksum TEXT,
                checksummed_on INTEGER,
                validated_on INTEGER,
                is_valid INTEGER,
                last_modified_on INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS \"idx_{bare}_pending\"
                ON {table} (is_valid, checksummed_on);"
        ))
        .map_err(map_sql_error)?;

    let exists: bool = connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![bare],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;
    if !exists {
        return Err(CatalogError::Bootstrap(bare.to_string()));
    }
    Ok(())
}
