use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;

use super::util::map_sql_error;
use super::{CatalogError, CatalogStore, MediaRecord, Validity};

/// Record counts per validation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: u64,
    pub pending: u64,
    pub valid: u64,
    pub invalid: u64,
}

const RECORD_COLUMNS: &str =
    "filename, checksum, checksummed_on, last_modified_on, validated_on, is_valid";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    Ok(MediaRecord {
        filename: row.get(0)?,
        checksum: row.get(1)?,
        checksummed_on: row.get(2)?,
        last_modified_on: row.get(3)?,
        validated_on: row.get(4)?,
        validity: Validity::from_sql(row.get(5)?),
    })
}

impl CatalogStore {
    /// Fetch the record for `filename`, if tracked.
    pub fn get(&self, filename: &str) -> Result<Option<MediaRecord>, CatalogError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE filename = ?1",
            self.table()
        );
        self.connection
            .query_row(&sql, params![filename], record_from_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Whether a record exists for `filename`.
    pub fn contains(&self, filename: &str) -> Result<bool, CatalogError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE filename = ?1)",
            self.table()
        );
        self.connection
            .query_row(&sql, params![filename], |row| row.get(0))
            .map_err(map_sql_error)
    }

    /// Files awaiting validation, oldest checksum first.
    pub fn pending_validation(&self) -> Result<Vec<String>, CatalogError> {
        self.filenames_where("is_valid IS NULL ORDER BY checksummed_on ASC, filename ASC")
    }

    /// Every tracked filename.
    pub fn filenames(&self) -> Result<Vec<String>, CatalogError> {
        self.filenames_where("1 = 1 ORDER BY filename ASC")
    }

    /// Files whose last validation failed.
    pub fn invalid_filenames(&self) -> Result<Vec<String>, CatalogError> {
        self.filenames_where("is_valid = 0 ORDER BY filename ASC")
    }

    /// Count records per validation state.
    pub fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let sql = format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN is_valid IS NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_valid != 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_valid = 0 THEN 1 ELSE 0 END), 0)
             FROM {}",
            self.table()
        );
        self.connection
            .query_row(&sql, [], |row| {
                Ok(CatalogStats {
                    total: row.get::<_, i64>(0)? as u64,
                    pending: row.get::<_, i64>(1)? as u64,
                    valid: row.get::<_, i64>(2)? as u64,
                    invalid: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(map_sql_error)
    }

    fn filenames_where(&self, clause: &str) -> Result<Vec<String>, CatalogError> {
        let sql = format!("SELECT filename FROM {} WHERE {clause}", self.table());
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CatalogStore {
        CatalogStore::open_in_memory("media_monitor").unwrap()
    }

    #[test]
    fn get_returns_none_for_untracked_file() {
        let store = store();
        assert!(store.get("/nope.mkv").unwrap().is_none());
        assert!(!store.contains("/nope.mkv").unwrap());
    }

    #[test]
    fn pending_is_ordered_by_checksum_age_then_name() {
        let store = store();
        store.upsert_checksum("/m/c.mkv", "c", 300, 1).unwrap();
        store.upsert_checksum("/m/b.mkv", "b", 100, 1).unwrap();
        store.upsert_checksum("/m/a.mkv", "a", 100, 1).unwrap();
        store.upsert_checksum("/m/d.mkv", "d", 50, 1).unwrap();
        store.set_validity("/m/d.mkv", true, 60).unwrap();

        assert_eq!(
            store.pending_validation().unwrap(),
            vec!["/m/a.mkv", "/m/b.mkv", "/m/c.mkv"]
        );
    }

    #[test]
    fn invalid_filenames_and_stats_track_states() {
        let store = store();
        for (name, at) in [("/m/a.mkv", 1), ("/m/b.mkv", 2), ("/m/c.mkv", 3), ("/m/d.mkv", 4)] {
            store.upsert_checksum(name, "x", at, 1).unwrap();
        }
        store.set_validity("/m/c.mkv", false, 10).unwrap();
        store.set_validity("/m/a.mkv", false, 10).unwrap();
        store.set_validity("/m/b.mkv", true, 10).unwrap();

        assert_eq!(store.invalid_filenames().unwrap(), vec!["/m/a.mkv", "/m/c.mkv"]);
        assert_eq!(
            store.stats().unwrap(),
            CatalogStats {
                total: 4,
                pending: 1,
                valid: 1,
                invalid: 2,
            }
        );
    }
}
