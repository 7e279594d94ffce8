use rusqlite::params;

use super::util::map_sql_error;
use super::{CatalogError, CatalogStore};

impl CatalogStore {
    /// Store a freshly computed checksum, creating the record if needed.
    ///
    /// Any previous validation result is cleared so the file is queued for
    /// validation again.
    pub fn upsert_checksum(
        &self,
        filename: &str,
        checksum: &str,
        checksummed_on: i64,
        last_modified_on: i64,
    ) -> Result<(), CatalogError> {
        let sql = format!(
            "INSERT INTO {} (filename, checksum, checksummed_on, validated_on, is_valid, last_modified_on)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4)
             ON CONFLICT(filename) DO UPDATE SET
                checksum = excluded.checksum,
                checksummed_on = excluded.checksummed_on,
                validated_on = NULL,
                is_valid = NULL,
                last_modified_on = excluded.last_modified_on",
            self.table()
        );
        self.connection
            .execute(
                &sql,
                params![filename, checksum, checksummed_on, last_modified_on],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Record a validation verdict for an existing record.
    pub fn set_validity(
        &self,
        filename: &str,
        valid: bool,
        validated_on: i64,
    ) -> Result<(), CatalogError> {
        let sql = format!(
            "UPDATE {} SET is_valid = ?1, validated_on = ?2 WHERE filename = ?3",
            self.table()
        );
        let changed = self
            .connection
            .execute(&sql, params![valid, validated_on, filename])
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(CatalogError::MissingRecord(filename.to_string()));
        }
        Ok(())
    }

    /// Remove the record for `filename` and confirm it is gone.
    ///
    /// Returns whether a row was deleted.
    pub fn delete(&self, filename: &str) -> Result<bool, CatalogError> {
        let sql = format!("DELETE FROM {} WHERE filename = ?1", self.table());
        let removed = self
            .connection
            .execute(&sql, params![filename])
            .map_err(map_sql_error)?;
        if self.contains(filename)? {
            return Err(CatalogError::DeleteNotApplied(filename.to_string()));
        }
        Ok(removed > 0)
    }
}
