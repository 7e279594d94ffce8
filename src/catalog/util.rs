use std::path::Path;

use super::CatalogError;
use crate::config::defaults::is_valid_table_name;

/// Translate rusqlite errors into friendlier CatalogError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> CatalogError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.code == rusqlite::ErrorCode::DatabaseBusy =>
        {
            CatalogError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => CatalogError::Unexpected,
        other => CatalogError::Sql(other),
    }
}

/// Validate a table name and wrap it in double quotes for interpolation.
pub(super) fn quote_table_name(name: &str) -> Result<String, CatalogError> {
    if !is_valid_table_name(name) {
        return Err(CatalogError::InvalidTableName(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_accepts_plain_identifiers() {
        assert_eq!(quote_table_name("media_monitor").unwrap(), "\"media_monitor\"");
        assert_eq!(quote_table_name("_t2").unwrap(), "\"_t2\"");
    }

    #[test]
    fn quote_rejects_everything_else() {
        for name in ["", "1abc", "public.media", "a b", "a\"b", "sqlite_master"] {
            assert!(
                matches!(quote_table_name(name), Err(CatalogError::InvalidTableName(_))),
                "{name} should be rejected"
            );
        }
    }
}
