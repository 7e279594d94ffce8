pub(super) const DEFAULT_TABLE_NAME: &str = "media_monitor";
pub(super) const DEFAULT_DATABASE_FILE: &str = "catalog.db";
pub(super) const DEFAULT_LOCK_FILE: &str = "mediamon.lock";
pub const FILENAME_PLACEHOLDER: &str = "{filename}";

pub(super) fn default_table() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

pub(super) fn default_extensions() -> Vec<String> {
    [
        "mp4", "mpeg", "mov", "wmv", "avi", "mkv", "mp3", "flac", "wma", "ogg",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

pub(super) fn default_checksum_ttl_days() -> u32 {
    180
}

pub(super) fn default_validate_command() -> String {
    "ffmpeg -v error -i {filename} -f null -".to_string()
}

pub(super) fn default_max_log_files() -> usize {
    10
}

pub(super) fn default_false() -> bool {
    false
}

/// Lowercase, strip leading dots, drop blanks and duplicates while keeping order.
pub(super) fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let cleaned = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if cleaned.is_empty() || normalized.contains(&cleaned) {
            continue;
        }
        normalized.push(cleaned);
    }
    normalized
}

/// SQLite identifiers are interpolated into statements, so only plain names pass.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.to_ascii_lowercase().starts_with("sqlite_")
}
