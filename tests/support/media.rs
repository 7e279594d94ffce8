use std::fs;
use std::path::{Path, PathBuf};

use mediamon::catalog::{CatalogStore, MediaRecord};
use mediamon::config::{
    CatalogSettings, GuardSettings, LoggingSettings, MediaSettings, MonitorConfig,
    ValidatorSettings,
};
use tempfile::TempDir;

/// Silent validator: every file is valid.
pub const SILENT_VALIDATOR: &str = "true {filename}";
/// Validator that complains about every file.
pub const NOISY_VALIDATOR: &str = "echo 'Invalid data found' 1>&2; true {filename}";
/// Validator that appends to the file it checks.
pub const MUTATING_VALIDATOR: &str = "echo x >> {filename}";

/// Media tree, catalog and lock file under one temp directory.
pub struct MediaHarness {
    temp: TempDir,
    pub media_root: PathBuf,
}

impl MediaHarness {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("create tempdir");
        let media_root = temp.path().join("media");
        fs::create_dir_all(&media_root).expect("create media dir");
        Self { temp, media_root }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp.path().join("state").join("catalog.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.temp.path().join("state").join("mediamon.lock")
    }

    pub fn config(&self, command: &str) -> MonitorConfig {
        MonitorConfig {
            catalog: CatalogSettings {
                database_path: Some(self.db_path()),
                ..CatalogSettings::default()
            },
            media: MediaSettings {
                locations: vec![self.media_root.clone()],
                ..MediaSettings::default()
            },
            validator: ValidatorSettings {
                command: command.to_string(),
                timeout_secs: Some(30),
            },
            guard: GuardSettings {
                lock_path: Some(self.lock_path()),
            },
            logging: LoggingSettings {
                directory: Some(self.temp.path().join("logs")),
                ..LoggingSettings::default()
            },
            ..MonitorConfig::default()
        }
        .validated()
        .expect("valid test config")
    }

    /// Write a media file and return its catalog key.
    pub fn write_media(&self, relative: &str, contents: &[u8]) -> String {
        let path = self.media_root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create media parent");
        }
        fs::write(&path, contents).expect("write media file");
        path.to_str().expect("utf-8 temp path").to_string()
    }

    pub fn store(&self) -> CatalogStore {
        CatalogStore::open(self.db_path(), "media_monitor").expect("open catalog")
    }

    pub fn record(&self, filename: &str) -> Option<MediaRecord> {
        self.store().get(filename).expect("query catalog")
    }
}

/// Set a file's access and modification time to `secs` since the epoch.
#[cfg(unix)]
pub fn set_mtime(path: &Path, secs: i64) {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).expect("path without NUL");
    let stamp = libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: 0,
    };
    let times = [stamp, stamp];
    // SAFETY: c_path is NUL terminated and times points at two valid timespecs.
    let rc = unsafe { libc::utimensat(libc::AT_FDCWD, c_path.as_ptr(), times.as_ptr(), 0) };
    assert_eq!(rc, 0, "utimensat failed: {}", std::io::Error::last_os_error());
}
