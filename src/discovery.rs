//! Enumerate media files under the configured roots.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Options controlling which entries are considered.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions<'a> {
    /// Lowercase extensions without a leading dot.
    pub extensions: &'a [String],
    pub include_hidden: bool,
}

/// Recursively list media files under `roots`.
///
/// The result is sorted, free of duplicates, and holds absolute paths as
/// strings. Roots that cannot be read are logged and skipped.
pub fn discover(roots: &[PathBuf], options: &DiscoveryOptions<'_>) -> Vec<String> {
    let mut found = BTreeSet::new();
    for root in roots {
        let root = absolute_root(root);
        if !root.is_dir() {
            warn!(root = %root.display(), "Media location is missing or not a directory");
            continue;
        }
        visit_dir(&root, options, &mut |path| {
            match path.to_str() {
                Some(name) => {
                    found.insert(name.to_string());
                }
                None => warn!(path = %path.display(), "Skipping non UTF-8 path"),
            }
        });
    }
    debug!(count = found.len(), "Discovery finished");
    found.into_iter().collect()
}

/// Whether `path` carries one of `extensions` (compared case-insensitively).
pub fn has_media_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|wanted| *wanted == ext))
}

fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn visit_dir(root: &Path, options: &DiscoveryOptions<'_>, visitor: &mut impl FnMut(&Path)) {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Failed to read directory during discovery");
                continue;
            }
        };
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read directory entry during discovery"
                    );
                    continue;
                }
            };

            let path = entry.path();
            if !options.include_hidden && is_hidden(&path) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to read file type during discovery"
                    );
                    continue;
                }
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            // Symlinks count when they resolve to a regular file.
            let is_file = file_type.is_file()
                || (file_type.is_symlink() && fs::metadata(&path).is_ok_and(|m| m.is_file()));
            if is_file && has_media_extension(&path, options.extensions) {
                visitor(&path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["mkv".into(), "mp3".into()]
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_matching_extensions_recursively_in_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.mkv"));
        touch(&root.join("Season 1/a.MKV"));
        touch(&root.join("deep/er/song.mp3"));
        touch(&root.join("notes.txt"));
        touch(&root.join("noext"));

        let extensions = exts();
        let options = DiscoveryOptions {
            extensions: &extensions,
            include_hidden: false,
        };
        let found = discover(&[root.to_path_buf()], &options);
        let expected: Vec<String> = vec![
            root.join("Season 1/a.MKV"),
            root.join("b.mkv"),
            root.join("deep/er/song.mp3"),
        ]
        .into_iter()
        .map(|p| p.to_str().unwrap().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn hidden_entries_need_opt_in() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".cache/a.mkv"));
        touch(&root.join(".b.mkv"));
        touch(&root.join("c.mkv"));

        let extensions = exts();
        let mut options = DiscoveryOptions {
            extensions: &extensions,
            include_hidden: false,
        };
        assert_eq!(discover(&[root.to_path_buf()], &options).len(), 1);
        options.include_hidden = true;
        assert_eq!(discover(&[root.to_path_buf()], &options).len(), 3);
    }

    #[test]
    fn missing_roots_are_skipped_and_overlaps_deduplicated() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("show/a.mkv"));

        let extensions = exts();
        let options = DiscoveryOptions {
            extensions: &extensions,
            include_hidden: false,
        };
        let found = discover(
            &[
                root.join("does-not-exist"),
                root.to_path_buf(),
                root.join("show"),
            ],
            &options,
        );
        assert_eq!(found, vec![root.join("show/a.mkv").to_str().unwrap().to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_count_but_symlinked_dirs_are_not_walked() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        touch(&outside.path().join("target.mkv"));
        touch(&outside.path().join("inner/nested.mkv"));
        let root = dir.path();
        std::os::unix::fs::symlink(outside.path().join("target.mkv"), root.join("link.mkv")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("inner"), root.join("linked_dir")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.mkv"), root.join("dangling.mkv")).unwrap();

        let extensions = exts();
        let options = DiscoveryOptions {
            extensions: &extensions,
            include_hidden: false,
        };
        assert_eq!(
            discover(&[root.to_path_buf()], &options),
            vec![root.join("link.mkv").to_str().unwrap().to_string()]
        );
    }

    #[test]
    fn extension_match_ignores_case() {
        let extensions = exts();
        assert!(has_media_extension(Path::new("/a/B.Mp3"), &extensions));
        assert!(!has_media_extension(Path::new("/a/mkv"), &extensions));
        assert!(!has_media_extension(Path::new("/a/x.mkv.part"), &extensions));
    }
}
