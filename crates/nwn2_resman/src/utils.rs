//! Name normalization and filesystem helpers.
//!
//! Game content is authored on Windows, so resource names and directory names are
//! compared case-insensitively everywhere in this crate. These helpers keep that
//! rule in one place.

use camino::{Utf8Path, Utf8PathBuf};
use std::time::UNIX_EPOCH;

/// Normalize a resource name for index lookups.
///
/// Names are trimmed and lowercased. Path separators are stripped so that
/// `"2DA/classes.2da"` and `"classes.2da"` address the same resource. If the name
/// carries no extension, `default_ext` is appended.
///
/// ```
/// use nwn2_resman::utils::normalize_name;
///
/// assert_eq!(normalize_name("Classes", "2da"), "classes.2da");
/// assert_eq!(normalize_name("2DA\\Feat.2DA", "2da"), "feat.2da");
/// assert_eq!(normalize_name("module.IFO", "2da"), "module.ifo");
/// ```
pub fn normalize_name(name: &str, default_ext: &str) -> String {
    let trimmed = name.trim();
    let file = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_ascii_lowercase();

    if file.contains('.') || default_ext.is_empty() {
        file
    } else {
        format!("{}.{}", file, default_ext.to_ascii_lowercase())
    }
}

/// Normalize a table name, appending `.2da` when no extension is given.
pub fn table_name(name: &str) -> String {
    normalize_name(name, "2da")
}

/// Strip the extension from a normalized resource name.
pub fn resref(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// Find a direct child of `dir` by name, ignoring ASCII case.
///
/// Returns the exact-case path when it exists, then falls back to scanning the
/// directory. Returns `None` if `dir` is unreadable or has no such child.
pub fn find_child_ci(dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
    let exact = dir.join(name);
    if exact.as_std_path().exists() {
        return Some(exact);
    }

    let entries = std::fs::read_dir(dir.as_std_path()).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name.eq_ignore_ascii_case(name) {
            return Utf8PathBuf::from_path_buf(entry.path()).ok();
        }
    }
    None
}

/// Find the first existing child named `name` across several directories.
pub fn find_in_dirs(dirs: &[Utf8PathBuf], name: &str) -> Option<Utf8PathBuf> {
    dirs.iter().find_map(|dir| find_child_ci(dir, name))
}

/// Modification time of `metadata` as seconds since the UNIX epoch.
///
/// Sub-second precision is kept so that rapid successive edits are still visible.
pub fn mtime_secs(metadata: &std::fs::Metadata) -> f64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Modification time of the file at `path`, or `None` if it cannot be stat'ed.
pub fn path_mtime(path: &Utf8Path) -> Option<f64> {
    std::fs::metadata(path.as_std_path())
        .ok()
        .map(|m| mtime_secs(&m))
}

/// Convert a `std` path to UTF-8, logging and returning `None` otherwise.
pub fn utf8_path(path: std::path::PathBuf) -> Option<Utf8PathBuf> {
    match Utf8PathBuf::from_path_buf(path) {
        Ok(p) => Some(p),
        Err(p) => {
            tracing::warn!("Skipping non-UTF-8 path: {}", p.display());
            None
        }
    }
}
