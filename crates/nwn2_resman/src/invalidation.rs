//! Modification tracking for files backing cached values.
//!
//! The tracker remembers the last observed modification time of each path. The
//! first observation of a path only records a baseline and is never reported as a
//! modification. Later checks compare against the baseline with a small tolerance
//! to absorb timestamp rounding across filesystems.

use crate::utils::path_mtime;
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tolerance for modification time comparisons, in seconds.
pub const MTIME_EPSILON_SECS: f64 = 0.0005;

#[derive(Debug, Default)]
pub struct ModificationTracker {
    seen: RwLock<HashMap<Utf8PathBuf, f64>>,
}

impl ModificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current modification time of `path` as its baseline.
    ///
    /// Returns the recorded time, or `None` if the file cannot be stat'ed.
    pub fn record(&self, path: &Utf8Path) -> Option<f64> {
        let mtime = path_mtime(path)?;
        self.seen.write().insert(path.to_path_buf(), mtime);
        Some(mtime)
    }

    /// Record `modified_time` as the baseline of `path`, typically a time taken
    /// before the file was read. A later write is then reported as a change even if
    /// it landed while the read was in progress.
    pub fn record_at(&self, path: &Utf8Path, modified_time: f64) {
        self.seen.write().insert(path.to_path_buf(), modified_time);
    }

    /// Whether `path` changed since it was last observed.
    ///
    /// A path seen for the first time is recorded and reported unchanged. A tracked
    /// path that disappeared is reported changed and forgotten. When a change is
    /// reported, the baseline moves to the new time.
    pub fn is_modified(&self, path: &Utf8Path) -> bool {
        let current = path_mtime(path);

        if let Some(&previous) = self.seen.read().get(path) {
            if current.is_some_and(|now| (now - previous).abs() <= MTIME_EPSILON_SECS) {
                return false;
            }
        }

        let mut seen = self.seen.write();
        match (seen.get(path).copied(), current) {
            (None, Some(now)) => {
                seen.insert(path.to_path_buf(), now);
                false
            }
            (None, None) => false,
            (Some(_), None) => {
                seen.remove(path);
                tracing::debug!("Tracker: {} disappeared", path);
                true
            }
            (Some(previous), Some(now)) => {
                if (now - previous).abs() <= MTIME_EPSILON_SECS {
                    return false;
                }
                seen.insert(path.to_path_buf(), now);
                tracing::debug!("Tracker: {} modified", path);
                true
            }
        }
    }

    pub fn forget(&self, path: &Utf8Path) {
        self.seen.write().remove(path);
    }

    pub fn clear(&self) {
        self.seen.write().clear();
    }

    pub fn tracked_count(&self) -> usize {
        self.seen.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn temp_file() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("classes.2da")).unwrap();
        std::fs::write(&path, b"v1").unwrap();
        (temp, path)
    }

    fn set_mtime(path: &Utf8Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    #[test]
    fn test_baseline_taken_before_a_racing_write() {
        let (_temp, path) = temp_file();
        set_mtime(&path, 1_000_000);
        let tracker = ModificationTracker::new();

        // Stat, then the file is rewritten before the caller records it.
        let before_read = path_mtime(&path).unwrap();
        set_mtime(&path, 1_000_050);
        tracker.record_at(&path, before_read);

        assert!(tracker.is_modified(&path));
    }

    #[test]
    fn test_first_observation_is_not_modified() {
        let (_temp, path) = temp_file();
        let tracker = ModificationTracker::new();
        assert!(!tracker.is_modified(&path));
        assert!(!tracker.is_modified(&path));
        assert_eq!(tracker.tracked_count(), 1);
    }

    #[test]
    fn test_mtime_change_is_reported_once() {
        let (_temp, path) = temp_file();
        set_mtime(&path, 1_000_000);
        let tracker = ModificationTracker::new();
        tracker.record(&path).unwrap();

        set_mtime(&path, 1_000_100);
        assert!(tracker.is_modified(&path));
        assert!(!tracker.is_modified(&path));
    }

    #[test]
    fn test_deleted_file_is_modified() {
        let (_temp, path) = temp_file();
        let tracker = ModificationTracker::new();
        tracker.record(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(tracker.is_modified(&path));
        assert_eq!(tracker.tracked_count(), 0);
        assert!(!tracker.is_modified(&path));
    }

    #[test]
    fn test_forget_resets_baseline() {
        let (_temp, path) = temp_file();
        set_mtime(&path, 1_000_000);
        let tracker = ModificationTracker::new();
        tracker.record(&path);
        tracker.forget(&path);

        set_mtime(&path, 1_000_100);
        assert!(!tracker.is_modified(&path));
    }
}
