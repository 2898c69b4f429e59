//! Resource discovery across archives, containers and loose directories.
//!
//! The [`ResourceLocator`] turns a list of containers and directories into a
//! [`ResourceIndex`] mapping each normalized resource name to the place it can be
//! read from. It offers two levels of work:
//!
//! 1. **Full scan** ([`scan`](ResourceLocator::scan)): opens every container and
//!    walks every directory, recording one [`ResourceLocation`] per resource.
//!    Containers are listed in parallel.
//!
//! 2. **Fast path** ([`fingerprint`](ResourceLocator::fingerprint)): only stats the
//!    containers and lists the directories, hashing paths, sizes and modification
//!    times into a single `u64`. The engine compares this against the fingerprint
//!    stored with the precompiled cache to decide whether a full scan is needed.
//!
//! Directory walks are recursive and case-insensitive. A corrupt or unreadable
//! container is logged and left out of the index; it never aborts a scan.

use crate::container::ContainerLoader;
use crate::error::{Error, Result};
use crate::location::{ResourceIndex, ResourceLocation, SourceKind};
use crate::utils::{mtime_secs, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

/// Builds resource indexes from containers and directories.
#[derive(Clone)]
pub struct ResourceLocator {
    loader: ContainerLoader,
}

impl ResourceLocator {
    pub fn new(loader: ContainerLoader) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &ContainerLoader {
        &self.loader
    }

    /// Full scan of `containers` then `directories`.
    ///
    /// Sources are applied in order, so a later source replaces an earlier one that
    /// provides the same name. Unreadable sources are skipped with a warning.
    pub fn scan(&self, containers: &[Utf8PathBuf], directories: &[Utf8PathBuf]) -> ResourceIndex {
        let mut merged = ResourceIndex::new();

        for (path, result) in self.scan_containers(containers, SourceKind::Container) {
            match result {
                Ok(index) => merged.extend(index),
                Err(e) => tracing::warn!("Skipping unreadable container '{}': {}", path, e),
            }
        }

        for dir in directories {
            match self.scan_directory(dir) {
                Ok(index) => merged.extend(index),
                Err(e) => tracing::warn!("Skipping unreadable directory '{}': {}", dir, e),
            }
        }

        tracing::debug!(
            "Scanned {} container(s) and {} directory(ies): {} resources",
            containers.len(),
            directories.len(),
            merged.len()
        );
        merged
    }

    /// Index several containers in parallel. Results keep the input order.
    pub fn scan_containers<'a>(
        &self,
        containers: &'a [Utf8PathBuf],
        kind: SourceKind,
    ) -> Vec<(&'a Utf8Path, Result<ResourceIndex>)> {
        containers
            .par_iter()
            .map(|path| (path.as_path(), self.loader.index(path, kind)))
            .collect()
    }

    /// Recursively index the loose files under `dir`.
    ///
    /// Names are the lowercase file names; subdirectory structure is flattened. When
    /// two files share a name, the first in sorted walk order wins.
    pub fn scan_directory(&self, dir: &Utf8Path) -> Result<ResourceIndex> {
        if !dir.as_std_path().is_dir() {
            return Err(Error::LayerUnavailable {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut index = ResourceIndex::new();
        for entry in WalkDir::new(dir.as_std_path()).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error walking '{}': {}", dir, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = utf8_path(entry.path().to_path_buf()) else {
                continue;
            };
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("Cannot stat '{}': {}", path, e);
                    continue;
                }
            };

            let name = file_name.to_ascii_lowercase();
            if let Some(existing) = index.get(&name) {
                tracing::trace!(
                    "Duplicate '{}' in '{}', keeping {}",
                    name,
                    dir,
                    existing.source_path
                );
                continue;
            }
            index.insert(
                name.clone(),
                ResourceLocation {
                    name,
                    source_kind: SourceKind::Directory,
                    source_path: path,
                    internal_path: String::new(),
                    size: metadata.len(),
                    modified_time: mtime_secs(&metadata),
                },
            );
        }
        Ok(index)
    }

    /// Fast-path fingerprint over `containers` and `directories`.
    ///
    /// Stats each container and lists each directory; nothing is opened or parsed.
    /// `extra` lets the caller mix in configuration that also affects resolution.
    pub fn fingerprint(
        &self,
        containers: &[Utf8PathBuf],
        directories: &[Utf8PathBuf],
        extra: &[&str],
    ) -> u64 {
        let mut hasher_input = Vec::new();

        for value in extra {
            hasher_input.extend_from_slice(value.as_bytes());
            hasher_input.push(0);
        }

        for path in containers {
            hasher_input.extend_from_slice(b"C:");
            push_file_stamp(&mut hasher_input, path);
        }

        for dir in directories {
            hasher_input.extend_from_slice(b"D:");
            hasher_input.extend_from_slice(dir.as_str().as_bytes());
            if !dir.as_std_path().is_dir() {
                continue;
            }
            for entry in WalkDir::new(dir.as_std_path())
                .sort_by_file_name()
                .into_iter()
                .flatten()
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(path) = utf8_path(entry.path().to_path_buf()) {
                    push_file_stamp(&mut hasher_input, &path);
                }
            }
        }

        xxh3_64(&hasher_input)
    }
}

/// Append path, size and modification time of one file.
fn push_file_stamp(buf: &mut Vec<u8>, path: &Utf8Path) {
    buf.extend_from_slice(path.as_str().as_bytes());
    buf.push(0);
    let Ok(metadata) = std::fs::metadata(path.as_std_path()) else {
        buf.extend_from_slice(b"missing");
        return;
    };
    buf.extend_from_slice(&metadata.len().to_le_bytes());
    if let Ok(modified) = metadata.modified() {
        if let Ok(duration) = modified.duration_since(UNIX_EPOCH) {
            buf.extend_from_slice(&duration.as_nanos().to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArchiveCodec;
    use nwn2_formats::{ErfBuilder, ErfVersion};
    use std::sync::Arc;

    fn locator() -> ResourceLocator {
        ResourceLocator::new(ContainerLoader::new(Arc::new(ArchiveCodec)))
    }

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, path)
    }

    #[test]
    fn test_scan_directory_recursive_case_insensitive() {
        let (_temp, dir) = tempdir();
        std::fs::create_dir_all(dir.join("Sub/Deeper")).unwrap();
        std::fs::write(dir.join("Classes.2DA"), b"a").unwrap();
        std::fs::write(dir.join("Sub/Deeper/FEAT.2da"), b"bb").unwrap();

        let index = locator().scan_directory(&dir).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["classes.2da"].size, 1);
        assert_eq!(index["feat.2da"].source_kind, SourceKind::Directory);
        assert!(index["feat.2da"].source_path.ends_with("Sub/Deeper/FEAT.2da"));
    }

    #[test]
    fn test_scan_skips_corrupt_container() {
        let (_temp, dir) = tempdir();
        let bad = dir.join("bad.hak");
        std::fs::write(&bad, b"not an erf").unwrap();

        let mut builder = ErfBuilder::new("HAK", ErfVersion::V1_1);
        builder.add("spells.2da", b"x".to_vec()).unwrap();
        let good = dir.join("good.hak");
        std::fs::write(&good, builder.build().unwrap()).unwrap();

        let loose = dir.join("loose");
        std::fs::create_dir(&loose).unwrap();
        std::fs::write(loose.join("spells.2da"), b"override").unwrap();

        let index = locator().scan(&[bad, good], &[loose]);
        assert_eq!(index.len(), 1);
        // Directories are applied after containers.
        assert_eq!(index["spells.2da"].source_kind, SourceKind::Directory);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let (_temp, dir) = tempdir();
        assert!(locator().scan_directory(&dir.join("missing")).is_err());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let (_temp, dir) = tempdir();
        std::fs::write(dir.join("a.2da"), b"one").unwrap();

        let dirs = vec![dir.clone()];
        let first = locator().fingerprint(&[], &dirs, &[]);
        assert_eq!(first, locator().fingerprint(&[], &dirs, &[]));

        std::fs::write(dir.join("b.2da"), b"two").unwrap();
        let second = locator().fingerprint(&[], &dirs, &[]);
        assert_ne!(first, second);

        assert_ne!(second, locator().fingerprint(&[], &dirs, &["custom"]));
    }
}
