//! Persisted cache of parsed tables, reused across runs.
//!
//! After a full scan, every table reachable through the global layers is parsed and
//! written to disk together with the fast-path fingerprint of the inputs that
//! produced it:
//!
//! ```text
//! <cache_dir>/
//!   precompiled.json          # PrecompiledMetadata
//!   tables/
//!     classes.2da.bin         # zstd-compressed MessagePack, one per table
//!     feat.2da.bin
//! ```
//!
//! On the next start the engine recomputes the fingerprint. If it matches, tables
//! are loaded lazily from their blobs and the full scan is skipped. Any mismatch
//! (game patched, override added, workshop mod updated) discards the cache.
//!
//! Rebuilds write into a sibling staging directory and swap it in with a rename,
//! so a reader never sees a half-written cache.

use crate::error::{Error, Result};
use crate::location::ResourceLocation;
use crate::resolver::Touched;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use nwn2_formats::TwoDaTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current metadata schema version.
pub const PRECOMPILED_VERSION: u32 = 2;

const METADATA_FILE: &str = "precompiled.json";
const TABLES_DIR: &str = "tables";
const COMPRESSION_LEVEL: i32 = 3;

/// Metadata persisted next to the table blobs.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "fingerprint": 1234567890,
///   "createdAt": "2024-01-01T00:00:00Z",
///   "tables": { "classes.2da": { "name": "classes.2da", "sourceKind": "archive", ... } },
///   "touched": { "classes.2da": [{ "path": ".../2da.zip", "modifiedTime": 1700000000.0 }] }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecompiledMetadata {
    pub version: u32,
    pub fingerprint: u64,
    pub created_at: DateTime<Utc>,
    /// Table name to the location it was parsed from.
    pub tables: BTreeMap<String, ResourceLocation>,
    /// Table name to every file read while resolving it, with the modification
    /// times seen at build time.
    #[serde(default)]
    pub touched: BTreeMap<String, Vec<Touched>>,
}

impl PrecompiledMetadata {
    pub fn matches(&self, fingerprint: u64) -> bool {
        self.version == PRECOMPILED_VERSION && self.fingerprint == fingerprint
    }
}

/// A precompiled cache directory.
#[derive(Debug)]
pub struct PrecompiledCache {
    root: Utf8PathBuf,
    metadata: Option<PrecompiledMetadata>,
}

impl PrecompiledCache {
    /// Open the cache at `root`. A missing or unreadable metadata file yields an
    /// empty cache that matches no fingerprint.
    pub fn open(root: &Utf8Path) -> Self {
        let metadata_path = root.join(METADATA_FILE);
        let metadata = match std::fs::read_to_string(metadata_path.as_std_path()) {
            Ok(contents) => match serde_json::from_str::<PrecompiledMetadata>(&contents) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable precompiled metadata {}: {}", metadata_path, e);
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            root: root.to_path_buf(),
            metadata,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn metadata(&self) -> Option<&PrecompiledMetadata> {
        self.metadata.as_ref()
    }

    pub fn is_valid_for(&self, fingerprint: u64) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.matches(fingerprint))
    }

    /// Where `name` was parsed from, if it is in the cache.
    pub fn location(&self, name: &str) -> Option<&ResourceLocation> {
        self.metadata.as_ref()?.tables.get(name)
    }

    /// Files read while `name` was resolved for this cache, winner last.
    pub fn touched(&self, name: &str) -> &[Touched] {
        self.metadata
            .as_ref()
            .and_then(|m| m.touched.get(name))
            .map_or(&[], Vec::as_slice)
    }

    pub fn table_count(&self) -> usize {
        self.metadata.as_ref().map_or(0, |m| m.tables.len())
    }

    /// Load one table blob. Returns `Ok(None)` if `name` is not in the cache.
    pub fn load_table(&self, name: &str) -> Result<Option<TwoDaTable>> {
        if self.location(name).is_none() {
            return Ok(None);
        }
        let bytes = std::fs::read(blob_path(&self.root, name).as_std_path())?;
        let decoded = zstd::decode_all(bytes.as_slice()).map_err(|e| Error::Compression(e.to_string()))?;
        Ok(Some(rmp_serde::from_slice(&decoded)?))
    }

    /// Write a new cache at `root`, replacing whatever is there.
    pub fn rebuild<'a, I>(root: &Utf8Path, fingerprint: u64, tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a ResourceLocation, &'a [Touched], &'a TwoDaTable)>,
    {
        let staging = sibling(root, "staging");
        if staging.as_std_path().exists() {
            std::fs::remove_dir_all(staging.as_std_path())?;
        }
        std::fs::create_dir_all(staging.join(TABLES_DIR).as_std_path())?;

        let mut index = BTreeMap::new();
        let mut touched_by_table = BTreeMap::new();
        for (location, touched, table) in tables {
            let encoded = rmp_serde::to_vec(table)?;
            let compressed = zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL)
                .map_err(|e| Error::Compression(e.to_string()))?;
            std::fs::write(blob_path(&staging, &location.name).as_std_path(), compressed)?;
            index.insert(location.name.clone(), location.clone());
            touched_by_table.insert(location.name.clone(), touched.to_vec());
        }

        let metadata = PrecompiledMetadata {
            version: PRECOMPILED_VERSION,
            fingerprint,
            created_at: Utc::now(),
            tables: index,
            touched: touched_by_table,
        };
        std::fs::write(
            staging.join(METADATA_FILE).as_std_path(),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        swap_into_place(&staging, root)?;
        tracing::info!(
            "Precompiled cache written: {} tables, fingerprint {:016x}",
            metadata.tables.len(),
            fingerprint
        );

        Ok(Self {
            root: root.to_path_buf(),
            metadata: Some(metadata),
        })
    }

    /// Delete the cache from disk.
    pub fn remove(root: &Utf8Path) -> Result<()> {
        if root.as_std_path().exists() {
            std::fs::remove_dir_all(root.as_std_path())?;
        }
        Ok(())
    }
}

fn sibling(root: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let name = root.file_name().unwrap_or("precompiled");
    root.with_file_name(format!("{}.{}", name, suffix))
}

fn blob_path(root: &Utf8Path, name: &str) -> Utf8PathBuf {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
        .collect();
    root.join(TABLES_DIR).join(format!("{}.bin", safe))
}

fn swap_into_place(staging: &Utf8Path, root: &Utf8Path) -> Result<()> {
    let retired = sibling(root, "old");
    if retired.as_std_path().exists() {
        std::fs::remove_dir_all(retired.as_std_path())?;
    }
    if root.as_std_path().exists() {
        std::fs::rename(root.as_std_path(), retired.as_std_path())?;
    }
    std::fs::rename(staging.as_std_path(), root.as_std_path())?;
    if retired.as_std_path().exists() {
        if let Err(e) = std::fs::remove_dir_all(retired.as_std_path()) {
            tracing::warn!("Failed to remove retired cache {}: {}", retired, e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceKind;

    fn location(name: &str) -> ResourceLocation {
        ResourceLocation {
            name: name.to_string(),
            source_kind: SourceKind::Archive,
            source_path: Utf8PathBuf::from("/install/Data/2DA.zip"),
            internal_path: format!("2DA/{}", name),
            size: 10,
            modified_time: 1.0,
        }
    }

    fn table(label: &str) -> TwoDaTable {
        let mut table = TwoDaTable::new(["Label"]);
        table.push_row([Some(label)]);
        table
    }

    #[test]
    fn test_open_missing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap().join("cache");
        let cache = PrecompiledCache::open(&root);
        assert!(cache.metadata().is_none());
        assert!(!cache.is_valid_for(0));
    }

    #[test]
    fn test_rebuild_and_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap().join("cache");
        let classes = (location("classes.2da"), table("Fighter"));

        let touched = vec![Touched {
            path: classes.0.source_path.clone(),
            modified_time: Some(1.0),
        }];

        PrecompiledCache::rebuild(&root, 42, [(&classes.0, touched.as_slice(), &classes.1)]).unwrap();

        let cache = PrecompiledCache::open(&root);
        assert!(cache.is_valid_for(42));
        assert!(!cache.is_valid_for(43));
        assert_eq!(cache.table_count(), 1);
        assert_eq!(cache.location("classes.2da").unwrap().source_kind, SourceKind::Archive);
        assert_eq!(cache.load_table("classes.2da").unwrap(), Some(classes.1));
        assert_eq!(cache.load_table("feat.2da").unwrap(), None);
        assert_eq!(cache.touched("classes.2da"), touched.as_slice());
        assert!(cache.touched("feat.2da").is_empty());
    }

    #[test]
    fn test_rebuild_replaces_previous() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap().join("cache");
        let a = (location("a.2da"), table("A"));
        let b = (location("b.2da"), table("B"));

        PrecompiledCache::rebuild(&root, 1, [(&a.0, &[][..], &a.1)]).unwrap();
        PrecompiledCache::rebuild(&root, 2, [(&b.0, &[][..], &b.1)]).unwrap();

        let cache = PrecompiledCache::open(&root);
        assert!(cache.is_valid_for(2));
        assert!(cache.location("a.2da").is_none());
        assert!(!root.join("tables/a.2da.bin").as_std_path().exists());
        assert!(!sibling(&root, "staging").as_std_path().exists());
        assert!(!sibling(&root, "old").as_std_path().exists());
    }

    #[test]
    fn test_corrupt_metadata_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::write(root.join(METADATA_FILE), b"{ nope").unwrap();
        assert!(PrecompiledCache::open(root).metadata().is_none());
    }

    #[test]
    fn test_metadata_format() {
        let metadata = PrecompiledMetadata {
            version: PRECOMPILED_VERSION,
            fingerprint: 7,
            created_at: Utc::now(),
            tables: BTreeMap::new(),
            touched: BTreeMap::new(),
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"version\":2"));
        assert!(json.contains("\"createdAt\""));
    }
}
