//! Codec seams between the engine and the on-disk formats.
//!
//! The engine never parses bytes itself. It goes through four narrow traits:
//!
//! - [`TableCodec`]: tabular rule data (`.2da`)
//! - [`StringTableCodec`]: localized string tables (`.tlk`)
//! - [`ManifestCodec`]: structured data trees (`module.ifo`, `campaign.cam`)
//! - [`ContainerCodec`]: archives and containers (`.zip`, `.hak`, `.erf`, `.mod`)
//!
//! [`Codecs`] bundles one implementation of each. The defaults are backed by
//! [`nwn2_formats`] for binary formats and `serde_json` for structured data trees.
//! Tests swap in instrumented codecs to count parses.

use crate::error::{Error, Result};
use camino::Utf8Path;
use nwn2_formats::{ErfIndex, TlkTable, TwoDaTable};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::sync::Arc;

/// Parses tabular rule data.
pub trait TableCodec: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<TwoDaTable>;
}

/// A localized string table keyed by reference number.
pub trait StringTable: Send + Sync {
    /// Text for `strref`, or `None` if the entry is absent or empty.
    fn get(&self, strref: u32) -> Option<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StringTable for TlkTable {
    fn get(&self, strref: u32) -> Option<String> {
        TlkTable::get(self, strref).map(str::to_string)
    }

    fn len(&self) -> usize {
        TlkTable::len(self)
    }
}

/// Parses localized string tables.
pub trait StringTableCodec: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Arc<dyn StringTable>>;
}

/// Parses and writes structured data trees.
pub trait ManifestCodec: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Value>;
    fn serialize(&self, tree: &Value) -> Result<Vec<u8>>;
}

/// One entry listed from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Normalized resource name (`resref.ext`, lowercase).
    pub name: String,
    /// Path or name that addresses the entry inside the container.
    pub internal_path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
}

/// An open container. Dropping the handle closes the underlying file.
pub trait ContainerHandle {
    fn list_entries(&mut self) -> Result<Vec<ContainerEntry>>;

    /// Read the entry addressed by `internal_path`.
    fn extract(&mut self, internal_path: &str) -> Result<Vec<u8>>;
}

/// Opens containers on disk.
pub trait ContainerCodec: Send + Sync {
    fn open(&self, path: &Utf8Path) -> Result<Box<dyn ContainerHandle>>;
}

/// Default 2DA codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct TwoDaCodec;

impl TableCodec for TwoDaCodec {
    fn parse(&self, bytes: &[u8]) -> Result<TwoDaTable> {
        Ok(TwoDaTable::parse(bytes)?)
    }
}

/// Default TLK codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct TlkCodec;

impl StringTableCodec for TlkCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Arc<dyn StringTable>> {
        Ok(Arc::new(TlkTable::parse(bytes)?))
    }
}

/// Structured data trees stored as JSON documents.
///
/// Module and campaign manifests are exported from the toolset as JSON keyed by
/// their original field names (`Mod_Name`, `Mod_HakList`, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonManifestCodec;

impl ManifestCodec for JsonManifestCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn serialize(&self, tree: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(tree)?)
    }
}

/// Opens `.zip` archives and ERF-family containers, detected by magic bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveCodec;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

impl ContainerCodec for ArchiveCodec {
    fn open(&self, path: &Utf8Path) -> Result<Box<dyn ContainerHandle>> {
        let mut reader = BufReader::new(File::open(path.as_std_path())?);
        let mut magic = [0u8; 4];
        let read = reader.read(&mut magic)?;
        reader.rewind()?;

        if read == 4 && &magic == ZIP_MAGIC {
            let archive = zip::ZipArchive::new(reader)?;
            Ok(Box::new(ZipHandle { archive }))
        } else {
            let index = ErfIndex::read(&mut reader)?;
            Ok(Box::new(ErfHandle { reader, index }))
        }
    }
}

struct ZipHandle<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
}

impl<R: Read + Seek> ContainerHandle for ZipHandle<R> {
    fn list_entries(&mut self) -> Result<Vec<ContainerEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for i in 0..self.archive.len() {
            let file = self.archive.by_index_raw(i)?;
            if file.is_dir() {
                continue;
            }
            let internal_path = file.name().to_string();
            entries.push(ContainerEntry {
                name: crate::utils::normalize_name(&internal_path, ""),
                internal_path,
                size: file.size(),
            });
        }
        Ok(entries)
    }

    fn extract(&mut self, internal_path: &str) -> Result<Vec<u8>> {
        let mut file = self.archive.by_name(internal_path)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

struct ErfHandle<R: Read + Seek> {
    reader: R,
    index: ErfIndex,
}

impl<R: Read + Seek> ContainerHandle for ErfHandle<R> {
    fn list_entries(&mut self) -> Result<Vec<ContainerEntry>> {
        Ok(self
            .index
            .entries
            .iter()
            .map(|entry| {
                let name = entry.file_name();
                ContainerEntry {
                    name: name.to_ascii_lowercase(),
                    internal_path: name,
                    size: entry.size as u64,
                }
            })
            .collect())
    }

    fn extract(&mut self, internal_path: &str) -> Result<Vec<u8>> {
        let entry = self
            .index
            .find(internal_path)
            .cloned()
            .ok_or_else(|| Error::Other(format!("No entry '{}' in container", internal_path)))?;
        Ok(ErfIndex::read_entry(&mut self.reader, &entry)?)
    }
}

/// Open an in-memory container. Used by tests and for nested containers.
pub fn open_bytes(bytes: Vec<u8>) -> Result<Box<dyn ContainerHandle>> {
    if bytes.starts_with(ZIP_MAGIC) {
        let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        Ok(Box::new(ZipHandle { archive }))
    } else {
        let mut reader = Cursor::new(bytes);
        let index = ErfIndex::read(&mut reader)?;
        Ok(Box::new(ErfHandle { reader, index }))
    }
}

/// The set of codecs an engine uses.
#[derive(Clone)]
pub struct Codecs {
    pub tables: Arc<dyn TableCodec>,
    pub strings: Arc<dyn StringTableCodec>,
    pub manifests: Arc<dyn ManifestCodec>,
    pub containers: Arc<dyn ContainerCodec>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self {
            tables: Arc::new(TwoDaCodec),
            strings: Arc::new(TlkCodec),
            manifests: Arc::new(JsonManifestCodec),
            containers: Arc::new(ArchiveCodec),
        }
    }
}

impl Codecs {
    pub fn with_tables(mut self, codec: Arc<dyn TableCodec>) -> Self {
        self.tables = codec;
        self
    }

    pub fn with_strings(mut self, codec: Arc<dyn StringTableCodec>) -> Self {
        self.strings = codec;
        self
    }

    pub fn with_manifests(mut self, codec: Arc<dyn ManifestCodec>) -> Self {
        self.manifests = codec;
        self
    }

    pub fn with_containers(mut self, codec: Arc<dyn ContainerCodec>) -> Self {
        self.containers = codec;
        self
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codecs").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nwn2_formats::{ErfBuilder, ErfVersion};
    use std::io::Write;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_zip_entries_are_flattened() {
        let bytes = zip_bytes(&[("2DA/Classes.2da", b"2DA V2.0\n\nA\n0 1\n")]);
        let mut handle = open_bytes(bytes).unwrap();

        let entries = handle.list_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "classes.2da");
        assert_eq!(entries[0].internal_path, "2DA/Classes.2da");

        let data = handle.extract("2DA/Classes.2da").unwrap();
        assert!(data.starts_with(b"2DA"));
    }

    #[test]
    fn test_erf_entries() {
        let mut builder = ErfBuilder::new("HAK ", ErfVersion::V1_1);
        builder.add("Feat.2da", b"payload".to_vec()).unwrap();
        let mut handle = open_bytes(builder.build().unwrap()).unwrap();

        let entries = handle.list_entries().unwrap();
        assert_eq!(entries[0].name, "feat.2da");
        assert_eq!(handle.extract(&entries[0].internal_path).unwrap(), b"payload");
        assert!(handle.extract("missing.2da").is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(open_bytes(b"not a container at all".to_vec()).is_err());
    }

    #[test]
    fn test_json_manifest_round_trip() {
        let codec = JsonManifestCodec;
        let tree = codec.parse(br#"{"Mod_Name": "Test"}"#).unwrap();
        assert_eq!(tree["Mod_Name"], "Test");
        let bytes = codec.serialize(&tree).unwrap();
        assert_eq!(codec.parse(&bytes).unwrap(), tree);
    }
}
