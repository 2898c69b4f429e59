//! Reading entries out of archives and containers.
//!
//! The [`ContainerLoader`] never keeps a container open: every call opens the file,
//! does its work and drops the handle before returning.

use crate::codec::{ContainerCodec, ContainerHandle};
use crate::error::{Error, Result};
use crate::location::{ResourceIndex, ResourceLocation, SourceKind};
use crate::utils::mtime_secs;
use camino::Utf8Path;
use std::sync::Arc;

/// Opens containers on demand through a [`ContainerCodec`].
#[derive(Clone)]
pub struct ContainerLoader {
    codec: Arc<dyn ContainerCodec>,
}

impl ContainerLoader {
    pub fn new(codec: Arc<dyn ContainerCodec>) -> Self {
        Self { codec }
    }

    /// Index every entry of the container at `path`.
    ///
    /// `kind` is recorded on each location; it is [`SourceKind::Archive`] for base
    /// installation archives and [`SourceKind::Container`] for everything else.
    /// When the container lists the same name twice, the later entry wins.
    pub fn index(&self, path: &Utf8Path, kind: SourceKind) -> Result<ResourceIndex> {
        let metadata = std::fs::metadata(path.as_std_path())?;
        let modified_time = mtime_secs(&metadata);

        let mut handle = self.open(path)?;
        let entries = handle.list_entries()?;

        let mut index = ResourceIndex::with_capacity(entries.len());
        for entry in entries {
            index.insert(
                entry.name.clone(),
                ResourceLocation {
                    name: entry.name,
                    source_kind: kind,
                    source_path: path.to_path_buf(),
                    internal_path: entry.internal_path,
                    size: entry.size,
                    modified_time,
                },
            );
        }
        Ok(index)
    }

    /// Read the bytes a location points at.
    pub fn read(&self, location: &ResourceLocation) -> Result<Vec<u8>> {
        match location.source_kind {
            SourceKind::Directory => Ok(std::fs::read(location.source_path.as_std_path())?),
            SourceKind::Archive | SourceKind::Container => {
                let mut handle = self.open(&location.source_path)?;
                handle.extract(&location.internal_path)
            }
        }
    }

    /// Read a named entry (`resref.ext`, any case) from the container at `path`.
    ///
    /// Returns `Ok(None)` when the container has no such entry.
    pub fn read_named(&self, path: &Utf8Path, name: &str) -> Result<Option<Vec<u8>>> {
        let mut handle = self.open(path)?;
        let wanted = name.to_ascii_lowercase();
        let Some(entry) = handle
            .list_entries()?
            .into_iter()
            .find(|e| e.name == wanted)
        else {
            return Ok(None);
        };
        handle.extract(&entry.internal_path).map(Some)
    }

    /// Check that a container can be opened and listed.
    pub fn probe(&self, path: &Utf8Path) -> Result<usize> {
        let mut handle = self.open(path)?;
        Ok(handle.list_entries()?.len())
    }

    fn open(&self, path: &Utf8Path) -> Result<Box<dyn ContainerHandle>> {
        self.codec.open(path).map_err(|e| match e {
            Error::Io(_) | Error::LayerUnavailable { .. } => e,
            other => Error::LayerUnavailable {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArchiveCodec;
    use camino::Utf8PathBuf;
    use nwn2_formats::{ErfBuilder, ErfVersion};

    fn loader() -> ContainerLoader {
        ContainerLoader::new(Arc::new(ArchiveCodec))
    }

    fn write_hak(dir: &Utf8Path, name: &str, files: &[(&str, &[u8])]) -> Utf8PathBuf {
        let mut builder = ErfBuilder::new("HAK", ErfVersion::V1_1);
        for (file, data) in files {
            builder.add(file, data.to_vec()).unwrap();
        }
        let path = dir.join(name);
        std::fs::write(&path, builder.build().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_index_and_read() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let hak = write_hak(dir, "test.hak", &[("classes.2da", b"abc"), ("feat.2da", b"de")]);

        let index = loader().index(&hak, SourceKind::Container).unwrap();
        assert_eq!(index.len(), 2);
        let location = &index["feat.2da"];
        assert_eq!(location.source_kind, SourceKind::Container);
        assert_eq!(location.size, 2);
        assert_eq!(loader().read(location).unwrap(), b"de");
    }

    #[test]
    fn test_read_named() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let module = write_hak(dir, "m.mod", &[("module.ifo", b"{}")]);

        assert_eq!(
            loader().read_named(&module, "MODULE.IFO").unwrap(),
            Some(b"{}".to_vec())
        );
        assert_eq!(loader().read_named(&module, "other.ifo").unwrap(), None);
    }

    #[test]
    fn test_corrupt_container_is_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("bad.hak");
        std::fs::write(&path, b"garbage").unwrap();

        let err = loader().index(&path, SourceKind::Container).unwrap_err();
        assert!(matches!(err, Error::LayerUnavailable { .. }));
    }

    #[test]
    fn test_loose_file_read() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("x.2da");
        std::fs::write(&path, b"loose").unwrap();
        let location = ResourceLocation {
            name: "x.2da".to_string(),
            source_kind: SourceKind::Directory,
            source_path: path,
            internal_path: String::new(),
            size: 5,
            modified_time: 0.0,
        };
        assert_eq!(loader().read(&location).unwrap(), b"loose");
    }
}
