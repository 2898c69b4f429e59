//! ERF-family containers (`.erf`, `.hak`, `.mod`).
//!
//! ```text
//! header (160 bytes)
//!     file_type:[u8;4] version:[u8;4] language_count:u32 localized_string_size:u32
//!     entry_count:u32 localized_string_offset:u32 key_list_offset:u32
//!     resource_list_offset:u32 build_year:u32 build_day:u32 description_strref:u32
//!     reserved:[u8;116]
//! key list      resref:[u8;16|32] res_id:u32 res_type:u16 unused:u16
//! resource list offset:u32 size:u32
//! ```
//!
//! `V1.0` archives use 16-byte resrefs; `V1.1` (the NWN2 default) uses 32.

use crate::error::{FormatError, Result};
use crate::restype::{extension_for_type, type_for_extension};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{Read, Seek, SeekFrom, Write};

const HEADER_SIZE: u64 = 160;
const RESOURCE_ENTRY_SIZE: u64 = 8;

/// ERF container version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErfVersion {
    V1_0,
    V1_1,
}

impl ErfVersion {
    fn resref_len(self) -> usize {
        match self {
            ErfVersion::V1_0 => 16,
            ErfVersion::V1_1 => 32,
        }
    }

    fn key_entry_size(self) -> u64 {
        self.resref_len() as u64 + 8
    }

    fn magic(self) -> &'static [u8; 4] {
        match self {
            ErfVersion::V1_0 => b"V1.0",
            ErfVersion::V1_1 => b"V1.1",
        }
    }
}

/// One resource stored in an ERF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErfEntry {
    /// Lowercased resref, without extension.
    pub resref: String,
    pub res_type: u16,
    pub offset: u32,
    pub size: u32,
}

impl ErfEntry {
    /// `resref.ext`, lowercased. Unknown types fall back to the numeric type id.
    pub fn file_name(&self) -> String {
        match extension_for_type(self.res_type) {
            Some(ext) => format!("{}.{}", self.resref, ext),
            None => format!("{}.{}", self.resref, self.res_type),
        }
    }
}

/// The table of contents of an ERF container.
#[derive(Debug, Clone)]
pub struct ErfIndex {
    pub file_type: String,
    pub version: ErfVersion,
    pub entries: Vec<ErfEntry>,
}

impl ErfIndex {
    /// Read the header, key list and resource list.
    ///
    /// Only the table of contents is read; resource bodies stay on disk until
    /// [`read_entry`](Self::read_entry) is called.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < HEADER_SIZE {
            return Err(FormatError::Truncated("ERF header"));
        }
        reader.seek(SeekFrom::Start(0))?;

        let mut file_type = [0u8; 4];
        reader.read_exact(&mut file_type)?;
        if !matches!(&file_type, b"ERF " | b"HAK " | b"MOD " | b"NWM ") {
            return Err(FormatError::InvalidMagic {
                expected: "ERF/HAK/MOD",
                found: String::from_utf8_lossy(&file_type).into_owned(),
            });
        }

        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        let version = match &version {
            b"V1.0" => ErfVersion::V1_0,
            b"V1.1" => ErfVersion::V1_1,
            other => {
                return Err(FormatError::UnsupportedVersion {
                    format: "ERF",
                    version: String::from_utf8_lossy(other).into_owned(),
                })
            }
        };

        let _language_count = reader.read_u32::<LE>()?;
        let _localized_string_size = reader.read_u32::<LE>()?;
        let entry_count = reader.read_u32::<LE>()? as u64;
        let _localized_string_offset = reader.read_u32::<LE>()?;
        let key_list_offset = reader.read_u32::<LE>()? as u64;
        let resource_list_offset = reader.read_u32::<LE>()? as u64;

        let key_list_end = key_list_offset + entry_count * version.key_entry_size();
        let resource_list_end = resource_list_offset + entry_count * RESOURCE_ENTRY_SIZE;
        if key_list_end > file_len || resource_list_end > file_len {
            return Err(FormatError::Truncated("ERF key/resource list"));
        }

        let resref_len = version.resref_len();
        let mut keys = Vec::with_capacity(entry_count as usize);
        reader.seek(SeekFrom::Start(key_list_offset))?;
        for _ in 0..entry_count {
            let mut raw = vec![0u8; resref_len];
            reader.read_exact(&mut raw)?;
            let _res_id = reader.read_u32::<LE>()?;
            let res_type = reader.read_u16::<LE>()?;
            let _unused = reader.read_u16::<LE>()?;

            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let resref = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
            keys.push((resref, res_type));
        }

        let mut entries = Vec::with_capacity(keys.len());
        reader.seek(SeekFrom::Start(resource_list_offset))?;
        for (resref, res_type) in keys {
            let offset = reader.read_u32::<LE>()?;
            let size = reader.read_u32::<LE>()?;
            if offset as u64 + size as u64 > file_len {
                return Err(FormatError::Malformed(format!(
                    "ERF entry '{}' extends past end of file",
                    resref
                )));
            }
            entries.push(ErfEntry {
                resref,
                res_type,
                offset,
                size,
            });
        }

        Ok(Self {
            file_type: String::from_utf8_lossy(&file_type).trim().to_string(),
            version,
            entries,
        })
    }

    /// Find an entry by `resref.ext` (case-insensitive).
    pub fn find(&self, file_name: &str) -> Option<&ErfEntry> {
        let (resref, ext) = file_name.rsplit_once('.')?;
        let res_type = type_for_extension(ext)?;
        self.entries
            .iter()
            .find(|e| e.res_type == res_type && e.resref.eq_ignore_ascii_case(resref))
    }

    /// Read the body of one entry.
    pub fn read_entry<R: Read + Seek>(reader: &mut R, entry: &ErfEntry) -> Result<Vec<u8>> {
        reader.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut data = vec![0u8; entry.size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }
}

/// Writes ERF containers.
///
/// Entries keep insertion order; adding the same name twice replaces the earlier body.
#[derive(Debug)]
pub struct ErfBuilder {
    file_type: [u8; 4],
    version: ErfVersion,
    entries: Vec<(String, u16, Vec<u8>)>,
}

impl ErfBuilder {
    /// `file_type` is one of `"ERF"`, `"HAK"`, `"MOD"`.
    pub fn new(file_type: &str, version: ErfVersion) -> Self {
        let mut magic = *b"    ";
        for (slot, byte) in magic.iter_mut().zip(file_type.bytes()) {
            *slot = byte.to_ascii_uppercase();
        }
        Self {
            file_type: magic,
            version,
            entries: Vec::new(),
        }
    }

    /// Add a resource by `resref.ext`.
    pub fn add(&mut self, file_name: &str, data: impl Into<Vec<u8>>) -> Result<&mut Self> {
        let (resref, ext) = file_name
            .rsplit_once('.')
            .ok_or_else(|| FormatError::Malformed(format!("missing extension: {}", file_name)))?;
        let res_type = type_for_extension(ext)
            .ok_or_else(|| FormatError::Malformed(format!("unknown resource type: {}", ext)))?;
        if resref.is_empty() || resref.len() > self.version.resref_len() {
            return Err(FormatError::Malformed(format!(
                "resref '{}' does not fit in {} bytes",
                resref,
                self.version.resref_len()
            )));
        }

        let resref = resref.to_ascii_lowercase();
        let data = data.into();
        match self
            .entries
            .iter_mut()
            .find(|(r, t, _)| *r == resref && *t == res_type)
        {
            Some(existing) => existing.2 = data,
            None => self.entries.push((resref, res_type, data)),
        }
        Ok(self)
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let count = self.entries.len() as u64;
        let key_list_offset = HEADER_SIZE;
        let resource_list_offset = key_list_offset + count * self.version.key_entry_size();
        let data_offset = resource_list_offset + count * RESOURCE_ENTRY_SIZE;

        let mut out = Vec::new();
        out.write_all(&self.file_type)?;
        out.write_all(self.version.magic())?;
        out.write_u32::<LE>(0)?;
        out.write_u32::<LE>(0)?;
        out.write_u32::<LE>(count as u32)?;
        out.write_u32::<LE>(HEADER_SIZE as u32)?;
        out.write_u32::<LE>(key_list_offset as u32)?;
        out.write_u32::<LE>(resource_list_offset as u32)?;
        out.write_u32::<LE>(0)?;
        out.write_u32::<LE>(0)?;
        out.write_u32::<LE>(u32::MAX)?;
        out.write_all(&[0u8; 116])?;

        let resref_len = self.version.resref_len();
        for (id, (resref, res_type, _)) in self.entries.iter().enumerate() {
            let mut raw = vec![0u8; resref_len];
            raw[..resref.len()].copy_from_slice(resref.as_bytes());
            out.write_all(&raw)?;
            out.write_u32::<LE>(id as u32)?;
            out.write_u16::<LE>(*res_type)?;
            out.write_u16::<LE>(0)?;
        }

        let mut offset = data_offset;
        for (_, _, data) in &self.entries {
            out.write_u32::<LE>(offset as u32)?;
            out.write_u32::<LE>(data.len() as u32)?;
            offset += data.len() as u64;
        }

        for (_, _, data) in &self.entries {
            out.write_all(data)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(version: ErfVersion) -> Vec<u8> {
        let mut builder = ErfBuilder::new("HAK", version);
        builder.add("classes.2da", b"2DA V2.0".to_vec()).unwrap();
        builder.add("Module.IFO", b"{}".to_vec()).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_index_v11() {
        let bytes = sample(ErfVersion::V1_1);
        let mut cursor = Cursor::new(bytes);
        let index = ErfIndex::read(&mut cursor).unwrap();

        assert_eq!(index.file_type, "HAK");
        assert_eq!(index.version, ErfVersion::V1_1);
        let names: Vec<String> = index.entries.iter().map(ErfEntry::file_name).collect();
        assert_eq!(names, vec!["classes.2da", "module.ifo"]);

        let entry = index.find("CLASSES.2DA").unwrap();
        let data = ErfIndex::read_entry(&mut cursor, entry).unwrap();
        assert_eq!(data, b"2DA V2.0");
    }

    #[test]
    fn test_index_v10() {
        let mut cursor = Cursor::new(sample(ErfVersion::V1_0));
        let index = ErfIndex::read(&mut cursor).unwrap();
        assert_eq!(index.version, ErfVersion::V1_0);
        assert_eq!(index.entries.len(), 2);
    }

    #[test]
    fn test_duplicate_add_replaces() {
        let mut builder = ErfBuilder::new("ERF", ErfVersion::V1_1);
        builder.add("feat.2da", b"old".to_vec()).unwrap();
        builder.add("FEAT.2da", b"new".to_vec()).unwrap();
        let mut cursor = Cursor::new(builder.build().unwrap());
        let index = ErfIndex::read(&mut cursor).unwrap();
        assert_eq!(index.entries.len(), 1);
        let data = ErfIndex::read_entry(&mut cursor, &index.entries[0]).unwrap();
        assert_eq!(data, b"new");
    }

    #[test]
    fn test_rejects_truncated() {
        let mut bytes = sample(ErfVersion::V1_1);
        bytes.truncate(170);
        let err = ErfIndex::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::Truncated(_)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = sample(ErfVersion::V1_1);
        bytes[..4].copy_from_slice(b"ZIP ");
        let err = ErfIndex::read(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::InvalidMagic { .. }));
    }

    #[test]
    fn test_resref_too_long_for_v10() {
        let mut builder = ErfBuilder::new("ERF", ErfVersion::V1_0);
        let err = builder
            .add("a_very_long_resref_name.2da", Vec::new())
            .unwrap_err();
        assert!(matches!(err, FormatError::Malformed(_)));
    }
}
