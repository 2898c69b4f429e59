//! Binary `TLK V3.0` string tables.
//!
//! Layout (little-endian):
//!
//! ```text
//! header  (20 bytes)  "TLK " "V3.0" language_id:u32 string_count:u32 entries_offset:u32
//! entries (40 bytes each)
//!     flags:u32 sound_resref:[u8;16] volume_variance:u32 pitch_variance:u32
//!     string_offset:u32 string_size:u32 sound_length:f32
//! string data, addressed relative to entries_offset
//! ```

use crate::error::{FormatError, Result};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{Cursor, Read, Write};

const HEADER_SIZE: usize = 20;
const ENTRY_SIZE: usize = 40;

/// Entry flag: the entry carries text.
pub const TEXT_PRESENT: u32 = 0x1;

/// A decoded string table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TlkTable {
    language_id: u32,
    entries: Vec<Option<String>>,
}

impl TlkTable {
    /// Parse a TLK file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated("TLK header"));
        }

        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != b"TLK " {
            return Err(FormatError::InvalidMagic {
                expected: "TLK ",
                found: String::from_utf8_lossy(&magic).into_owned(),
            });
        }
        let mut version = [0u8; 4];
        cursor.read_exact(&mut version)?;
        if &version != b"V3.0" {
            return Err(FormatError::UnsupportedVersion {
                format: "TLK",
                version: String::from_utf8_lossy(&version).into_owned(),
            });
        }

        let language_id = cursor.read_u32::<LE>()?;
        let string_count = cursor.read_u32::<LE>()? as usize;
        let entries_offset = cursor.read_u32::<LE>()? as usize;

        let table_end = string_count
            .checked_mul(ENTRY_SIZE)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .ok_or(FormatError::Truncated("TLK entry table"))?;
        if table_end > bytes.len() {
            return Err(FormatError::Truncated("TLK entry table"));
        }

        let mut entries = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            let flags = cursor.read_u32::<LE>()?;
            let mut _sound = [0u8; 16];
            cursor.read_exact(&mut _sound)?;
            let _volume_variance = cursor.read_u32::<LE>()?;
            let _pitch_variance = cursor.read_u32::<LE>()?;
            let string_offset = cursor.read_u32::<LE>()? as usize;
            let string_size = cursor.read_u32::<LE>()? as usize;
            let _sound_length = cursor.read_f32::<LE>()?;

            if flags & TEXT_PRESENT == 0 {
                entries.push(None);
                continue;
            }

            let start = entries_offset.saturating_add(string_offset);
            let end = start.saturating_add(string_size);
            let text = bytes
                .get(start..end)
                .ok_or(FormatError::Truncated("TLK string data"))?;
            entries.push(Some(String::from_utf8_lossy(text).into_owned()));
        }

        Ok(Self {
            language_id,
            entries,
        })
    }

    pub fn language_id(&self) -> u32 {
        self.language_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a string by reference. Entries without text return `None`.
    pub fn get(&self, strref: u32) -> Option<&str> {
        self.entries.get(strref as usize)?.as_deref()
    }
}

/// Writes `TLK V3.0` files.
#[derive(Debug, Default)]
pub struct TlkBuilder {
    language_id: u32,
    entries: Vec<Option<String>>,
}

impl TlkBuilder {
    pub fn new(language_id: u32) -> Self {
        Self {
            language_id,
            entries: Vec::new(),
        }
    }

    /// Append a string and return its reference.
    pub fn push(&mut self, text: impl Into<String>) -> u32 {
        self.entries.push(Some(text.into()));
        (self.entries.len() - 1) as u32
    }

    /// Append an entry without text.
    pub fn push_empty(&mut self) -> u32 {
        self.entries.push(None);
        (self.entries.len() - 1) as u32
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let entries_offset = HEADER_SIZE + self.entries.len() * ENTRY_SIZE;
        let mut out = Vec::with_capacity(entries_offset);
        out.write_all(b"TLK V3.0")?;
        out.write_u32::<LE>(self.language_id)?;
        out.write_u32::<LE>(self.entries.len() as u32)?;
        out.write_u32::<LE>(entries_offset as u32)?;

        let mut data = Vec::new();
        for entry in &self.entries {
            let (flags, offset, size) = match entry {
                Some(text) => {
                    let offset = data.len();
                    data.extend_from_slice(text.as_bytes());
                    (TEXT_PRESENT, offset, text.len())
                }
                None => (0, 0, 0),
            };
            out.write_u32::<LE>(flags)?;
            out.write_all(&[0u8; 16])?;
            out.write_u32::<LE>(0)?;
            out.write_u32::<LE>(0)?;
            out.write_u32::<LE>(offset as u32)?;
            out.write_u32::<LE>(size as u32)?;
            out.write_f32::<LE>(0.0)?;
        }
        out.extend_from_slice(&data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_read() {
        let mut builder = TlkBuilder::new(0);
        let a = builder.push("Barbarian");
        let b = builder.push_empty();
        let c = builder.push("Ünïcode");
        let table = TlkTable::parse(&builder.build().unwrap()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(a), Some("Barbarian"));
        assert_eq!(table.get(b), None);
        assert_eq!(table.get(c), Some("Ünïcode"));
        assert_eq!(table.get(99), None);
    }

    #[test]
    fn test_rejects_wrong_magic() {
        let err = TlkTable::parse(b"ERF V1.0xxxxxxxxxxxxxxxxxxxx").unwrap_err();
        assert!(matches!(err, FormatError::InvalidMagic { .. }));
    }

    #[test]
    fn test_rejects_truncated_table() {
        let mut bytes = TlkBuilder::new(0).build().unwrap();
        // Claim 10 entries without providing them.
        bytes[12..16].copy_from_slice(&10u32.to_le_bytes());
        let err = TlkTable::parse(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::Truncated(_)));
    }
}
