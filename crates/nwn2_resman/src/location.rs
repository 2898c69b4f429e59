//! Where a resource physically lives.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of source a resource is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    /// An entry inside a base installation archive.
    Archive,
    /// A loose file on disk.
    Directory,
    /// An entry inside a user or module container (`.hak`, `.mod`, `.erf`).
    Container,
}

/// Physical location of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLocation {
    /// Normalized name (`resref.ext`, lowercase).
    pub name: String,
    pub source_kind: SourceKind,
    /// The loose file, or the archive/container holding the entry.
    pub source_path: Utf8PathBuf,
    /// Entry address inside the archive/container. Empty for loose files.
    pub internal_path: String,
    pub size: u64,
    /// Modification time of `source_path`, seconds since the UNIX epoch.
    pub modified_time: f64,
}

impl ResourceLocation {
    /// Whether the resource is a loose file rather than an archive entry.
    pub fn is_loose(&self) -> bool {
        self.source_kind == SourceKind::Directory
    }
}

/// Normalized resource name to location.
pub type ResourceIndex = HashMap<String, ResourceLocation>;
