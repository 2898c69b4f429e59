use super::campaign::CampaignInfo;
use super::manifest::ModuleManifest;
use crate::codec::StringTable;
use crate::layers::LayerStack;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Identity of one loaded module context.
///
/// Derived from the module path, its modification time and its dependent container
/// list, so reloading a changed module yields a new identity and never reuses
/// cache entries from the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl ContextId {
    pub fn derive(path: &str, modified_time: f64, haks: &[Utf8PathBuf]) -> Self {
        let mut input = Vec::new();
        input.extend_from_slice(path.as_bytes());
        input.push(0);
        input.extend_from_slice(&modified_time.to_bits().to_le_bytes());
        for hak in haks {
            input.extend_from_slice(hak.as_str().as_bytes());
            input.push(0);
        }
        Self(xxh3_64(&input))
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A loaded module: its manifest, its own resources and its dependent containers.
pub struct ModuleContext {
    pub id: ContextId,
    /// Module file stem (`MyModule` for `MyModule.mod`).
    pub name: String,
    pub path: Utf8PathBuf,
    pub manifest: ModuleManifest,
    /// Dependent containers that were found, in load order.
    pub containers: Vec<Utf8PathBuf>,
    /// Dependent containers named by the manifest that could not be loaded.
    pub missing_containers: Vec<String>,
    pub campaign: Option<CampaignInfo>,
    pub(crate) custom_strings: Option<Arc<dyn StringTable>>,
    pub(crate) layers: LayerStack,
    pub(crate) modified_time: f64,
}

impl ModuleContext {
    /// The module-own and dependent-container layers.
    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn custom_string_table(&self) -> Option<&Arc<dyn StringTable>> {
        self.custom_strings.as_ref()
    }

    pub fn custom_string_table_name(&self) -> Option<&str> {
        self.manifest.custom_tlk.as_deref()
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("containers", &self.containers)
            .field("missing_containers", &self.missing_containers)
            .field("custom_strings", &self.custom_strings.as_ref().map(|t| t.len()))
            .finish()
    }
}
