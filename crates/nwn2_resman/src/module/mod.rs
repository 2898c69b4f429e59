//! Module contexts: loading a module, its haks and its custom string table.
//!
//! A module is either a `.mod` container or a directory holding a `module.ifo`.
//! Activating one produces a [`ModuleContext`] with two layers:
//!
//! - **module-own**: the module's resources, above its campaign folder if it has one
//! - **dependent containers**: each hak named by the manifest, in load order
//!
//! Contexts are kept in a small LRU keyed by module path, so switching back to a
//! recently used module costs a lookup instead of a manifest parse and a hak scan.
//! A missing hak is logged and left out; the module still activates.

mod campaign;
mod context;
mod index;
mod manifest;

pub use campaign::{find_campaign, scan_campaigns, CampaignInfo};
pub use context::{ContextId, ModuleContext};
pub use index::{ModuleIndex, ModuleIndexEntry};
pub use manifest::ModuleManifest;

use crate::codec::{Codecs, ManifestCodec};
use crate::config::ResmanConfig;
use crate::container::ContainerLoader;
use crate::error::{Error, Result};
use crate::layers::{LayerKind, LayerSource, LayerStack};
use crate::location::SourceKind;
use crate::locator::ResourceLocator;
use crate::utils::{find_child_ci, path_mtime};
use camino::{Utf8Path, Utf8PathBuf};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

pub(crate) const MANIFEST_NAME: &str = "module.ifo";

/// Where modules and their dependencies are searched.
#[derive(Debug, Clone, Default)]
pub struct ModulePaths {
    pub module_dirs: Vec<Utf8PathBuf>,
    pub hak_dirs: Vec<Utf8PathBuf>,
    pub tlk_dirs: Vec<Utf8PathBuf>,
    pub campaign_dirs: Vec<Utf8PathBuf>,
    pub bundled_modules: Vec<String>,
}

impl ModulePaths {
    pub fn from_config(config: &ResmanConfig) -> Self {
        Self {
            module_dirs: config.module_dirs(),
            hak_dirs: config.hak_dirs(),
            tlk_dirs: config.tlk_dirs(),
            campaign_dirs: config.campaign_dirs(),
            bundled_modules: config.bundled_modules.clone(),
        }
    }
}

/// The two on-disk shapes of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModuleForm {
    Directory(Utf8PathBuf),
    Container(Utf8PathBuf),
}

impl ModuleForm {
    pub(crate) fn detect(path: &Utf8Path) -> Result<Self> {
        let std_path = path.as_std_path();
        if std_path.is_dir() {
            Ok(Self::Directory(path.to_path_buf()))
        } else if std_path.is_file() {
            Ok(Self::Container(path.to_path_buf()))
        } else {
            Err(Error::ModuleNotFound(path.to_string()))
        }
    }

    fn path(&self) -> &Utf8Path {
        match self {
            Self::Directory(p) | Self::Container(p) => p,
        }
    }

    /// The file whose modification time stands for the whole module.
    fn stamp_path(&self) -> Utf8PathBuf {
        match self {
            Self::Directory(dir) => {
                find_child_ci(dir, MANIFEST_NAME).unwrap_or_else(|| dir.join(MANIFEST_NAME))
            }
            Self::Container(file) => file.clone(),
        }
    }
}

/// Read and decode the manifest of a module.
pub(crate) fn read_manifest(
    loader: &ContainerLoader,
    codec: &dyn ManifestCodec,
    form: &ModuleForm,
) -> Result<ModuleManifest> {
    let invalid = |reason: String| Error::InvalidModule {
        path: form.path().to_path_buf(),
        reason,
    };

    let bytes = match form {
        ModuleForm::Directory(dir) => {
            let manifest = find_child_ci(dir, MANIFEST_NAME)
                .ok_or_else(|| invalid(format!("no {}", MANIFEST_NAME)))?;
            std::fs::read(manifest.as_std_path())?
        }
        ModuleForm::Container(file) => loader
            .read_named(file, MANIFEST_NAME)
            .map_err(|e| invalid(e.to_string()))?
            .ok_or_else(|| invalid(format!("no {}", MANIFEST_NAME)))?,
    };

    let tree = codec.parse(&bytes).map_err(|e| invalid(e.to_string()))?;
    ModuleManifest::from_tree(&tree).map_err(|e| invalid(e.to_string()))
}

/// Loads module contexts and tracks which one is active.
pub struct ModuleContextManager {
    locator: ResourceLocator,
    codecs: Codecs,
    paths: ModulePaths,
    contexts: Mutex<LruCache<Utf8PathBuf, Arc<ModuleContext>>>,
    active: RwLock<Option<Arc<ModuleContext>>>,
    index: OnceLock<ModuleIndex>,
}

impl ModuleContextManager {
    pub fn new(locator: ResourceLocator, codecs: Codecs, paths: ModulePaths, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            locator,
            codecs,
            paths,
            contexts: Mutex::new(LruCache::new(capacity)),
            active: RwLock::new(None),
            index: OnceLock::new(),
        }
    }

    pub fn paths(&self) -> &ModulePaths {
        &self.paths
    }

    /// Make the module at `path` the active context.
    ///
    /// A context cached from an earlier activation is reused unless the module
    /// changed on disk. On failure the previously active context stays active.
    pub fn activate(&self, path: &Utf8Path) -> Result<Arc<ModuleContext>> {
        let form = ModuleForm::detect(path)?;
        let key = canonical(path);

        let cached = self.contexts.lock().get(&key).cloned();
        let context = match cached {
            Some(ctx) if path_mtime(&form.stamp_path()) == Some(ctx.modified_time) => {
                tracing::debug!("Module: reusing cached context for {}", ctx.name);
                ctx
            }
            _ => {
                let ctx = Arc::new(self.load_form(&form)?);
                self.contexts.lock().put(key, ctx.clone());
                ctx
            }
        };

        *self.active.write() = Some(context.clone());
        tracing::info!(
            "Module: activated '{}' ({} hak(s), {} missing)",
            context.name,
            context.containers.len(),
            context.missing_containers.len()
        );
        Ok(context)
    }

    /// Clear the active context. The context stays in the LRU.
    pub fn deactivate(&self) -> Option<Arc<ModuleContext>> {
        self.active.write().take()
    }

    pub fn active(&self) -> Option<Arc<ModuleContext>> {
        self.active.read().clone()
    }

    /// Load a module without caching or activating it.
    pub fn load(&self, path: &Utf8Path) -> Result<ModuleContext> {
        self.load_form(&ModuleForm::detect(path)?)
    }

    /// Read only the manifest of the module at `path`.
    pub fn read_manifest(&self, path: &Utf8Path) -> Result<ModuleManifest> {
        read_manifest(
            self.locator.loader(),
            self.codecs.manifests.as_ref(),
            &ModuleForm::detect(path)?,
        )
    }

    /// Paths of cached contexts, most recently used first.
    pub fn cached_contexts(&self) -> Vec<Utf8PathBuf> {
        self.contexts.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Drop every cached context except the active one.
    pub fn clear(&self) {
        self.contexts.lock().clear();
    }

    /// The module index, built on first use.
    pub fn index(&self) -> &ModuleIndex {
        self.index.get_or_init(|| {
            ModuleIndex::build(
                &self.paths.module_dirs,
                &self.paths.bundled_modules,
                self.locator.loader(),
                self.codecs.manifests.as_ref(),
            )
        })
    }

    /// Find a module by name through the index.
    pub fn find_module(&self, name: &str) -> Option<Utf8PathBuf> {
        self.index().find(name).map(|e| e.path.clone())
    }

    /// The campaign the module at `path` belongs to.
    pub fn find_campaign(&self, path: &Utf8Path) -> Option<CampaignInfo> {
        let manifest = match self.read_manifest(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Module: cannot read manifest of {}: {}", path, e);
                return None;
            }
        };
        let name = index::module_name(path)?;
        find_campaign(
            &self.paths.campaign_dirs,
            self.codecs.manifests.as_ref(),
            manifest.campaign_id.as_deref(),
            &name,
        )
    }

    fn load_form(&self, form: &ModuleForm) -> Result<ModuleContext> {
        let path = form.path();
        let loader = self.locator.loader();
        let manifest = read_manifest(loader, self.codecs.manifests.as_ref(), form)?;
        let name = index::module_name(path).unwrap_or_else(|| manifest.name.clone());

        let own_index = match form {
            ModuleForm::Directory(dir) => self.locator.scan_directory(dir)?,
            ModuleForm::Container(file) => {
                loader
                    .index(file, SourceKind::Container)
                    .map_err(|e| Error::InvalidModule {
                        path: file.clone(),
                        reason: e.to_string(),
                    })?
            }
        };

        let mut layers = LayerStack::new();

        let campaign = if manifest.campaign_id.is_some() {
            find_campaign(
                &self.paths.campaign_dirs,
                self.codecs.manifests.as_ref(),
                manifest.campaign_id.as_deref(),
                &name,
            )
        } else {
            None
        };
        if let Some(campaign) = &campaign {
            match self.locator.scan_directory(&campaign.directory) {
                Ok(index) => layers.push(
                    LayerKind::ModuleOwn,
                    LayerSource::new(campaign.directory.clone(), index),
                ),
                Err(e) => tracing::warn!(
                    "Module: campaign folder {} unavailable: {}",
                    campaign.directory,
                    e
                ),
            }
        }
        layers.push(LayerKind::ModuleOwn, LayerSource::new(path, own_index));

        let mut containers = Vec::new();
        let mut missing_containers = Vec::new();
        for hak in &manifest.hak_list {
            let file_name = format!("{}.hak", hak);
            let Some(hak_path) = ResmanConfig::find_file(&self.paths.hak_dirs, &file_name) else {
                tracing::warn!("Module '{}': dependent container '{}' not found", name, file_name);
                missing_containers.push(hak.clone());
                continue;
            };
            match loader.index(&hak_path, SourceKind::Container) {
                Ok(index) => {
                    layers.push(LayerKind::DependentContainer, LayerSource::new(&hak_path, index));
                    containers.push(hak_path);
                }
                Err(e) => {
                    tracing::warn!("Module '{}': skipping unreadable '{}': {}", name, hak_path, e);
                    missing_containers.push(hak.clone());
                }
            }
        }

        let custom_strings = manifest
            .custom_tlk
            .as_deref()
            .and_then(|tlk| self.load_custom_tlk(&name, tlk));

        let stamp = form.stamp_path();
        let modified_time = path_mtime(&stamp).unwrap_or_default();
        let id = ContextId::derive(path.as_str(), modified_time, &containers);

        Ok(ModuleContext {
            id,
            name,
            path: path.to_path_buf(),
            manifest,
            containers,
            missing_containers,
            campaign,
            custom_strings,
            layers,
            modified_time,
        })
    }

    fn load_custom_tlk(
        &self,
        module: &str,
        tlk: &str,
    ) -> Option<Arc<dyn crate::codec::StringTable>> {
        let file_name = format!("{}.tlk", tlk);
        let Some(path) = ResmanConfig::find_file(&self.paths.tlk_dirs, &file_name) else {
            tracing::warn!("Module '{}': custom string table '{}' not found", module, file_name);
            return None;
        };
        let parsed = std::fs::read(path.as_std_path())
            .map_err(Error::from)
            .and_then(|bytes| self.codecs.strings.parse(&bytes));
        match parsed {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::warn!("Module '{}': custom string table {} unreadable: {}", module, path, e);
                None
            }
        }
    }
}

fn canonical(path: &Utf8Path) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or_else(|_| path.to_path_buf())
}
