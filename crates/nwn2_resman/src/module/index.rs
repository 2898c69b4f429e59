use super::manifest::ModuleManifest;
use super::{read_manifest, ModuleForm};
use crate::codec::ManifestCodec;
use crate::container::ContainerLoader;
use crate::utils::utf8_path;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::collections::HashMap;

/// What the index knows about one module without loading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleIndexEntry {
    /// File stem, as it appears in saves.
    pub name: String,
    /// Display name from the manifest.
    pub display_name: String,
    pub path: Utf8PathBuf,
    pub hak_list: Vec<String>,
    pub custom_tlk: Option<String>,
}

/// Name to manifest summary for every reachable module.
///
/// Built by scanning the module directories in priority order (user before
/// install). The first module with a given name wins. Modules on the bundled list
/// are skipped.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    modules: HashMap<String, ModuleIndexEntry>,
}

impl ModuleIndex {
    pub fn build(
        dirs: &[Utf8PathBuf],
        bundled: &[String],
        loader: &ContainerLoader,
        codec: &dyn ManifestCodec,
    ) -> Self {
        let mut modules: HashMap<String, ModuleIndexEntry> = HashMap::new();
        let mut skipped = 0usize;

        for dir in dirs {
            for path in module_candidates(dir) {
                let Some(name) = module_name(&path) else {
                    continue;
                };
                let key = name.to_ascii_lowercase();
                if modules.contains_key(&key) {
                    continue;
                }
                if bundled.iter().any(|b| b.eq_ignore_ascii_case(&name)) {
                    skipped += 1;
                    continue;
                }

                let manifest = ModuleForm::detect(&path)
                    .and_then(|form| read_manifest(loader, codec, &form));
                match manifest {
                    Ok(ModuleManifest {
                        name: display_name,
                        hak_list,
                        custom_tlk,
                        ..
                    }) => {
                        modules.insert(
                            key,
                            ModuleIndexEntry {
                                name,
                                display_name,
                                path,
                                hak_list,
                                custom_tlk,
                            },
                        );
                    }
                    Err(e) => tracing::warn!("Module index: skipping {}: {}", path, e),
                }
            }
        }

        tracing::info!(
            "Module index built: {} modules ({} bundled skipped)",
            modules.len(),
            skipped
        );
        Self { modules }
    }

    /// Find by file stem, then by display name. Both ignore case.
    pub fn find(&self, name: &str) -> Option<&ModuleIndexEntry> {
        let stem = name.trim();
        let stem = stem
            .strip_suffix(".mod")
            .or_else(|| stem.strip_suffix(".MOD"))
            .unwrap_or(stem);
        self.modules.get(&stem.to_ascii_lowercase()).or_else(|| {
            self.modules
                .values()
                .find(|e| e.display_name.eq_ignore_ascii_case(stem))
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> Vec<&ModuleIndexEntry> {
        let mut entries: Vec<_> = self.modules.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// `.mod` files and directory-form modules directly under `dir`, sorted.
fn module_candidates(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir.as_std_path()) else {
        return Vec::new();
    };
    let mut paths: Vec<Utf8PathBuf> = entries
        .flatten()
        .filter_map(|e| utf8_path(e.path()))
        .filter(|p| {
            if p.as_std_path().is_dir() {
                crate::utils::find_child_ci(p, super::MANIFEST_NAME).is_some()
            } else {
                p.extension().is_some_and(|e| e.eq_ignore_ascii_case("mod"))
            }
        })
        .collect();
    paths.sort();
    paths
}

pub(crate) fn module_name(path: &Utf8Path) -> Option<String> {
    if path.as_std_path().is_dir() {
        path.file_name().map(str::to_string)
    } else {
        path.file_stem().map(str::to_string)
    }
}
