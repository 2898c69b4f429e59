//! Engine configuration.
//!
//! A [`ResmanConfig`] tells the engine where the game is installed, where the
//! per-user content lives, and how large the in-memory caches may grow. It is
//! persisted as TOML so the CLI and the editor can share one file:
//!
//! ```toml
//! install_dir = "C:/Games/Neverwinter Nights 2"
//! user_dir = "C:/Users/me/Documents/Neverwinter Nights 2"
//! memory_ceiling_bytes = 268435456
//! custom_override_dirs = ["D:/nwn2/my_overrides"]
//! optional_table_prefixes = ["cls_bfeat_", "race_feat_"]
//!
//! [table_aliases]
//! "classes_x2.2da" = "classes.2da"
//! ```
//!
//! Every field has a default, so a partial file is always valid.

use crate::error::{Error, Result};
use crate::utils::{find_child_ci, find_in_dirs};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default in-memory cache ceiling: 256 MiB.
pub const DEFAULT_MEMORY_CEILING: usize = 256 * 1024 * 1024;

/// Default size above which cached tables are stored compressed: 64 KiB.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 64 * 1024;

/// Default share of entries dropped when the cache ceiling is exceeded.
pub const DEFAULT_EVICTION_FRACTION: f64 = 0.2;

/// Default number of module contexts kept warm.
pub const DEFAULT_MODULE_LRU_CAPACITY: usize = 5;

/// Environment variable overriding the installation directory.
pub const INSTALL_DIR_ENV: &str = "NWN2_INSTALL_DIR";

/// Environment variable overriding the user content directory.
pub const USER_DIR_ENV: &str = "NWN2_USER_DIR";

/// Engine configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResmanConfig {
    /// Game installation root (contains `Data/`, `Modules/`, `dialog.tlk`).
    pub install_dir: Utf8PathBuf,

    /// Per-user content root (contains `override/`, `hak/`, `modules/`).
    pub user_dir: Utf8PathBuf,

    /// Where the precompiled cache is persisted. Defaults to
    /// `<user_dir>/resman_cache` when unset.
    pub cache_dir: Option<Utf8PathBuf>,

    /// In-memory cache ceiling in bytes.
    pub memory_ceiling_bytes: usize,

    /// Tables whose footprint exceeds this are stored compressed.
    pub compression_threshold_bytes: usize,

    /// Share of entries evicted in one batch when over the ceiling.
    pub eviction_fraction: f64,

    /// Number of module contexts kept in the module LRU.
    pub module_lru_capacity: usize,

    /// Extra override directories, lowest precedence first.
    pub custom_override_dirs: Vec<Utf8PathBuf>,

    /// Roots under which workshop mods are installed, one subdirectory per mod.
    pub workshop_dirs: Vec<Utf8PathBuf>,

    /// Whether to persist parsed tables between runs.
    pub precompiled_cache: bool,

    /// Module names that ship with the game and are skipped by the module index.
    pub bundled_modules: Vec<String>,

    /// Table name prefixes that may be absent; lookups for them return an empty
    /// table instead of nothing.
    pub optional_table_prefixes: Vec<String>,

    /// Table aliases, tried in order when the requested name resolves nowhere.
    pub table_aliases: HashMap<String, String>,
}

impl Default for ResmanConfig {
    fn default() -> Self {
        Self {
            install_dir: Utf8PathBuf::new(),
            user_dir: Utf8PathBuf::new(),
            cache_dir: None,
            memory_ceiling_bytes: DEFAULT_MEMORY_CEILING,
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
            module_lru_capacity: DEFAULT_MODULE_LRU_CAPACITY,
            custom_override_dirs: Vec::new(),
            workshop_dirs: Vec::new(),
            precompiled_cache: true,
            bundled_modules: Vec::new(),
            optional_table_prefixes: vec![
                "cls_bfeat_".to_string(),
                "cls_feat_".to_string(),
                "cls_skill_".to_string(),
                "cls_spgn_".to_string(),
                "cls_spkn_".to_string(),
                "race_feat_".to_string(),
            ],
            table_aliases: HashMap::new(),
        }
    }
}

impl ResmanConfig {
    /// Create a configuration for the given install and user directories.
    pub fn new(install_dir: impl Into<Utf8PathBuf>, user_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            user_dir: user_dir.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from the environment.
    ///
    /// Reads [`INSTALL_DIR_ENV`] and [`USER_DIR_ENV`]. When the user directory is
    /// not set, it defaults to `Documents/Neverwinter Nights 2`.
    pub fn discover() -> Result<Self> {
        let install_dir = std::env::var(INSTALL_DIR_ENV)
            .map(Utf8PathBuf::from)
            .map_err(|_| {
                Error::Other(format!(
                    "Installation directory unknown, set {} or pass it explicitly",
                    INSTALL_DIR_ENV
                ))
            })?;

        let user_dir = match std::env::var(USER_DIR_ENV) {
            Ok(dir) => Utf8PathBuf::from(dir),
            Err(_) => default_user_dir().ok_or_else(|| {
                Error::Other(format!(
                    "User directory unknown, set {} or pass it explicitly",
                    USER_DIR_ENV
                ))
            })?,
        };

        tracing::debug!("Discovered install_dir={} user_dir={}", install_dir, user_dir);
        Ok(Self::new(install_dir, user_dir))
    }

    /// Load a configuration file. Returns `Ok(None)` if it doesn't exist.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path.as_std_path())?;
        Ok(Some(toml::from_str(&contents)?))
    }

    /// Save the configuration, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
        std::fs::write(path.as_std_path(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_cache_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_memory_ceiling(mut self, bytes: usize) -> Self {
        self.memory_ceiling_bytes = bytes;
        self
    }

    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold_bytes = bytes;
        self
    }

    pub fn with_custom_override_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.custom_override_dirs.push(dir.into());
        self
    }

    pub fn with_workshop_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.workshop_dirs.push(dir.into());
        self
    }

    pub fn with_precompiled_cache(mut self, enabled: bool) -> Self {
        self.precompiled_cache = enabled;
        self
    }

    pub fn with_table_alias(mut self, name: &str, target: &str) -> Self {
        self.table_aliases.insert(
            crate::utils::table_name(name),
            crate::utils::table_name(target),
        );
        self
    }

    /// Resolved precompiled cache directory.
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.user_dir.join("resman_cache"))
    }

    /// Base installation archives in ascending precedence.
    ///
    /// Every `.zip` under `<install>/Data`, sorted by lowercase file name, so that
    /// expansion archives (`2DA_X1.zip`, `2DA_X2.zip`) sort after the original
    /// release and win on conflicts.
    pub fn base_archives(&self) -> Result<Vec<Utf8PathBuf>> {
        let data_dir = find_child_ci(&self.install_dir, "Data")
            .ok_or_else(|| Error::InvalidInstallDir(self.install_dir.clone()))?;

        let mut archives = Vec::new();
        for entry in std::fs::read_dir(data_dir.as_std_path())? {
            let entry = entry?;
            let Some(path) = crate::utils::utf8_path(entry.path()) else {
                continue;
            };
            let is_zip = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if is_zip && path.as_std_path().is_file() {
                archives.push(path);
            }
        }

        archives.sort_by_key(|p| p.file_name().unwrap_or_default().to_ascii_lowercase());
        if archives.is_empty() {
            return Err(Error::InvalidInstallDir(self.install_dir.clone()));
        }
        Ok(archives)
    }

    /// `<user>/override`, if present.
    pub fn override_dir(&self) -> Option<Utf8PathBuf> {
        find_child_ci(&self.user_dir, "override")
    }

    /// Directories searched for `.hak` containers, highest priority first.
    pub fn hak_dirs(&self) -> Vec<Utf8PathBuf> {
        self.child_dirs("hak")
    }

    /// Directories searched for custom `.tlk` files, highest priority first.
    pub fn tlk_dirs(&self) -> Vec<Utf8PathBuf> {
        self.child_dirs("tlk")
    }

    /// Directories searched for modules, highest priority first.
    pub fn module_dirs(&self) -> Vec<Utf8PathBuf> {
        self.child_dirs("modules")
    }

    /// Directories searched for campaigns, highest priority first.
    pub fn campaign_dirs(&self) -> Vec<Utf8PathBuf> {
        self.child_dirs("campaigns")
    }

    /// The base string table, `<install>/dialog.tlk`.
    pub fn base_tlk(&self) -> Option<Utf8PathBuf> {
        find_child_ci(&self.install_dir, "dialog.tlk")
    }

    fn child_dirs(&self, name: &str) -> Vec<Utf8PathBuf> {
        [&self.user_dir, &self.install_dir]
            .into_iter()
            .filter_map(|root| find_child_ci(root, name))
            .filter(|p| p.as_std_path().is_dir())
            .collect()
    }

    /// Locate a file by name in the given search directories.
    pub fn find_file(dirs: &[Utf8PathBuf], name: &str) -> Option<Utf8PathBuf> {
        find_in_dirs(dirs, name).filter(|p| p.as_std_path().is_file())
    }
}

fn default_user_dir() -> Option<Utf8PathBuf> {
    let dirs = directories_next::UserDirs::new()?;
    let documents = dirs.document_dir()?;
    Utf8PathBuf::from_path_buf(documents.join("Neverwinter Nights 2")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResmanConfig::default();
        assert_eq!(config.memory_ceiling_bytes, DEFAULT_MEMORY_CEILING);
        assert_eq!(config.module_lru_capacity, 5);
        assert!(config.precompiled_cache);
    }

    #[test]
    fn test_partial_toml() {
        let config: ResmanConfig = toml::from_str(
            r#"
            install_dir = "/games/nwn2"
            memory_ceiling_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.install_dir, Utf8PathBuf::from("/games/nwn2"));
        assert_eq!(config.memory_ceiling_bytes, 1024);
        assert_eq!(config.compression_threshold_bytes, DEFAULT_COMPRESSION_THRESHOLD);
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(temp.path()).unwrap().join("resman.toml");

        let config = ResmanConfig::new("/install", "/user")
            .with_custom_override_dir("/extra")
            .with_table_alias("classes_x2", "classes");
        config.save(&path).unwrap();

        let loaded = ResmanConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded.custom_override_dirs, vec![Utf8PathBuf::from("/extra")]);
        assert_eq!(
            loaded.table_aliases.get("classes_x2.2da").map(String::as_str),
            Some("classes.2da")
        );
    }

    #[test]
    fn test_load_missing() {
        assert!(ResmanConfig::load(Utf8Path::new("/nope/resman.toml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_base_archives_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let data = root.join("Data");
        std::fs::create_dir(&data).unwrap();
        for name in ["2DA_X2.zip", "2DA.zip", "2DA_X1.zip", "readme.txt"] {
            std::fs::write(data.join(name), b"").unwrap();
        }

        let config = ResmanConfig::new(root, root.join("user"));
        let names: Vec<_> = config
            .base_archives()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["2DA.zip", "2DA_X1.zip", "2DA_X2.zip"]);
    }

    #[test]
    fn test_base_archives_missing_data() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        let config = ResmanConfig::new(root, root);
        assert!(matches!(
            config.base_archives(),
            Err(Error::InvalidInstallDir(_))
        ));
    }
}
