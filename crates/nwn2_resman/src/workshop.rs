//! Workshop mods: local enumeration plus optional remote metadata.
//!
//! Workshop content is installed as one folder per mod under a workshop root:
//!
//! ```text
//! <workshop_root>/
//!   1234567890/
//!     override/        # resources applied in the workshop layer
//!   2345678901/
//!     classes.2da      # mods without an override/ folder contribute the folder itself
//! ```
//!
//! Local enumeration never touches the network. Titles and update times come from a
//! [`MetadataProvider`]; wrap remote providers in [`CachedMetadataProvider`] so that
//! repeated listings stay cheap and an outage only means "no metadata".

use crate::error::Result;
use crate::utils::{find_child_ci, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const STEAM_DETAILS_URL: &str =
    "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/";

/// A workshop mod found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopMod {
    /// Folder name, normally the published file id.
    pub id: String,
    pub title: Option<String>,
    pub time_updated: Option<u64>,
    pub directory: Utf8PathBuf,
    /// Folder contributing to the workshop layer.
    pub override_dir: Utf8PathBuf,
}

/// Remote metadata for one mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteModInfo {
    pub id: String,
    pub title: String,
    pub time_updated: Option<u64>,
}

/// Source of remote mod metadata.
pub trait MetadataProvider: Send + Sync {
    fn fetch(&self, ids: &[String]) -> Result<Vec<RemoteModInfo>>;
}

/// Enumerates workshop mods under a set of roots.
#[derive(Debug, Clone, Default)]
pub struct WorkshopScanner {
    roots: Vec<Utf8PathBuf>,
}

impl WorkshopScanner {
    pub fn new(roots: Vec<Utf8PathBuf>) -> Self {
        Self { roots }
    }

    /// Mods on disk, roots in configured order and folders sorted by name.
    pub fn list_local(&self) -> Vec<WorkshopMod> {
        let mut mods = Vec::new();
        for root in &self.roots {
            let Ok(entries) = std::fs::read_dir(root.as_std_path()) else {
                tracing::debug!("Workshop root {} not readable", root);
                continue;
            };
            let mut dirs: Vec<Utf8PathBuf> = entries
                .flatten()
                .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
                .filter_map(|e| utf8_path(e.path()))
                .collect();
            dirs.sort();

            for directory in dirs {
                let Some(id) = directory.file_name().map(str::to_string) else {
                    continue;
                };
                let override_dir = find_child_ci(&directory, "override")
                    .filter(|p| p.as_std_path().is_dir())
                    .unwrap_or_else(|| directory.clone());
                mods.push(WorkshopMod {
                    id,
                    title: None,
                    time_updated: None,
                    directory,
                    override_dir,
                });
            }
        }
        mods
    }

    /// Folders for the workshop layer, lowest precedence first.
    pub fn override_dirs(&self) -> Vec<Utf8PathBuf> {
        self.list_local().into_iter().map(|m| m.override_dir).collect()
    }

    /// Mods on disk, annotated with remote metadata when a provider is available.
    ///
    /// A provider failure leaves the titles empty; the local list is unaffected.
    pub fn list_mods(&self, provider: Option<&dyn MetadataProvider>) -> Vec<WorkshopMod> {
        let mut mods = self.list_local();
        let Some(provider) = provider else {
            return mods;
        };
        if mods.is_empty() {
            return mods;
        }

        let ids: Vec<String> = mods.iter().map(|m| m.id.clone()).collect();
        let remote = match provider.fetch(&ids) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Workshop metadata unavailable: {}", e);
                return mods;
            }
        };

        let by_id: HashMap<&str, &RemoteModInfo> = remote.iter().map(|r| (r.id.as_str(), r)).collect();
        for m in &mut mods {
            if let Some(info) = by_id.get(m.id.as_str()) {
                m.title = Some(info.title.clone());
                m.time_updated = info.time_updated;
            }
        }
        mods
    }
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    response: DetailsResponse,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<PublishedFile>,
}

#[derive(Debug, Deserialize)]
struct PublishedFile {
    publishedfileid: String,
    #[serde(default)]
    result: i32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    time_updated: Option<u64>,
}

/// Steam Web API published file details.
pub struct SteamWorkshopProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl SteamWorkshopProvider {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("nwn2-resman/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: STEAM_DETAILS_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl MetadataProvider for SteamWorkshopProvider {
    fn fetch(&self, ids: &[String]) -> Result<Vec<RemoteModInfo>> {
        let mut form = vec![("itemcount".to_string(), ids.len().to_string())];
        for (i, id) in ids.iter().enumerate() {
            form.push((format!("publishedfileids[{}]", i), id.clone()));
        }

        let envelope: DetailsEnvelope = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(envelope
            .response
            .publishedfiledetails
            .into_iter()
            // Steam marks missing or private items with a non-1 result.
            .filter(|f| f.result == 1)
            .filter_map(|f| {
                Some(RemoteModInfo {
                    title: f.title?,
                    id: f.publishedfileid,
                    time_updated: f.time_updated,
                })
            })
            .collect())
    }
}

struct CacheState {
    entries: HashMap<String, (Instant, RemoteModInfo)>,
    last_call: Option<Instant>,
}

/// Wraps a provider with a TTL cache and a minimum interval between calls.
///
/// Never returns an error: when the wrapped provider fails or is throttled, the
/// cached entries (possibly none) are returned instead.
pub struct CachedMetadataProvider<P> {
    inner: P,
    ttl: Duration,
    min_interval: Duration,
    state: Mutex<CacheState>,
}

impl<P: MetadataProvider> CachedMetadataProvider<P> {
    pub fn new(inner: P, ttl: Duration, min_interval: Duration) -> Self {
        Self {
            inner,
            ttl,
            min_interval,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                last_call: None,
            }),
        }
    }
}

impl<P: MetadataProvider> MetadataProvider for CachedMetadataProvider<P> {
    fn fetch(&self, ids: &[String]) -> Result<Vec<RemoteModInfo>> {
        let now = Instant::now();
        let stale: Vec<String> = {
            let mut state = self.state.lock();
            let stale: Vec<String> = ids
                .iter()
                .filter(|id| {
                    state
                        .entries
                        .get(*id)
                        .is_none_or(|(at, _)| now.duration_since(*at) >= self.ttl)
                })
                .cloned()
                .collect();

            let throttled = state
                .last_call
                .is_some_and(|last| now.duration_since(last) < self.min_interval);
            if !stale.is_empty() && !throttled {
                state.last_call = Some(now);
                stale
            } else {
                Vec::new()
            }
        };

        if !stale.is_empty() {
            match self.inner.fetch(&stale) {
                Ok(items) => {
                    let mut state = self.state.lock();
                    for item in items {
                        state.entries.insert(item.id.clone(), (now, item));
                    }
                }
                Err(e) => tracing::warn!("Workshop metadata fetch failed: {}", e),
            }
        }

        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.entries.get(id).map(|(_, info)| info.clone()))
            .collect())
    }
}

/// Check whether `dir` looks like a workshop root (has at least one mod folder).
pub fn is_workshop_root(dir: &Utf8Path) -> bool {
    std::fs::read_dir(dir.as_std_path())
        .map(|mut entries| entries.any(|e| e.is_ok_and(|e| e.path().is_dir())))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl MetadataProvider for CountingProvider {
        fn fetch(&self, ids: &[String]) -> Result<Vec<RemoteModInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Other("service down".to_string()));
            }
            Ok(ids
                .iter()
                .map(|id| RemoteModInfo {
                    id: id.clone(),
                    title: format!("Mod {}", id),
                    time_updated: Some(1),
                })
                .collect())
        }
    }

    fn workshop_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("200/Override")).unwrap();
        std::fs::create_dir_all(root.join("100")).unwrap();
        std::fs::write(root.join("stray.txt"), b"").unwrap();
        (temp, root)
    }

    #[test]
    fn test_list_local() {
        let (_temp, root) = workshop_root();
        let scanner = WorkshopScanner::new(vec![root.clone()]);
        let mods = scanner.list_local();

        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].id, "100");
        assert_eq!(mods[0].override_dir, root.join("100"));
        assert_eq!(mods[1].override_dir, root.join("200/Override"));
        assert!(is_workshop_root(&root));
    }

    #[test]
    fn test_list_mods_with_metadata() {
        let (_temp, root) = workshop_root();
        let scanner = WorkshopScanner::new(vec![root]);
        let provider = CountingProvider::new(false);
        let mods = scanner.list_mods(Some(&provider));
        assert_eq!(mods[1].title.as_deref(), Some("Mod 200"));
    }

    #[test]
    fn test_provider_outage_keeps_local_list() {
        let (_temp, root) = workshop_root();
        let scanner = WorkshopScanner::new(vec![root]);
        let provider = CountingProvider::new(true);
        let mods = scanner.list_mods(Some(&provider));
        assert_eq!(mods.len(), 2);
        assert!(mods.iter().all(|m| m.title.is_none()));
    }

    #[test]
    fn test_cached_provider_ttl() {
        let cached = CachedMetadataProvider::new(
            CountingProvider::new(false),
            Duration::from_secs(3600),
            Duration::ZERO,
        );
        let ids = vec!["1".to_string(), "2".to_string()];

        assert_eq!(cached.fetch(&ids).unwrap().len(), 2);
        assert_eq!(cached.fetch(&ids).unwrap().len(), 2);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cached_provider_throttles_and_degrades() {
        let cached = CachedMetadataProvider::new(
            CountingProvider::new(true),
            Duration::ZERO,
            Duration::from_secs(3600),
        );
        let ids = vec!["1".to_string()];

        assert!(cached.fetch(&ids).unwrap().is_empty());
        assert!(cached.fetch(&ids).unwrap().is_empty());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
    }
}
