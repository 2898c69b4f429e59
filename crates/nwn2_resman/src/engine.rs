//! The engine facade.
//!
//! [`ResourceEngine`] wires the services of this crate together and is the single
//! entry point for callers. It owns all cache and index state; there are no
//! process-wide singletons, so several engines with different configurations can
//! coexist (tests rely on this).
//!
//! # Startup
//!
//! [`initialize`](ResourceEngine::initialize) runs once:
//!
//! 1. Lists the base archives and opens each of them. An unreadable base archive
//!    is fatal, since every lookup depends on it.
//! 2. Loads the base string table.
//! 3. Computes the fast-path fingerprint of base archives and override folders.
//! 4. If the precompiled cache matches the fingerprint, the full scan is skipped
//!    and tables are loaded from their blobs on demand. Otherwise every layer is
//!    scanned and the precompiled cache is rebuilt.
//!
//! # Lookups
//!
//! Table lookups go through the in-memory cache, keyed by the active module
//! context. Before serving a cached table, the files it was read from are checked
//! for modification; a change drops every entry backed by that file and the
//! precompiled cache stops being trusted for the rest of the session.
//!
//! The global layers are scanned lazily when the precompiled cache cannot answer,
//! so a fast start costs nothing until an override actually changes. Base-only
//! lookups after a fast start index the base archives alone.

use crate::cache::{CacheConfig, CacheKey, CacheScope, CacheStats, Loaded, ResourceCache};
use crate::codec::{Codecs, StringTable};
use crate::config::ResmanConfig;
use crate::container::ContainerLoader;
use crate::error::{Error, Result};
use crate::invalidation::ModificationTracker;
use crate::layers::{LayerKind, LayerSource, LayerStack, LayerSummary};
use crate::location::SourceKind;
use crate::locator::ResourceLocator;
use crate::module::{CampaignInfo, ModuleContext, ModuleContextManager, ModulePaths};
use crate::precompiled::{PrecompiledCache, PRECOMPILED_VERSION};
use crate::resolver::{OverrideResolver, ResolutionPlan, Resolved, Touched};
use crate::strings::StringResolver;
use crate::utils::{find_child_ci, table_name};
use crate::workshop::{MetadataProvider, WorkshopMod, WorkshopScanner};
use camino::{Utf8Path, Utf8PathBuf};
use nwn2_formats::{TableSchema, TwoDaTable};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sidecar file in a save folder naming the module the save belongs to.
pub const SAVE_MODULE_FILE: &str = "currentmodule.txt";

/// What [`ResourceEngine::initialize`] found.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    pub base_archives: usize,
    pub fingerprint: u64,
    /// Whether the precompiled cache was valid and the full scan was skipped.
    pub precompiled_hit: bool,
    /// Resources indexed by the full scan. Zero on a precompiled hit.
    pub resources: usize,
    pub base_strings: bool,
    pub elapsed_ms: u64,
}

#[derive(Default)]
struct EngineState {
    archives: Vec<Utf8PathBuf>,
    custom_dirs: Vec<Utf8PathBuf>,
    /// Every global layer, from the full scan.
    global: Option<Arc<LayerStack>>,
    /// The base layer alone. Filled by the full scan or by indexing the archives.
    base: Option<Arc<LayerStack>>,
    precompiled: Option<Arc<PrecompiledCache>>,
    fingerprint: u64,
}

/// Layered resource resolution with caching.
///
/// `ResourceEngine` is `Send + Sync`; share it behind an `Arc`.
pub struct ResourceEngine {
    config: ResmanConfig,
    codecs: Codecs,
    locator: ResourceLocator,
    resolver: OverrideResolver,
    tables: ResourceCache<TwoDaTable>,
    tracker: ModificationTracker,
    modules: ModuleContextManager,
    strings: StringResolver,
    workshop: WorkshopScanner,
    metadata: Option<Box<dyn MetadataProvider>>,
    state: RwLock<EngineState>,
}

impl ResourceEngine {
    /// Create an engine with the default codecs. Call
    /// [`initialize`](Self::initialize) before looking anything up.
    pub fn new(config: ResmanConfig) -> Self {
        Self::with_codecs(config, Codecs::default())
    }

    pub fn with_codecs(config: ResmanConfig, codecs: Codecs) -> Self {
        let loader = ContainerLoader::new(codecs.containers.clone());
        let locator = ResourceLocator::new(loader.clone());
        let modules = ModuleContextManager::new(
            locator.clone(),
            codecs.clone(),
            ModulePaths::from_config(&config),
            config.module_lru_capacity,
        );

        Self {
            resolver: OverrideResolver::new(loader),
            tables: ResourceCache::new(CacheConfig::from(&config)),
            tracker: ModificationTracker::new(),
            strings: StringResolver::new(),
            workshop: WorkshopScanner::new(config.workshop_dirs.clone()),
            metadata: None,
            state: RwLock::new(EngineState {
                custom_dirs: config.custom_override_dirs.clone(),
                ..Default::default()
            }),
            modules,
            locator,
            codecs,
            config,
        }
    }

    /// Attach a remote metadata provider for [`list_mods`](Self::list_mods).
    pub fn with_metadata_provider(mut self, provider: Box<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    /// Create and initialize an engine in one step.
    pub fn open(config: ResmanConfig) -> Result<Self> {
        let engine = Self::new(config);
        engine.initialize()?;
        Ok(engine)
    }

    pub fn config(&self) -> &ResmanConfig {
        &self.config
    }

    /// Validate the installation, load the base string table and prepare the
    /// layers. See the module docs for the sequence.
    pub fn initialize(&self) -> Result<StartupReport> {
        let start_time = std::time::Instant::now();
        tracing::info!("Engine: initializing");
        tracing::info!("Install dir: {}", self.config.install_dir);
        tracing::info!("User dir: {}", self.config.user_dir);

        let archives = self.config.base_archives()?;
        for archive in &archives {
            let entries = self
                .locator
                .loader()
                .probe(archive)
                .map_err(|e| Error::BaseArchiveUnreadable {
                    path: archive.clone(),
                    reason: e.to_string(),
                })?;
            tracing::debug!("Base archive {} ({} entries)", archive, entries);
        }

        let base_strings = self.load_base_strings();

        let mut state = self.state.write();
        state.archives = archives;
        state.global = None;
        state.base = None;
        state.precompiled = None;
        state.fingerprint = self.fingerprint(&state.archives, &state.custom_dirs);

        let mut report = StartupReport {
            base_archives: state.archives.len(),
            fingerprint: state.fingerprint,
            precompiled_hit: false,
            resources: 0,
            base_strings,
            elapsed_ms: 0,
        };

        if self.config.precompiled_cache {
            let precompiled = PrecompiledCache::open(&self.config.cache_dir());
            if precompiled.is_valid_for(state.fingerprint) {
                tracing::info!(
                    "Engine: precompiled cache valid ({} tables), skipping full scan",
                    precompiled.table_count()
                );
                state.precompiled = Some(Arc::new(precompiled));
                report.precompiled_hit = true;
                report.elapsed_ms = start_time.elapsed().as_millis() as u64;
                return Ok(report);
            }
            tracing::info!("Engine: precompiled cache stale or absent, running full scan");
        }

        let global = self.scan_layers(&state.archives, &state.custom_dirs);
        report.resources = global.summary().iter().map(|layer| layer.resources).sum();
        set_scanned(&mut state, global);
        drop(state);

        if self.config.precompiled_cache {
            if let Err(e) = self.rebuild_precompiled() {
                tracing::warn!("Engine: precompiled cache rebuild failed: {}", e);
            }
        }

        report.elapsed_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            "Engine: initialized in {} ms ({} resources)",
            report.elapsed_ms,
            report.resources
        );
        Ok(report)
    }

    /// Look up a table in the base installation only, ignoring every override.
    pub fn get_table(&self, name: &str) -> Option<Arc<TwoDaTable>> {
        let name = table_name(name);
        let key = CacheKey::new(CacheScope::BaseOnly, name.clone());
        self.refresh_if_modified(&key);

        self.tables.get_or_load(&key, || {
            let base = self.base_layers();
            let plan = ResolutionPlan::build(&name, &self.config.table_aliases);
            self.resolver
                .resolve_plan(&base, &plan, |bytes| self.parse_table(&name, bytes))
                .map(|resolved| self.track(resolved))
        })
    }

    /// Look up a table through the full precedence chain of the active module.
    ///
    /// A table absent from every layer yields `None`, except for optional table
    /// families (see [`ResmanConfig::optional_table_prefixes`]), which yield an
    /// empty table.
    pub fn get_table_with_overrides(&self, name: &str) -> Option<Arc<TwoDaTable>> {
        let name = table_name(name);
        let active = self.modules.active();
        let scope = active
            .as_ref()
            .map_or(CacheScope::Global, |ctx| CacheScope::Module(ctx.id));
        let key = CacheKey::new(scope, name.clone());
        self.refresh_if_modified(&key);

        let plan = ResolutionPlan::build(&name, &self.config.table_aliases);
        self.tables
            .get_or_load(&key, || self.load_with_overrides(active.as_deref(), &plan))
            .or_else(|| self.optional_fallback(&name))
    }

    /// Look up a table and decode its rows with a typed schema.
    ///
    /// Returns `None` when the table is absent or its rows do not fit the schema.
    pub fn table_rows<T: TableSchema>(&self, name: &str) -> Option<Vec<T>> {
        let table = self.get_table_with_overrides(name)?;
        match table.rows_as::<T>() {
            Ok(rows) => Some(rows),
            Err(e) => {
                tracing::warn!("Engine: rows of '{}' do not match schema: {}", name, e);
                None
            }
        }
    }

    /// Resolve a string reference against the active module's custom table and the
    /// base table.
    pub fn resolve_string(&self, strref: u32) -> String {
        let active = self.modules.active();
        self.strings.resolve(custom_strings(active.as_deref()), strref)
    }

    pub fn resolve_strings_batch(&self, strrefs: &[u32]) -> BTreeMap<u32, String> {
        let active = self.modules.active();
        self.strings
            .resolve_batch(custom_strings(active.as_deref()), strrefs)
    }

    /// Activate the module at `path`. Returns `false` and leaves the previous
    /// module active when it cannot be loaded.
    pub fn activate_module(&self, path: &Utf8Path) -> bool {
        match self.try_activate_module(path) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Engine: cannot activate module {}: {}", path, e);
                false
            }
        }
    }

    /// Activate the module at `path`, returning its context.
    pub fn try_activate_module(&self, path: &Utf8Path) -> Result<Arc<ModuleContext>> {
        self.modules.activate(path)
    }

    /// Return to global resolution. Cached module contexts are kept.
    pub fn deactivate_module(&self) {
        if let Some(context) = self.modules.deactivate() {
            tracing::info!("Module: deactivated '{}'", context.name);
        }
    }

    pub fn active_module(&self) -> Option<Arc<ModuleContext>> {
        self.modules.active()
    }

    pub fn find_module(&self, name: &str) -> Option<Utf8PathBuf> {
        self.modules.find_module(name)
    }

    pub fn find_campaign(&self, module_path: &Utf8Path) -> Option<CampaignInfo> {
        self.modules.find_campaign(module_path)
    }

    pub fn modules(&self) -> &ModuleContextManager {
        &self.modules
    }

    /// Activate the module a save was created under.
    pub fn load_save_context(&self, save_folder: &Utf8Path) -> bool {
        match self.try_load_save_context(save_folder) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Engine: cannot load save context {}: {}", save_folder, e);
                false
            }
        }
    }

    /// Read [`SAVE_MODULE_FILE`] in `save_folder` and activate the module it names.
    pub fn try_load_save_context(&self, save_folder: &Utf8Path) -> Result<Arc<ModuleContext>> {
        let sidecar = find_child_ci(save_folder, SAVE_MODULE_FILE).ok_or_else(|| {
            Error::ModuleNotFound(format!("no {} in {}", SAVE_MODULE_FILE, save_folder))
        })?;
        let contents = std::fs::read_to_string(sidecar.as_std_path())?;
        let name = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| Error::ModuleNotFound(format!("{} is empty", sidecar)))?;

        let path = self
            .find_module(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        tracing::info!("Engine: save {} uses module '{}'", save_folder, name);
        self.try_activate_module(&path)
    }

    /// Add a directory to the custom override layer, above every directory added
    /// before it.
    pub fn add_custom_override_directory(&self, dir: &Utf8Path) -> Result<()> {
        let index = self.locator.scan_directory(dir)?;
        let source = LayerSource::new(dir, index);

        let mut state = self.state.write();
        state.custom_dirs.retain(|d| d.as_path() != dir);
        state.custom_dirs.push(dir.to_path_buf());
        if let Some(scanned) = &state.global {
            let mut global = (**scanned).clone();
            let mut sources: Vec<Arc<LayerSource>> = global
                .sources(LayerKind::CustomOverride)
                .iter()
                .filter(|s| s.origin.as_path() != dir)
                .cloned()
                .collect();
            sources.push(source);
            global.set(LayerKind::CustomOverride, sources);
            state.global = Some(Arc::new(global));
        }
        self.layers_changed(&mut state);
        drop(state);

        tracing::info!("Engine: added custom override directory {}", dir);
        Ok(())
    }

    /// Remove a directory from the custom override layer. Returns `false` if it was
    /// not part of the layer.
    pub fn remove_custom_override_directory(&self, dir: &Utf8Path) -> bool {
        let mut state = self.state.write();
        let before = state.custom_dirs.len();
        state.custom_dirs.retain(|d| d.as_path() != dir);
        if state.custom_dirs.len() == before {
            return false;
        }

        if let Some(scanned) = &state.global {
            let mut global = (**scanned).clone();
            let sources = global
                .sources(LayerKind::CustomOverride)
                .iter()
                .filter(|s| s.origin.as_path() != dir)
                .cloned()
                .collect();
            global.set(LayerKind::CustomOverride, sources);
            state.global = Some(Arc::new(global));
        }
        self.layers_changed(&mut state);
        drop(state);

        tracing::info!("Engine: removed custom override directory {}", dir);
        true
    }

    pub fn custom_override_directories(&self) -> Vec<Utf8PathBuf> {
        self.state.read().custom_dirs.clone()
    }

    /// Rescan every global layer and drop all cached tables.
    pub fn rescan(&self) -> usize {
        let mut state = self.state.write();
        let global = self.scan_layers(&state.archives, &state.custom_dirs);
        let resources = global.summary().iter().map(|l| l.resources).sum();
        set_scanned(&mut state, global);
        state.fingerprint = self.fingerprint(&state.archives, &state.custom_dirs);
        if state
            .precompiled
            .as_ref()
            .is_some_and(|p| !p.is_valid_for(state.fingerprint))
        {
            state.precompiled = None;
        }
        drop(state);

        self.tables.clear();
        self.tracker.clear();
        tracing::info!("Engine: rescanned, {} resources", resources);
        resources
    }

    /// Workshop mods on disk, with titles when a metadata provider is attached.
    pub fn list_mods(&self) -> Vec<WorkshopMod> {
        self.workshop.list_mods(self.metadata.as_deref())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.tables.stats()
    }

    /// Cached table keys, most recently used first.
    pub fn cached_keys(&self) -> Vec<CacheKey> {
        self.tables.keys()
    }

    /// Occupancy of every layer, including the active module's.
    pub fn layer_summary(&self) -> Vec<LayerSummary> {
        let mut stack = (*self.global_layers()).clone();
        if let Some(context) = self.modules.active() {
            stack.merge_from(context.layers(), &LayerKind::MODULE);
        }
        stack.summary()
    }

    /// Whether the full scan of the global layers has run in this session.
    pub fn layers_scanned(&self) -> bool {
        self.state.read().global.is_some()
    }

    /// Whether tables are currently served from the precompiled cache.
    pub fn precompiled_active(&self) -> bool {
        self.state.read().precompiled.is_some()
    }

    /// Drop cached tables, tracked modification times and cached module contexts.
    /// The active module stays active.
    pub fn clear_caches(&self) {
        self.tables.clear();
        self.tracker.clear();
        self.modules.clear();
        tracing::info!("Engine: caches cleared");
    }

    /// Parse every table reachable through the global layers and persist them.
    ///
    /// The snapshot is written to a staging directory and swapped in; the live
    /// in-memory cache is not touched. Returns the number of tables written.
    pub fn rebuild_precompiled(&self) -> Result<usize> {
        let global = self.global_layers();
        let fingerprint = self.state.read().fingerprint;
        let names = global.names_with_extension("2da");

        let tables: Vec<Resolved<TwoDaTable>> = names
            .par_iter()
            .filter_map(|name| {
                self.resolver
                    .resolve(&global, name, |bytes| self.parse_table(name, bytes))
            })
            .collect();

        let cache = PrecompiledCache::rebuild(
            &self.config.cache_dir(),
            fingerprint,
            tables
                .iter()
                .map(|resolved| (&resolved.location, resolved.touched.as_slice(), &resolved.value)),
        )?;

        let mut state = self.state.write();
        if state.fingerprint == fingerprint {
            state.precompiled = Some(Arc::new(cache));
        }
        Ok(tables.len())
    }

    fn load_base_strings(&self) -> bool {
        let Some(path) = self.config.base_tlk() else {
            tracing::warn!("Engine: base string table not found, strrefs will not resolve");
            return false;
        };
        let parsed = std::fs::read(path.as_std_path())
            .map_err(Error::from)
            .and_then(|bytes| self.codecs.strings.parse(&bytes));
        match parsed {
            Ok(table) => {
                tracing::info!("Engine: base string table {} ({} entries)", path, table.len());
                self.strings.set_base(Some(table));
                true
            }
            Err(e) => {
                tracing::warn!("Engine: base string table {} unreadable: {}", path, e);
                false
            }
        }
    }

    /// Directories of the global layers below base, lowest precedence first.
    fn override_dirs(&self, custom_dirs: &[Utf8PathBuf]) -> Vec<(LayerKind, Utf8PathBuf)> {
        let mut dirs = Vec::new();
        if let Some(dir) = self.config.override_dir() {
            dirs.push((LayerKind::Override, dir));
        }
        for dir in self.workshop.override_dirs() {
            dirs.push((LayerKind::Workshop, dir));
        }
        for dir in custom_dirs {
            dirs.push((LayerKind::CustomOverride, dir.clone()));
        }
        dirs
    }

    fn fingerprint(&self, archives: &[Utf8PathBuf], custom_dirs: &[Utf8PathBuf]) -> u64 {
        let dirs = self.override_dirs(custom_dirs);
        let labels: Vec<&str> = dirs.iter().map(|(kind, _)| kind.label()).collect();
        let version = format!("precompiled-v{}", PRECOMPILED_VERSION);
        let mut extra = vec![version.as_str()];
        extra.extend(labels);

        let paths: Vec<Utf8PathBuf> = dirs.into_iter().map(|(_, dir)| dir).collect();
        self.locator.fingerprint(archives, &paths, &extra)
    }

    fn scan_base(&self, archives: &[Utf8PathBuf]) -> LayerStack {
        let mut stack = LayerStack::new();
        for (path, result) in self.locator.scan_containers(archives, SourceKind::Archive) {
            match result {
                Ok(index) => stack.push(LayerKind::Base, LayerSource::new(path, index)),
                Err(e) => tracing::warn!("Engine: skipping base archive {}: {}", path, e),
            }
        }
        stack
    }

    fn scan_layers(&self, archives: &[Utf8PathBuf], custom_dirs: &[Utf8PathBuf]) -> LayerStack {
        let mut global = self.scan_base(archives);

        for (kind, dir) in self.override_dirs(custom_dirs) {
            match self.locator.scan_directory(&dir) {
                Ok(index) => global.push(kind, LayerSource::new(dir, index)),
                Err(e) => tracing::warn!("Engine: skipping {} directory {}: {}", kind, dir, e),
            }
        }

        for layer in global.summary() {
            tracing::debug!(
                "Layer {} (rank {}): {} source(s), {} resources",
                layer.kind,
                layer.rank,
                layer.sources.len(),
                layer.resources
            );
        }

        global
    }

    /// The global layers, running the full scan first if it has not run yet.
    fn global_layers(&self) -> Arc<LayerStack> {
        if let Some(global) = self.state.read().global.clone() {
            return global;
        }

        let mut state = self.state.write();
        if let Some(global) = state.global.clone() {
            return global;
        }
        tracing::info!("Engine: scanning layers on demand");
        let global = self.scan_layers(&state.archives, &state.custom_dirs);
        set_scanned(&mut state, global)
    }

    /// The base layer alone. Indexes only the base archives when the full scan has
    /// not run.
    fn base_layers(&self) -> Arc<LayerStack> {
        if let Some(base) = self.state.read().base.clone() {
            return base;
        }

        let mut state = self.state.write();
        if let Some(base) = state.base.clone() {
            return base;
        }
        let base = Arc::new(self.scan_base(&state.archives));
        tracing::debug!("Engine: indexed {} base archive(s)", state.archives.len());
        state.base = Some(base.clone());
        base
    }

    fn layers_changed(&self, state: &mut EngineState) {
        state.fingerprint = self.fingerprint(&state.archives, &state.custom_dirs);
        if state.precompiled.take().is_some() {
            tracing::info!("Engine: precompiled cache no longer matches the layers");
        }
        let dropped = self
            .tables
            .invalidate_scope(|scope| !matches!(scope, CacheScope::BaseOnly));
        tracing::debug!("Engine: dropped {} override-scoped tables", dropped);
    }

    /// Drop the entry for `key` and everything sharing its sources if any of them
    /// changed on disk.
    fn refresh_if_modified(&self, key: &CacheKey) {
        for source in self.tables.sources(key) {
            if !self.tracker.is_modified(&source) {
                continue;
            }
            let dropped = self.tables.invalidate_source(&source);
            tracing::info!(
                "Engine: {} changed, dropped {} cached table(s)",
                source,
                dropped
            );
            if self.state.write().precompiled.take().is_some() {
                tracing::info!("Engine: precompiled cache distrusted after modification");
            }
        }
    }

    fn load_with_overrides(
        &self,
        active: Option<&ModuleContext>,
        plan: &ResolutionPlan,
    ) -> Option<Loaded<TwoDaTable>> {
        let parse = |bytes: &[u8]| self.parse_table(plan.requested(), bytes);

        if let Some(context) = active {
            if let Some(resolved) = self.resolver.resolve_plan(context.layers(), plan, parse) {
                return Some(self.track(resolved));
            }
        }

        let precompiled = self.state.read().precompiled.clone();
        if let Some(precompiled) = precompiled {
            match self.load_precompiled(&precompiled, plan) {
                Ok(found) => return found,
                Err(e) => {
                    tracing::warn!("Engine: precompiled cache unreadable, falling back: {}", e);
                    self.state.write().precompiled = None;
                }
            }
        }

        let global = self.global_layers();
        self.resolver
            .resolve_plan(&global, plan, parse)
            .map(|resolved| self.track(resolved))
    }

    /// Look `plan` up in the precompiled cache. It holds every global table, so a
    /// name absent from it is absent from the global layers.
    fn load_precompiled(
        &self,
        precompiled: &PrecompiledCache,
        plan: &ResolutionPlan,
    ) -> Result<Option<Loaded<TwoDaTable>>> {
        for name in plan.names() {
            let Some(location) = precompiled.location(name) else {
                continue;
            };
            let touched = precompiled.touched(name);
            if touched.is_empty() {
                self.tracker.record(&location.source_path);
            }
            if let Some(table) = precompiled.load_table(name)? {
                let sources = if touched.is_empty() {
                    vec![location.source_path.clone()]
                } else {
                    self.record_touched(touched)
                };
                return Ok(Some(Loaded {
                    value: table,
                    sources,
                }));
            }
        }
        Ok(None)
    }

    /// Every file the resolution read, rejected candidates included, backs the
    /// cached value.
    fn track(&self, resolved: Resolved<TwoDaTable>) -> Loaded<TwoDaTable> {
        tracing::debug!(
            "Engine: '{}' resolved from {} layer ({} file(s) read)",
            resolved.location.name,
            resolved.layer,
            resolved.touched.len()
        );
        Loaded {
            sources: self.record_touched(&resolved.touched),
            value: resolved.value,
        }
    }

    /// Use the times seen before each read as baselines.
    fn record_touched(&self, touched: &[Touched]) -> Vec<Utf8PathBuf> {
        touched
            .iter()
            .map(|t| {
                match t.modified_time {
                    Some(mtime) => self.tracker.record_at(&t.path, mtime),
                    None => self.tracker.forget(&t.path),
                }
                t.path.clone()
            })
            .collect()
    }

    fn parse_table(&self, name: &str, bytes: &[u8]) -> Result<TwoDaTable> {
        self.codecs
            .tables
            .parse(bytes)
            .map_err(|e| Error::CorruptResource {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn optional_fallback(&self, name: &str) -> Option<Arc<TwoDaTable>> {
        let optional = self
            .config
            .optional_table_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()));
        if !optional {
            return None;
        }
        tracing::debug!("Engine: optional table '{}' absent, using an empty table", name);
        Some(Arc::new(TwoDaTable::new(Vec::<String>::new())))
    }
}

/// Store a full scan and the base layer derived from it.
fn set_scanned(state: &mut EngineState, global: LayerStack) -> Arc<LayerStack> {
    let global = Arc::new(global);
    state.base = Some(Arc::new(global.only(&[LayerKind::Base])));
    state.global = Some(global.clone());
    global
}

fn custom_strings(context: Option<&ModuleContext>) -> Option<&dyn StringTable> {
    context
        .and_then(ModuleContext::custom_string_table)
        .map(|table| &**table)
}
