//! The six precedence layers and the stack that orders them.
//!
//! Resolution walks the layers from highest to lowest precedence:
//!
//! | Rank | Layer                 | Sources                                        |
//! |------|-----------------------|------------------------------------------------|
//! | 1    | `ModuleOwn`           | the active module (and its campaign folder)    |
//! | 2    | `DependentContainer`  | the module's haks                              |
//! | 3    | `CustomOverride`      | user-added override directories                |
//! | 4    | `Workshop`            | workshop mod override folders                  |
//! | 5    | `Override`            | `<user>/override`                              |
//! | 6    | `Base`                | installation archives                          |
//!
//! Within one layer, sources are stored lowest precedence first and the *last*
//! source wins. Dependent containers are stored in load order, so a hak loaded
//! later overrides one loaded earlier.
//!
//! Precedence is a property of the [`LayerKind`], never of the order in which
//! layers were populated.

use crate::location::{ResourceIndex, ResourceLocation};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One precedence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerKind {
    ModuleOwn,
    DependentContainer,
    CustomOverride,
    Workshop,
    Override,
    Base,
}

impl LayerKind {
    /// All kinds, highest precedence first.
    pub const ALL: [LayerKind; 6] = [
        LayerKind::ModuleOwn,
        LayerKind::DependentContainer,
        LayerKind::CustomOverride,
        LayerKind::Workshop,
        LayerKind::Override,
        LayerKind::Base,
    ];

    /// Layers that belong to a module context.
    pub const MODULE: [LayerKind; 2] = [LayerKind::ModuleOwn, LayerKind::DependentContainer];

    /// Layers that exist regardless of the active module.
    pub const GLOBAL: [LayerKind; 4] = [
        LayerKind::CustomOverride,
        LayerKind::Workshop,
        LayerKind::Override,
        LayerKind::Base,
    ];

    /// 1-based precedence rank; lower wins.
    pub fn rank(self) -> usize {
        self as usize + 1
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerKind::ModuleOwn => "module",
            LayerKind::DependentContainer => "hak",
            LayerKind::CustomOverride => "custom",
            LayerKind::Workshop => "workshop",
            LayerKind::Override => "override",
            LayerKind::Base => "base",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One container or directory contributing to a layer.
#[derive(Debug)]
pub struct LayerSource {
    /// The container file or directory root.
    pub origin: Utf8PathBuf,
    pub index: ResourceIndex,
}

impl LayerSource {
    pub fn new(origin: impl Into<Utf8PathBuf>, index: ResourceIndex) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.into(),
            index,
        })
    }
}

/// Layer occupancy, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub kind: LayerKind,
    pub rank: usize,
    /// Sources in precedence order, highest first.
    pub sources: Vec<Utf8PathBuf>,
    pub resources: usize,
}

/// An immutable snapshot of layered sources.
///
/// Cloning is cheap: sources are shared. Updates build a new stack and swap it in,
/// so readers never observe a half-built layer.
#[derive(Debug, Clone, Default)]
pub struct LayerStack {
    layers: [Vec<Arc<LayerSource>>; 6],
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sources of one layer. `sources` are lowest precedence first.
    pub fn set(&mut self, kind: LayerKind, sources: Vec<Arc<LayerSource>>) {
        self.layers[kind as usize] = sources;
    }

    /// Add a source at the top of its layer.
    pub fn push(&mut self, kind: LayerKind, source: Arc<LayerSource>) {
        self.layers[kind as usize].push(source);
    }

    pub fn sources(&self, kind: LayerKind) -> &[Arc<LayerSource>] {
        &self.layers[kind as usize]
    }

    /// A stack containing only `kinds` from this one.
    pub fn only(&self, kinds: &[LayerKind]) -> LayerStack {
        let mut stack = LayerStack::new();
        for &kind in kinds {
            stack.set(kind, self.sources(kind).to_vec());
        }
        stack
    }

    /// Copy `kinds` from `other` into this stack.
    pub fn merge_from(&mut self, other: &LayerStack, kinds: &[LayerKind]) {
        for &kind in kinds {
            self.set(kind, other.sources(kind).to_vec());
        }
    }

    /// Every location of `name`, highest precedence first.
    pub fn candidates<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (LayerKind, &'a ResourceLocation)> + 'a {
        LayerKind::ALL.into_iter().flat_map(move |kind| {
            self.layers[kind as usize]
                .iter()
                .rev()
                .filter_map(move |source| source.index.get(name).map(|loc| (kind, loc)))
        })
    }

    /// The winning location of `name`, without reading it.
    pub fn locate<'a>(&'a self, name: &'a str) -> Option<(LayerKind, &'a ResourceLocation)> {
        self.candidates(name).next()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    /// All distinct names with the given extension, sorted.
    pub fn names_with_extension(&self, ext: &str) -> BTreeSet<String> {
        let suffix = format!(".{}", ext.to_ascii_lowercase());
        self.layers
            .iter()
            .flatten()
            .flat_map(|source| source.index.keys())
            .filter(|name| name.ends_with(&suffix))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
    }

    pub fn summary(&self) -> Vec<LayerSummary> {
        LayerKind::ALL
            .into_iter()
            .map(|kind| {
                let sources = self.sources(kind);
                LayerSummary {
                    kind,
                    rank: kind.rank(),
                    sources: sources.iter().rev().map(|s| s.origin.clone()).collect(),
                    resources: sources.iter().map(|s| s.index.len()).sum(),
                }
            })
            .collect()
    }
}
