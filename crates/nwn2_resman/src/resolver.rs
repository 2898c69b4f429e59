//! Walking a [`LayerStack`] to produce a parsed resource.

use crate::container::ContainerLoader;
use crate::error::Result;
use crate::layers::{LayerKind, LayerStack};
use crate::location::ResourceLocation;
use crate::utils::path_mtime;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum number of alias hops followed for one lookup.
pub const MAX_ALIAS_DEPTH: usize = 4;

/// A file read during one resolution, with its modification time taken before
/// the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Touched {
    pub path: Utf8PathBuf,
    pub modified_time: Option<f64>,
}

impl Touched {
    fn stat(path: &Utf8Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified_time: path_mtime(path),
        }
    }
}

/// A parsed resource and where it came from.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub layer: LayerKind,
    pub location: ResourceLocation,
    /// Every file read on the way, rejected candidates first and the winner last.
    pub touched: Vec<Touched>,
}

/// The ordered list of names tried for one lookup: the requested name, then its
/// aliases.
///
/// Alias chains are followed at most [`MAX_ALIAS_DEPTH`] hops and stop at the first
/// repeated name, so a misconfigured cycle cannot recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPlan {
    names: Vec<String>,
}

impl ResolutionPlan {
    pub fn build(name: &str, aliases: &HashMap<String, String>) -> Self {
        let mut names = vec![name.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([name]);
        let mut current = name;

        for _ in 0..MAX_ALIAS_DEPTH {
            let Some(next) = aliases.get(current) else {
                break;
            };
            if !seen.insert(next.as_str()) {
                tracing::warn!("Alias cycle at '{}' -> '{}', stopping", current, next);
                break;
            }
            names.push(next.clone());
            current = next.as_str();
        }

        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn requested(&self) -> &str {
        &self.names[0]
    }
}

/// Reads and parses the highest-precedence usable copy of a resource.
#[derive(Clone)]
pub struct OverrideResolver {
    loader: ContainerLoader,
}

impl OverrideResolver {
    pub fn new(loader: ContainerLoader) -> Self {
        Self { loader }
    }

    /// Resolve `name` against `stack`.
    ///
    /// Candidates are tried in precedence order. A candidate that cannot be read or
    /// that `parse` rejects is logged and skipped, and the next lower layer is tried.
    /// Returns `None` when no layer yields a usable copy.
    pub fn resolve<T, F>(&self, stack: &LayerStack, name: &str, parse: F) -> Option<Resolved<T>>
    where
        F: Fn(&[u8]) -> Result<T>,
    {
        let mut touched = Vec::new();
        self.resolve_name(stack, name, &parse, &mut touched)
            .map(|(value, layer, location)| Resolved {
                value,
                layer,
                location,
                touched,
            })
    }

    /// Resolve the first name of `plan` that yields a usable copy. Files rejected
    /// while trying earlier names are reported too.
    pub fn resolve_plan<T, F>(
        &self,
        stack: &LayerStack,
        plan: &ResolutionPlan,
        parse: F,
    ) -> Option<Resolved<T>>
    where
        F: Fn(&[u8]) -> Result<T>,
    {
        let mut touched = Vec::new();
        plan.names()
            .iter()
            .find_map(|name| self.resolve_name(stack, name, &parse, &mut touched))
            .map(|(value, layer, location)| Resolved {
                value,
                layer,
                location,
                touched,
            })
    }

    fn resolve_name<T, F>(
        &self,
        stack: &LayerStack,
        name: &str,
        parse: &F,
        touched: &mut Vec<Touched>,
    ) -> Option<(T, LayerKind, ResourceLocation)>
    where
        F: Fn(&[u8]) -> Result<T>,
    {
        for (layer, location) in stack.candidates(name) {
            // Stat before reading: an edit racing the read must not become the baseline.
            let stamp = Touched::stat(&location.source_path);
            let read = self.loader.read(location);
            if !touched.iter().any(|t| t.path == stamp.path) {
                touched.push(stamp);
            }

            let bytes = match read {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        "Resolver: '{}' unreadable in {} layer ({}): {}",
                        name,
                        layer,
                        location.source_path,
                        e
                    );
                    continue;
                }
            };

            match parse(&bytes) {
                Ok(value) => {
                    tracing::trace!(
                        "Resolver: '{}' from {} layer ({})",
                        name,
                        layer,
                        location.source_path
                    );
                    // Keep the winner last.
                    if let Some(pos) = touched.iter().position(|t| t.path == location.source_path) {
                        let winner = touched.remove(pos);
                        touched.push(winner);
                    }
                    return Some((value, layer, location.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        "Resolver: corrupt '{}' in {} layer ({}), falling through: {}",
                        name,
                        layer,
                        location.source_path,
                        e
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ArchiveCodec;
    use crate::layers::LayerSource;
    use crate::location::{ResourceIndex, SourceKind};
    use camino::{Utf8Path, Utf8PathBuf};
    use nwn2_formats::TwoDaTable;
    use std::sync::Arc;

    fn resolver() -> OverrideResolver {
        OverrideResolver::new(ContainerLoader::new(Arc::new(ArchiveCodec)))
    }

    fn loose(dir: &Utf8Path, name: &str, contents: &str) -> Arc<LayerSource> {
        let path = dir.join(name);
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(&path, contents).unwrap();
        let mut index = ResourceIndex::new();
        index.insert(
            name.to_string(),
            ResourceLocation {
                name: name.to_string(),
                source_kind: SourceKind::Directory,
                source_path: path,
                internal_path: String::new(),
                size: contents.len() as u64,
                modified_time: 0.0,
            },
        );
        LayerSource::new(dir, index)
    }

    fn parse(bytes: &[u8]) -> Result<TwoDaTable> {
        Ok(TwoDaTable::parse(bytes)?)
    }

    #[test]
    fn test_highest_layer_wins() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stack = LayerStack::new();
        stack.push(LayerKind::Base, loose(&root.join("base"), "x.2da", "2DA V2.0\n\nA\n0 base\n"));
        stack.push(
            LayerKind::Override,
            loose(&root.join("ovr"), "x.2da", "2DA V2.0\n\nA\n0 override\n"),
        );

        let resolved = resolver().resolve(&stack, "x.2da", parse).unwrap();
        assert_eq!(resolved.layer, LayerKind::Override);
        assert_eq!(resolved.value.get(0, "A"), Some("override"));
    }

    #[test]
    fn test_corrupt_falls_through() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stack = LayerStack::new();
        stack.push(LayerKind::Base, loose(&root.join("base"), "x.2da", "2DA V2.0\n\nA\n0 base\n"));
        stack.push(LayerKind::Workshop, loose(&root.join("ws"), "x.2da", "garbage"));

        let resolved = resolver().resolve(&stack, "x.2da", parse).unwrap();
        assert_eq!(resolved.layer, LayerKind::Base);

        let touched: Vec<_> = resolved.touched.iter().map(|t| t.path.clone()).collect();
        assert_eq!(touched, vec![root.join("ws/x.2da"), root.join("base/x.2da")]);
        assert!(resolved.touched.iter().all(|t| t.modified_time.is_some()));
    }

    #[test]
    fn test_plan_reports_files_rejected_under_earlier_names() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stack = LayerStack::new();
        stack.push(LayerKind::Override, loose(&root.join("ovr"), "alias.2da", "garbage"));
        stack.push(LayerKind::Base, loose(&root.join("base"), "real.2da", "2DA V2.0\n\nA\n0 1\n"));

        let aliases = HashMap::from([("alias.2da".to_string(), "real.2da".to_string())]);
        let plan = ResolutionPlan::build("alias.2da", &aliases);
        let resolved = resolver().resolve_plan(&stack, &plan, parse).unwrap();

        assert_eq!(resolved.location.name, "real.2da");
        assert_eq!(resolved.touched.len(), 2);
        assert_eq!(resolved.touched[0].path, root.join("ovr/alias.2da"));
        assert_eq!(resolved.touched[1].path, root.join("base/real.2da"));
    }

    #[test]
    fn test_all_corrupt_is_none() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stack = LayerStack::new();
        stack.push(LayerKind::Base, loose(&root.join("base"), "x.2da", "garbage"));

        assert!(resolver().resolve(&stack, "x.2da", parse).is_none());
        assert!(resolver().resolve(&stack, "missing.2da", parse).is_none());
    }

    #[test]
    fn test_alias_plan_bounded() {
        let mut aliases = HashMap::new();
        for i in 0..10 {
            aliases.insert(format!("t{}.2da", i), format!("t{}.2da", i + 1));
        }
        let plan = ResolutionPlan::build("t0.2da", &aliases);
        assert_eq!(plan.names().len(), MAX_ALIAS_DEPTH + 1);
        assert_eq!(plan.requested(), "t0.2da");
    }

    #[test]
    fn test_alias_cycle_stops() {
        let aliases = HashMap::from([
            ("a.2da".to_string(), "b.2da".to_string()),
            ("b.2da".to_string(), "a.2da".to_string()),
        ]);
        let plan = ResolutionPlan::build("a.2da", &aliases);
        assert_eq!(plan.names(), &["a.2da".to_string(), "b.2da".to_string()]);
    }

    #[test]
    fn test_plan_uses_alias() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let mut stack = LayerStack::new();
        stack.push(LayerKind::Base, loose(&root, "real.2da", "2DA V2.0\n\nA\n0 1\n"));

        let aliases = HashMap::from([("alias.2da".to_string(), "real.2da".to_string())]);
        let plan = ResolutionPlan::build("alias.2da", &aliases);
        let resolved = resolver().resolve_plan(&stack, &plan, parse).unwrap();
        assert_eq!(resolved.location.name, "real.2da");
    }
}
