//! Module manifests (`module.ifo`) read from structured data trees.
//!
//! The tree uses the toolset's field names. Localized strings may appear either as
//! a plain string or as an object of language id to text; both are accepted.
//!
//! ```json
//! {
//!   "Mod_Name": { "0": "Shadows of Undrentide" },
//!   "Mod_Entry_Area": "a_start",
//!   "Mod_HakList": [ { "Mod_Hak": "x1_top" }, { "Mod_Hak": "x1_tiles" } ],
//!   "Mod_CustomTlk": "x1_custom",
//!   "Campaign_ID": "6b5b3f1e-..."
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The parts of a module manifest the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleManifest {
    pub name: String,
    pub entry_area: Option<String>,
    /// Dependent containers in load order, without extension.
    pub hak_list: Vec<String>,
    /// Custom string table name, without extension.
    pub custom_tlk: Option<String>,
    pub campaign_id: Option<String>,
}

impl ModuleManifest {
    /// Decode a manifest tree. Only the root must be an object; every field is
    /// optional.
    pub fn from_tree(tree: &Value) -> Result<Self> {
        let root = tree
            .as_object()
            .ok_or_else(|| Error::Other("module manifest root is not an object".to_string()))?;

        let mut hak_list: Vec<String> = field(root, "Mod_HakList")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(obj) => field(obj, "Mod_Hak").and_then(text),
                        other => text(other),
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Older modules carry a single hak in `Mod_Hak` instead of a list.
        if hak_list.is_empty() {
            if let Some(hak) = field(root, "Mod_Hak").and_then(text) {
                hak_list.push(hak);
            }
        }

        Ok(Self {
            name: field(root, "Mod_Name").and_then(text).unwrap_or_default(),
            entry_area: field(root, "Mod_Entry_Area").and_then(text),
            hak_list: hak_list.iter().map(|h| strip_ext(h, "hak")).collect(),
            custom_tlk: field(root, "Mod_CustomTlk")
                .and_then(text)
                .map(|t| strip_ext(&t, "tlk")),
            campaign_id: field(root, "Campaign_ID").and_then(text),
        })
    }

    /// Encode back into a tree with the toolset field names.
    pub fn to_tree(&self) -> Value {
        let haks: Vec<Value> = self
            .hak_list
            .iter()
            .map(|h| json!({ "Mod_Hak": h }))
            .collect();

        let mut root = Map::new();
        root.insert("Mod_Name".to_string(), json!(self.name));
        if let Some(area) = &self.entry_area {
            root.insert("Mod_Entry_Area".to_string(), json!(area));
        }
        root.insert("Mod_HakList".to_string(), Value::Array(haks));
        if let Some(tlk) = &self.custom_tlk {
            root.insert("Mod_CustomTlk".to_string(), json!(tlk));
        }
        if let Some(id) = &self.campaign_id {
            root.insert("Campaign_ID".to_string(), json!(id));
        }
        Value::Object(root)
    }
}

/// Look up a field ignoring ASCII case.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Text content of a value. Empty strings are `None`.
///
/// Objects are treated as localized strings: a `"value"` key wins, then language
/// `"0"`, then the first string found.
pub(crate) fn text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => ["value", "0"]
            .iter()
            .find_map(|key| field(obj, key).and_then(text))
            .or_else(|| obj.values().find_map(text)),
        _ => None,
    }?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn strip_ext(name: &str, ext: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, e)) if e.eq_ignore_ascii_case(ext) => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_manifest() {
        let tree = json!({
            "Mod_Name": { "0": "My Module" },
            "Mod_Entry_Area": "start",
            "Mod_HakList": [ { "Mod_Hak": "first" }, { "Mod_Hak": "second.hak" } ],
            "Mod_CustomTlk": "custom.tlk",
            "Campaign_ID": "abc-123"
        });
        let manifest = ModuleManifest::from_tree(&tree).unwrap();
        assert_eq!(manifest.name, "My Module");
        assert_eq!(manifest.entry_area.as_deref(), Some("start"));
        assert_eq!(manifest.hak_list, vec!["first", "second"]);
        assert_eq!(manifest.custom_tlk.as_deref(), Some("custom"));
        assert_eq!(manifest.campaign_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_legacy_single_hak_and_case() {
        let tree = json!({ "mod_name": "Old", "MOD_HAK": "legacy", "Mod_CustomTlk": "" });
        let manifest = ModuleManifest::from_tree(&tree).unwrap();
        assert_eq!(manifest.name, "Old");
        assert_eq!(manifest.hak_list, vec!["legacy"]);
        assert_eq!(manifest.custom_tlk, None);
    }

    #[test]
    fn test_plain_string_haks() {
        let tree = json!({ "Mod_HakList": ["a", "", "b"] });
        let manifest = ModuleManifest::from_tree(&tree).unwrap();
        assert_eq!(manifest.hak_list, vec!["a", "b"]);
    }

    #[test]
    fn test_non_object_root() {
        assert!(ModuleManifest::from_tree(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_tree_round_trip() {
        let manifest = ModuleManifest {
            name: "Round".to_string(),
            entry_area: None,
            hak_list: vec!["h1".to_string(), "h2".to_string()],
            custom_tlk: Some("t".to_string()),
            campaign_id: None,
        };
        assert_eq!(ModuleManifest::from_tree(&manifest.to_tree()).unwrap(), manifest);
    }
}
