//! Campaign discovery (`Campaigns/<name>/campaign.cam`).

use super::manifest::{field, text};
use crate::codec::ManifestCodec;
use crate::error::{Error, Result};
use crate::utils::{find_child_ci, utf8_path};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;

const CAMPAIGN_FILE: &str = "campaign.cam";

/// A campaign and the modules it chains together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInfo {
    pub id: String,
    pub name: String,
    /// The campaign folder. Its files override global content for member modules.
    pub directory: Utf8PathBuf,
    pub modules: Vec<String>,
    pub start_module: Option<String>,
}

impl CampaignInfo {
    pub fn from_tree(tree: &Value, directory: &Utf8Path) -> Result<Self> {
        let root = tree
            .as_object()
            .ok_or_else(|| Error::Other("campaign root is not an object".to_string()))?;

        let id = field(root, "GUID")
            .or_else(|| field(root, "Campaign_ID"))
            .and_then(text)
            .ok_or_else(|| Error::Other(format!("campaign in {} has no GUID", directory)))?;

        let modules = field(root, "ModNames")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(obj) => field(obj, "ModuleName").and_then(text),
                        other => text(other),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            name: field(root, "DisplayName")
                .and_then(text)
                .or_else(|| directory.file_name().map(str::to_string))
                .unwrap_or_default(),
            directory: directory.to_path_buf(),
            modules,
            start_module: field(root, "StartModule").and_then(text),
        })
    }

    /// Whether `module_name` (file stem, any case) belongs to this campaign.
    pub fn contains_module(&self, module_name: &str) -> bool {
        self.modules
            .iter()
            .any(|m| m.eq_ignore_ascii_case(module_name))
    }
}

/// Every readable campaign under `dirs`, in directory order.
pub fn scan_campaigns(dirs: &[Utf8PathBuf], codec: &dyn ManifestCodec) -> Vec<CampaignInfo> {
    let mut campaigns = Vec::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir.as_std_path()) else {
            continue;
        };
        let mut folders: Vec<Utf8PathBuf> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| utf8_path(e.path()))
            .collect();
        folders.sort();

        for folder in folders {
            let Some(cam) = find_child_ci(&folder, CAMPAIGN_FILE) else {
                continue;
            };
            match read_campaign(&cam, &folder, codec) {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => tracing::warn!("Skipping campaign {}: {}", cam, e),
            }
        }
    }
    campaigns
}

/// Find the campaign with `id`, or failing that, the one listing `module_name`.
pub fn find_campaign(
    dirs: &[Utf8PathBuf],
    codec: &dyn ManifestCodec,
    id: Option<&str>,
    module_name: &str,
) -> Option<CampaignInfo> {
    let campaigns = scan_campaigns(dirs, codec);
    if let Some(id) = id {
        if let Some(found) = campaigns.iter().find(|c| c.id.eq_ignore_ascii_case(id)) {
            return Some(found.clone());
        }
    }
    campaigns
        .into_iter()
        .find(|c| c.contains_module(module_name))
}

fn read_campaign(cam: &Utf8Path, folder: &Utf8Path, codec: &dyn ManifestCodec) -> Result<CampaignInfo> {
    let bytes = std::fs::read(cam.as_std_path())?;
    CampaignInfo::from_tree(&codec.parse(&bytes)?, folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonManifestCodec;
    use serde_json::json;

    fn write_campaign(root: &Utf8Path, folder: &str, tree: Value) {
        let dir = root.join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Campaign.CAM"), serde_json::to_vec(&tree).unwrap()).unwrap();
    }

    #[test]
    fn test_find_by_id_and_by_module() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp.path()).unwrap();
        write_campaign(
            root,
            "OC",
            json!({
                "GUID": "oc-guid",
                "DisplayName": "Original Campaign",
                "ModNames": [ { "ModuleName": "0_Tutorial" }, { "ModuleName": "1000_Neverwinter_A1" } ],
                "StartModule": "0_Tutorial"
            }),
        );
        write_campaign(root, "Broken", json!({ "DisplayName": "no guid" }));

        let dirs = vec![root.to_path_buf()];
        let campaigns = scan_campaigns(&dirs, &JsonManifestCodec);
        assert_eq!(campaigns.len(), 1);

        let by_id = find_campaign(&dirs, &JsonManifestCodec, Some("OC-GUID"), "x").unwrap();
        assert_eq!(by_id.name, "Original Campaign");
        assert_eq!(by_id.start_module.as_deref(), Some("0_Tutorial"));
        assert_eq!(by_id.directory, root.join("OC"));

        let by_module =
            find_campaign(&dirs, &JsonManifestCodec, None, "1000_neverwinter_a1").unwrap();
        assert_eq!(by_module.id, "oc-guid");

        assert!(find_campaign(&dirs, &JsonManifestCodec, Some("other"), "nope").is_none());
    }
}
