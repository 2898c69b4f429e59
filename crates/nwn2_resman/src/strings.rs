//! String reference resolution.
//!
//! A string reference is looked up in the active module's custom table first, then
//! in the base table. References with [`CUSTOM_STRREF_FLAG`] set address the custom
//! table only. A reference found nowhere resolves to the placeholder
//! `{StrRef:<ref>}`, so callers always get displayable text.

use crate::codec::StringTable;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// High bit marking a reference into the module's custom table.
pub const CUSTOM_STRREF_FLAG: u32 = 0x0100_0000;

/// Placeholder text for an unresolved reference.
pub fn placeholder(strref: u32) -> String {
    format!("{{StrRef:{}}}", strref)
}

/// Holds the base table. The custom table belongs to the active module context
/// and is passed per call, so a lookup never pairs one module with another
/// module's strings.
#[derive(Default)]
pub struct StringResolver {
    base: RwLock<Option<Arc<dyn StringTable>>>,
}

impl StringResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_base(&self, table: Option<Arc<dyn StringTable>>) {
        *self.base.write() = table;
    }

    pub fn has_base(&self) -> bool {
        self.base.read().is_some()
    }

    /// Resolve one reference against `custom` and the base table. Never fails.
    pub fn resolve(&self, custom: Option<&dyn StringTable>, strref: u32) -> String {
        let base = self.base.read().clone();
        lookup(base.as_deref(), custom, strref).unwrap_or_else(|| placeholder(strref))
    }

    /// Resolve several references. Every input appears in the output.
    pub fn resolve_batch(
        &self,
        custom: Option<&dyn StringTable>,
        strrefs: &[u32],
    ) -> BTreeMap<u32, String> {
        let base = self.base.read().clone();
        strrefs
            .iter()
            .map(|&strref| {
                let text = lookup(base.as_deref(), custom, strref)
                    .unwrap_or_else(|| placeholder(strref));
                (strref, text)
            })
            .collect()
    }
}

fn lookup(
    base: Option<&dyn StringTable>,
    custom: Option<&dyn StringTable>,
    strref: u32,
) -> Option<String> {
    let local = strref & !CUSTOM_STRREF_FLAG;
    if let Some(text) = custom.and_then(|t| t.get(local)) {
        return Some(text);
    }
    if strref & CUSTOM_STRREF_FLAG != 0 {
        return None;
    }
    base.and_then(|t| t.get(strref))
}
