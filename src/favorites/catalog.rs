use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One row of an exported listing. NPC exports fill every field; equipment exports only
/// `name` and `form_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<String>,
    pub form_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl CatalogRecord {
    pub fn new(name: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            editor_id: None,
            form_id: form_id.into(),
            base_id: None,
            race: None,
            gender: None,
        }
    }

    pub fn matches(&self, form_id: &str) -> bool {
        self.form_id.eq_ignore_ascii_case(form_id)
    }
}

type Categories = IndexMap<String, Vec<CatalogRecord>>;

/// `{ "timestamp": ..., "plugins": { "<plugin>": { "<category>": [records] } } }`.
/// Totals and timestamps in the export are ignored; counts are always derived.
#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    plugins: IndexMap<String, Categories>,
}

/// Per-plugin listing the favorites overlay is measured against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginCatalog {
    plugins: IndexMap<String, Categories>,
}

impl PluginCatalog {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let file = CatalogFile::deserialize(payload)?;
        Ok(Self {
            plugins: file.plugins,
        })
    }

    pub fn insert(&mut self, plugin: &str, category: &str, records: Vec<CatalogRecord>) {
        self.plugins
            .entry(plugin.to_string())
            .or_default()
            .insert(category.to_string(), records);
    }

    pub fn plugins(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn categories(&self, plugin: &str) -> impl Iterator<Item = (&str, &[CatalogRecord])> {
        self.plugins
            .get(plugin)
            .into_iter()
            .flat_map(|c| c.iter().map(|(k, v)| (k.as_str(), v.as_slice())))
    }

    /// Items across every category of `plugin`; 0 when the plugin is unknown.
    pub fn total(&self, plugin: &str) -> usize {
        self.categories(plugin).map(|(_, records)| records.len()).sum()
    }

    pub fn find(&self, plugin: &str, category: &str, form_id: &str) -> Option<&CatalogRecord> {
        self.plugins
            .get(plugin)?
            .get(category)?
            .iter()
            .find(|r| r.matches(form_id))
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::PluginCatalog;
    use crate::statics;
    use serde_json::json;

    #[test]
    fn npc_export_parses_and_counts() {
        let payload = json!({
            "timestamp": "2025-01-01 00:00:00",
            "total_npcs": 3,
            "plugins": {
                "Foo.esp": {
                    "npcs": [
                        { "name": "A", "editor_id": "FooA", "form_id": "0x01000D62", "base_id": "0x01000D61", "race": "NordRace", "gender": "Female" },
                        { "name": "B", "editor_id": "FooB", "form_id": "0x01000D63", "base_id": "0x01000D64", "race": "NordRace", "gender": "Female" }
                    ]
                },
                "Bar.esp": { "npcs": [] }
            }
        });
        let catalog = PluginCatalog::from_payload(&payload).unwrap();
        assert_eq!(catalog.total("Foo.esp"), 2);
        assert_eq!(catalog.total("Bar.esp"), 0);
        assert_eq!(catalog.total("Missing.esp"), 0);
        let record = catalog.find("Foo.esp", "npcs", "0x01000d63").unwrap();
        assert_eq!(record.editor_id.as_deref(), Some("FooB"));
    }

    #[test]
    fn equipment_export_ignores_nested_outfit_items() {
        let payload = json!({
            "plugins": {
                "Armor.esp": {
                    "armors": [{ "name": "Cuirass", "form_id": "0x800" }],
                    "outfits": [{ "name": "Set", "form_id": "0x801", "items": [{ "name": "Cuirass", "form_id": "0x800" }] }],
                    "weapons": []
                }
            }
        });
        let catalog = PluginCatalog::from_payload(&payload).unwrap();
        assert_eq!(catalog.total("Armor.esp"), 2);
        let categories: Vec<&str> = catalog.categories("Armor.esp").map(|(c, _)| c).collect();
        assert_eq!(categories, statics::EQUIPMENT_CATEGORIES);
    }
}
