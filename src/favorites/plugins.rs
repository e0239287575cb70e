use super::catalog::{CatalogRecord, PluginCatalog};
use crate::error::{AssistError, Result};
use crate::statics;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A stored snapshot of a catalog record. Snapshots outlive the catalog entry they were
/// taken from.
pub trait FavoriteEntry: Clone + PartialEq + Serialize + DeserializeOwned {
    fn form_id(&self) -> &str;

    fn snapshot(plugin: &str, category: &str, record: &CatalogRecord) -> Self;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcFavorite {
    pub name: String,
    #[serde(default)]
    pub editor_id: String,
    pub form_id: String,
    #[serde(default)]
    pub base_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl FavoriteEntry for NpcFavorite {
    fn form_id(&self) -> &str {
        &self.form_id
    }

    fn snapshot(_plugin: &str, _category: &str, record: &CatalogRecord) -> Self {
        Self {
            name: record.name.clone(),
            editor_id: record.editor_id.clone().unwrap_or_default(),
            form_id: record.form_id.clone(),
            base_id: record.base_id.clone().unwrap_or_default(),
            race: record.race.clone(),
            gender: record.gender.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentFavorite {
    pub name: String,
    pub form_id: String,
    pub plugin: String,
    pub category: String,
}

impl FavoriteEntry for EquipmentFavorite {
    fn form_id(&self) -> &str {
        &self.form_id
    }

    fn snapshot(plugin: &str, category: &str, record: &CatalogRecord) -> Self {
        Self {
            name: record.name.clone(),
            form_id: record.form_id.clone(),
            plugin: plugin.to_string(),
            category: category.to_string(),
        }
    }
}

/// Favorites for one plugin: `{ "allSelected": bool, "<category>": [entries], ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginFavorites<E> {
    #[serde(rename = "allSelected", default)]
    pub all_selected: bool,
    #[serde(flatten)]
    pub categories: IndexMap<String, Vec<E>>,
}

impl<E> Default for PluginFavorites<E> {
    fn default() -> Self {
        Self {
            all_selected: false,
            categories: IndexMap::new(),
        }
    }
}

impl<E: FavoriteEntry> PluginFavorites<E> {
    pub fn favorited_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    fn position(&self, category: &str, form_id: &str) -> Option<usize> {
        self.categories
            .get(category)?
            .iter()
            .position(|e| e.form_id().eq_ignore_ascii_case(form_id))
    }
}

/// Per-plugin favorites for one domain (NPCs or equipment).
///
/// `allSelected` is never adjusted incrementally: every mutation recomputes it from the
/// catalog total for the plugin it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct PerPluginFavorites<E> {
    plugins: IndexMap<String, PluginFavorites<E>>,
}

impl<E> Default for PerPluginFavorites<E> {
    fn default() -> Self {
        Self {
            plugins: IndexMap::new(),
        }
    }
}

impl<E: FavoriteEntry> PerPluginFavorites<E> {
    /// Accepts `{ "<plugin>": {...} }` or the same map wrapped in `{ "plugins": ... }`.
    pub fn from_payload(payload: &serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        let inner = payload.get(statics::KEY_PLUGINS).unwrap_or(payload);
        let plugins = IndexMap::<String, PluginFavorites<E>>::deserialize(inner)?;
        Ok(Self { plugins })
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.plugins).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn plugin(&self, plugin: &str) -> Option<&PluginFavorites<E>> {
        self.plugins.get(plugin)
    }

    pub fn plugins(&self) -> impl Iterator<Item = (&str, &PluginFavorites<E>)> {
        self.plugins.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_favorite(&self, plugin: &str, category: &str, form_id: &str) -> bool {
        self.plugins
            .get(plugin)
            .and_then(|p| p.position(category, form_id))
            .is_some()
    }

    pub fn favorited_count(&self, plugin: &str) -> usize {
        self.plugins
            .get(plugin)
            .map(PluginFavorites::favorited_count)
            .unwrap_or(0)
    }

    pub fn all_selected(&self, plugin: &str) -> bool {
        self.plugins.get(plugin).is_some_and(|p| p.all_selected)
    }

    pub fn len(&self) -> usize {
        self.plugins.values().map(PluginFavorites::favorited_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flips one entry. Adding snapshots the catalog record; removing works even if the
    /// record has since left the catalog. Returns whether the entry is now a favorite.
    pub fn toggle(
        &mut self,
        catalog: &PluginCatalog,
        plugin: &str,
        category: &str,
        form_id: &str,
    ) -> Result<bool> {
        if let Some(set) = self.plugins.get_mut(plugin)
            && let Some(pos) = set.position(category, form_id)
        {
            if let Some(list) = set.categories.get_mut(category) {
                list.remove(pos);
            }
            self.prune(plugin);
            self.recompute(catalog, plugin);
            return Ok(false);
        }

        let record = catalog.find(plugin, category, form_id).ok_or_else(|| {
            AssistError::invalid_target(format!(
                "{plugin}/{category}/{form_id}: {}",
                statics::EN_ERR_UNKNOWN_ENTRY
            ))
        })?;
        let entry = E::snapshot(plugin, category, record);
        self.plugins
            .entry(plugin.to_string())
            .or_default()
            .categories
            .entry(category.to_string())
            .or_default()
            .push(entry);
        self.recompute(catalog, plugin);
        Ok(true)
    }

    /// Bulk form of [`toggle`](Self::toggle): `true` snapshots every catalog record of
    /// the plugin, `false` drops all of its favorites. Returns the favorited count after.
    pub fn set_all(&mut self, catalog: &PluginCatalog, plugin: &str, selected: bool) -> Result<usize> {
        if !selected {
            self.plugins.shift_remove(plugin);
            return Ok(0);
        }
        if catalog.total(plugin) == 0 {
            return Err(AssistError::invalid_target(format!(
                "{plugin} has no catalog entries"
            )));
        }

        let categories = catalog
            .categories(plugin)
            .filter(|(_, records)| !records.is_empty())
            .map(|(category, records)| {
                let entries = records
                    .iter()
                    .map(|r| E::snapshot(plugin, category, r))
                    .collect();
                (category.to_string(), entries)
            })
            .collect();
        self.plugins.insert(
            plugin.to_string(),
            PluginFavorites {
                all_selected: false,
                categories,
            },
        );
        self.recompute(catalog, plugin);
        Ok(self.favorited_count(plugin))
    }

    /// Re-derives `allSelected` for one plugin from the catalog total.
    pub fn recompute(&mut self, catalog: &PluginCatalog, plugin: &str) {
        let total = catalog.total(plugin);
        if let Some(set) = self.plugins.get_mut(plugin) {
            set.all_selected = total > 0 && set.favorited_count() == total;
        }
    }

    pub fn recompute_all(&mut self, catalog: &PluginCatalog) {
        let plugins: Vec<String> = self.plugins.keys().cloned().collect();
        for plugin in plugins {
            self.recompute(catalog, &plugin);
        }
    }

    pub fn clear_all(&mut self) {
        self.plugins.clear();
    }

    fn prune(&mut self, plugin: &str) {
        let Some(set) = self.plugins.get_mut(plugin) else {
            return;
        };
        set.categories.retain(|_, entries| !entries.is_empty());
        if set.categories.is_empty() {
            self.plugins.shift_remove(plugin);
        }
    }
}
