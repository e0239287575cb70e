//! Favorites overlay: presets, per-plugin NPC and equipment sets, and the faction library.
//!
//! Each collection is persisted on its own. The per-plugin sets keep `allSelected` in step
//! with the catalogs held here, so a catalog refresh is followed by a full recompute.

mod catalog;
mod factions;
mod plugins;
mod presets;

pub use catalog::{CatalogRecord, PluginCatalog};
pub use factions::{FactionInfo, FactionLibrary};
pub use plugins::{EquipmentFavorite, FavoriteEntry, NpcFavorite, PerPluginFavorites, PluginFavorites};
pub use presets::{PresetFavorites, PresetToggle};

use crate::gateway::{CatalogKind, FavoriteCategory};

#[derive(Debug, Clone, Default)]
pub struct FavoritesOverlay {
    pub presets: PresetFavorites,
    pub npcs: PerPluginFavorites<NpcFavorite>,
    pub equipment: PerPluginFavorites<EquipmentFavorite>,
    pub factions: FactionLibrary,
    npc_catalog: PluginCatalog,
    equipment_catalog: PluginCatalog,
}

impl FavoritesOverlay {
    pub fn with_pinned(pinned: Vec<String>) -> Self {
        Self {
            presets: PresetFavorites::new(pinned),
            ..Self::default()
        }
    }

    pub fn catalog(&self, kind: CatalogKind) -> &PluginCatalog {
        match kind {
            CatalogKind::Npcs => &self.npc_catalog,
            CatalogKind::Equipment => &self.equipment_catalog,
        }
    }

    /// Swaps in a fresh catalog and re-derives every `allSelected` flag that depends on it.
    pub fn set_catalog(&mut self, kind: CatalogKind, catalog: PluginCatalog) {
        match kind {
            CatalogKind::Npcs => {
                self.npc_catalog = catalog;
                self.npcs.recompute_all(&self.npc_catalog);
            }
            CatalogKind::Equipment => {
                self.equipment_catalog = catalog;
                self.equipment.recompute_all(&self.equipment_catalog);
            }
        }
    }

    pub fn hydrate(
        &mut self,
        category: FavoriteCategory,
        payload: &serde_json::Value,
    ) -> Result<(), serde_json::Error> {
        match category {
            FavoriteCategory::Presets => self.presets.hydrate(payload),
            FavoriteCategory::Npcs => {
                self.npcs = PerPluginFavorites::from_payload(payload)?;
                self.npcs.recompute_all(&self.npc_catalog);
            }
            FavoriteCategory::Equipment => {
                self.equipment = PerPluginFavorites::from_payload(payload)?;
                self.equipment.recompute_all(&self.equipment_catalog);
            }
        }
        Ok(())
    }

    pub fn payload(&self, category: FavoriteCategory) -> serde_json::Value {
        match category {
            FavoriteCategory::Presets => self.presets.to_payload(),
            FavoriteCategory::Npcs => self.npcs.to_payload(),
            FavoriteCategory::Equipment => self.equipment.to_payload(),
        }
    }

    pub fn clear(&mut self, category: FavoriteCategory) {
        match category {
            FavoriteCategory::Presets => self.presets.clear_all(),
            FavoriteCategory::Npcs => self.npcs.clear_all(),
            FavoriteCategory::Equipment => self.equipment.clear_all(),
        }
    }

    pub fn toggle_npc(&mut self, plugin: &str, form_id: &str) -> crate::Result<bool> {
        self.npcs
            .toggle(&self.npc_catalog, plugin, crate::statics::CATEGORY_NPCS, form_id)
    }

    pub fn toggle_equipment(
        &mut self,
        plugin: &str,
        category: &str,
        form_id: &str,
    ) -> crate::Result<bool> {
        self.equipment
            .toggle(&self.equipment_catalog, plugin, category, form_id)
    }

    pub fn set_plugin_all(
        &mut self,
        category: FavoriteCategory,
        plugin: &str,
        selected: bool,
    ) -> crate::Result<usize> {
        match category {
            FavoriteCategory::Npcs => self.npcs.set_all(&self.npc_catalog, plugin, selected),
            FavoriteCategory::Equipment => {
                self.equipment
                    .set_all(&self.equipment_catalog, plugin, selected)
            }
            FavoriteCategory::Presets => Err(crate::AssistError::invalid_target(
                "presets have no per-plugin selection",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogRecord, FavoritesOverlay, PluginCatalog};
    use crate::gateway::{CatalogKind, FavoriteCategory};
    use serde_json::json;

    #[test]
    fn hydrated_flags_are_recomputed_against_the_catalog() {
        let mut overlay = FavoritesOverlay::default();
        let mut catalog = PluginCatalog::default();
        catalog.insert("Foo.esp", "npcs", vec![CatalogRecord::new("A", "0x1"), CatalogRecord::new("B", "0x2")]);
        overlay.set_catalog(CatalogKind::Npcs, catalog);

        // Stored flag claims everything is selected; only one of two is.
        overlay
            .hydrate(
                FavoriteCategory::Npcs,
                &json!({ "Foo.esp": { "allSelected": true, "npcs": [{ "name": "A", "formId": "0x1" }] } }),
            )
            .unwrap();
        assert!(!overlay.npcs.all_selected("Foo.esp"));

        overlay.toggle_npc("Foo.esp", "0x2").unwrap();
        assert!(overlay.npcs.all_selected("Foo.esp"));
    }

    #[test]
    fn presets_reject_bulk_selection() {
        let mut overlay = FavoritesOverlay::default();
        assert!(overlay.set_plugin_all(FavoriteCategory::Presets, "Foo.esp", true).is_err());
    }

    #[test]
    fn clearing_one_category_leaves_the_others() {
        let mut overlay = FavoritesOverlay::with_pinned(vec![]);
        overlay.presets.toggle("Athletic");
        let mut catalog = PluginCatalog::default();
        catalog.insert("Armor.esp", "armors", vec![CatalogRecord::new("Cuirass", "0x800")]);
        overlay.set_catalog(CatalogKind::Equipment, catalog);
        overlay.toggle_equipment("Armor.esp", "armors", "0x800").unwrap();

        overlay.clear(FavoriteCategory::Presets);
        assert!(overlay.presets.is_empty());
        assert_eq!(overlay.equipment.len(), 1);
    }
}
