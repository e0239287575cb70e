use crate::gateway::FactionSource;
use crate::statics;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionInfo {
    #[serde(default)]
    pub name: String,
}

/// Read-only `editorId -> info` lookup. Both sources can be loaded at once; only the
/// active one answers queries.
#[derive(Debug, Clone, Default)]
pub struct FactionLibrary {
    active: FactionSource,
    tables: HashMap<FactionSource, IndexMap<String, FactionInfo>>,
}

impl FactionLibrary {
    pub fn active(&self) -> FactionSource {
        self.active
    }

    pub fn set_active(&mut self, source: FactionSource) {
        self.active = source;
    }

    pub fn is_loaded(&self, source: FactionSource) -> bool {
        self.tables.contains_key(&source)
    }

    /// Stores a table from `{ "factions": { id: { "name": .. } } }` or the bare map.
    pub fn insert_table(
        &mut self,
        source: FactionSource,
        payload: &serde_json::Value,
    ) -> Result<usize, serde_json::Error> {
        let inner = payload.get(statics::KEY_FACTIONS).unwrap_or(payload);
        let table = IndexMap::<String, FactionInfo>::deserialize(inner)?;
        let count = table.len();
        self.tables.insert(source, table);
        Ok(count)
    }

    fn table(&self) -> Option<&IndexMap<String, FactionInfo>> {
        self.tables.get(&self.active)
    }

    pub fn len(&self) -> usize {
        self.table().map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, editor_id: &str) -> Option<&FactionInfo> {
        self.table()?.get(editor_id)
    }

    /// Case-insensitive substring match on editor id or display name. An empty term
    /// lists everything.
    pub fn search(&self, term: &str) -> Vec<(&str, &FactionInfo)> {
        let needle = term.trim().to_lowercase();
        self.table()
            .into_iter()
            .flatten()
            .filter(|(id, info)| {
                needle.is_empty()
                    || id.to_lowercase().contains(&needle)
                    || info.name.to_lowercase().contains(&needle)
            })
            .map(|(id, info)| (id.as_str(), info))
            .collect()
    }
}
