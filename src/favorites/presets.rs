use crate::statics;
use indexmap::IndexSet;
use serde_json::Value;

/// Outcome of [`PresetFavorites::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetToggle {
    Added,
    Removed,
    /// Name is pinned; membership did not change.
    Pinned,
}

/// Flat set of favorited preset names plus a fixed allow-list that is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetFavorites {
    pinned: Vec<String>,
    names: IndexSet<String>,
}

impl Default for PresetFavorites {
    fn default() -> Self {
        Self::new(statics::DEFAULT_PINNED_PRESETS.iter().map(|s| s.to_string()).collect())
    }
}

impl PresetFavorites {
    pub fn new(pinned: Vec<String>) -> Self {
        Self {
            pinned,
            names: IndexSet::new(),
        }
    }

    pub fn is_pinned(&self, name: &str) -> bool {
        self.pinned.iter().any(|p| p == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_pinned(name) || self.names.contains(name)
    }

    /// Pinned names first, then stored names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pinned
            .iter()
            .map(String::as_str)
            .chain(self.names.iter().map(String::as_str).filter(|n| !self.is_pinned(n)))
    }

    pub fn len(&self) -> usize {
        self.names().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn toggle(&mut self, name: &str) -> PresetToggle {
        if self.is_pinned(name) {
            return PresetToggle::Pinned;
        }
        if self.names.shift_remove(name) {
            PresetToggle::Removed
        } else {
            self.names.insert(name.to_string());
            PresetToggle::Added
        }
    }

    /// Replaces stored membership from `{ "favorites": [...] }` or a bare list. Non-string
    /// items are skipped.
    pub fn hydrate(&mut self, payload: &Value) {
        let list = payload
            .get(statics::KEY_FAVORITES)
            .unwrap_or(payload)
            .as_array();
        self.names = list
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|n| !self.is_pinned(n))
            .map(str::to_string)
            .collect();
    }

    /// Pinned names are implied and never written.
    pub fn to_payload(&self) -> Value {
        let names: Vec<Value> = self.names.iter().map(|n| Value::from(n.as_str())).collect();
        let mut payload = serde_json::Map::new();
        payload.insert(statics::KEY_FAVORITES.to_string(), Value::Array(names));
        Value::Object(payload)
    }

    pub fn clear_all(&mut self) {
        self.names.clear();
    }
}
