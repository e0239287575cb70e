use crate::error::{AssistError, Result};
use crate::gateway::{AuditAction, AuditRecord, GatewayError};
use crate::value::{SectionShape, ShapeClass};
use crate::{ConfigValue, statics};
use indexmap::IndexMap;
use std::fmt;

/// Where inside a section something points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Whole,
    Key(String),
    Index(usize),
}

impl Address {
    /// Audit/log form: the key, the index, or nothing for the whole section.
    pub fn target(&self) -> Option<String> {
        match self {
            Address::Whole => None,
            Address::Key(key) => Some(key.clone()),
            Address::Index(index) => Some(index.to_string()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Whole => f.write_str(statics::EN_LABEL_WHOLE_SECTION),
            Address::Key(key) => write!(f, "\"{key}\""),
            Address::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// The single element currently inspected or edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub section: String,
    pub address: Address,
}

/// A deletion waiting for confirmation. Holding one never changes the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    pub section: String,
    pub address: Address,
    pub label: String,
}

/// Borrowed view of the open section, already split by shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SectionView<'a> {
    /// No section open, or the open key is not in the document.
    Empty,
    List(&'a [ConfigValue]),
    Map(&'a IndexMap<String, ConfigValue>),
    Scalar(&'a ConfigValue),
}

/// In-memory mirror of the master document plus the editor's navigation state.
/// All tree mutation goes through here.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    root: IndexMap<String, ConfigValue>,
    open_section: Option<String>,
    selection: Option<Selection>,
    pending: Option<PendingDeletion>,
    dirty: bool,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: ConfigValue) -> Result<Self> {
        let mut store = Self::default();
        store.replace(document)?;
        Ok(store)
    }

    /// Swaps in a freshly loaded document. Clears the selection and any staged deletion;
    /// the open section name survives so the view can re-render in place.
    pub fn replace(&mut self, document: ConfigValue) -> Result<()> {
        let type_name = document.type_name();
        let ConfigValue::Object(root) = document else {
            return Err(AssistError::load(
                "document",
                GatewayError::Decode(format!("document root is {type_name}, expected an object")),
            ));
        };
        self.root = root;
        self.selection = None;
        self.pending = None;
        self.dirty = false;
        Ok(())
    }

    /// Snapshot of the whole tree for a push.
    pub fn document(&self) -> ConfigValue {
        ConfigValue::Object(self.root.clone())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn section(&self, key: &str) -> Option<&ConfigValue> {
        self.root.get(key)
    }

    pub fn section_shape(&self, key: &str) -> Option<SectionShape> {
        self.root.get(key).map(ConfigValue::section_shape)
    }

    pub fn open_section(&mut self, key: &str) -> SectionView<'_> {
        if self.open_section.as_deref() != Some(key) {
            self.selection = None;
            self.open_section = Some(key.to_string());
        }
        self.open_view()
    }

    pub fn open_section_name(&self) -> Option<&str> {
        self.open_section.as_deref()
    }

    pub fn close_section(&mut self) {
        self.open_section = None;
        self.selection = None;
    }

    pub fn open_view(&self) -> SectionView<'_> {
        let Some(value) = self.open_section.as_deref().and_then(|k| self.root.get(k)) else {
            return SectionView::Empty;
        };
        match value {
            ConfigValue::Array(values) => SectionView::List(values),
            ConfigValue::Object(map) => SectionView::Map(map),
            scalar => SectionView::Scalar(scalar),
        }
    }

    /// Points the selection at an element of the open section.
    pub fn select(&mut self, address: Address) -> Result<&Selection> {
        let section = self
            .open_section
            .clone()
            .ok_or_else(|| AssistError::invalid_target(statics::EN_ERR_NO_OPEN_SECTION))?;
        self.validate_address(&section, &address)?;
        Ok(self.selection.insert(Selection { section, address }))
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_value(&self) -> Option<&ConfigValue> {
        let selection = self.selection.as_ref()?;
        self.value_at(&selection.section, &selection.address)
    }

    pub fn value_at(&self, section: &str, address: &Address) -> Option<&ConfigValue> {
        let value = self.root.get(section)?;
        match address {
            Address::Whole => Some(value),
            Address::Key(key) => value.as_object()?.get(key),
            Address::Index(index) => value.as_array()?.get(*index),
        }
    }

    fn value_at_mut(&mut self, section: &str, address: &Address) -> Option<&mut ConfigValue> {
        let value = self.root.get_mut(section)?;
        match address {
            Address::Whole => Some(value),
            Address::Key(key) => value.as_object_mut()?.get_mut(key),
            Address::Index(index) => value.as_array_mut()?.get_mut(*index),
        }
    }

    /// Checks that `address` fits the section's shape: keys only on maps, indices only
    /// on lists (bounds-checked).
    pub fn validate_address(&self, section: &str, address: &Address) -> Result<()> {
        let Some(value) = self.root.get(section) else {
            return Err(AssistError::invalid_target(format!(
                "section \"{section}\" does not exist"
            )));
        };
        let shape = value.section_shape();
        match (address, value) {
            (Address::Whole, _) => Ok(()),
            (Address::Key(key), ConfigValue::Object(map)) => {
                if map.contains_key(key) {
                    Ok(())
                } else {
                    Err(AssistError::invalid_target(format!(
                        "key \"{key}\" is not in \"{section}\""
                    )))
                }
            }
            (Address::Index(index), ConfigValue::Array(values)) => {
                if *index < values.len() {
                    Ok(())
                } else {
                    Err(AssistError::invalid_target(format!(
                        "index {index} is out of bounds for \"{section}\" ({} items)",
                        values.len()
                    )))
                }
            }
            (Address::Key(_), _) => Err(AssistError::invalid_target(format!(
                "\"{section}\" is a {shape}, it has no keys"
            ))),
            (Address::Index(_), _) => Err(AssistError::invalid_target(format!(
                "\"{section}\" is a {shape}, it has no indices"
            ))),
        }
    }

    /// Adds `value` under `key` in a map section. Lists merge (append, skipping values
    /// already present) instead of being replaced, so repeating an add is harmless.
    /// Returns `None` when nothing changed.
    pub fn add_map_entry(
        &mut self,
        section: &str,
        key: &str,
        value: ConfigValue,
    ) -> Result<Option<AuditRecord>> {
        let map = match self
            .root
            .entry(section.to_string())
            .or_insert_with(|| ConfigValue::Object(IndexMap::new()))
        {
            ConfigValue::Object(map) => map,
            other => {
                return Err(AssistError::invalid_target(format!(
                    "\"{section}\" is a {}, not a map",
                    other.section_shape()
                )));
            }
        };

        let before = map.get(key).cloned();
        let after = match map.get_mut(key) {
            Some(ConfigValue::Array(existing)) => {
                if merge_into(existing, value) == 0 {
                    return Ok(None);
                }
                ConfigValue::Array(existing.clone())
            }
            Some(existing) => {
                if *existing == value {
                    return Ok(None);
                }
                *existing = value.clone();
                value
            }
            None => {
                let value = match value {
                    ConfigValue::Array(values) => {
                        let mut deduped = Vec::with_capacity(values.len());
                        merge_into(&mut deduped, ConfigValue::Array(values));
                        ConfigValue::Array(deduped)
                    }
                    other => other,
                };
                map.insert(key.to_string(), value.clone());
                value
            }
        };

        self.dirty = true;
        Ok(Some(AuditRecord {
            action: AuditAction::AddMapEntry,
            section: section.to_string(),
            target: Some(key.to_string()),
            before,
            after: Some(after),
        }))
    }

    /// Appends `values` to a list section, skipping any already present.
    /// Returns `None` when nothing changed.
    pub fn add_list_entries(
        &mut self,
        section: &str,
        values: Vec<ConfigValue>,
    ) -> Result<Option<AuditRecord>> {
        // Nothing to add must not create the section either.
        if values.is_empty() && !self.root.contains_key(section) {
            return Ok(None);
        }
        let list = match self
            .root
            .entry(section.to_string())
            .or_insert_with(|| ConfigValue::Array(Vec::new()))
        {
            ConfigValue::Array(list) => list,
            other => {
                return Err(AssistError::invalid_target(format!(
                    "\"{section}\" is a {}, not a list",
                    other.section_shape()
                )));
            }
        };

        let before = list.clone();
        if merge_into(list, ConfigValue::Array(values)) == 0 {
            return Ok(None);
        }
        let after = list.clone();

        self.dirty = true;
        Ok(Some(AuditRecord {
            action: AuditAction::AddListEntries,
            section: section.to_string(),
            target: None,
            before: Some(ConfigValue::Array(before)),
            after: Some(ConfigValue::Array(after)),
        }))
    }

    /// First phase of a deletion. Replaces any earlier staged deletion.
    pub fn stage_deletion(
        &mut self,
        section: &str,
        address: Address,
        label: impl Into<String>,
    ) -> Result<&PendingDeletion> {
        self.validate_address(section, &address)?;
        let mut label = label.into();
        if label.trim().is_empty() {
            label = format!("{section} {address}");
        }
        Ok(self.pending.insert(PendingDeletion {
            section: section.to_string(),
            address,
            label,
        }))
    }

    pub fn pending_deletion(&self) -> Option<&PendingDeletion> {
        self.pending.as_ref()
    }

    pub fn cancel_deletion(&mut self) -> Option<PendingDeletion> {
        self.pending.take()
    }

    /// Second phase: applies the staged deletion. The staging is consumed even when the
    /// address has gone stale in the meantime.
    pub fn commit_deletion(&mut self) -> Result<AuditRecord> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| AssistError::invalid_target(statics::EN_ERR_NOTHING_STAGED))?;
        self.validate_address(&pending.section, &pending.address)?;

        let removed = match &pending.address {
            Address::Whole => self.root.shift_remove(&pending.section),
            Address::Key(key) => self
                .root
                .get_mut(&pending.section)
                .and_then(ConfigValue::as_object_mut)
                .and_then(|map| map.shift_remove(key)),
            Address::Index(index) => self
                .root
                .get_mut(&pending.section)
                .and_then(ConfigValue::as_array_mut)
                .map(|list| list.remove(*index)),
        };
        let Some(removed) = removed else {
            return Err(AssistError::invalid_target(format!(
                "{} no longer exists",
                pending.label
            )));
        };

        self.adjust_selection_after_delete(&pending.section, &pending.address);
        self.dirty = true;
        Ok(AuditRecord {
            action: AuditAction::Delete,
            section: pending.section,
            target: pending.address.target(),
            before: Some(removed),
            after: None,
        })
    }

    fn adjust_selection_after_delete(&mut self, section: &str, removed: &Address) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        if selection.section != section {
            return;
        }
        let clear = match (removed, &mut selection.address) {
            (Address::Whole, _) => true,
            (Address::Key(gone), Address::Key(selected)) => gone == selected,
            (Address::Index(gone), Address::Index(selected)) => {
                if *selected > *gone {
                    *selected -= 1;
                    false
                } else {
                    *selected == *gone
                }
            }
            _ => false,
        };
        if clear {
            self.selection = None;
        }
    }

    /// Replaces a scalar section wholesale.
    pub fn set_scalar(&mut self, section: &str, value: ConfigValue) -> Result<AuditRecord> {
        let Some(current) = self.root.get_mut(section) else {
            return Err(AssistError::invalid_target(format!(
                "section \"{section}\" does not exist"
            )));
        };
        if current.section_shape() != SectionShape::Scalar {
            return Err(AssistError::invalid_target(format!(
                "\"{section}\" is a {}, not a scalar",
                current.section_shape()
            )));
        }
        if matches!(value.shape_class(), ShapeClass::List | ShapeClass::Map) {
            return Err(AssistError::ShapeMismatch {
                expected: ShapeClass::Primitive,
                found: value.shape_class(),
            });
        }

        let before = std::mem::replace(current, value.clone());
        self.dirty = true;
        Ok(AuditRecord {
            action: AuditAction::SetScalar,
            section: section.to_string(),
            target: None,
            before: Some(before),
            after: Some(value),
        })
    }

    /// Overwrites the selected value. Shape checks are the caller's job (see
    /// [`crate::editor::ManualEditValidator`]).
    pub(crate) fn replace_selected(&mut self, value: ConfigValue) -> Result<AuditRecord> {
        let selection = self
            .selection
            .clone()
            .ok_or_else(|| AssistError::invalid_target(statics::EN_ERR_NO_SELECTION))?;
        let Some(slot) = self.value_at_mut(&selection.section, &selection.address) else {
            return Err(AssistError::invalid_target(format!(
                "{} {} no longer exists",
                selection.section, selection.address
            )));
        };

        let before = std::mem::replace(slot, value.clone());
        self.dirty = true;
        Ok(AuditRecord {
            action: AuditAction::ManualEdit,
            section: selection.section,
            target: selection.address.target(),
            before: Some(before),
            after: Some(value),
        })
    }
}

/// Appends `incoming` (or each of its elements, for a list) to `list`, skipping values
/// already present. Returns how many were added.
fn merge_into(list: &mut Vec<ConfigValue>, incoming: ConfigValue) -> usize {
    let incoming = match incoming {
        ConfigValue::Array(values) => values,
        single => vec![single],
    };
    let mut added = 0;
    for value in incoming {
        if !list.contains(&value) {
            list.push(value);
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::{Address, DocumentStore, SectionView};
    use crate::ConfigValue;
    use crate::error::AssistError;
    use pretty_assertions::assert_eq;

    fn store(text: &str) -> DocumentStore {
        DocumentStore::from_document(ConfigValue::parse_json5(text).unwrap()).unwrap()
    }

    #[test]
    fn replace_rejects_non_object_roots() {
        let mut store = DocumentStore::new();
        let err = store.replace(ConfigValue::from(vec![1i64])).unwrap_err();
        assert!(matches!(err, AssistError::Load { what: "document", .. }));
    }

    #[test]
    fn open_missing_section_renders_empty() {
        let mut store = store(r#"{ "a": [1] }"#);
        assert_eq!(store.open_section("missing"), SectionView::Empty);
        assert!(store.select(Address::Whole).is_err());
    }

    #[test]
    fn changing_section_clears_selection() {
        let mut store = store(r#"{ "a": [1], "b": { "k": 1 } }"#);
        store.open_section("a");
        store.select(Address::Index(0)).unwrap();
        store.open_section("a");
        assert!(store.selection().is_some());
        store.open_section("b");
        assert!(store.selection().is_none());
    }

    #[test]
    fn addressing_must_match_section_shape() {
        let mut store = store(r#"{ "list": ["a"], "map": { "k": 1 }, "flag": true }"#);

        store.open_section("map");
        assert!(matches!(
            store.select(Address::Index(0)),
            Err(AssistError::InvalidTarget(_))
        ));
        assert!(store.select(Address::Key("k".to_string())).is_ok());

        store.open_section("list");
        assert!(store.select(Address::Key("k".to_string())).is_err());
        assert!(store.select(Address::Index(1)).is_err());
        assert!(store.select(Address::Index(0)).is_ok());

        store.open_section("flag");
        assert!(store.select(Address::Index(0)).is_err());
        assert!(store.select(Address::Whole).is_ok());
    }

    #[test]
    fn add_map_entry_merges_lists() {
        let mut store = store(r#"{ "npc": { "Lydia": ["PresetA"] } }"#);
        let audit = store
            .add_map_entry("npc", "Lydia", ConfigValue::from(vec!["PresetB"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            store.document(),
            ConfigValue::parse_json5(r#"{ "npc": { "Lydia": ["PresetA", "PresetB"] } }"#).unwrap()
        );
        assert_eq!(audit.before, Some(ConfigValue::from(vec!["PresetA"])));
        assert!(store.is_dirty());

        let again = store
            .add_map_entry("npc", "Lydia", ConfigValue::from(vec!["PresetB"]))
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn add_map_entry_creates_missing_section_and_key() {
        let mut store = store("{}");
        store
            .add_map_entry("npc", "Serana", ConfigValue::from(vec!["X", "X", "Y"]))
            .unwrap();
        assert_eq!(
            store.section("npc").and_then(|s| s.get("Serana")),
            Some(&ConfigValue::from(vec!["X", "Y"]))
        );
    }

    #[test]
    fn add_map_entry_on_list_section_is_rejected() {
        let mut store = store(r#"{ "blacklist": ["a"] }"#);
        let before = store.document();
        assert!(
            store
                .add_map_entry("blacklist", "k", ConfigValue::from("v"))
                .is_err()
        );
        assert_eq!(store.document(), before);
    }

    #[test]
    fn add_list_entries_is_idempotent() {
        let mut store = store(r#"{ "blacklist": ["a"] }"#);
        store
            .add_list_entries("blacklist", vec![ConfigValue::from("x")])
            .unwrap();
        let second = store
            .add_list_entries("blacklist", vec![ConfigValue::from("x")])
            .unwrap();
        assert!(second.is_none());
        assert_eq!(
            store.section("blacklist"),
            Some(&ConfigValue::from(vec!["a", "x"]))
        );
    }

    #[test]
    fn staged_deletion_is_two_phase() {
        let mut store = store(r#"{ "list": ["a", "b"] }"#);
        let before = serde_json::to_string(&store.document()).unwrap();

        store.stage_deletion("list", Address::Index(0), "a").unwrap();
        assert_eq!(serde_json::to_string(&store.document()).unwrap(), before);
        assert!(store.cancel_deletion().is_some());
        assert_eq!(serde_json::to_string(&store.document()).unwrap(), before);

        store.stage_deletion("list", Address::Index(0), "a").unwrap();
        let audit = store.commit_deletion().unwrap();
        assert_eq!(store.section("list"), Some(&ConfigValue::from(vec!["b"])));
        assert_eq!(audit.before, Some(ConfigValue::from("a")));
        assert_eq!(audit.target.as_deref(), Some("0"));
        assert!(store.pending_deletion().is_none());
    }

    #[test]
    fn commit_fails_when_section_changed_shape() {
        let mut store = store(r#"{ "list": ["a", "b"] }"#);
        store.stage_deletion("list", Address::Index(1), "").unwrap();
        assert_eq!(store.pending_deletion().unwrap().label, "list [1]");

        store
            .replace(ConfigValue::parse_json5(r#"{ "list": { "k": 1 } }"#).unwrap())
            .unwrap();
        assert!(store.pending_deletion().is_none());

        // Stage again against the new shape, then let the section shrink underneath it.
        store.stage_deletion("list", Address::Key("k".to_string()), "k").unwrap();
        store.root.insert("list".to_string(), ConfigValue::from(vec!["z"]));
        assert!(matches!(
            store.commit_deletion(),
            Err(AssistError::InvalidTarget(_))
        ));
        assert!(store.pending_deletion().is_none());
    }

    #[test]
    fn commit_clears_or_shifts_selection() {
        let mut store = store(r#"{ "list": ["a", "b", "c"], "map": { "k": 1, "j": 2 } }"#);
        store.open_section("list");
        store.select(Address::Index(2)).unwrap();
        store.stage_deletion("list", Address::Index(0), "a").unwrap();
        store.commit_deletion().unwrap();
        assert_eq!(store.selection().unwrap().address, Address::Index(1));
        assert_eq!(store.selected_value(), Some(&ConfigValue::from("c")));

        store.stage_deletion("list", Address::Index(1), "c").unwrap();
        store.commit_deletion().unwrap();
        assert!(store.selection().is_none());

        store.open_section("map");
        store.select(Address::Key("k".to_string())).unwrap();
        store.stage_deletion("map", Address::Key("j".to_string()), "j").unwrap();
        store.commit_deletion().unwrap();
        assert!(store.selection().is_some());
        store.stage_deletion("map", Address::Whole, "map").unwrap();
        store.commit_deletion().unwrap();
        assert!(store.selection().is_none());
        assert_eq!(store.open_view(), SectionView::Empty);
    }

    #[test]
    fn set_scalar_only_touches_scalar_sections() {
        let mut store = store(r#"{ "enabled": true, "list": [] }"#);
        store.set_scalar("enabled", ConfigValue::from(false)).unwrap();
        assert_eq!(store.section("enabled"), Some(&ConfigValue::from(false)));
        assert!(store.set_scalar("list", ConfigValue::from(1i64)).is_err());
        assert!(matches!(
            store.set_scalar("enabled", ConfigValue::from(vec![1i64])),
            Err(AssistError::ShapeMismatch { .. })
        ));
        assert!(store.set_scalar("missing", ConfigValue::Null).is_err());
    }
}
