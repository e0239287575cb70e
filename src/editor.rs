use crate::ConfigValue;
use crate::document::DocumentStore;
use crate::error::{AssistError, Result};
use crate::gateway::AuditRecord;
use crate::statics;

/// Raw-text editing of the selected value, guarded by a coarse shape check.
///
/// The check only stops typos that would turn a map into a list (or a value into
/// null, and so on); it is not schema validation. The mode is off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualEditValidator {
    enabled: bool,
}

impl ManualEditValidator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Text to pre-fill the edit buffer with.
    pub fn buffer_for(store: &DocumentStore) -> Option<String> {
        store.selected_value().map(ConfigValue::to_pretty_text)
    }

    /// Parses and shape-checks `raw` without touching the store.
    pub fn check(store: &DocumentStore, raw: &str) -> Result<ConfigValue> {
        let current = store
            .selected_value()
            .ok_or_else(|| AssistError::invalid_target(statics::EN_ERR_NO_SELECTION))?;
        let parsed = ConfigValue::parse_json5(raw)
            .map_err(|e| AssistError::MalformedInput(e.to_string()))?;
        if !parsed.is_finite() {
            return Err(AssistError::MalformedInput(
                statics::EN_ERR_NON_FINITE.to_string(),
            ));
        }

        let expected = current.shape_class();
        let found = parsed.shape_class();
        if expected != found {
            return Err(AssistError::ShapeMismatch { expected, found });
        }
        Ok(parsed)
    }

    /// Replaces the selected value with `raw` if it parses and keeps the shape class.
    /// On any error the store is left untouched.
    pub fn apply(&self, store: &mut DocumentStore, raw: &str) -> Result<AuditRecord> {
        if !self.enabled {
            return Err(AssistError::ManualEditDisabled);
        }
        let parsed = Self::check(store, raw)?;
        store.replace_selected(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::ManualEditValidator;
    use crate::ConfigValue;
    use crate::document::{Address, DocumentStore};
    use crate::error::AssistError;
    use crate::value::ShapeClass;

    fn selected(text: &str, section: &str, address: Address) -> DocumentStore {
        let mut store =
            DocumentStore::from_document(ConfigValue::parse_json5(text).unwrap()).unwrap();
        store.open_section(section);
        store.select(address).unwrap();
        store
    }

    #[test]
    fn disabled_mode_rejects_everything() {
        let mut store = selected(r#"{ "n": 42 }"#, "n", Address::Whole);
        let editor = ManualEditValidator::default();
        assert!(matches!(
            editor.apply(&mut store, "43"),
            Err(AssistError::ManualEditDisabled)
        ));
        assert_eq!(store.section("n"), Some(&ConfigValue::from(42i64)));
    }

    #[test]
    fn primitive_to_primitive_is_accepted() {
        let mut store = selected(r#"{ "n": 42 }"#, "n", Address::Whole);
        let editor = ManualEditValidator::new(true);
        let audit = editor.apply(&mut store, r#""hello""#).unwrap();
        assert_eq!(store.section("n"), Some(&ConfigValue::from("hello")));
        assert_eq!(audit.before, Some(ConfigValue::from(42i64)));
    }

    #[test]
    fn map_replaced_by_list_is_rejected() {
        let mut store = selected(r#"{ "npc": { "Lydia": ["A"] } }"#, "npc", Address::Whole);
        let before = store.document();
        let editor = ManualEditValidator::new(true);
        let err = editor.apply(&mut store, "[1,2]").unwrap_err();
        assert!(matches!(
            err,
            AssistError::ShapeMismatch {
                expected: ShapeClass::Map,
                found: ShapeClass::List
            }
        ));
        assert_eq!(store.document(), before);
    }

    #[test]
    fn malformed_text_is_rejected() {
        let mut store = selected(r#"{ "npc": { "Lydia": ["A"] } }"#, "npc", Address::Key("Lydia".to_string()));
        let editor = ManualEditValidator::new(true);
        assert!(matches!(
            editor.apply(&mut store, "[\"A\","),
            Err(AssistError::MalformedInput(_))
        ));
        assert!(editor.apply(&mut store, "[\"A\", \"B\"]").is_ok());
        assert_eq!(
            store.selected_value(),
            Some(&ConfigValue::from(vec!["A", "B"]))
        );
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut store = selected(r#"{ "weight": 0.5 }"#, "weight", Address::Whole);
        let editor = ManualEditValidator::new(true);
        for raw in ["Infinity", "-Infinity", "NaN"] {
            assert!(matches!(
                editor.apply(&mut store, raw),
                Err(AssistError::MalformedInput(_))
            ));
        }
        assert_eq!(store.section("weight"), Some(&ConfigValue::from(0.5)));

        let mut store = selected(r#"{ "npc": { "Lydia": [1] } }"#, "npc", Address::Whole);
        assert!(matches!(
            editor.apply(&mut store, r#"{ "Lydia": [NaN] }"#),
            Err(AssistError::MalformedInput(_))
        ));
        assert!(editor.apply(&mut store, r#"{ "Lydia": [1.5] }"#).is_ok());
    }

    #[test]
    fn null_only_matches_null() {
        let mut store = selected(r#"{ "list": [null, 1] }"#, "list", Address::Index(0));
        let editor = ManualEditValidator::new(true);
        assert!(editor.apply(&mut store, "1").is_err());
        assert!(editor.apply(&mut store, "null").is_ok());
    }

    #[test]
    fn buffer_is_pretty_text_of_selection() {
        let store = selected(r#"{ "list": [{ "a": 1 }] }"#, "list", Address::Index(0));
        assert_eq!(
            ManualEditValidator::buffer_for(&store).as_deref(),
            Some("{\n    \"a\": 1\n}")
        );
    }
}
