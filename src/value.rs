use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;

/// A number that keeps the distinction between I64, U64 and F64.
/// The backend writes counts as integers and slider weights as floats; an edit must not
/// silently turn one into the other.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Number {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::I64(v) => Some(*v),
            Number::U64(v) => i64::try_from(*v).ok(),
            Number::F64(_) => None,
        }
    }

    fn write(&self, out: &mut String) {
        match self {
            Number::I64(v) => out.push_str(&v.to_string()),
            Number::U64(v) => out.push_str(&v.to_string()),
            Number::F64(v) => {
                if v.is_nan() {
                    out.push_str("NaN");
                } else if v.is_infinite() {
                    if v.is_sign_negative() {
                        out.push_str("-Infinity");
                    } else {
                        out.push_str("Infinity");
                    }
                } else {
                    let mut buf = ryu::Buffer::new();
                    out.push_str(buf.format(*v));
                }
            }
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Number::I64(v) => serializer.serialize_i64(*v),
            Number::U64(v) => serializer.serialize_u64(*v),
            Number::F64(v) => serializer.serialize_f64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NumberVisitor;

        impl<'de> de::Visitor<'de> for NumberVisitor {
            type Value = Number;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Number::I64(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Number::U64(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(Number::F64(v))
            }
        }

        deserializer.deserialize_any(NumberVisitor)
    }
}

/// Structural class of a value, as far as the manual editor cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    Null,
    List,
    Map,
    Primitive,
}

impl ShapeClass {
    pub const fn label(&self) -> &'static str {
        match self {
            ShapeClass::Null => "null",
            ShapeClass::List => "list",
            ShapeClass::Map => "map",
            ShapeClass::Primitive => "primitive",
        }
    }
}

impl fmt::Display for ShapeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shape of a top-level section. Null counts as a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionShape {
    List,
    Map,
    Scalar,
}

impl fmt::Display for SectionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SectionShape::List => "list",
            SectionShape::Map => "map",
            SectionShape::Scalar => "scalar",
        })
    }
}

/// A value in the configuration document (JSON, parsed leniently as JSON5).
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ConfigValue>),
    Object(IndexMap<String, ConfigValue>),
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Object(IndexMap::new())
    }
}

impl ConfigValue {
    pub fn as_object(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.as_object_mut().and_then(|m| m.get_mut(key))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Object(_) => "object",
        }
    }

    pub fn shape_class(&self) -> ShapeClass {
        match self {
            ConfigValue::Null => ShapeClass::Null,
            ConfigValue::Array(_) => ShapeClass::List,
            ConfigValue::Object(_) => ShapeClass::Map,
            ConfigValue::Bool(_) | ConfigValue::Number(_) | ConfigValue::String(_) => {
                ShapeClass::Primitive
            }
        }
    }

    /// False when any number in the tree is NaN or infinite. JSON has no spelling for
    /// those, so they would reach the backend as `null`.
    pub fn is_finite(&self) -> bool {
        match self {
            ConfigValue::Number(Number::F64(v)) => v.is_finite(),
            ConfigValue::Array(values) => values.iter().all(ConfigValue::is_finite),
            ConfigValue::Object(map) => map.values().all(ConfigValue::is_finite),
            _ => true,
        }
    }

    pub fn section_shape(&self) -> SectionShape {
        match self {
            ConfigValue::Array(_) => SectionShape::List,
            ConfigValue::Object(_) => SectionShape::Map,
            _ => SectionShape::Scalar,
        }
    }

    /// Number of direct children (0 for scalars).
    pub fn len(&self) -> usize {
        match self {
            ConfigValue::Array(values) => values.len(),
            ConfigValue::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parse_json5(text: &str) -> anyhow::Result<ConfigValue> {
        Ok(json5::from_str::<ConfigValue>(text)?)
    }

    /// Pretty text for the editor buffer: 4-space indentation, quoted keys.
    pub fn to_pretty_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, 0, true);
        out
    }

    pub fn to_compact_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out, 0, false);
        out
    }

    fn write_text(&self, out: &mut String, indent: usize, pretty: bool) {
        match self {
            ConfigValue::Null => out.push_str("null"),
            ConfigValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
            ConfigValue::Number(n) => n.write(out),
            ConfigValue::String(s) => write_escaped_string(out, s),
            ConfigValue::Array(values) => {
                out.push('[');
                if pretty && !values.is_empty() {
                    out.push('\n');
                }
                for (i, v) in values.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 4));
                    } else if i > 0 {
                        out.push(' ');
                    }
                    v.write_text(out, indent + 4, pretty);
                    if i + 1 != values.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !values.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push(']');
            }
            ConfigValue::Object(map) => {
                out.push('{');
                if pretty && !map.is_empty() {
                    out.push('\n');
                }
                for (i, (k, v)) in map.iter().enumerate() {
                    if pretty {
                        out.push_str(&" ".repeat(indent + 4));
                    } else if i > 0 {
                        out.push(' ');
                    }
                    write_escaped_string(out, k);
                    out.push(':');
                    if pretty {
                        out.push(' ');
                    }
                    v.write_text(out, indent + 4, pretty);
                    if i + 1 != map.len() {
                        out.push(',');
                    }
                    if pretty {
                        out.push('\n');
                    }
                }
                if pretty && !map.is_empty() {
                    out.push_str(&" ".repeat(indent));
                }
                out.push('}');
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact_text())
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(Number::I64(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(Number::F64(value))
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(values: Vec<T>) -> Self {
        ConfigValue::Array(values.into_iter().map(Into::into).collect())
    }
}

fn write_escaped_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write as _;
                write!(out, "\\u{:04X}", c as u32).ok();
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Null => serializer.serialize_unit(),
            ConfigValue::Bool(v) => serializer.serialize_bool(*v),
            ConfigValue::Number(n) => n.serialize(serializer),
            ConfigValue::String(s) => serializer.serialize_str(s),
            ConfigValue::Array(values) => values.serialize(serializer),
            ConfigValue::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> de::Visitor<'de> for ValueVisitor {
            type Value = ConfigValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ConfigValue::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ConfigValue::Null)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ConfigValue::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ConfigValue::Number(Number::I64(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ConfigValue::Number(Number::U64(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ConfigValue::Number(Number::F64(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ConfigValue::String(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(ConfigValue::String(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element::<ConfigValue>()? {
                    values.push(value);
                }
                Ok(ConfigValue::Array(values))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut values = IndexMap::new();
                while let Some((key, value)) = map.next_entry::<String, ConfigValue>()? {
                    values.insert(key, value);
                }
                Ok(ConfigValue::Object(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigValue, Number, SectionShape, ShapeClass};
    use indexmap::IndexMap;

    #[test]
    fn parse_json5_accepts_relaxed_syntax() {
        let v = ConfigValue::parse_json5("{ npc: { Lydia: ['PresetA',], }, // trailing\n }").unwrap();
        let lydia = v.get("npc").and_then(|n| n.get("Lydia")).unwrap();
        assert_eq!(lydia, &ConfigValue::from(vec!["PresetA"]));
    }

    #[test]
    fn parse_json5_keeps_integer_and_float_apart() {
        let v = ConfigValue::parse_json5("[1, 1.5]").unwrap();
        let items = v.as_array().unwrap();
        assert_eq!(items[0], ConfigValue::Number(Number::I64(1)));
        assert_eq!(items[1], ConfigValue::Number(Number::F64(1.5)));
    }

    #[test]
    fn shape_class_groups_primitives() {
        assert_eq!(ConfigValue::Null.shape_class(), ShapeClass::Null);
        assert_eq!(ConfigValue::from(42i64).shape_class(), ShapeClass::Primitive);
        assert_eq!(ConfigValue::from("hello").shape_class(), ShapeClass::Primitive);
        assert_eq!(ConfigValue::from(true).shape_class(), ShapeClass::Primitive);
        assert_eq!(ConfigValue::from(vec![1i64]).shape_class(), ShapeClass::List);
        assert_eq!(
            ConfigValue::Object(IndexMap::new()).shape_class(),
            ShapeClass::Map
        );
    }

    #[test]
    fn null_sections_are_scalars() {
        assert_eq!(ConfigValue::Null.section_shape(), SectionShape::Scalar);
        assert_eq!(ConfigValue::from(vec!["a"]).section_shape(), SectionShape::List);
    }

    #[test]
    fn pretty_text_is_valid_json() {
        let v = ConfigValue::parse_json5(r#"{ "npc": { "Lydia": ["A", "B"] }, "flag": true }"#).unwrap();
        let text = v.to_pretty_text();
        assert_eq!(
            text,
            "{\n    \"npc\": {\n        \"Lydia\": [\n            \"A\",\n            \"B\"\n        ]\n    },\n    \"flag\": true\n}"
        );
        let back: ConfigValue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn compact_text_escapes_quotes() {
        let v = ConfigValue::from("say \"hi\"");
        assert_eq!(v.to_compact_text(), "\"say \\\"hi\\\"\"");
    }
}
