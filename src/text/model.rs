//! Element and span models for collaborative text.
//!
//! A text position holds either a single character or an opaque embedded value.
//! Embedded values travel as `serde_json::Value` and are stored in the document
//! as native Automerge values, so other replicas see ordinary maps and lists.

use std::collections::HashMap;
use std::fmt;

use automerge::{ObjId, ObjType, ScalarValue, Value};
use autosurgeon::reconcile::NoKey;
use autosurgeon::{HydrateError, ReadDoc, Reconcile, Reconciler};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Placeholder emitted for embedded values in the flattened string view
/// (U+FFFC OBJECT REPLACEMENT CHARACTER).
pub const EMBED_MARKER: char = '\u{FFFC}';

// =============================================================================
// ELEMENT
// =============================================================================

/// One position in a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    /// A single Unicode scalar value.
    Character(char),
    /// An opaque non-character value (image, mention, block marker, ...).
    Embedded(JsonValue),
}

impl Element {
    /// Creates an embedded element.
    pub fn embedded(value: impl Into<JsonValue>) -> Self {
        Self::Embedded(value.into())
    }

    /// Returns the character, if this is one.
    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Character(c) => Some(*c),
            Self::Embedded(_) => None,
        }
    }

    /// Returns the embedded value, if this is one.
    pub fn as_embedded(&self) -> Option<&JsonValue> {
        match self {
            Self::Character(_) => None,
            Self::Embedded(value) => Some(value),
        }
    }

    /// Returns true for character elements.
    pub fn is_character(&self) -> bool {
        matches!(self, Self::Character(_))
    }

    /// Returns true for embedded elements.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

impl From<char> for Element {
    fn from(c: char) -> Self {
        Self::Character(c)
    }
}

/// Characters render as themselves, embedded values as compact JSON.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character(c) => write!(f, "{}", c),
            Self::Embedded(value) => write!(f, "{}", value),
        }
    }
}

// =============================================================================
// SPAN
// =============================================================================

/// A grouped view of a text: a run of consecutive characters, or one embedded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Span {
    Text(String),
    Embedded(JsonValue),
}

impl Span {
    /// Returns the run of characters, if this span is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Embedded(_) => None,
        }
    }
}

// =============================================================================
// CONSTRUCTION INPUT
// =============================================================================

/// The accepted shapes for building a text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TextInput {
    /// Decomposed into one character element per Unicode scalar value.
    Str(String),
    /// Used as-is.
    Elements(Vec<Element>),
    #[default]
    Empty,
}

impl From<&str> for TextInput {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for TextInput {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Element>> for TextInput {
    fn from(elements: Vec<Element>) -> Self {
        Self::Elements(elements)
    }
}

/// Returns the character if `s` holds exactly one scalar value.
pub(crate) fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

// =============================================================================
// RECONCILE
// =============================================================================

/// Characters are written as one-character strings; embedded values as native
/// Automerge scalars, maps and lists.
impl Reconcile for Element {
    type Key<'a> = NoKey;

    fn reconcile<R: Reconciler>(&self, mut reconciler: R) -> Result<(), R::Error> {
        match self {
            Element::Character(c) => reconciler.str(c.to_string()),
            Element::Embedded(value) => JsonRef(value).reconcile(reconciler),
        }
    }
}

/// Borrowed JSON value, reconciled structurally.
struct JsonRef<'a>(&'a JsonValue);

impl Reconcile for JsonRef<'_> {
    type Key<'a> = NoKey;

    fn reconcile<R: Reconciler>(&self, mut reconciler: R) -> Result<(), R::Error> {
        match self.0 {
            JsonValue::Null => reconciler.none(),
            JsonValue::Bool(b) => reconciler.boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    reconciler.i64(i)
                } else if let Some(u) = n.as_u64() {
                    reconciler.u64(u)
                } else {
                    reconciler.f64(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => reconciler.str(s),
            JsonValue::Array(items) => {
                let items: Vec<JsonRef<'_>> = items.iter().map(JsonRef).collect();
                items.reconcile(reconciler)
            }
            JsonValue::Object(fields) => {
                let fields: HashMap<String, JsonRef<'_>> = fields
                    .iter()
                    .map(|(key, value)| (key.clone(), JsonRef(value)))
                    .collect();
                fields.reconcile(reconciler)
            }
        }
    }
}

// =============================================================================
// HYDRATE HELPERS
// =============================================================================

/// Reads the element at `index` of the list `obj`.
///
/// A one-character string is a character; every other value is embedded.
pub(crate) fn hydrate_element<D: ReadDoc>(
    doc: &D,
    obj: &ObjId,
    index: usize,
) -> Result<Element, HydrateError> {
    match doc.get(obj, index)? {
        Some((Value::Scalar(s), _)) => Ok(match s.as_ref() {
            ScalarValue::Str(st) => match single_char(st) {
                Some(c) => Element::Character(c),
                None => Element::Embedded(JsonValue::String(st.to_string())),
            },
            other => Element::Embedded(scalar_to_json(other)),
        }),
        Some((Value::Object(obj_type), id)) => {
            Ok(Element::Embedded(object_to_json(doc, &id, obj_type)?))
        }
        None => Ok(Element::Embedded(JsonValue::Null)),
    }
}

fn value_to_json<D: ReadDoc>(
    doc: &D,
    value: Value<'_>,
    id: &ObjId,
) -> Result<JsonValue, HydrateError> {
    match value {
        Value::Scalar(s) => Ok(scalar_to_json(s.as_ref())),
        Value::Object(obj_type) => object_to_json(doc, id, obj_type),
    }
}

fn object_to_json<D: ReadDoc>(
    doc: &D,
    obj: &ObjId,
    obj_type: ObjType,
) -> Result<JsonValue, HydrateError> {
    match obj_type {
        ObjType::Text => Ok(JsonValue::String(doc.text(obj)?)),
        ObjType::List => {
            let mut items = Vec::with_capacity(doc.length(obj));
            for index in 0..doc.length(obj) {
                if let Some((value, id)) = doc.get(obj, index)? {
                    items.push(value_to_json(doc, value, &id)?);
                }
            }
            Ok(JsonValue::Array(items))
        }
        _ => {
            let keys: Vec<String> = doc
                .map_range(obj, ..)
                .map(|item| item.key.to_string())
                .collect();
            let mut fields = serde_json::Map::new();
            for key in keys {
                if let Some((value, id)) = doc.get(obj, key.as_str())? {
                    let json = value_to_json(doc, value, &id)?;
                    fields.insert(key, json);
                }
            }
            Ok(JsonValue::Object(fields))
        }
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> JsonValue {
    match scalar {
        ScalarValue::Null => JsonValue::Null,
        ScalarValue::Boolean(b) => JsonValue::Bool(*b),
        ScalarValue::Int(i) | ScalarValue::Timestamp(i) => JsonValue::from(*i),
        ScalarValue::Uint(u) => JsonValue::from(*u),
        ScalarValue::F64(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ScalarValue::Str(s) => JsonValue::String(s.to_string()),
        ScalarValue::Bytes(bytes) => {
            JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
        }
        // Counters and unknown scalar types carry no meaning as embeds.
        _ => JsonValue::Null,
    }
}

/// Converts a JSON scalar to an Automerge scalar; `None` for arrays and objects.
pub(crate) fn json_to_scalar(value: &JsonValue) -> Option<ScalarValue> {
    match value {
        JsonValue::Null => Some(ScalarValue::Null),
        JsonValue::Bool(b) => Some(ScalarValue::Boolean(*b)),
        JsonValue::Number(n) => Some(if let Some(i) = n.as_i64() {
            ScalarValue::Int(i)
        } else if let Some(u) = n.as_u64() {
            ScalarValue::Uint(u)
        } else {
            ScalarValue::F64(n.as_f64().unwrap_or_default())
        }),
        JsonValue::String(s) => Some(ScalarValue::Str(s.as_str().into())),
        JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_element_accessors() {
        let c = Element::from('a');
        assert!(c.is_character());
        assert_eq!(c.as_char(), Some('a'));
        assert_eq!(c.as_embedded(), None);

        let e = Element::embedded(json!({"x": 3}));
        assert!(e.is_embedded());
        assert_eq!(e.as_char(), None);
        assert_eq!(e.as_embedded(), Some(&json!({"x": 3})));
    }

    #[test]
    fn test_element_display() {
        assert_eq!(Element::from('q').to_string(), "q");
        assert_eq!(Element::embedded(json!({"x": 1})).to_string(), r#"{"x":1}"#);
    }

    #[test]
    fn test_single_char() {
        assert_eq!(single_char("a"), Some('a'));
        assert_eq!(single_char("é"), Some('é'));
        assert_eq!(single_char(""), None);
        assert_eq!(single_char("ab"), None);
    }

    #[test]
    fn test_span_serializes_untagged() {
        let spans = vec![
            Span::Text("ab".to_string()),
            Span::Embedded(json!({"x": 3})),
            Span::Text("cd".to_string()),
        ];
        assert_eq!(serde_json::to_value(&spans).unwrap(), json!(["ab", {"x": 3}, "cd"]));
    }

    #[test]
    fn test_json_to_scalar() {
        assert_eq!(json_to_scalar(&json!(null)), Some(ScalarValue::Null));
        assert_eq!(json_to_scalar(&json!(true)), Some(ScalarValue::Boolean(true)));
        assert_eq!(json_to_scalar(&json!(-4)), Some(ScalarValue::Int(-4)));
        assert_eq!(json_to_scalar(&json!(1.5)), Some(ScalarValue::F64(1.5)));
        assert_eq!(json_to_scalar(&json!([1])), None);
        assert_eq!(json_to_scalar(&json!({"a": 1})), None);
    }
}
