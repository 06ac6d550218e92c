//! The `Text` value: an ordered run of characters and embedded values.
//!
//! A `Text` is either a local scratch value (detached) or a view of text stored
//! in a [`TextDocument`](super::TextDocument) (attached). Detached texts are
//! edited in place. Attached texts refuse direct edits; those go through the
//! document's change blocks so concurrent replicas can merge them.
//!
//! # Caching Strategy
//!
//! - `cached_string`: flattened string, built on first read
//! - `cached_spans`: span-grouped view, built on first read
//!
//! Both are cleared by every successful edit.

use std::cell::OnceCell;
use std::fmt;
use std::ops::{Bound, RangeBounds};

use automerge::{ObjId, ObjType};
use autosurgeon::reconcile::{NoKey, SeqReconciler};
use autosurgeon::{Hydrate, HydrateError, ReadDoc, Reconcile, Reconciler};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use super::attachment::{Attachment, Binding, SequenceValue};
use super::model::{hydrate_element, single_char, Element, Span, TextInput, EMBED_MARKER};
use crate::error::{TextError, TextResult};

/// Iterator over the elements of a text, in order.
pub type Iter<'a> = std::slice::Iter<'a, Element>;

/// A replicable rich-text value.
#[derive(Clone, Default)]
pub struct Text {
    elements: Vec<Element>,
    attachment: Attachment,
    cached_string: OnceCell<String>,
    cached_spans: OnceCell<Vec<Span>>,
}

impl Text {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Creates an empty, detached text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a detached text from one of the accepted input shapes.
    pub fn from_input(input: TextInput) -> Self {
        let elements = match input {
            TextInput::Str(s) => s.chars().map(Element::Character).collect(),
            TextInput::Elements(elements) => elements,
            TextInput::Empty => Vec::new(),
        };
        Self {
            elements,
            ..Self::default()
        }
    }

    // =========================================================================
    // ATTACHMENT
    // =========================================================================

    /// Returns the binding state.
    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    /// Returns true if this text is a view of document state.
    pub fn is_attached(&self) -> bool {
        self.attachment.is_attached()
    }

    /// Returns the document binding, if attached.
    pub fn binding(&self) -> Option<&Binding> {
        self.attachment.binding()
    }

    pub(crate) fn attach(mut self, binding: Binding) -> Self {
        self.attachment = Attachment::Attached(binding);
        self
    }

    /// Fails with `IllegalMutation` when bound to a document.
    fn ensure_detached(&self, op: &'static str) -> TextResult<()> {
        if let Attachment::Attached(binding) = &self.attachment {
            let path = binding.display_path();
            tracing::debug!(%path, op, "rejected direct edit of bound text");
            return Err(TextError::illegal_mutation(path));
        }
        Ok(())
    }

    fn invalidate_caches(&mut self) {
        self.cached_string.take();
        self.cached_spans.take();
    }

    // =========================================================================
    // MUTATION (detached only)
    // =========================================================================

    /// Replaces the element at `index`.
    pub fn set(&mut self, index: usize, value: impl Into<Element>) -> TextResult<()> {
        self.ensure_detached("set")?;
        let length = self.elements.len();
        let slot = self
            .elements
            .get_mut(index)
            .ok_or_else(|| TextError::out_of_range(index, length))?;
        *slot = value.into();
        self.invalidate_caches();
        Ok(())
    }

    /// Inserts `values` starting at `index`; `index == len()` appends.
    pub fn insert_at<I>(&mut self, index: usize, values: I) -> TextResult<()>
    where
        I: IntoIterator<Item = Element>,
    {
        self.ensure_detached("insert_at")?;
        if index > self.elements.len() {
            return Err(TextError::out_of_range(index, self.elements.len()));
        }
        self.elements.splice(index..index, values);
        self.invalidate_caches();
        Ok(())
    }

    /// Inserts the characters of `s` starting at `index`.
    pub fn insert_str(&mut self, index: usize, s: &str) -> TextResult<()> {
        self.insert_at(index, s.chars().map(Element::Character))
    }

    /// Appends one element.
    pub fn push(&mut self, value: impl Into<Element>) -> TextResult<()> {
        let end = self.elements.len();
        self.insert_at(end, [value.into()])
    }

    /// Removes up to `count` elements starting at `index`.
    ///
    /// Ranges running past the end are truncated; an `index` past the end
    /// removes nothing.
    pub fn delete_at(&mut self, index: usize, count: usize) -> TextResult<()> {
        self.ensure_detached("delete_at")?;
        let start = index.min(self.elements.len());
        let end = index.saturating_add(count).min(self.elements.len());
        if start < end {
            self.elements.drain(start..end);
            self.invalidate_caches();
        }
        Ok(())
    }

    // =========================================================================
    // DERIVED VIEWS
    // =========================================================================

    /// Flattened string; embedded values appear as [`EMBED_MARKER`].
    pub fn as_str(&self) -> &str {
        self.cached_string.get_or_init(|| {
            tracing::trace!(len = self.elements.len(), "building string view");
            self.elements
                .iter()
                .map(|element| element.as_char().unwrap_or(EMBED_MARKER))
                .collect()
        })
    }

    /// Characters grouped into maximal runs, each embedded value on its own.
    pub fn spans(&self) -> &[Span] {
        self.cached_spans.get_or_init(|| {
            tracing::trace!(len = self.elements.len(), "building span view");
            let mut spans = Vec::new();
            let mut run = String::new();
            for element in &self.elements {
                match element {
                    Element::Character(c) => run.push(*c),
                    Element::Embedded(value) => {
                        if !run.is_empty() {
                            spans.push(Span::Text(std::mem::take(&mut run)));
                        }
                        spans.push(Span::Embedded(value.clone()));
                    }
                }
            }
            if !run.is_empty() {
                spans.push(Span::Text(run));
            }
            spans
        })
    }

    /// JSON form: the flattened string. Embedded values are lost; use
    /// [`spans`](Self::spans) or [`elements`](Self::elements) to keep them.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::String(self.as_str().to_string())
    }

    // =========================================================================
    // SEQUENCE OPERATIONS
    // =========================================================================

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements, in order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Iterates from the first element; every call starts over.
    pub fn iter(&self) -> Iter<'_> {
        self.elements.iter()
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&Element) -> T,
    {
        self.elements.iter().map(f).collect()
    }

    /// New detached text holding the elements matching `predicate`.
    pub fn filter<F>(&self, mut predicate: F) -> Text
    where
        F: FnMut(&Element) -> bool,
    {
        self.elements
            .iter()
            .filter(|element| predicate(element))
            .cloned()
            .collect()
    }

    pub fn find<F>(&self, mut predicate: F) -> Option<&Element>
    where
        F: FnMut(&Element) -> bool,
    {
        self.elements.iter().find(|element| predicate(element))
    }

    pub fn find_index<F>(&self, predicate: F) -> Option<usize>
    where
        F: FnMut(&Element) -> bool,
    {
        self.elements.iter().position(predicate)
    }

    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Element),
    {
        self.elements.iter().for_each(f);
    }

    pub fn includes(&self, element: &Element) -> bool {
        self.elements.contains(element)
    }

    pub fn index_of(&self, element: &Element) -> Option<usize> {
        self.elements.iter().position(|e| e == element)
    }

    pub fn last_index_of(&self, element: &Element) -> Option<usize> {
        self.elements.iter().rposition(|e| e == element)
    }

    /// Renders every element (embedded values as compact JSON) separated by `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.elements
            .iter()
            .map(Element::to_string)
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// Folds from the first element to the last.
    pub fn reduce<T, F>(&self, init: T, f: F) -> T
    where
        F: FnMut(T, &Element) -> T,
    {
        self.elements.iter().fold(init, f)
    }

    /// Folds from the last element to the first.
    pub fn reduce_right<T, F>(&self, init: T, f: F) -> T
    where
        F: FnMut(T, &Element) -> T,
    {
        self.elements.iter().rev().fold(init, f)
    }

    /// New detached text holding the elements in `range`, clamped to the text.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Text {
        let len = self.elements.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .min(len);
        if start >= end {
            return Text::new();
        }
        Text::from(self.elements[start..end].to_vec())
    }

    pub fn some<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Element) -> bool,
    {
        self.elements.iter().any(predicate)
    }

    pub fn every<F>(&self, predicate: F) -> bool
    where
        F: FnMut(&Element) -> bool,
    {
        self.elements.iter().all(predicate)
    }

    /// New detached text: this text's elements followed by `other`'s.
    pub fn concat(&self, other: &Text) -> Text {
        self.elements
            .iter()
            .chain(other.elements.iter())
            .cloned()
            .collect()
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self::from_input(TextInput::from(s))
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Self::from_input(TextInput::Str(s))
    }
}

impl From<Vec<Element>> for Text {
    fn from(elements: Vec<Element>) -> Self {
        Self::from_input(TextInput::Elements(elements))
    }
}

impl From<TextInput> for Text {
    fn from(input: TextInput) -> Self {
        Self::from_input(input)
    }
}

impl FromIterator<Element> for Text {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl FromIterator<char> for Text {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        iter.into_iter().map(Element::Character).collect()
    }
}

/// Loosely-typed input: a string, an array of elements, or `null`.
///
/// Array items that are one-character strings become characters; every other
/// item is embedded.
impl TryFrom<JsonValue> for Text {
    type Error = TextError;

    fn try_from(value: JsonValue) -> TextResult<Self> {
        let input = match value {
            JsonValue::Null => TextInput::Empty,
            JsonValue::String(s) => TextInput::Str(s),
            JsonValue::Array(items) => TextInput::Elements(
                items
                    .into_iter()
                    .map(|item| match item.as_str().and_then(single_char) {
                        Some(c) => Element::Character(c),
                        None => Element::Embedded(item),
                    })
                    .collect(),
            ),
            other => {
                return Err(TextError::invalid_argument(format!(
                    "cannot build a text from {}",
                    other
                )))
            }
        };
        Ok(Self::from_input(input))
    }
}

impl<'a> IntoIterator for &'a Text {
    type Item = &'a Element;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Text")
            .field("elements", &self.elements)
            .field("attachment", &self.attachment)
            .finish()
    }
}

/// Value equality over elements; attachment is not compared.
impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Serialize for Text {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Text::try_from(value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// DOCUMENT INTEGRATION
// =============================================================================

impl SequenceValue for Text {
    const OBJ_TYPE: ObjType = ObjType::List;

    /// Native Automerge text objects read as characters only.
    fn is_stored_as(obj_type: ObjType) -> bool {
        obj_type == Self::OBJ_TYPE || obj_type == ObjType::Text
    }
}

/// Writes the elements as a list, updating in place and trimming the tail.
impl Reconcile for Text {
    type Key<'a> = NoKey;

    fn reconcile<R: Reconciler>(&self, mut reconciler: R) -> Result<(), R::Error> {
        let mut seq = reconciler.seq()?;
        let existing = seq.len()?;
        for (index, element) in self.elements.iter().enumerate() {
            if index < existing {
                seq.set(index, element)?;
            } else {
                seq.insert(index, element)?;
            }
        }
        for index in (self.elements.len()..existing).rev() {
            seq.delete(index)?;
        }
        Ok(())
    }
}

/// Hydrated texts are detached snapshots; bound views come from
/// [`TextDocument::text`](super::TextDocument::text).
impl Hydrate for Text {
    fn hydrate_seq<D: ReadDoc>(doc: &D, obj: &ObjId) -> Result<Self, HydrateError> {
        let elements = (0..doc.length(obj))
            .map(|index| hydrate_element(doc, obj, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Text::from(elements))
    }

    fn hydrate_text<D: ReadDoc>(doc: &D, obj: &ObjId) -> Result<Self, HydrateError> {
        Ok(Text::from(doc.text(obj)?))
    }

    fn hydrate_string(string: &'_ str) -> Result<Self, HydrateError> {
        Ok(Text::from(string))
    }
}

// =============================================================================
// TESTS
// =============================================================================
