//! Document binding for texts, with a hybrid operations pattern.
//!
//! `TextDocument` wraps an Automerge document and provides:
//! - Bulk writes of whole texts via autosurgeon reconcile (`put_text`)
//! - Bound (attached) views of stored texts (`text`)
//! - Change blocks issuing targeted list operations for character-level edits

use std::collections::HashMap;

use automerge::{
    transaction::{CommitOptions, Transactable},
    AutoCommit, ChangeHash, ObjId, ObjType, Prop, ReadDoc, ScalarValue, Value, ROOT,
};
use autosurgeon::{reconcile_prop, Hydrate};
use serde_json::Value as JsonValue;

use super::attachment::{Binding, SequenceValue};
use super::model::{json_to_scalar, Element};
use super::value::Text;
use crate::error::{TextError, TextResult};

type PathKey = Vec<String>;

/// A resolved text object and the Automerge type it is stored as.
type TextObj = (ObjId, ObjType);

/// A replicated document holding texts at paths of map keys.
///
/// # Caching Strategy
///
/// - `cached_objs`: ObjId of each resolved text, invalidated on put/merge/sync/delete
/// - `cached_texts`: hydrated bound views, invalidated on any mutation
pub struct TextDocument {
    doc: AutoCommit,
    cached_objs: HashMap<PathKey, TextObj>,
    cached_texts: HashMap<PathKey, Text>,
}

impl TextDocument {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a new empty document.
    pub fn new() -> Self {
        Self {
            doc: AutoCommit::new(),
            cached_objs: HashMap::new(),
            cached_texts: HashMap::new(),
        }
    }

    /// Creates a document from saved binary data.
    pub fn from_bytes(bytes: &[u8]) -> TextResult<Self> {
        let doc = AutoCommit::load(bytes)?;
        Ok(Self {
            doc,
            cached_objs: HashMap::new(),
            cached_texts: HashMap::new(),
        })
    }

    /// Saves the document to binary format.
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Returns the current heads (for sync protocol).
    pub fn get_heads(&mut self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    /// Gets the actor ID for this document instance.
    pub fn actor_id(&self) -> String {
        self.doc.get_actor().to_hex_string()
    }

    /// Invalidates all caches. Call after any operation that might change document structure.
    fn invalidate_all_caches(&mut self) {
        self.cached_objs.clear();
        self.cached_texts.clear();
    }

    // =========================================================================
    // WHOLE-TEXT OPERATIONS (via Reconcile/Hydrate)
    // =========================================================================

    /// Stores `text` at `path`, creating intermediate maps, and returns the bound view.
    ///
    /// An existing text at `path` is updated in place. Any other value there,
    /// including a map holding further texts, is replaced.
    pub fn put_text(&mut self, path: &[&str], text: &Text) -> TextResult<Text> {
        let (key, parents) = split_path(path)?;
        let parent = self.ensure_map_path(parents)?;
        reconcile_prop(&mut self.doc, &parent, *key, text)?;
        // Object ids below `path` may now belong to a deleted subtree.
        self.invalidate_all_caches();
        tracing::debug!(path = %path.join("."), len = text.len(), "stored text");
        self.text(path)
    }

    /// Returns the text at `path`, bound to this document.
    pub fn text(&mut self, path: &[&str]) -> TextResult<Text> {
        let key = owned_path(path);
        if let Some(cached) = self.cached_texts.get(&key) {
            return Ok(cached.clone());
        }
        let (obj, obj_type) = resolve_text_obj(&self.doc, &mut self.cached_objs, path)?;
        let text = match obj_type {
            ObjType::Text => Text::hydrate_text(&self.doc, &obj)?,
            _ => Text::hydrate_seq(&self.doc, &obj)?,
        };
        let text = text.attach(Binding::new(obj, key.clone()));
        self.cached_texts.insert(key, text.clone());
        Ok(text)
    }

    /// Removes the text at `path`.
    pub fn delete_text(&mut self, path: &[&str]) -> TextResult<()> {
        let (key, parents) = split_path(path)?;
        let mut parent = ROOT;
        for segment in parents {
            parent = get_obj_at_key(&self.doc, &parent, segment)?;
        }
        if self.doc.get(&parent, *key)?.is_none() {
            return Err(TextError::field_not_found(path.join(".")));
        }
        self.doc.delete(&parent, *key)?;
        self.invalidate_all_caches();
        Ok(())
    }

    // =========================================================================
    // CHANGE BLOCKS (targeted list operations)
    // =========================================================================

    /// Runs `f` as one atomic change.
    ///
    /// Operations issued by `f` are committed together when it returns `Ok` and
    /// rolled back when it returns `Err`.
    pub fn change<T, F>(&mut self, f: F) -> TextResult<T>
    where
        F: FnOnce(&mut ChangeBlock<'_>) -> TextResult<T>,
    {
        self.change_with(CommitOptions::default(), f)
    }

    /// Like [`change`](Self::change), with a commit message.
    pub fn change_with_message<T, F>(&mut self, message: &str, f: F) -> TextResult<T>
    where
        F: FnOnce(&mut ChangeBlock<'_>) -> TextResult<T>,
    {
        self.change_with(CommitOptions::default().with_message(message), f)
    }

    fn change_with<T, F>(&mut self, options: CommitOptions, f: F) -> TextResult<T>
    where
        F: FnOnce(&mut ChangeBlock<'_>) -> TextResult<T>,
    {
        // Seal earlier operations so a rollback only drops this block's.
        let sealed = self.doc.commit();
        tracing::trace!(?sealed, "sealed pending operations");
        self.cached_texts.clear();

        let mut block = ChangeBlock {
            doc: &mut self.doc,
            objs: &mut self.cached_objs,
        };
        match f(&mut block) {
            Ok(value) => {
                let hash = self.doc.commit_with(options);
                tracing::debug!(?hash, "committed change block");
                Ok(value)
            }
            Err(err) => {
                let cancelled = self.doc.rollback();
                tracing::debug!(cancelled, error = %err, "rolled back change block");
                Err(err)
            }
        }
    }

    // =========================================================================
    // SYNC OPERATIONS
    // =========================================================================

    /// Merges another document into this one.
    pub fn merge(&mut self, other: &mut Self) -> TextResult<()> {
        self.invalidate_all_caches(); // Must invalidate topology cache on merge
        self.doc.merge(&mut other.doc)?;
        Ok(())
    }

    /// Generates sync message for incremental sync.
    /// Returns None if there are no changes since their_heads.
    pub fn generate_sync_message(&mut self, their_heads: &[ChangeHash]) -> Option<Vec<u8>> {
        let changes = self.doc.get_changes(their_heads);
        if changes.is_empty() {
            return None;
        }
        let mut bytes = Vec::new();
        for change in changes {
            bytes.extend_from_slice(change.raw_bytes());
        }
        Some(bytes)
    }

    /// Applies sync message from peer.
    pub fn apply_sync_message(&mut self, msg: &[u8]) -> TextResult<()> {
        self.invalidate_all_caches(); // Must invalidate topology cache on sync
        self.doc.load_incremental(msg)?;
        Ok(())
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    /// Walks `path` from the root, creating missing maps.
    fn ensure_map_path(&mut self, path: &[&str]) -> TextResult<ObjId> {
        let mut obj = ROOT;
        for segment in path {
            let existing = self.doc.get(&obj, *segment)?.map(|(value, id)| {
                let is_map = matches!(value, Value::Object(ObjType::Map | ObjType::Table));
                (is_map, id)
            });
            obj = match existing {
                Some((true, id)) => id,
                Some((false, _)) => {
                    return Err(TextError::schema_violation(format!(
                        "'{}' is not a map",
                        segment
                    )))
                }
                None => self.doc.put_object(&obj, *segment, ObjType::Map)?,
            };
        }
        Ok(obj)
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CHANGE BLOCK
// =============================================================================

/// Edits to bound texts, applied inside [`TextDocument::change`].
///
/// Bounds follow the same policy as detached edits: `set` needs an existing
/// index, `insert_at` accepts `0..=len`, `delete_at` truncates.
///
/// Native Automerge text objects accept character edits only; embedding a
/// value in one is a [`TextError::SchemaViolation`].
pub struct ChangeBlock<'a> {
    doc: &'a mut AutoCommit,
    objs: &'a mut HashMap<PathKey, TextObj>,
}

impl ChangeBlock<'_> {
    /// Number of elements in the text at `path`, including this block's edits.
    pub fn len(&mut self, path: &[&str]) -> TextResult<usize> {
        let (obj, _) = self.obj(path)?;
        Ok(self.doc.length(&obj))
    }

    /// Replaces the element at `index`.
    pub fn set(&mut self, path: &[&str], index: usize, value: impl Into<Element>) -> TextResult<()> {
        let (obj, obj_type) = self.obj(path)?;
        let length = self.doc.length(&obj);
        if index >= length {
            return Err(TextError::out_of_range(index, length));
        }
        match (obj_type, value.into()) {
            (ObjType::Text, Element::Character(c)) => {
                self.doc.splice_text(&obj, index, 1, &c.to_string())?
            }
            (ObjType::Text, Element::Embedded(_)) => return Err(characters_only(path)),
            (_, Element::Character(c)) => self.doc.put(&obj, index, c.to_string())?,
            (_, Element::Embedded(value)) => put_json(self.doc, &obj, index, &value)?,
        }
        Ok(())
    }

    /// Inserts `values` starting at `index`.
    pub fn insert_at<I>(&mut self, path: &[&str], index: usize, values: I) -> TextResult<()>
    where
        I: IntoIterator<Item = Element>,
    {
        let (obj, obj_type) = self.obj(path)?;
        let length = self.doc.length(&obj);
        if index > length {
            return Err(TextError::out_of_range(index, length));
        }
        if obj_type == ObjType::Text {
            let chars = values
                .into_iter()
                .map(|element| element.as_char().ok_or_else(|| characters_only(path)))
                .collect::<TextResult<String>>()?;
            self.doc.splice_text(&obj, index, 0, &chars)?;
            return Ok(());
        }
        for (offset, element) in values.into_iter().enumerate() {
            match element {
                Element::Character(c) => self.doc.insert(&obj, index + offset, c.to_string())?,
                Element::Embedded(value) => insert_json(self.doc, &obj, index + offset, &value)?,
            }
        }
        Ok(())
    }

    /// Inserts the characters of `s` starting at `index`.
    pub fn insert_str(&mut self, path: &[&str], index: usize, s: &str) -> TextResult<()> {
        self.insert_at(path, index, s.chars().map(Element::Character))
    }

    /// Removes up to `count` elements starting at `index`.
    pub fn delete_at(&mut self, path: &[&str], index: usize, count: usize) -> TextResult<()> {
        let (obj, obj_type) = self.obj(path)?;
        let length = self.doc.length(&obj);
        let start = index.min(length);
        let end = index.saturating_add(count).min(length);
        if start == end {
            return Ok(());
        }
        let delete = (end - start) as _;
        match obj_type {
            ObjType::Text => self.doc.splice_text(&obj, start, delete, "")?,
            _ => self.doc.splice(&obj, start, delete, std::iter::empty::<ScalarValue>())?,
        }
        Ok(())
    }

    /// Removes `delete` elements at `index`, then inserts `values` there.
    pub fn splice<I>(&mut self, path: &[&str], index: usize, delete: usize, values: I) -> TextResult<()>
    where
        I: IntoIterator<Item = Element>,
    {
        let length = self.len(path)?;
        if index > length {
            return Err(TextError::out_of_range(index, length));
        }
        self.delete_at(path, index, delete)?;
        self.insert_at(path, index, values)
    }

    fn obj(&mut self, path: &[&str]) -> TextResult<TextObj> {
        resolve_text_obj(self.doc, self.objs, path)
    }
}

fn characters_only(path: &[&str]) -> TextError {
    TextError::schema_violation(format!(
        "'{}' is a native text and holds characters only",
        path.join(".")
    ))
}

// =============================================================================
// PATH RESOLUTION
// =============================================================================

fn owned_path(path: &[&str]) -> PathKey {
    path.iter().map(|segment| segment.to_string()).collect()
}

fn split_path<'p, 's>(path: &'p [&'s str]) -> TextResult<(&'p &'s str, &'p [&'s str])> {
    path.split_last()
        .ok_or_else(|| TextError::invalid_argument("text path must not be empty"))
}

/// Finds the text object at `path`, consulting and filling `cache`.
fn resolve_text_obj(
    doc: &AutoCommit,
    cache: &mut HashMap<PathKey, TextObj>,
    path: &[&str],
) -> TextResult<TextObj> {
    let key = owned_path(path);
    if let Some(obj) = cache.get(&key) {
        return Ok(obj.clone());
    }
    let (last, parents) = split_path(path)?;
    let mut obj = ROOT;
    for segment in parents {
        obj = get_obj_at_key(doc, &obj, segment)?;
    }
    match doc.get(&obj, *last)? {
        Some((Value::Object(obj_type), id)) if Text::is_stored_as(obj_type) => {
            cache.insert(key, (id.clone(), obj_type));
            Ok((id, obj_type))
        }
        Some(_) => Err(TextError::schema_violation(format!(
            "'{}' is not a text",
            path.join(".")
        ))),
        None => Err(TextError::field_not_found(path.join("."))),
    }
}

/// Gets the map object at a key.
fn get_obj_at_key(doc: &AutoCommit, parent: &ObjId, key: &str) -> TextResult<ObjId> {
    match doc.get(parent, key)? {
        Some((Value::Object(ObjType::Map | ObjType::Table), obj_id)) => Ok(obj_id),
        Some(_) => Err(TextError::schema_violation(format!(
            "'{}' is not a map",
            key
        ))),
        None => Err(TextError::field_not_found(key)),
    }
}

// =============================================================================
// EMBEDDED VALUE WRITES
// =============================================================================

fn obj_type_for(value: &JsonValue) -> ObjType {
    match value {
        JsonValue::Array(_) => ObjType::List,
        _ => ObjType::Map,
    }
}

fn insert_json(doc: &mut AutoCommit, list: &ObjId, index: usize, value: &JsonValue) -> TextResult<()> {
    match json_to_scalar(value) {
        Some(scalar) => doc.insert(list, index, scalar)?,
        None => {
            let child = doc.insert_object(list, index, obj_type_for(value))?;
            fill_object(doc, &child, value)?;
        }
    }
    Ok(())
}

fn put_json<P: Into<Prop>>(doc: &mut AutoCommit, obj: &ObjId, prop: P, value: &JsonValue) -> TextResult<()> {
    match json_to_scalar(value) {
        Some(scalar) => doc.put(obj, prop, scalar)?,
        None => {
            let child = doc.put_object(obj, prop, obj_type_for(value))?;
            fill_object(doc, &child, value)?;
        }
    }
    Ok(())
}

fn fill_object(doc: &mut AutoCommit, obj: &ObjId, value: &JsonValue) -> TextResult<()> {
    match value {
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                insert_json(doc, obj, index, item)?;
            }
        }
        JsonValue::Object(fields) => {
            for (key, field) in fields {
                put_json(doc, obj, key.as_str(), field)?;
            }
        }
        _ => {}
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
