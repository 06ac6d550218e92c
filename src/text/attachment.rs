//! Binding state of a text value.

use automerge::{ObjId, ObjType};

/// Values the document stores as a character-level replicated list rather than
/// a generic structured value.
pub trait SequenceValue {
    /// Object type created for the value inside a document.
    const OBJ_TYPE: ObjType;

    /// Whether an object of `obj_type` found in a document reads as this value.
    fn is_stored_as(obj_type: ObjType) -> bool {
        obj_type == Self::OBJ_TYPE
    }
}

/// Whether a text is a local scratch value or a view of document state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attachment {
    /// Standalone, freely mutable.
    #[default]
    Detached,
    /// Bound to document state; edits must go through a change block.
    Attached(Binding),
}

impl Attachment {
    /// Returns true if bound to document state.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached(_))
    }

    /// Returns the binding, if attached.
    pub fn binding(&self) -> Option<&Binding> {
        match self {
            Self::Detached => None,
            Self::Attached(binding) => Some(binding),
        }
    }
}

/// Location of a bound text inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    obj: ObjId,
    path: Vec<String>,
}

impl Binding {
    pub(crate) fn new(obj: ObjId, path: Vec<String>) -> Self {
        Self { obj, path }
    }

    /// The list or text object holding the text.
    pub fn obj(&self) -> &ObjId {
        &self.obj
    }

    /// Map keys from the document root to the text.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Dotted form of the path, for messages.
    pub fn display_path(&self) -> String {
        self.path.join(".")
    }
}
