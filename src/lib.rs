//! CollabText - replicable rich-text values for Automerge documents.
//!
//! A [`Text`] is an ordered run of characters interleaved with embedded
//! values (images, mentions, block markers). It lives in one of two modes:
//!
//! - **Detached**: a local scratch value, edited directly
//! - **Attached**: a view of text stored in a [`TextDocument`]; direct edits are
//!   refused and must go through a change block so replicas can merge them
//!
//! # Example
//!
//! ```rust
//! use collabtext::{Element, Text, TextDocument, TextError};
//!
//! // Build and edit a local text
//! let mut draft = Text::from("hello");
//! draft.insert_str(5, " world").unwrap();
//! draft.push(Element::embedded(serde_json::json!({"img": "wave.png"}))).unwrap();
//!
//! // Store it in a document; the returned view is bound
//! let mut doc = TextDocument::new();
//! let mut bound = doc.put_text(&["notes", "body"], &draft).unwrap();
//! assert!(matches!(bound.push('!'), Err(TextError::IllegalMutation { .. })));
//!
//! // Edits to bound text go through a change block
//! doc.change(|block| block.insert_str(&["notes", "body"], 0, "Oh, "))
//!     .unwrap();
//! let text = doc.text(&["notes", "body"]).unwrap();
//! assert!(text.as_str().starts_with("Oh, hello world"));
//!
//! // Save for sync
//! let bytes = doc.save();
//! ```

pub mod error;

// Text module
pub mod text;

// Re-exports for convenience
pub use error::{TextError, TextResult};
pub use text::{
    Attachment, Binding, ChangeBlock, Element, SequenceValue, Span, Text, TextDocument, TextInput,
    EMBED_MARKER,
};
