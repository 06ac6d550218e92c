//! Text value module.
//!
//! Provides the replicable rich-text value and its document binding.

pub mod attachment;
pub mod document;
pub mod model;
pub mod value;

// Re-exports for convenience
pub use attachment::{Attachment, Binding, SequenceValue};
pub use document::{ChangeBlock, TextDocument};
pub use model::{Element, Span, TextInput, EMBED_MARKER};
pub use value::{Iter, Text};
