//! Error types for collaborative text values.

use thiserror::Error;

/// Result type alias for text operations.
pub type TextResult<T> = Result<T, TextError>;

/// Errors that can occur while building, editing or binding a text.
#[derive(Error, Debug)]
pub enum TextError {
    /// Automerge error during document operations.
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// Autosurgeon hydration error.
    #[error("Hydration error: {0}")]
    Hydrate(#[from] autosurgeon::HydrateError),

    /// Autosurgeon reconcile error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] autosurgeon::ReconcileError),

    /// Input that cannot be turned into a text.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Direct edit of a text that is bound to document state.
    #[error(
        "Cannot edit the text bound at `{path}` directly; \
         apply the edit inside a change block (TextDocument::change)"
    )]
    IllegalMutation { path: String },

    /// Index outside the valid range for the operation.
    #[error("Index {index} out of range for text of length {length}")]
    OutOfRange { index: usize, length: usize },

    /// Nothing stored at a document path.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Schema violation - document structure is invalid.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

impl TextError {
    /// Creates an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an IllegalMutation error.
    pub fn illegal_mutation(path: impl Into<String>) -> Self {
        Self::IllegalMutation { path: path.into() }
    }

    /// Creates an OutOfRange error.
    pub fn out_of_range(index: usize, length: usize) -> Self {
        Self::OutOfRange { index, length }
    }

    /// Creates a FieldNotFound error.
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound(field.into())
    }

    /// Creates a SchemaViolation error.
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_mutation_points_at_change_block() {
        let err = TextError::illegal_mutation("notes.body");
        let msg = err.to_string();
        assert!(msg.contains("notes.body"));
        assert!(msg.contains("TextDocument::change"));
    }

    #[test]
    fn test_out_of_range_message() {
        let err = TextError::out_of_range(7, 3);
        assert_eq!(err.to_string(), "Index 7 out of range for text of length 3");
    }
}
