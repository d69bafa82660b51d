//! Typed errors for the storage layer

use crate::hash::ObjectId;
use crate::backend::ObjectKind;

/// Errors raised while building or decoding a tree
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate tree entry: {0}")]
    DuplicateEntry(String),

    #[error("tree entries out of order: {previous:?} followed by {next:?}")]
    Unsorted { previous: String, next: String },

    #[error("corrupt tree data: {0}")]
    Corrupt(String),

    #[error("tree encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("tree JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the repository storage layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("repository not initialized at {0}")]
    NotInitialized(String),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{kind} object not found: {id}")]
    ObjectNotFound { kind: ObjectKind, id: ObjectId },

    #[error("{kind} object hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        kind: ObjectKind,
        expected: ObjectId,
        actual: ObjectId,
    },

    #[error("background upload failed: {0}")]
    UploadFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}
