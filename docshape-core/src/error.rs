//! Error types and result types for document store operations.
//!
//! This module provides error handling for every orchestrator operation.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Errors fall into a few families:
//!
//! - **Preconditions** - local validation failures that are never retried
//!   ([`DocumentStoreError::InvalidProjection`], [`DocumentStoreError::EmptyFilterField`],
//!   [`DocumentStoreError::NotSetUp`], [`DocumentStoreError::EmptyUpdate`],
//!   [`DocumentStoreError::AlreadySetUp`])
//! - **Hooks** - a lifecycle hook failed and aborted the operation ([`DocumentStoreError::Hook`])
//! - **Not found** - a single-document read matched nothing ([`DocumentStoreError::DocumentNotFound`])
//! - **Backend** - the store itself failed; the driver error is carried unmodified
//! - **Initialization** - the connection could not be established

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

/// Boxed error type used for store-level and hook failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The lifecycle stage a hook runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    PreCreate,
    PostCreate,
    PreUpdate,
    PostUpdate,
    PreSoftDelete,
    PostSoftDelete,
    PreHardDelete,
    PostHardDelete,
    PreFindOne,
    PostFindOne,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookStage::PreCreate => "PreCreate",
            HookStage::PostCreate => "PostCreate",
            HookStage::PreUpdate => "PreUpdate",
            HookStage::PostUpdate => "PostUpdate",
            HookStage::PreSoftDelete => "PreSoftDelete",
            HookStage::PostSoftDelete => "PostSoftDelete",
            HookStage::PreHardDelete => "PreHardDelete",
            HookStage::PostHardDelete => "PostHardDelete",
            HookStage::PreFindOne => "PreFindOne",
            HookStage::PostFindOne => "PostFindOne",
        })
    }
}

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// No document matched a single-document read or an identity-keyed write.
    #[error("No document found in collection {0}")]
    DocumentNotFound(String),
    /// The value does not serialize to a BSON document.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A projection was supplied that is not a field-selection mapping.
    #[error("Projections must be field-selection documents: {0}")]
    InvalidProjection(String),
    /// A filter constraint has an empty field name.
    #[error("Field names in filters cannot be empty")]
    EmptyFilterField,
    /// The document has no identity or timestamps yet; `setup()` was never called.
    #[error("Cannot save document before setup() has been called")]
    NotSetUp,
    /// `setup()` was called on a document that already has an identity.
    #[error("Document is already set up; setup() only applies to new documents")]
    AlreadySetUp,
    /// An update-many was dispatched without any accumulated operations.
    #[error("Empty UpdateManyBuilder provided")]
    EmptyUpdate,
    /// A lifecycle hook failed and aborted the enclosing operation.
    #[error("{stage} hook error: {source}")]
    Hook {
        stage: HookStage,
        #[source]
        source: BoxError,
    },
    /// An error reported by the underlying storage backend, carried unmodified.
    #[error(transparent)]
    Backend(BoxError),
}

impl DocumentStoreError {
    /// Wraps a driver or backend error without altering it.
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        DocumentStoreError::Backend(err.into())
    }

    /// Returns `true` for the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::DocumentNotFound(_))
    }

    /// Returns the failed hook stage, if this is a hook error.
    pub fn hook_stage(&self) -> Option<HookStage> {
        match self {
            DocumentStoreError::Hook { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_error_names_the_stage() {
        let err = DocumentStoreError::Hook {
            stage: HookStage::PreCreate,
            source: "email taken".into(),
        };

        assert_eq!(err.to_string(), "PreCreate hook error: email taken");
        assert_eq!(err.hook_stage(), Some(HookStage::PreCreate));
        assert!(!err.is_not_found());
    }

    #[test]
    fn backend_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = DocumentStoreError::backend(io);

        assert_eq!(err.to_string(), "timed out");

        match err {
            DocumentStoreError::Backend(inner) => {
                assert!(inner.downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
