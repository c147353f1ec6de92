//! Error types and result types for document model operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! Backend failures keep the driver error as their `source`, so callers can walk
//! the chain down to the original cause.

use bson::error::Error as BsonError;
use csv::Error as CsvError;
use serde_json::Error as SerdeJsonError;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error used where the concrete cause belongs to another crate.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON, CSV).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup, including missing configuration.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given key already exists in the collection.
    /// The first argument describes the key, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// No document with the given identity exists in the collection.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// A single-document lookup matched nothing.
    #[error("No documents in result from collection {0}")]
    NoDocuments(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A polymorphic record carried a discriminator with no registered shape.
    #[error("unknown kind: {0}")]
    UnknownKind(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: BoxError,
    },
    /// The operation was cancelled or its deadline passed.
    #[error("Cancelled: {0}")]
    Cancelled(String),
    /// Commit or abort was requested without an active transaction, or the session failed.
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// A caller-supplied callback returned an error while streaming.
    #[error("Callback error: {0}")]
    Callback(#[source] BoxError),
    /// The backend cannot execute the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Wraps a backend error with a short description of what was being attempted.
    pub fn backend(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DocumentStoreError::Backend {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wraps an error raised by a streaming callback.
    pub fn callback(source: impl Into<BoxError>) -> Self {
        DocumentStoreError::Callback(source.into())
    }

    /// Returns `true` for the "matched nothing" conditions of single-document lookups.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::DocumentNotFound(..) | DocumentStoreError::NoDocuments(_)
        )
    }
}

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

impl From<CsvError> for DocumentStoreError {
    fn from(err: CsvError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_their_source() {
        let io = std::io::Error::other("connection reset");
        let err = DocumentStoreError::backend("insert into users", io);

        assert_eq!(err.to_string(), "Backend error: insert into users");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("connection reset".to_string())
        );
    }

    #[test]
    fn not_found_covers_both_lookup_shapes() {
        assert!(DocumentStoreError::NoDocuments("users".into()).is_not_found());
        assert!(
            DocumentStoreError::DocumentNotFound("1".into(), "users".into()).is_not_found()
        );
        assert!(!DocumentStoreError::Cancelled("x".into()).is_not_found());
    }
}
