//! Storage backend abstraction for the document model.
//!
//! This module defines the traits that abstract over different storage implementations,
//! allowing the [`Model`](crate::model::Model) to run unchanged against MongoDB or the
//! in-memory store.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for all storage operations:
//! inserts, filtered reads returning a [`DocumentCursor`], field-level updates, deletes,
//! aggregation, collection and index management, and transactions.
//! Implementations are required to be thread-safe (`Send + Sync`) and support concurrent access.
//!
//! Backends receive documents as raw [`bson::Document`] values. Serialization of typed
//! documents happens in the model, never in the backend.
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use docmodel::query::{Filter, Query};
//! use bson::doc;
//!
//! let id = backend.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
//! let found = backend.find_one("users", Query::filtered(Filter::id(id))).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{TryStreamExt, stream::BoxStream};
use std::fmt::Debug;

use crate::{
    document::IndexSpec,
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Pipeline},
    query::{Expr, Query},
    update::Update,
};

/// A stream of raw rows produced by a find or an aggregation.
///
/// Rows arrive in cursor order. The stream is fully owned, so it can outlive the
/// call that produced it.
pub type DocumentCursor = BoxStream<'static, DocumentStoreResult<Document>>;

/// Result of one element of an unordered bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write was applied. Inserts and upserts carry the stored identity.
    Applied(Option<Bson>),
    /// The write was rejected; the reason is the backend's message.
    Failed(String),
}

impl WriteOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }
}

/// Per-element results of an unordered bulk write, in the order the elements were submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub outcomes: Vec<WriteOutcome>,
}

impl BulkOutcome {
    pub fn new(outcomes: Vec<WriteOutcome>) -> Self {
        Self { outcomes }
    }

    /// Identities of the applied elements that reported one.
    pub fn inserted_ids(&self) -> Vec<Bson> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                WriteOutcome::Applied(Some(id)) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Submission indices of the rejected elements.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(index, _)| index)
            .collect()
    }
}

/// Counts reported by an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter.
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
    /// Identity of the document created by an upsert.
    pub upserted_id: Option<Bson>,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Transactions are the exception: a backend handle carries at most one
/// active transaction, shared by every clone of that handle.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Driver failures are wrapped in [`DocumentStoreError::Backend`] with the driver error
/// as the source. Rejections inside bulk writes are reported per element and are never
/// an `Err`.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts one document and returns its identity.
    ///
    /// A document without `_id` is assigned one by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentAlreadyExists`] on a unique key violation.
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson>;

    /// Inserts many documents without stopping at the first failure.
    ///
    /// The outcome has exactly one entry per submitted document, in submission order.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<BulkOutcome>;

    /// Opens a cursor over the documents matching a query.
    ///
    /// # Arguments
    ///
    /// * `collection` - The name of the collection to query
    /// * `query` - Filter, sort keys, offset, limit and projection
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor>;

    /// Returns the first document matching a query, if any.
    async fn find_one(
        &self,
        collection: &str,
        query: Query,
    ) -> DocumentStoreResult<Option<Document>> {
        let query = Query { limit: Some(1), ..query };
        let mut cursor = self.find(collection, query).await?;
        cursor.try_next().await
    }

    /// Applies an update to the first document matching `filter`.
    ///
    /// With `upsert`, a new document is created when nothing matches.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Applies an update to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Applies independent single-document updates without stopping at the first failure.
    ///
    /// The outcome has exactly one entry per submitted pair, in submission order.
    async fn bulk_update(
        &self,
        collection: &str,
        updates: Vec<(Expr, Update)>,
        upsert: bool,
    ) -> DocumentStoreResult<BulkOutcome>;

    /// Deletes the first document matching `filter` and returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter` and returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline and opens a cursor over its output.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Pipeline,
        options: AggregateOptions,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64>;

    /// Returns `true` when the collection exists.
    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|existing| existing == name))
    }

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Creates an empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Creates indexes on a collection, creating the collection if needed.
    ///
    /// # Note
    ///
    /// If an index is unique and existing documents violate it, the backend returns an error.
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<()>;

    /// Drops (deletes) a collection and all its documents.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Starts a transaction on this handle.
    ///
    /// Returns `false` without doing anything when a transaction is already active.
    async fn begin_transaction(&self) -> DocumentStoreResult<bool> {
        Err(DocumentStoreError::Unsupported("transactions".to_string()))
    }

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Transaction`] when no transaction is active.
    async fn commit_transaction(&self) -> DocumentStoreResult<()> {
        Err(DocumentStoreError::Unsupported("transactions".to_string()))
    }

    /// Aborts the active transaction, discarding its writes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Transaction`] when no transaction is active.
    async fn abort_transaction(&self) -> DocumentStoreResult<()> {
        Err(DocumentStoreError::Unsupported("transactions".to_string()))
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_outcome_reports_by_submission_index() {
        let outcome = BulkOutcome::new(vec![
            WriteOutcome::Applied(Some(Bson::Int32(1))),
            WriteOutcome::Failed("duplicate key".into()),
            WriteOutcome::Applied(Some(Bson::Int32(3))),
            WriteOutcome::Applied(None),
        ]);

        assert_eq!(outcome.inserted_ids(), vec![Bson::Int32(1), Bson::Int32(3)]);
        assert_eq!(outcome.failed_indices(), vec![1]);
    }
}
