//! In-memory storage implementation for the document model.
//!
//! This module provides a simple backend that keeps every collection as an
//! insertion-ordered list of BSON documents behind async-aware read-write locks.

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use docmodel_core::{
    backend::{
        BulkOutcome, DocumentCursor, StoreBackend, StoreBackendBuilder, UpdateOutcome,
        WriteOutcome,
    },
    document::IndexSpec,
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Pipeline},
    query::{Expr, ID_FIELD, Query},
    update::Update,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents, lookup},
    pipeline::{project, run_pipeline},
    update::{apply_update, seed_from_filter},
};

/// Documents and index declarations of one collection.
#[derive(Debug, Clone, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

type StoreMap = HashMap<String, CollectionState>;

/// Assigns a fresh `ObjectId` when the document has no identity, and returns the identity.
fn ensure_id(document: &mut Document) -> Bson {
    match document.get(ID_FIELD) {
        Some(id) if *id != Bson::Null => id.clone(),
        _ => {
            let id = Bson::ObjectId(ObjectId::new());
            let mut with_id = Document::new();
            with_id.insert(ID_FIELD, id.clone());
            for (key, value) in std::mem::take(document) {
                if key != ID_FIELD {
                    with_id.insert(key, value);
                }
            }
            *document = with_id;
            id
        }
    }
}

impl CollectionState {
    fn matching(&self, filter: &Expr) -> DocumentStoreResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::matches(document, filter)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    fn first_match(&self, filter: &Expr) -> DocumentStoreResult<Option<usize>> {
        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::matches(document, filter)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Rejects `candidate` when it collides with another document on `_id` or a unique index.
    ///
    /// `skip` is the candidate's own position when it replaces a stored document.
    fn check_unique(
        &self,
        candidate: &Document,
        skip: Option<usize>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        let id_index = IndexSpec::ascending(ID_FIELD).unique();
        let unique = std::iter::once(&id_index).chain(self.indexes.iter().filter(|index| index.unique));

        for index in unique {
            let key = |document: &Document| -> Vec<Bson> {
                index
                    .fields()
                    .map(|field| lookup(document, field).cloned().unwrap_or(Bson::Null))
                    .collect()
            };
            let wanted = key(candidate);

            let collides = self
                .documents
                .iter()
                .enumerate()
                .any(|(position, stored)| Some(position) != skip && key(stored) == wanted);

            if collides {
                let described = index
                    .fields()
                    .zip(&wanted)
                    .map(|(field, value)| format!("{field}: {value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(DocumentStoreError::DocumentAlreadyExists(
                    format!("{{{described}}}"),
                    collection.to_string(),
                ));
            }
        }
        Ok(())
    }

    fn insert(&mut self, mut document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let id = ensure_id(&mut document);
        self.check_unique(&document, None, collection)?;
        self.documents.push(document);
        Ok(id)
    }

    fn update(
        &mut self,
        collection: &str,
        filter: &Expr,
        update: &Update,
        upsert: bool,
        many: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let positions = if many {
            self.matching(filter)?
        } else {
            self.first_match(filter)?.into_iter().collect()
        };

        if positions.is_empty() {
            if !upsert {
                return Ok(UpdateOutcome::default());
            }
            let mut document = seed_from_filter(filter)?;
            apply_update(&mut document, update)?;
            let id = self.insert(document, collection)?;
            return Ok(UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            });
        }

        let mut outcome = UpdateOutcome {
            matched: positions.len() as u64,
            ..UpdateOutcome::default()
        };
        for position in positions {
            let mut updated = self.documents[position].clone();
            if apply_update(&mut updated, update)? {
                self.check_unique(&updated, Some(position), collection)?;
                self.documents[position] = updated;
                outcome.modified += 1;
            }
        }
        Ok(outcome)
    }

    fn delete(&mut self, filter: &Expr, many: bool) -> DocumentStoreResult<u64> {
        let positions = if many {
            self.matching(filter)?
        } else {
            self.first_match(filter)?.into_iter().collect()
        };
        for position in positions.iter().rev() {
            self.documents.remove(*position);
        }
        Ok(positions.len() as u64)
    }
}

fn cursor(rows: Vec<Document>) -> DocumentCursor {
    stream::iter(rows.into_iter().map(Ok)).boxed()
}

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
/// Documents keep their insertion order, identities default to fresh `ObjectId`s, and
/// unique indexes (plus the implicit one on `_id`) are enforced on every write.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data and the same transaction.
///
/// # Transactions
///
/// A transaction is a snapshot of the whole store taken by `begin_transaction`.
/// Aborting restores the snapshot; committing discards it. Writes made while a
/// transaction is active are visible to every clone immediately.
///
/// # Performance
///
/// Queries scan all documents in a collection; indexes are only used for uniqueness.
/// For larger datasets, use a persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use docmodel::query::{Filter, Query};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
///     let found = store.find_one("users", Query::filtered(Filter::id(id))).await?;
///     assert!(found.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> collection state
    store: Arc<RwLock<StoreMap>>,
    /// Copy of the store taken when the active transaction began
    snapshot: Arc<RwLock<Option<StoreMap>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            snapshot: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docmodel_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns `true` while a transaction is active.
    pub async fn in_transaction(&self) -> bool {
        self.snapshot.read().await.is_some()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        let mut store = self.store.write().await;
        store
            .entry(collection.to_string())
            .or_default()
            .insert(document, collection)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> DocumentStoreResult<BulkOutcome> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        let outcomes = documents
            .into_iter()
            .map(|document| match state.insert(document, collection) {
                Ok(id) => WriteOutcome::Applied(Some(id)),
                Err(err) => WriteOutcome::Failed(err.to_string()),
            })
            .collect();

        Ok(BulkOutcome::new(outcomes))
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(cursor(Vec::new()));
        };

        let mut rows = match &query.filter {
            Some(filter) => {
                let mut rows = Vec::new();
                for position in state.matching(filter)? {
                    rows.push(state.documents[position].clone());
                }
                rows
            }
            None => state.documents.clone(),
        };

        if !query.sort.is_empty() {
            rows.sort_by(|a, b| compare_documents(a, b, &query.sort));
        }

        let rows = rows
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX));

        let rows = match &query.projection {
            Some(projection) => rows
                .map(|row| project(&row, projection))
                .collect::<DocumentStoreResult<Vec<_>>>()?,
            None => rows.collect(),
        };

        Ok(cursor(rows))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        if !upsert && !store.contains_key(collection) {
            return Ok(UpdateOutcome::default());
        }
        store
            .entry(collection.to_string())
            .or_default()
            .update(collection, filter, &update, upsert, false)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        match store.get_mut(collection) {
            Some(state) => state.update(collection, filter, &update, false, true),
            None => Ok(UpdateOutcome::default()),
        }
    }

    async fn bulk_update(
        &self,
        collection: &str,
        updates: Vec<(Expr, Update)>,
        upsert: bool,
    ) -> DocumentStoreResult<BulkOutcome> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        let outcomes = updates
            .iter()
            .map(|(filter, update)| match state.update(collection, filter, update, upsert, false) {
                Ok(outcome) => WriteOutcome::Applied(outcome.upserted_id),
                Err(err) => WriteOutcome::Failed(err.to_string()),
            })
            .collect();

        Ok(BulkOutcome::new(outcomes))
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        match store.get_mut(collection) {
            Some(state) => state.delete(filter, false),
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        match store.get_mut(collection) {
            Some(state) => state.delete(filter, true),
            None => Ok(0),
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Pipeline,
        _options: AggregateOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let rows = match self.store.read().await.get(collection) {
            Some(state) => state.documents.clone(),
            None => Vec::new(),
        };
        Ok(cursor(run_pipeline(rows, &pipeline)?))
    }

    async fn count_documents(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        match self.store.read().await.get(collection) {
            Some(state) => Ok(state.matching(filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        Ok(self.store.read().await.contains_key(name))
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(self.store.read().await.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let state = store.entry(collection.to_string()).or_default();

        for index in indexes {
            let mut declared = state.indexes.clone();
            declared.retain(|existing| existing.index_name() != index.index_name());
            declared.push(index.clone());

            if index.unique {
                let mut check = CollectionState {
                    documents: Vec::with_capacity(state.documents.len()),
                    indexes: declared.clone(),
                };
                for document in &state.documents {
                    check.insert(document.clone(), collection)?;
                }
            }
            state.indexes = declared;
        }

        debug!(collection, indexes = indexes.len(), "created indexes");
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn begin_transaction(&self) -> DocumentStoreResult<bool> {
        let mut snapshot = self.snapshot.write().await;
        if snapshot.is_some() {
            return Ok(false);
        }
        *snapshot = Some(self.store.read().await.clone());
        debug!("transaction started");
        Ok(true)
    }

    async fn commit_transaction(&self) -> DocumentStoreResult<()> {
        match self.snapshot.write().await.take() {
            Some(_) => {
                debug!("transaction committed");
                Ok(())
            }
            None => Err(DocumentStoreError::Transaction(
                "no active transaction to commit".to_string(),
            )),
        }
    }

    async fn abort_transaction(&self) -> DocumentStoreResult<()> {
        let mut snapshot = self.snapshot.write().await;
        match snapshot.take() {
            Some(saved) => {
                *self.store.write().await = saved;
                debug!("transaction aborted");
                Ok(())
            }
            None => Err(DocumentStoreError::Transaction(
                "no active transaction to abort".to_string(),
            )),
        }
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
