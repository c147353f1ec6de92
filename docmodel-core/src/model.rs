//! The generic model engine.
//!
//! [`Model`] exposes CRUD, aggregation, streaming and paging over any kind that
//! implements the [`Document`] or [`Aggregate`] contract. Dispatch is purely
//! generic: the engine asks the kind for its collection, identity, indexes and
//! audit log, and moves everything else through serde.
//!
//! Every backend call and every cursor fetch is raced against the model's
//! optional [`CancellationToken`] and deadline.
//!
//! ```ignore
//! use docmodel::{Model, memory::InMemoryStore, query::Filter};
//!
//! let model = Model::new(InMemoryStore::new());
//! let mut user = User::new("alice@example.com");
//! let id = model.save(&mut user, Some(&admin)).await?;
//!
//! let users: Vec<User> = model.find(Query::filtered(Filter::eq("active", true))).await?;
//! ```

use bson::{Bson, Document as BsonDocument, de::deserialize_from_document, ser::serialize_to_bson};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    audit::{Actor, AuditEntry, RECORDS_FIELD},
    backend::{DocumentCursor, StoreBackend, WriteOutcome},
    datasource::{FindDataSource, PipeDataSource},
    document::{Aggregate, Collection, CollectionSpec, Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Stage},
    query::{Expr, Filter, ID_FIELD, Query, Sort},
    source::{FindPaginationSource, PipeCount, PipePaginationSource},
    update::Update,
};

/// Summary of the entry recorded by updates.
pub const UPDATE_SUMMARY: &str = "updated";
/// Summary of the entry recorded by upserts.
pub const UPSERT_SUMMARY: &str = "upserted";
/// Summary of the entry recorded when fields are removed.
pub const UNSET_SUMMARY: &str = "unset";

/// Page size used by the paged finds when the caller passes none.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Field written by the count stage appended in [`Model::count_aggr_documents`].
const COUNT_FIELD: &str = "count";

/// Outcome of [`Model::batch_save`].
#[derive(Debug, Clone)]
pub struct BatchSave<D> {
    /// Identities of the stored documents, in submission order.
    pub inserted: Vec<Bson>,
    /// The documents the backend rejected, in submission order.
    pub failed: Vec<D>,
}

impl<D> Default for BatchSave<D> {
    fn default() -> Self {
        Self { inserted: Vec::new(), failed: Vec::new() }
    }
}

/// Resolves the `(limit, skip)` window of a paged find.
///
/// A non-positive limit becomes [`DEFAULT_PAGE_SIZE`] and a non-positive page becomes 1.
/// The skip saturates at `i64::MAX`.
pub fn page_window(limit: i64, page: i64) -> (u64, u64) {
    let limit = if limit <= 0 { DEFAULT_PAGE_SIZE as i64 } else { limit };
    let page = page.max(1);
    (limit as u64, limit.saturating_mul(page - 1) as u64)
}

/// Reads the non-negative count written by the count stage.
fn read_count(row: &BsonDocument, collection: &str) -> DocumentStoreResult<u64> {
    let value = row.get(COUNT_FIELD);
    let count = match value {
        Some(Bson::Int32(n)) => u64::try_from(*n).ok(),
        Some(Bson::Int64(n)) => u64::try_from(*n).ok(),
        Some(Bson::Double(n)) if *n >= 0.0 => Some(*n as u64),
        _ => None,
    };
    count.ok_or_else(|| {
        DocumentStoreError::Serialization(format!("unexpected count value {value:?} from {collection}"))
    })
}

/// Turns one raw row into a value.
type Decode<T> = fn(BsonDocument) -> DocumentStoreResult<T>;

fn decode<T: DeserializeOwned>(raw: BsonDocument) -> DocumentStoreResult<T> {
    Ok(deserialize_from_document(raw)?)
}

/// Generic persistence engine over a [`StoreBackend`].
#[derive(Debug, Clone)]
pub struct Model<B> {
    backend: B,
    check_before_save: bool,
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl<B: StoreBackend> Model<B> {
    /// Creates a model over `backend`.
    ///
    /// Collections are created on first save unless
    /// [`disable_check_before_save`](Self::disable_check_before_save) is used.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            check_before_save: true,
            cancellation: None,
            deadline: None,
        }
    }

    /// Makes every call fail with [`DocumentStoreError::Cancelled`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Makes every call fail with [`DocumentStoreError::Cancelled`] once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Swaps the backend.
    pub fn set_backend(&mut self, backend: B) {
        self.backend = backend;
    }

    /// Turns off the collection check done before each save.
    pub fn disable_check_before_save(&mut self, disabled: bool) {
        self.check_before_save = !disabled;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs `fut` unless the token is cancelled or the deadline passes first.
    async fn guard<T, F>(&self, operation: &str, fut: F) -> DocumentStoreResult<T>
    where
        F: Future<Output = DocumentStoreResult<T>>,
    {
        let run = async {
            match &self.cancellation {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        warn!(operation, "operation cancelled");
                        Err(DocumentStoreError::Cancelled(format!("{operation} cancelled")))
                    }
                    result = fut => result,
                },
                None => fut.await,
            }
        };

        match self.deadline {
            Some(deadline) => {
                let expired = || {
                    warn!(operation, "deadline exceeded");
                    DocumentStoreError::Cancelled(format!("{operation}: deadline exceeded"))
                };
                if Instant::now() >= deadline {
                    return Err(expired());
                }
                timeout_at(deadline, run).await.unwrap_or_else(|_| Err(expired()))
            }
            None => run.await,
        }
    }

    async fn next_row(
        &self,
        operation: &str,
        cursor: &mut DocumentCursor,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        self.guard(operation, cursor.try_next()).await
    }

    async fn collect<T>(
        &self,
        operation: &str,
        mut cursor: DocumentCursor,
        decode: Decode<T>,
    ) -> DocumentStoreResult<Vec<T>> {
        let mut rows = Vec::new();
        while let Some(raw) = self.next_row(operation, &mut cursor).await? {
            rows.push(decode(raw)?);
        }
        Ok(rows)
    }

    /// Decodes each row into a fresh value and hands it to `exec`.
    ///
    /// Stops at the first error. When every row was handled, the last row
    /// replaces `prototype`.
    async fn stream<T, F>(
        &self,
        operation: &str,
        mut cursor: DocumentCursor,
        decode: Decode<T>,
        prototype: &mut T,
        mut exec: F,
    ) -> DocumentStoreResult<()>
    where
        T: Send,
        F: FnMut(&T) -> DocumentStoreResult<()> + Send,
    {
        let mut last = None;
        while let Some(raw) = self.next_row(operation, &mut cursor).await? {
            let row = decode(raw)?;
            exec(&row)?;
            last = Some(row);
        }
        if let Some(row) = last {
            *prototype = row;
        }
        Ok(())
    }

    /// Inserts a document and returns its identity.
    ///
    /// Unless disabled, the collection and its declared indexes are created first.
    /// With an actor, a creation entry is recorded before the insert. An identity
    /// assigned by the backend is written back into `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentAlreadyExists`] on a unique key violation.
    pub async fn save<D: Document>(
        &self,
        doc: &mut D,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<Bson> {
        let collection = D::collection_name();
        if self.check_before_save {
            self.create_collection::<D>().await?;
        }
        if let Some(actor) = actor {
            doc.stamp(actor);
        }

        let body = doc.payload()?;
        let id = self.guard("save", self.backend.insert_one(collection, body)).await?;
        if doc.id() == Bson::Null {
            doc.set_id(id.clone());
        }

        debug!(collection, %id, "saved document");
        Ok(id)
    }

    /// Writes the whole document keyed by its identity, inserting it when absent.
    ///
    /// The collection is always ensured first. With an actor, an `"upserted"`
    /// entry is recorded and stored with the document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] when `doc` has no identity.
    pub async fn upsert<D: Document>(
        &self,
        doc: &mut D,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<Bson> {
        let collection = D::collection_name();
        let id = doc.id();
        if id == Bson::Null {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "cannot upsert into {collection} without an identity"
            )));
        }

        self.create_collection::<D>().await?;
        if let Some(actor) = actor {
            doc.record_audit(actor, UPSERT_SUMMARY);
        }

        let mut fields = doc.payload()?;
        fields.remove(ID_FIELD);
        let filter = Filter::id(id.clone());
        self.guard(
            "upsert",
            self.backend
                .update_one(collection, &filter, Update::set(fields), true),
        )
        .await?;

        debug!(collection, %id, "upserted document");
        Ok(id)
    }

    /// Reloads `doc` from the store by its identity.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] when no document has that identity.
    pub async fn find_by_id<D: Document>(&self, doc: &mut D) -> DocumentStoreResult<()> {
        let collection = D::collection_name();
        let id = doc.id();
        let query = Query::filtered(Filter::id(id.clone()));

        match self
            .guard("find_by_id", self.backend.find_one(collection, query))
            .await?
        {
            Some(raw) => {
                *doc = D::from_raw(raw)?;
                Ok(())
            }
            None => Err(DocumentStoreError::DocumentNotFound(
                id.to_string(),
                collection.to_string(),
            )),
        }
    }

    /// Fills `doc` with the first document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NoDocuments`] when nothing matches.
    pub async fn find_one<D: Document>(&self, doc: &mut D, query: Query) -> DocumentStoreResult<()> {
        let collection = D::collection_name();
        match self
            .guard("find_one", self.backend.find_one(collection, query))
            .await?
        {
            Some(raw) => {
                *doc = D::from_raw(raw)?;
                Ok(())
            }
            None => Err(DocumentStoreError::NoDocuments(collection.to_string())),
        }
    }

    /// Returns every document matching `query`, in cursor order.
    pub async fn find<D: Document>(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        let collection = D::collection_name();
        debug!(collection, "find");
        let cursor = self
            .guard("find", self.backend.find(collection, query))
            .await?;
        self.collect("find", cursor, D::from_raw).await
    }

    /// Streams the documents matching `query` through `exec`.
    ///
    /// Each row is decoded into a fresh value. The first error from decoding or
    /// from `exec` stops the iteration and is returned. When every row was handled,
    /// the last one is copied into `prototype`.
    pub async fn find_and_exec<D, F>(
        &self,
        prototype: &mut D,
        query: Query,
        exec: F,
    ) -> DocumentStoreResult<()>
    where
        D: Document,
        F: FnMut(&D) -> DocumentStoreResult<()> + Send,
    {
        let collection = D::collection_name();
        debug!(collection, "find and exec");
        let cursor = self
            .guard("find_and_exec", self.backend.find(collection, query))
            .await?;
        self.stream("find_and_exec", cursor, D::from_raw, prototype, exec).await
    }

    /// Sets `fields` on the stored copy of `doc` and returns the modified count.
    ///
    /// With an actor, an `"updated"` entry is appended to the document's audit log
    /// and the whole log is written in the same update.
    pub async fn update_one<D: Document>(
        &self,
        doc: &mut D,
        fields: BsonDocument,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<u64> {
        let collection = D::collection_name();
        let mut fields = fields;
        if let Some(actor) = actor {
            if let Some(log) = doc.record_audit(actor, UPDATE_SUMMARY) {
                fields.insert(RECORDS_FIELD, serialize_to_bson(log)?);
            }
        }

        let filter = Filter::id(doc.id());
        let outcome = self
            .guard(
                "update_one",
                self.backend
                    .update_one(collection, &filter, Update::set(fields), false),
            )
            .await?;

        debug!(collection, modified = outcome.modified, "updated document");
        Ok(outcome.modified)
    }

    /// Sets `fields` on every document matching `filter` and returns the modified count.
    ///
    /// With an actor, one `"updated"` entry is pushed onto each matched document's
    /// audit log in the same update.
    pub async fn update_all<C: Collection>(
        &self,
        filter: &Expr,
        fields: BsonDocument,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<u64> {
        let collection = C::collection_name();
        let mut update = Update::set(fields);
        if let Some(actor) = actor {
            let entry = AuditEntry::new(actor, UPDATE_SUMMARY);
            update = update.with_push(RECORDS_FIELD, serialize_to_bson(&entry)?);
        }

        let outcome = self
            .guard(
                "update_all",
                self.backend.update_many(collection, filter, update),
            )
            .await?;

        debug!(collection, modified = outcome.modified, "updated documents");
        Ok(outcome.modified)
    }

    /// Removes the named fields from every document matching `filter`.
    ///
    /// With an actor, one `"unset"` entry is pushed in the same update.
    pub async fn unset_fields<C: Collection>(
        &self,
        filter: &Expr,
        fields: &[&str],
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<u64> {
        let collection = C::collection_name();
        let mut update = Update::unset(fields.iter().copied());
        if let Some(actor) = actor {
            let entry = AuditEntry::new(actor, UNSET_SUMMARY);
            update = update.with_push(RECORDS_FIELD, serialize_to_bson(&entry)?);
        }

        let outcome = self
            .guard(
                "unset_fields",
                self.backend.update_many(collection, filter, update),
            )
            .await?;

        debug!(collection, ?fields, modified = outcome.modified, "unset fields");
        Ok(outcome.modified)
    }

    /// Deletes every document matching `filter` and returns the number deleted.
    pub async fn remove_all<C: Collection>(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        let collection = C::collection_name();
        let deleted = self
            .guard("remove_all", self.backend.delete_many(collection, filter))
            .await?;
        debug!(collection, deleted, "removed documents");
        Ok(deleted)
    }

    /// Deletes the stored copy of `doc` and returns the number deleted.
    pub async fn remove_by_id<D: Document>(&self, doc: &D) -> DocumentStoreResult<u64> {
        let collection = D::collection_name();
        let filter = Filter::id(doc.id());
        let deleted = self
            .guard("remove_by_id", self.backend.delete_one(collection, &filter))
            .await?;
        debug!(collection, deleted, "removed document");
        Ok(deleted)
    }

    /// Inserts many documents without stopping at the first rejection.
    ///
    /// Rejected documents are returned in [`BatchSave::failed`]; a partial failure
    /// is not an error. With an actor, each document gets its creation entry first.
    pub async fn batch_save<D: Document>(
        &self,
        docs: Vec<D>,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<BatchSave<D>> {
        if docs.is_empty() {
            return Ok(BatchSave::default());
        }

        let collection = D::collection_name();
        if self.check_before_save {
            self.create_collection::<D>().await?;
        }

        let mut docs = docs;
        let mut bodies = Vec::with_capacity(docs.len());
        for doc in docs.iter_mut() {
            if let Some(actor) = actor {
                doc.stamp(actor);
            }
            bodies.push(doc.payload()?);
        }

        let outcome = self
            .guard("batch_save", self.backend.insert_many(collection, bodies))
            .await?;

        let mut result = BatchSave::default();
        for (doc, outcome) in docs.into_iter().zip(outcome.outcomes) {
            match outcome {
                WriteOutcome::Applied(Some(id)) => result.inserted.push(id),
                WriteOutcome::Applied(None) => {}
                WriteOutcome::Failed(reason) => {
                    debug!(collection, %reason, "document rejected");
                    result.failed.push(doc);
                }
            }
        }

        if !result.failed.is_empty() {
            warn!(
                collection,
                inserted = result.inserted.len(),
                failed = result.failed.len(),
                "batch save partially failed"
            );
        }
        Ok(result)
    }

    /// Upserts `selector(doc)` onto each document by identity, without stopping at
    /// the first rejection. Returns the documents that could not be written.
    ///
    /// Documents without an identity are never sent and come back as failed. With
    /// an actor, one `"updated"` entry is pushed onto each document's audit log.
    pub async fn batch_update<D, S>(
        &self,
        docs: Vec<D>,
        selector: S,
        actor: Option<&dyn Actor>,
    ) -> DocumentStoreResult<Vec<D>>
    where
        D: Document,
        S: Fn(&D) -> BsonDocument,
    {
        let collection = D::collection_name();
        let (docs, mut failed): (Vec<D>, Vec<D>) =
            docs.into_iter().partition(|doc| doc.id() != Bson::Null);
        if docs.is_empty() {
            return Ok(failed);
        }

        let mut updates = Vec::with_capacity(docs.len());
        for doc in &docs {
            let mut update = Update::set(selector(doc));
            if let Some(actor) = actor {
                let entry = AuditEntry::new(actor, UPDATE_SUMMARY);
                update = update.with_push(RECORDS_FIELD, serialize_to_bson(&entry)?);
            }
            updates.push((Filter::id(doc.id()), update));
        }

        let outcome = self
            .guard(
                "batch_update",
                self.backend.bulk_update(collection, updates, true),
            )
            .await?;

        for (doc, outcome) in docs.into_iter().zip(outcome.outcomes) {
            if outcome.is_failed() {
                failed.push(doc);
            }
        }

        if !failed.is_empty() {
            warn!(collection, failed = failed.len(), "batch update partially failed");
        }
        Ok(failed)
    }

    async fn run_pipeline<A: Aggregate>(
        &self,
        operation: &str,
        stages: Vec<Stage>,
        options: AggregateOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let collection = A::collection_name();
        debug!(collection, operation, stages = stages.len(), "aggregate");
        self.guard(
            operation,
            self.backend.aggregate(collection, stages, options),
        )
        .await
    }

    /// Runs the handle's pipeline and returns every row.
    pub async fn pipe_find<A: Aggregate>(
        &self,
        handle: &A,
        filter: &Expr,
        options: AggregateOptions,
    ) -> DocumentStoreResult<Vec<A>> {
        let cursor = self
            .run_pipeline::<A>("pipe_find", handle.pipeline(filter), options)
            .await?;
        self.collect("pipe_find", cursor, decode::<A>).await
    }

    /// Runs the handle's pipeline and fills `handle` with the first row.
    ///
    /// `handle` is left untouched when the pipeline produces no row.
    pub async fn pipe_find_one<A: Aggregate>(
        &self,
        handle: &mut A,
        filter: &Expr,
    ) -> DocumentStoreResult<()> {
        let mut cursor = self
            .run_pipeline::<A>("pipe_find_one", handle.pipeline(filter), AggregateOptions::default())
            .await?;
        if let Some(raw) = self.next_row("pipe_find_one", &mut cursor).await? {
            *handle = decode(raw)?;
        }
        Ok(())
    }

    /// Streams the handle's pipeline output through `exec`.
    ///
    /// Behaves like [`find_and_exec`](Self::find_and_exec): the last row replaces
    /// `handle` once every row was handled.
    pub async fn pipe_find_and_exec<A, F>(
        &self,
        handle: &mut A,
        filter: &Expr,
        options: AggregateOptions,
        exec: F,
    ) -> DocumentStoreResult<()>
    where
        A: Aggregate,
        F: FnMut(&A) -> DocumentStoreResult<()> + Send,
    {
        let cursor = self
            .run_pipeline::<A>("pipe_find_and_exec", handle.pipeline(filter), options)
            .await?;
        self.stream("pipe_find_and_exec", cursor, decode::<A>, handle, exec).await
    }

    /// Returns one page of the documents matching `query`.
    ///
    /// A non-positive `limit` becomes [`DEFAULT_PAGE_SIZE`] and a non-positive
    /// `page` becomes 1. The query's own offset and limit are replaced.
    pub async fn page_find<D: Document>(
        &self,
        query: Query,
        limit: i64,
        page: i64,
    ) -> DocumentStoreResult<Vec<D>> {
        let (limit, skip) = page_window(limit, page);
        let query = Query {
            limit: Some(limit as usize),
            offset: Some(skip as usize),
            ..query
        };
        self.find(query).await
    }

    /// Returns one page of the handle's pipeline output.
    ///
    /// Sort, skip and limit stages are appended in that order. The sort stage is
    /// left out when `sort` is empty.
    pub async fn page_pipe_find<A: Aggregate>(
        &self,
        handle: &A,
        filter: &Expr,
        sort: &[Sort],
        limit: i64,
        page: i64,
    ) -> DocumentStoreResult<Vec<A>> {
        let (limit, skip) = page_window(limit, page);
        let mut stages = handle.pipeline(filter);
        if !sort.is_empty() {
            stages.push(Stage::Sort(sort.to_vec()));
        }
        stages.push(Stage::Skip(skip));
        stages.push(Stage::Limit(limit));

        let cursor = self
            .run_pipeline::<A>("page_pipe_find", stages, AggregateOptions::default())
            .await?;
        self.collect("page_pipe_find", cursor, decode::<A>).await
    }

    /// Counts the documents of a kind matching `filter`.
    pub async fn count_documents<C: Collection>(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        self.guard(
            "count_documents",
            self.backend.count_documents(C::collection_name(), filter),
        )
        .await
    }

    /// Counts the rows the handle's pipeline produces.
    ///
    /// Returns zero when the pipeline produces nothing.
    pub async fn count_aggr_documents<A: Aggregate>(
        &self,
        handle: &A,
        filter: &Expr,
    ) -> DocumentStoreResult<u64> {
        let mut stages = handle.pipeline(filter);
        stages.push(Stage::Count(COUNT_FIELD.to_string()));

        let mut cursor = self
            .run_pipeline::<A>("count_aggr_documents", stages, AggregateOptions::default())
            .await?;
        let Some(row) = self.next_row("count_aggr_documents", &mut cursor).await? else {
            return Ok(0);
        };

        read_count(&row, A::collection_name())
    }

    /// Creates the kind's collection with its declared indexes, unless it exists.
    pub async fn create_collection<D: Document>(&self) -> DocumentStoreResult<()> {
        self.ensure_collection(&CollectionSpec::of::<D>()).await
    }

    /// Creates every listed collection that does not exist yet.
    pub async fn create_collections(&self, specs: &[CollectionSpec]) -> DocumentStoreResult<()> {
        for spec in specs {
            self.ensure_collection(spec).await?;
        }
        Ok(())
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> DocumentStoreResult<()> {
        let name = spec.name.as_str();
        if self
            .guard("collection_exists", self.backend.collection_exists(name))
            .await?
        {
            return Ok(());
        }

        if spec.indexes.is_empty() {
            self.guard("create_collection", self.backend.create_collection(name))
                .await?;
        } else {
            self.guard(
                "create_indexes",
                self.backend.create_indexes(name, &spec.indexes),
            )
            .await?;
        }

        debug!(collection = name, indexes = spec.indexes.len(), "created collection");
        Ok(())
    }

    /// Starts a transaction. Returns `false` when one is already active.
    pub async fn begin_transaction(&self) -> DocumentStoreResult<bool> {
        self.guard("begin_transaction", self.backend.begin_transaction())
            .await
    }

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Transaction`] when no transaction is active.
    pub async fn commit_transaction(&self) -> DocumentStoreResult<()> {
        self.guard("commit_transaction", self.backend.commit_transaction())
            .await
    }

    /// Aborts the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Transaction`] when no transaction is active.
    pub async fn abort_transaction(&self) -> DocumentStoreResult<()> {
        self.guard("abort_transaction", self.backend.abort_transaction())
            .await
    }

    /// A streaming source over the documents matching `query`.
    pub fn find_data_source<D: Document>(&self, prototype: D, query: Query) -> FindDataSource<'_, B, D> {
        FindDataSource::new(self, prototype, query)
    }

    /// A streaming source over the rows of the handle's pipeline.
    pub fn pipe_data_source<A: Aggregate>(
        &self,
        handle: A,
        filter: Expr,
        options: AggregateOptions,
    ) -> PipeDataSource<'_, B, A> {
        PipeDataSource::new(self, handle, filter, options)
    }

    /// A pagination source over the documents matching `query`.
    pub fn pagination_source<D: Document>(&self, query: Query) -> FindPaginationSource<'_, B, D> {
        FindPaginationSource::new(self, query)
    }

    /// A pagination source over the handle's pipeline, counted by applying `filter`
    /// directly to the collection.
    pub fn pipe_pagination_source<A: Aggregate>(
        &self,
        handle: A,
        filter: Expr,
        sort: Vec<Sort>,
    ) -> PipePaginationSource<'_, B, A> {
        PipePaginationSource::new(self, handle, filter, sort, PipeCount::Collection)
    }

    /// A pagination source over the handle's pipeline, counted by running the
    /// pipeline with a count stage.
    pub fn pipe_match_pagination_source<A: Aggregate>(
        &self,
        handle: A,
        filter: Expr,
        sort: Vec<Sort>,
    ) -> PipePaginationSource<'_, B, A> {
        PipePaginationSource::new(self, handle, filter, sort, PipeCount::Pipeline)
    }
}
