use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::{StreamExt, TryStreamExt, stream};
use mea::mutex::Mutex;
use mongodb::{
    Client, ClientSession, Collection as MongoCollection, Database,
    error::{CommandError, Error as MongoError, ErrorKind, InsertManyError, WriteError, WriteFailure},
    options::{AggregateOptions as MongoAggregateOptions, FindOptions},
    results::UpdateResult,
};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, info, warn};

use docmodel_core::{
    backend::{BulkOutcome, DocumentCursor, StoreBackend, UpdateOutcome, WriteOutcome},
    document::IndexSpec,
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{AggregateOptions, Pipeline},
    query::{Expr, ID_FIELD, Query},
    update::Update,
};

use crate::{
    config::{ConnectionObserver, MongoConfig, MongoDbStoreBuilder},
    query::{index_model, sort_document, translate_filter, translate_pipeline, translate_update},
};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_NOT_FOUND: i32 = 26;
const NAMESPACE_EXISTS: i32 = 48;
const NOT_IN_TRANSACTION: &str = "OperationNotSupportedInTransaction";

/// Updates in flight at once during a bulk update outside a transaction.
const BULK_CONCURRENCY: usize = 16;

/// Runs a driver action inside the active session, or on its own when there is none.
macro_rules! in_session {
    ($store:expr, $action:expr) => {{
        let mut guard = $store.session.lock().await;
        match guard.as_mut() {
            Some(session) => $action.session(session).await,
            None => {
                drop(guard);
                $action.await
            }
        }
    }};
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: DUPLICATE_KEY, .. }))
    )
}

fn command_code(err: &MongoError) -> Option<(i32, &str)> {
    match err.kind.as_ref() {
        ErrorKind::Command(CommandError { code, code_name, .. }) => Some((*code, code_name.as_str())),
        _ => None,
    }
}

fn update_outcome(result: UpdateResult) -> UpdateOutcome {
    UpdateOutcome {
        matched: result.matched_count,
        modified: result.modified_count,
        upserted_id: result.upserted_id,
    }
}

/// MongoDB implementation of [`StoreBackend`].
///
/// Clones share the client and the transaction slot: a transaction begun on one
/// clone is used by every operation issued through any of them.
#[derive(Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    session: Arc<Mutex<Option<ClientSession>>>,
    observer: Option<Arc<dyn ConnectionObserver>>,
}

impl fmt::Debug for MongoDbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbStore")
            .field("database", &self.database)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

impl MongoDbStore {
    pub fn new(client: Client, database: String, observer: Option<Arc<dyn ConnectionObserver>>) -> Self {
        Self {
            client,
            database,
            session: Arc::new(Mutex::new(None)),
            observer,
        }
    }

    pub fn builder(config: MongoConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(config)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.database().collection(name)
    }

    /// Collects a session cursor eagerly; session cursors borrow the session.
    async fn find_in_session(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Vec<Document>>> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };

        let mut cursor = self
            .collection(collection)
            .find(filter)
            .with_options(options)
            .session(&mut *session)
            .await
            .map_err(|e| DocumentStoreError::backend(format!("find in {collection}"), e))?;

        let rows = cursor
            .stream(session)
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::backend(format!("find in {collection}"), e))?;

        Ok(Some(rows))
    }

    async fn aggregate_in_session(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: MongoAggregateOptions,
    ) -> DocumentStoreResult<Option<Vec<Document>>> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };

        let mut cursor = self
            .collection(collection)
            .aggregate(pipeline)
            .with_options(options)
            .session(&mut *session)
            .await
            .map_err(|e| DocumentStoreError::backend(format!("aggregate on {collection}"), e))?;

        let rows = cursor
            .stream(session)
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::backend(format!("aggregate on {collection}"), e))?;

        Ok(Some(rows))
    }

    async fn apply_update(&self, collection: &str, filter: Expr, update: Update, upsert: bool) -> WriteOutcome {
        match self.update_one(collection, &filter, update, upsert).await {
            Ok(outcome) => WriteOutcome::Applied(outcome.upserted_id),
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }

    fn rows_cursor(rows: Vec<Document>) -> DocumentCursor {
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    /// Reads per-index results out of an unordered insert.
    fn insert_many_outcome(
        collection: &str,
        ids: &[Bson],
        err: MongoError,
    ) -> DocumentStoreResult<BulkOutcome> {
        let ErrorKind::InsertMany(InsertManyError {
            write_errors: Some(write_errors),
            ..
        }) = err.kind.as_ref()
        else {
            return Err(DocumentStoreError::backend(format!("insert into {collection}"), err));
        };

        let failed: HashMap<usize, String> = write_errors
            .iter()
            .map(|failure| (failure.index, failure.message.clone()))
            .collect();

        warn!(collection, failed = failed.len(), "partial insert");

        Ok(BulkOutcome::new(
            ids.iter()
                .enumerate()
                .map(|(index, id)| match failed.get(&index) {
                    Some(message) => WriteOutcome::Failed(message.clone()),
                    None => WriteOutcome::Applied(Some(id.clone())),
                })
                .collect(),
        ))
    }
}

fn in_submission_order(mut indexed: Vec<(usize, WriteOutcome)>) -> Vec<WriteOutcome> {
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Gives a document an ObjectId when it has none, and returns the identity.
fn ensure_id(document: &mut Document) -> Bson {
    match document.get(ID_FIELD) {
        Some(id) if *id != Bson::Null => id.clone(),
        _ => {
            let id = Bson::ObjectId(ObjectId::new());
            let mut with_id = doc! { ID_FIELD: id.clone() };
            with_id.extend(std::mem::take(document).into_iter().filter(|(k, _)| k != ID_FIELD));
            *document = with_id;
            id
        }
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, collection: &str, document: Document) -> DocumentStoreResult<Bson> {
        let result = in_session!(self, self.collection(collection).insert_one(&document));

        match result {
            Ok(inserted) => Ok(inserted.inserted_id),
            Err(e) if is_duplicate_key(&e) => Err(DocumentStoreError::DocumentAlreadyExists(
                document
                    .get(ID_FIELD)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                collection.to_string(),
            )),
            Err(e) => Err(DocumentStoreError::backend(format!("insert into {collection}"), e)),
        }
    }

    async fn insert_many(
        &self,
        collection: &str,
        mut documents: Vec<Document>,
    ) -> DocumentStoreResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let ids: Vec<Bson> = documents.iter_mut().map(ensure_id).collect();
        let result = in_session!(
            self,
            self.collection(collection).insert_many(&documents).ordered(false)
        );

        match result {
            Ok(_) => Ok(BulkOutcome::new(
                ids.into_iter().map(|id| WriteOutcome::Applied(Some(id))).collect(),
            )),
            Err(e) => Self::insert_many_outcome(collection, &ids, e),
        }
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<DocumentCursor> {
        let filter = translate_filter(&query.filter_or_all())?;

        let mut options = FindOptions::default();
        options.limit = query.limit.map(|limit| limit as i64);
        options.skip = query.offset.map(|offset| offset as u64);
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        options.projection = query.projection;

        debug!(collection, %filter, "find");

        if let Some(rows) = self.find_in_session(collection, filter.clone(), options.clone()).await? {
            return Ok(Self::rows_cursor(rows));
        }

        let context = format!("find in {collection}");
        let cursor = self
            .collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::backend(context.clone(), e))?;

        Ok(cursor
            .map_err(move |e| DocumentStoreError::backend(context.clone(), e))
            .boxed())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let filter = translate_filter(filter)?;
        let update = translate_update(&update);
        if update.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("empty update".to_string()));
        }

        match in_session!(self, self.collection(collection).update_one(filter.clone(), update.clone()).upsert(upsert)) {
            Ok(result) => Ok(update_outcome(result)),
            Err(e) if is_duplicate_key(&e) => Err(DocumentStoreError::DocumentAlreadyExists(
                filter.to_string(),
                collection.to_string(),
            )),
            Err(e) => Err(DocumentStoreError::backend(format!("update in {collection}"), e)),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let filter = translate_filter(filter)?;
        let update = translate_update(&update);
        if update.is_empty() {
            return Err(DocumentStoreError::InvalidDocument("empty update".to_string()));
        }

        in_session!(self, self.collection(collection).update_many(filter.clone(), update.clone()))
            .map(update_outcome)
            .map_err(|e| DocumentStoreError::backend(format!("update in {collection}"), e))
    }

    async fn bulk_update(
        &self,
        collection: &str,
        updates: Vec<(Expr, Update)>,
        upsert: bool,
    ) -> DocumentStoreResult<BulkOutcome> {
        let in_transaction = self.session.lock().await.is_some();

        // A session serves one operation at a time.
        let outcomes: Vec<WriteOutcome> = if in_transaction {
            stream::iter(updates)
                .then(move |(filter, update)| self.apply_update(collection, filter, update, upsert))
                .collect()
                .await
        } else {
            let indexed: Vec<(usize, WriteOutcome)> = stream::iter(updates.into_iter().enumerate())
                .map(move |(index, (filter, update))| async move {
                    (index, self.apply_update(collection, filter, update, upsert).await)
                })
                .buffer_unordered(BULK_CONCURRENCY)
                .collect()
                .await;
            in_submission_order(indexed)
        };

        let failed = outcomes.iter().filter(|outcome| outcome.is_failed()).count();
        if failed > 0 {
            warn!(collection, failed, "partial bulk update");
        }

        Ok(BulkOutcome::new(outcomes))
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let filter = translate_filter(filter)?;

        in_session!(self, self.collection(collection).delete_one(filter.clone()))
            .map(|result| result.deleted_count)
            .map_err(|e| DocumentStoreError::backend(format!("delete from {collection}"), e))
    }

    async fn delete_many(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let filter = translate_filter(filter)?;

        in_session!(self, self.collection(collection).delete_many(filter.clone()))
            .map(|result| result.deleted_count)
            .map_err(|e| DocumentStoreError::backend(format!("delete from {collection}"), e))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Pipeline,
        options: AggregateOptions,
    ) -> DocumentStoreResult<DocumentCursor> {
        let stages = translate_pipeline(&pipeline)?;

        let mut driver_options = MongoAggregateOptions::default();
        driver_options.allow_disk_use = options.allow_disk_use;
        driver_options.batch_size = options.batch_size;

        debug!(collection, stages = stages.len(), "aggregate");

        if let Some(rows) = self
            .aggregate_in_session(collection, stages.clone(), driver_options.clone())
            .await?
        {
            return Ok(Self::rows_cursor(rows));
        }

        let context = format!("aggregate on {collection}");
        let cursor = self
            .collection(collection)
            .aggregate(stages)
            .with_options(driver_options)
            .await
            .map_err(|e| DocumentStoreError::backend(context.clone(), e))?;

        Ok(cursor
            .map_err(move |e| DocumentStoreError::backend(context.clone(), e))
            .boxed())
    }

    async fn count_documents(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        let filter = translate_filter(filter)?;

        in_session!(self, self.collection(collection).count_documents(filter.clone()))
            .map_err(|e| DocumentStoreError::backend(format!("count in {collection}"), e))
    }

    async fn collection_exists(&self, name: &str) -> DocumentStoreResult<bool> {
        match in_session!(self, self.database().list_collection_names().filter(doc! { "name": name })) {
            Ok(names) => Ok(names.iter().any(|existing| existing == name)),
            // Listing is refused inside a transaction; the caller then skips creation.
            Err(e) if command_code(&e).is_some_and(|(_, code_name)| code_name == NOT_IN_TRANSACTION) => Ok(true),
            Err(e) => Err(DocumentStoreError::backend(format!("look up collection {name}"), e)),
        }
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        in_session!(self, self.database().list_collection_names())
            .map_err(|e| DocumentStoreError::backend("list collections", e))
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        match in_session!(self, self.database().create_collection(name)) {
            Ok(()) => Ok(()),
            Err(e) if command_code(&e).is_some_and(|(code, _)| code == NAMESPACE_EXISTS) => Ok(()),
            Err(e) => Err(DocumentStoreError::backend(format!("create collection {name}"), e)),
        }
    }

    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<()> {
        if indexes.is_empty() {
            return self.create_collection(collection).await;
        }

        let models: Vec<_> = indexes.iter().map(index_model).collect();
        in_session!(self, self.collection(collection).create_indexes(models.clone()))
            .map_err(|e| DocumentStoreError::backend(format!("create indexes on {collection}"), e))?;

        debug!(collection, count = indexes.len(), "indexes created");
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        match in_session!(self, self.collection(name).drop()) {
            Ok(()) => Ok(()),
            Err(e) if command_code(&e).is_some_and(|(code, _)| code == NAMESPACE_NOT_FOUND) => {
                Err(DocumentStoreError::CollectionNotFound(name.to_string()))
            }
            Err(e) => Err(DocumentStoreError::backend(format!("drop collection {name}"), e)),
        }
    }

    async fn begin_transaction(&self) -> DocumentStoreResult<bool> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Ok(false);
        }

        let mut session = self
            .client
            .start_session()
            .await
            .map_err(|e| DocumentStoreError::Transaction(e.to_string()))?;
        session
            .start_transaction()
            .await
            .map_err(|e| DocumentStoreError::Transaction(e.to_string()))?;

        *guard = Some(session);
        debug!(database = %self.database, "transaction started");
        Ok(true)
    }

    async fn commit_transaction(&self) -> DocumentStoreResult<()> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Err(DocumentStoreError::Transaction("no active session".to_string()));
        };

        session
            .commit_transaction()
            .await
            .map_err(|e| DocumentStoreError::Transaction(e.to_string()))
    }

    async fn abort_transaction(&self) -> DocumentStoreResult<()> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Err(DocumentStoreError::Transaction("no active session".to_string()));
        };

        session
            .abort_transaction()
            .await
            .map_err(|e| DocumentStoreError::Transaction(e.to_string()))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        let Self {
            client,
            database,
            session,
            observer,
        } = self;

        drop(session.lock().await.take());
        client.shutdown().await;

        info!(database = %database, "disconnected from mongodb");
        if let Some(observer) = observer {
            observer.on_disconnect(&database);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_are_generated_first() {
        let mut document = doc! { "name": "box", "_id": Bson::Null };
        let id = ensure_id(&mut document);

        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(document.keys().next().map(String::as_str), Some(ID_FIELD));
        assert_eq!(document.len(), 2);
    }

    #[test]
    fn existing_ids_are_kept() {
        let mut document = doc! { "_id": 7, "name": "box" };
        assert_eq!(ensure_id(&mut document), Bson::Int32(7));
        assert_eq!(document, doc! { "_id": 7, "name": "box" });
    }

    #[test]
    fn concurrent_outcomes_are_reported_by_submission_index() {
        let indexed = vec![
            (2, WriteOutcome::Failed("duplicate".to_string())),
            (0, WriteOutcome::Applied(None)),
            (1, WriteOutcome::Applied(Some(Bson::Int32(9)))),
        ];

        let outcomes = in_submission_order(indexed);
        assert!(matches!(outcomes[0], WriteOutcome::Applied(None)));
        assert!(matches!(outcomes[1], WriteOutcome::Applied(Some(Bson::Int32(9)))));
        assert!(matches!(outcomes[2], WriteOutcome::Failed(ref reason) if reason == "duplicate"));
    }
}
