//! [`PaginationSource`] implementations backed by a [`Model`].

use async_trait::async_trait;
use std::marker::PhantomData;

use crate::{
    backend::StoreBackend,
    document::{Aggregate, Document},
    error::DocumentStoreResult,
    model::Model,
    page::PaginationSource,
    query::{Expr, Query, Sort},
};

/// Pages through the documents matching a query.
///
/// Counts with the query's filter and reads with [`Model::page_find`], so the
/// query's sort keys apply to every page.
pub struct FindPaginationSource<'m, B, D> {
    model: &'m Model<B>,
    query: Query,
    kind: PhantomData<fn() -> D>,
}

impl<'m, B: StoreBackend, D: Document> FindPaginationSource<'m, B, D> {
    pub fn new(model: &'m Model<B>, query: Query) -> Self {
        Self { model, query, kind: PhantomData }
    }
}

#[async_trait]
impl<'m, B: StoreBackend, D: Document> PaginationSource for FindPaginationSource<'m, B, D> {
    type Item = D;

    async fn count(&self) -> DocumentStoreResult<u64> {
        self.model
            .count_documents::<D>(&self.query.filter_or_all())
            .await
    }

    async fn data<R: Send>(
        &self,
        limit: u64,
        page: u64,
        mapper: &(dyn Fn(D) -> Option<R> + Send + Sync),
    ) -> DocumentStoreResult<Vec<R>> {
        let rows = self
            .model
            .page_find::<D>(self.query.clone(), limit as i64, page as i64)
            .await?;
        Ok(rows.into_iter().filter_map(mapper).collect())
    }
}

/// How a [`PipePaginationSource`] counts its total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeCount {
    /// Applies the filter directly to the collection.
    ///
    /// Only correct when the pipeline neither drops nor multiplies rows.
    Collection,
    /// Runs the pipeline with a count stage appended.
    Pipeline,
}

/// Pages through the rows of an aggregation pipeline.
pub struct PipePaginationSource<'m, B, A> {
    model: &'m Model<B>,
    handle: A,
    filter: Expr,
    sort: Vec<Sort>,
    count: PipeCount,
}

impl<'m, B: StoreBackend, A: Aggregate> PipePaginationSource<'m, B, A> {
    pub fn new(
        model: &'m Model<B>,
        handle: A,
        filter: Expr,
        sort: Vec<Sort>,
        count: PipeCount,
    ) -> Self {
        Self { model, handle, filter, sort, count }
    }
}

#[async_trait]
impl<'m, B: StoreBackend, A: Aggregate> PaginationSource for PipePaginationSource<'m, B, A> {
    type Item = A;

    async fn count(&self) -> DocumentStoreResult<u64> {
        match self.count {
            PipeCount::Collection => self.model.count_documents::<A>(&self.filter).await,
            PipeCount::Pipeline => {
                self.model
                    .count_aggr_documents(&self.handle, &self.filter)
                    .await
            }
        }
    }

    async fn data<R: Send>(
        &self,
        limit: u64,
        page: u64,
        mapper: &(dyn Fn(A) -> Option<R> + Send + Sync),
    ) -> DocumentStoreResult<Vec<R>> {
        let rows = self
            .model
            .page_pipe_find(&self.handle, &self.filter, &self.sort, limit as i64, page as i64)
            .await?;
        Ok(rows.into_iter().filter_map(mapper).collect())
    }
}
