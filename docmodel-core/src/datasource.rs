//! Streaming over query and pipeline results.
//!
//! A [`DataSource`] owns a prototype value and the parameters of one read. Each
//! call to [`DataSource::exec`] re-runs the read and feeds every decoded row to a
//! callback, so large results never have to be held in memory at once.

use async_trait::async_trait;
use std::io;

use crate::{
    backend::StoreBackend,
    document::{Aggregate, Document},
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    pipeline::AggregateOptions,
    query::{Expr, Query},
};

/// A re-runnable stream of decoded rows.
#[async_trait]
pub trait DataSource: Send {
    type Item: Send + Sync;

    /// Feeds every row to `exec` in cursor order.
    ///
    /// The first error stops the iteration and is returned. When every row was
    /// handled, the last one replaces the source's prototype.
    async fn exec<F>(&mut self, exec: F) -> DocumentStoreResult<()>
    where
        F: FnMut(&Self::Item) -> DocumentStoreResult<()> + Send;

    /// Writes the rows as CSV: `header` once, then one `write_row` call per row.
    ///
    /// The writer is flushed even when the header or a row fails. The first
    /// error encountered is returned.
    async fn export_csv<W, F>(
        &mut self,
        writer: W,
        header: &[&str],
        mut write_row: F,
    ) -> DocumentStoreResult<()>
    where
        W: io::Write + Send,
        F: FnMut(&mut csv::Writer<W>, &Self::Item) -> DocumentStoreResult<()> + Send,
    {
        let mut csv = csv::Writer::from_writer(writer);

        let result = match csv.write_record(header) {
            Ok(()) => self.exec(|item| write_row(&mut csv, item)).await,
            Err(err) => Err(err.into()),
        };
        let flushed = csv
            .flush()
            .map_err(|err| DocumentStoreError::Serialization(err.to_string()));

        result.and(flushed)
    }
}

/// Streams the documents matching a query.
pub struct FindDataSource<'m, B, D> {
    model: &'m Model<B>,
    prototype: D,
    query: Query,
}

impl<'m, B: StoreBackend, D: Document> FindDataSource<'m, B, D> {
    pub fn new(model: &'m Model<B>, prototype: D, query: Query) -> Self {
        Self { model, prototype, query }
    }

    /// The prototype, holding the last row of the most recent complete run.
    pub fn prototype(&self) -> &D {
        &self.prototype
    }

    pub fn into_prototype(self) -> D {
        self.prototype
    }
}

#[async_trait]
impl<'m, B: StoreBackend, D: Document> DataSource for FindDataSource<'m, B, D> {
    type Item = D;

    async fn exec<F>(&mut self, exec: F) -> DocumentStoreResult<()>
    where
        F: FnMut(&D) -> DocumentStoreResult<()> + Send,
    {
        self.model
            .find_and_exec(&mut self.prototype, self.query.clone(), exec)
            .await
    }
}

/// Streams the rows of an aggregation pipeline.
pub struct PipeDataSource<'m, B, A> {
    model: &'m Model<B>,
    prototype: A,
    filter: Expr,
    options: AggregateOptions,
}

impl<'m, B: StoreBackend, A: Aggregate> PipeDataSource<'m, B, A> {
    pub fn new(model: &'m Model<B>, prototype: A, filter: Expr, options: AggregateOptions) -> Self {
        Self { model, prototype, filter, options }
    }

    pub fn prototype(&self) -> &A {
        &self.prototype
    }

    pub fn into_prototype(self) -> A {
        self.prototype
    }
}

#[async_trait]
impl<'m, B: StoreBackend, A: Aggregate> DataSource for PipeDataSource<'m, B, A> {
    type Item = A;

    async fn exec<F>(&mut self, exec: F) -> DocumentStoreResult<()>
    where
        F: FnMut(&A) -> DocumentStoreResult<()> + Send,
    {
        self.model
            .pipe_find_and_exec(&mut self.prototype, &self.filter, self.options.clone(), exec)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rows {
        rows: Vec<u32>,
        last: Option<u32>,
    }

    #[async_trait]
    impl DataSource for Rows {
        type Item = u32;

        async fn exec<F>(&mut self, mut exec: F) -> DocumentStoreResult<()>
        where
            F: FnMut(&u32) -> DocumentStoreResult<()> + Send,
        {
            for row in &self.rows {
                exec(row)?;
            }
            self.last = self.rows.last().copied();
            Ok(())
        }
    }

    #[tokio::test]
    async fn export_writes_header_once_then_rows() {
        let mut source = Rows { rows: vec![3, 1, 2], last: None };
        let mut out = Vec::new();

        source
            .export_csv(&mut out, &["n"], |csv, n| Ok(csv.write_record([n.to_string()])?))
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "n\n3\n1\n2\n");
        assert_eq!(source.last, Some(2));
    }

    #[tokio::test]
    async fn export_flushes_rows_written_before_a_failure() {
        let mut source = Rows { rows: vec![1, 2, 3], last: None };
        let mut out = Vec::new();

        let err = source
            .export_csv(&mut out, &["n"], |csv, n| {
                if *n == 2 {
                    return Err(DocumentStoreError::InvalidDocument("two".into()));
                }
                Ok(csv.write_record([n.to_string()])?)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
        assert_eq!(String::from_utf8(out).unwrap(), "n\n1\n");
        assert_eq!(source.last, None);
    }
}
