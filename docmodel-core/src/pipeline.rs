//! Aggregation pipeline stages.
//!
//! Pipelines are built by [`Aggregate`](crate::document::Aggregate) kinds and
//! extended by the model for paging and counting. Backends translate each stage
//! in order; [`Stage::Raw`] passes a database-native stage through untouched.

use bson::Document;

use crate::query::{Expr, Sort};

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps rows matching the expression.
    Match(Expr),
    /// Orders rows by the given keys.
    Sort(Vec<Sort>),
    /// Drops the first `n` rows.
    Skip(u64),
    /// Keeps at most `n` rows.
    Limit(u64),
    /// Replaces the rows with a single `{field: n}` row. Produces no row when
    /// the input is empty.
    Count(String),
    /// Reshapes rows (`{field: 1}` includes, `{field: 0}` excludes).
    Project(Document),
    /// A stage in the database's own syntax.
    Raw(Document),
}

/// An ordered list of stages.
pub type Pipeline = Vec<Stage>;

/// Options for running a pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Allows stages to spill to disk.
    pub allow_disk_use: Option<bool>,
    /// Number of rows per cursor batch.
    pub batch_size: Option<u32>,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_disk_use(mut self, allow: bool) -> Self {
        self.allow_disk_use = Some(allow);
        self
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }
}
