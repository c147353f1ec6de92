//! Convenient re-exports of commonly used types from docmodel.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    audit::{Actor, AuditEntry, AuditLog},
    backend::{StoreBackend, StoreBackendBuilder},
    datasource::DataSource,
    document::{Aggregate, Collection, CollectionSpec, Document, DocumentExt, IndexSpec},
    error::{DocumentStoreError, DocumentStoreResult},
    model::{BatchSave, Model},
    page::{Pagination, PaginationSource, paginate},
    pipeline::{AggregateOptions, Pipeline, Stage},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    update::Update,
    variant::{Envelope, Polymorphic},
};
