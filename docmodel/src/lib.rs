//! Main docmodel crate providing a unified interface for document persistence.
//!
//! This crate is the primary entry point for users of docmodel. It re-exports the
//! core types from the sub-crates and gives convenient access to the storage
//! backends.
//!
//! # Features
//!
//! - **Generic model** - One [`Model`] saves, finds, updates and removes any document kind
//! - **Multiple backends** - In-memory and MongoDB storage behind one async trait
//! - **Flexible querying** - Composable filters, sorting, projections and aggregation pipelines
//! - **Streaming and export** - Callback iteration and CSV export over cursors
//! - **Pagination** - Page metadata over plain finds or aggregation pipelines
//! - **Audit trails** - Optional per-document records of who changed what
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::{Bson, oid::ObjectId};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Collection for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> Bson { self.id.map(Bson::ObjectId).unwrap_or(Bson::Null) }
//!     fn set_id(&mut self, id: Bson) {
//!         if let Bson::ObjectId(oid) = id { self.id = Some(oid); }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let model = Model::new(InMemoryStore::builder().build().await?);
//!
//!     let mut user = User { id: None, name: "Alice".to_string() };
//!     model.save(&mut user, None).await?;
//!
//!     let users: Vec<User> = model
//!         .find(Query::builder().filter(Filter::eq("name", "Alice")).build())
//!         .await?;
//!     println!("Queried users: {:?}", users);
//!
//!     let page = paginate(&model.pagination_source::<User>(Query::new()), 20, 1, Some).await?;
//!     println!("{:?}", page.map(|p| p.all_pages));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    audit, backend, datasource, document, error, model, page, pipeline, query, source, update, variant,
};
pub use docmodel_core::model::Model;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{
        CONNECT_TIMEOUT, ConnectionObserver, MongoConfig, MongoDbStore, MongoDbStoreBuilder,
    };
}
