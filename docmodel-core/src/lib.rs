//! A generic persistence layer over document databases.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Capability contract** ([`document`], [`audit`]) - What a kind reports about itself: collection, identity, indexes, audit log
//! - **Model engine** ([`model`]) - Type-agnostic CRUD, aggregation and paging over any kind
//! - **Store backend abstraction** ([`backend`]) - The async trait every database backend implements
//! - **Query, pipeline and update descriptions** ([`query`], [`pipeline`], [`update`]) - Backend-neutral request types
//! - **Streaming** ([`datasource`]) - Callback iteration and CSV export over result cursors
//! - **Pagination** ([`page`], [`source`]) - The paginator and its find and pipeline sources
//! - **Polymorphic documents** ([`variant`]) - Discriminator-driven decoding into one of several shapes
//! - **Error handling** ([`error`]) - The error enum and result alias shared by the workspace
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{Model, document::{Collection, Document}};
//! use bson::{Bson, oid::ObjectId};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Collection for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> Bson {
//!         self.id.map(Bson::ObjectId).unwrap_or(Bson::Null)
//!     }
//!
//!     fn set_id(&mut self, id: Bson) {
//!         if let Bson::ObjectId(oid) = id {
//!             self.id = Some(oid);
//!         }
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod audit;
pub mod backend;
pub mod datasource;
pub mod document;
pub mod error;
pub mod model;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod source;
pub mod update;
pub mod variant;
