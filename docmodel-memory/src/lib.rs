//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filters and sorting** - Dotted paths, array matching and cross-type ordering
//! - **Aggregation** - Match, sort, skip, limit, count and project stages
//! - **Field updates** - `$set`, `$unset` and `$push` semantics, with upserts
//! - **Unique indexes** - Enforced on every insert and update
//! - **Snapshot transactions** - Begin, commit and abort on a shared handle
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{Model, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let model = Model::new(backend);
//!
//!     let mut user = User::new("alice@example.com");
//!     model.save(&mut user, None).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

pub mod evaluator;
mod pipeline;
pub mod store;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
