//! Main docshape crate providing a document-mapping layer over MongoDB-style stores.
//!
//! This crate is the primary entry point for users of docshape. It re-exports
//! the core types from the sub-crates, the `Document` derive macro, and the
//! storage backends.
//!
//! # Features
//!
//! - **Lifecycle** - Identity and timestamps assigned on setup, refreshed on update
//! - **Soft delete** - Deleted documents stay stored and are hidden from default reads
//! - **Hooks** - Optional pre/post callbacks around create, update, delete and find
//! - **Pagination** - Page arithmetic for finds and aggregation pipelines
//! - **Multiple backends** - MongoDB for persistence, in-memory for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use docshape::{prelude::*, memory::InMemoryStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Document)]
//! #[document(collection = "users")]
//! pub struct User {
//!     #[serde(flatten)]
//!     pub base: Base,
//!     pub first_name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!
//!     let mut user = User { first_name: "Ivy".to_string(), ..Default::default() };
//!     user.setup()?;
//!     store.save_document(&mut user).await?;
//!
//!     let mut found = User::default();
//!     store.find_one_by_id(user.id().unwrap(), None, &mut found).await?;
//!
//!     store.soft_delete_document(&mut found).await?;
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Hooks
//!
//! Derive with `#[document(hooks)]` and implement [`document::DocumentHooks`]
//! yourself. A failing hook aborts the operation with
//! [`error::DocumentStoreError::Hook`].
//!
//! ```ignore
//! use docshape::{prelude::*, async_trait};
//!
//! #[async_trait]
//! impl DocumentHooks for User {
//!     async fn pre_create(&mut self, _store: &dyn DynStoreBackend) -> HookResult {
//!         self.first_name = self.first_name.trim().to_string();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docshape;

pub mod prelude;

pub use docshape_core::{backend, collection, cursor, document, error, operator, page, query, store, update};
pub use docshape_macros::Document;

pub use async_trait::async_trait;
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docshape_memory::{InMemoryStore, InMemoryStoreBuilder, InMemoryStoreError};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docshape_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
