//! In-memory document storage backend for docshape.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filters** - Equality, comparison, set membership, existence and logical operators on dotted paths
//! - **Updates** - `$set`, `$unset`, `$inc`, `$mul`, `$rename`, `$push`, `$addToSet`, `$pull`
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$count`, `$project`, `$facet`
//!
//! # Quick Start
//!
//! ```ignore
//! use docshape::{DocumentStore, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!
//!     let mut user = User { first_name: "Alice".to_string(), ..Default::default() };
//!     user.setup()?;
//!     store.save_document(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;

mod evaluator;
mod pipeline;
mod update;

pub use error::InMemoryStoreError;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
