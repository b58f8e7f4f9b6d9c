//! MongoDB backend for docshape.
//!
//! This crate implements the `StoreBackend` trait on top of the official
//! MongoDB driver. Filters, sorts, projections and pipelines are handed to the
//! server as-is; driver errors are surfaced unmodified.
//!
//! Enable it through the `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! docshape = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder parses the connection string, applies a connect and
//! server-selection timeout (10 seconds unless overridden) and pings the
//! primary before returning the store.
//!
//! # Example
//!
//! ```ignore
//! use docshape::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .app_name("my-service")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod query;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
