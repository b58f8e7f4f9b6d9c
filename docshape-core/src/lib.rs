//! A document-mapping lifecycle layer for MongoDB-compatible stores.
//!
//! This crate is the core of the docshape project and provides:
//!
//! - **Document contract** ([`document`]) - Shared fields, lifecycle methods and lifecycle hooks
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query filters** ([`query`]) - Ordered filter lists with soft-delete exclusion by default
//! - **Update builder** ([`update`]) - Accumulates update-many operations per operator
//! - **Pagination** ([`page`]) - Page arithmetic and paginated results
//! - **Cursors** ([`cursor`]) - Caller-owned streams over multi-document results
//! - **Collections** ([`collection`]) - Untyped operations on a named collection
//! - **Document store** ([`store`]) - The persistence orchestrator
//! - **Operators** ([`operator`]) - MongoDB query, update and aggregation tokens
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docshape_core::document::{Base, Document, DocumentHooks};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(flatten)]
//!     pub base: Base,
//!     pub first_name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn base(&self) -> &Base {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut Base {
//!         &mut self.base
//!     }
//! }
//!
//! impl DocumentHooks for User {}
//! ```

pub mod backend;
pub mod collection;
pub mod cursor;
pub mod document;
pub mod error;
pub mod operator;
pub mod page;
pub mod query;
pub mod store;
pub mod update;
