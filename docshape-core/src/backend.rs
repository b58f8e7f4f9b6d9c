//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over the external store the
//! orchestrator talks to. The store does all real work (query execution,
//! updates, aggregation); the orchestrator only shapes requests and interprets
//! results.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: An object-safe mirror handed to lifecycle hooks
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Request shapes
//!
//! - filters are ordered `(field, value)` lists ([`Filters`]), duplicates allowed
//! - projections are BSON documents of field selections
//! - sorts are ordered [`Sort`] keys
//! - updates are operator documents such as `{ "$set": { .. } }`
//!
//! # Examples
//!
//! ```ignore
//! use docshape::backend::{FindOptions, StoreBackend};
//! use docshape::query::{QueryFilter, Sort};
//!
//! let filters = QueryFilter::new().add_filter("last_name", "Cobhams").into_filters();
//! let options = FindOptions { sort: Some(vec![Sort::desc("_id")]), limit: Some(5), ..Default::default() };
//!
//! let cursor = backend.find(filters, options, "users").await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::Any, fmt::Debug};

use crate::{
    cursor::DocumentCursor,
    error::DocumentStoreResult,
    query::{Filters, Sort},
};

/// Options for a multi-document read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Vec<Sort>>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

/// Options for a single-document read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Vec<Sort>>,
}

/// Options for a bulk update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Insert a document when nothing matches.
    pub upsert: Option<bool>,
}

/// Options for an aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    /// Allow stages to spill to temporary files on the server.
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
}

/// Outcome of a replace or bulk update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks.
///
/// # Cancellation
///
/// Every method is a single round trip. Dropping the returned future cancels
/// the request; deadlines are applied by the caller.
///
/// # Error Handling
///
/// Store failures are reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend)
/// carrying the driver error unmodified.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`, or `None`.
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Returns a cursor over every document matching `filter`.
    ///
    /// The caller owns the cursor and should close it once read.
    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64>;

    /// Inserts a single document and returns its identity.
    ///
    /// The collection is created automatically if it doesn't exist.
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;

    /// Replaces the first document matching `filter` entirely.
    ///
    /// A replace that matches nothing is not an error at this level; the
    /// result reports `matched_count == 0`.
    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Applies an operator update document to every document matching `filter`.
    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult>;

    /// Runs an aggregation pipeline and returns a cursor over its output.
    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external
    /// connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self).find_one(filter, options, collection).await
    }

    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        (*self).find(filter, options, collection).await
    }

    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64> {
        (*self).count_documents(filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        (*self).insert_one(document, collection).await
    }

    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        (*self)
            .replace_one(filter, replacement, collection)
            .await
    }

    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        (*self)
            .update_many(filter, update, options, collection)
            .await
    }

    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult> {
        (*self).delete_one(filter, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        (*self)
            .aggregate(pipeline, options, collection)
            .await
    }
}

/// Object-safe view of a [`StoreBackend`].
///
/// Lifecycle hooks receive the active store as `&dyn DynStoreBackend`. Hooks
/// that need the concrete backend (for example the MongoDB driver handle) can
/// recover it with [`DynStoreBackend::as_any`].
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor>;
    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64>;
    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;
    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult>;
    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one(self, filter, options, collection).await
    }

    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        StoreBackend::find(self, filter, options, collection).await
    }

    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn insert_one(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        StoreBackend::insert_one(self, document, collection).await
    }

    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::replace_one(self, filter, replacement, collection).await
    }

    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::update_many(self, filter, update, options, collection).await
    }

    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult> {
        StoreBackend::delete_one(self, filter, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        StoreBackend::aggregate(self, pipeline, options, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Async factory for backends, used for builder-style configuration.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
