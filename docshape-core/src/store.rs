//! The persistence orchestrator.
//!
//! [`DocumentStore`] is the primary API. It coordinates validation, soft-delete
//! filter injection, lifecycle hook ordering and dispatch to the backend for
//! every document operation. Typed operations take the collection name from
//! [`Document::collection_name`]; [`DocumentStore::collection`] gives untyped
//! access by name.
//!
//! # Example
//!
//! ```ignore
//! use docshape::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//!
//! let mut user = User { first_name: "Ivy".into(), ..Default::default() };
//! user.setup()?;
//! store.save_document(&mut user).await?;
//!
//! let mut found = User::default();
//! store.find_one_by_id(user.id().unwrap(), None, &mut found).await?;
//! ```

use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use tracing::debug;

use crate::{
    backend::{AggregateOptions, DeleteResult, StoreBackend, UpdateOptions, UpdateResult},
    collection::{Collection, prepare_read},
    cursor::DocumentCursor,
    document::{Document, DocumentExt, HookResult},
    error::{DocumentStoreError, DocumentStoreResult, HookStage},
    page::{AggregationPaginatedResult, PageOptions, PaginatedResult},
    query::{Filters, ID_FIELD, QueryFilter, Sort},
    update::UpdateManyBuilder,
};

/// A document store bound to a specific backend implementation.
///
/// The store is an explicitly constructed handle; there is no process-wide
/// connection. It may be shared between tasks by reference.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    fn collection_of<D: Document>(&self) -> Collection<'_, B> {
        self.collection(D::collection_name())
    }

    /// Finds the first non-deleted document matching `filters` and decodes it into `target`.
    ///
    /// `target`'s `pre_find_one` hook runs before the read and its
    /// `post_find_one` hook after `target` has been filled.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::InvalidProjection`] for a malformed projection
    /// * [`DocumentStoreError::EmptyFilterField`] if a constraint has no field name
    /// * [`DocumentStoreError::Hook`] if a hook fails
    /// * [`DocumentStoreError::DocumentNotFound`] if nothing matches
    pub async fn find_one<D: Document>(
        &self,
        filters: Filters,
        projection: Option<BsonDocument>,
        target: &mut D,
    ) -> DocumentStoreResult<()> {
        let filters = prepare_read(filters, projection.as_ref())?;

        check_hook::<D>(HookStage::PreFindOne, target.pre_find_one(&self.backend).await)?;

        let found = self
            .collection_of::<D>()
            .find_one_prepared(filters, projection)
            .await?;
        *target = D::from_bson_document(found)?;

        check_hook::<D>(HookStage::PostFindOne, target.post_find_one(&self.backend).await)
    }

    /// Finds the non-deleted document with the given identity.
    pub async fn find_one_by_id<D: Document>(
        &self,
        id: ObjectId,
        projection: Option<BsonDocument>,
        target: &mut D,
    ) -> DocumentStoreResult<()> {
        let filters = QueryFilter::new().add_filter(ID_FIELD, id).into_filters();

        self.find_one(filters, projection, target).await
    }

    /// Finds the first non-deleted document whose `field` equals `value`.
    pub async fn find_one_by_field<D: Document>(
        &self,
        field: &str,
        value: impl Into<Bson>,
        projection: Option<BsonDocument>,
        target: &mut D,
    ) -> DocumentStoreResult<()> {
        let filters = QueryFilter::new().add_filter(field, value).into_filters();

        self.find_one(filters, projection, target).await
    }

    /// Returns a page of `D` documents matching `filters`.
    ///
    /// The caller owns the returned cursor.
    pub async fn find_paginated<D: Document>(
        &self,
        page_options: PageOptions,
        filters: Filters,
        projection: Option<BsonDocument>,
        sort: Option<Vec<Sort>>,
    ) -> DocumentStoreResult<PaginatedResult> {
        self.collection_of::<D>()
            .find_paginated(page_options, filters, projection, sort)
            .await
    }

    /// Decodes the most recently created matching document into `target`.
    ///
    /// No hooks run.
    pub async fn find_last<D: Document>(
        &self,
        filters: Filters,
        projection: Option<BsonDocument>,
        target: &mut D,
    ) -> DocumentStoreResult<()> {
        let mut cursor = self.find_last_n::<D>(1, filters, projection).await?;

        let last = cursor.next::<D>().await;
        cursor.close().await;

        match last {
            Some(found) => {
                *target = found?;
                Ok(())
            }
            None => Err(DocumentStoreError::DocumentNotFound(D::collection_name().to_string())),
        }
    }

    /// Returns a cursor over the `limit` most recently created matching documents.
    pub async fn find_last_n<D: Document>(
        &self,
        limit: i64,
        filters: Filters,
        projection: Option<BsonDocument>,
    ) -> DocumentStoreResult<DocumentCursor> {
        self.collection_of::<D>()
            .find_last_n(limit, filters, projection)
            .await
    }

    /// Returns a cursor over every matching document, `_id` descending unless `sort` is given.
    ///
    /// The result is unbounded.
    pub async fn find_all<D: Document>(
        &self,
        filters: Filters,
        projection: Option<BsonDocument>,
        sort: Option<Vec<Sort>>,
    ) -> DocumentStoreResult<DocumentCursor> {
        self.collection_of::<D>()
            .find_all(filters, projection, sort)
            .await
    }

    /// Persists `document`: inserts it when new, replaces the stored copy otherwise.
    ///
    /// For a new document `pre_create` runs, the document is inserted and
    /// marked as no longer new, then `post_create` runs. For an existing
    /// document `pre_update` runs, the update timestamp is refreshed, the
    /// non-deleted stored copy with the same identity is replaced, then
    /// `post_update` runs. A failing hook aborts the remaining stages.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::NotSetUp`] if `setup()` was never called
    /// * [`DocumentStoreError::Hook`] if a hook fails
    /// * [`DocumentStoreError::DocumentNotFound`] if an existing document is no longer stored
    pub async fn save_document<D: Document>(&self, document: &mut D) -> DocumentStoreResult<()> {
        if !document.can_save() {
            return Err(DocumentStoreError::NotSetUp);
        }

        if document.is_new() {
            check_hook::<D>(HookStage::PreCreate, document.pre_create(&self.backend).await)?;

            debug!(collection = D::collection_name(), "insert_one");
            self.backend
                .insert_one(document.to_bson_document()?, D::collection_name())
                .await?;
            document.set_is_new(false);

            check_hook::<D>(HookStage::PostCreate, document.post_create(&self.backend).await)
        } else {
            check_hook::<D>(HookStage::PreUpdate, document.pre_update(&self.backend).await)?;

            self.replace_document(document).await?;

            check_hook::<D>(HookStage::PostUpdate, document.post_update(&self.backend).await)
        }
    }

    /// Applies the operations of `builder` to every `D` document matching `filters`.
    ///
    /// `filters` are used as given; no soft-delete constraint is injected.
    pub async fn update_many<D: Document>(
        &self,
        filters: Filters,
        builder: &UpdateManyBuilder,
        options: Option<UpdateOptions>,
    ) -> DocumentStoreResult<UpdateResult> {
        self.collection_of::<D>()
            .update_many(filters, builder, options)
            .await
    }

    /// Counts the `D` documents matching `filters` as given.
    pub async fn count_documents<D: Document>(&self, filters: Filters) -> DocumentStoreResult<u64> {
        self.collection_of::<D>()
            .count_documents(filters)
            .await
    }

    /// Marks `document` as deleted and persists it.
    ///
    /// The stored record is kept but hidden from default queries. Runs
    /// `pre_soft_delete` after the document was marked and `post_soft_delete`
    /// after the replace.
    pub async fn soft_delete_document<D: Document>(&self, document: &mut D) -> DocumentStoreResult<()> {
        if document.id().is_none() {
            return Err(DocumentStoreError::NotSetUp);
        }

        document.before_soft_delete();

        check_hook::<D>(
            HookStage::PreSoftDelete,
            document.pre_soft_delete(&self.backend).await,
        )?;

        self.replace_document(document).await?;

        check_hook::<D>(
            HookStage::PostSoftDelete,
            document.post_soft_delete(&self.backend).await,
        )
    }

    /// Permanently removes `document` from the store by identity.
    ///
    /// The record is removed whether or not it was soft-deleted before.
    pub async fn hard_delete_document<D: Document>(
        &self,
        document: &mut D,
    ) -> DocumentStoreResult<DeleteResult> {
        let Some(id) = document.id() else {
            return Err(DocumentStoreError::NotSetUp);
        };

        check_hook::<D>(
            HookStage::PreHardDelete,
            document.pre_hard_delete(&self.backend).await,
        )?;

        debug!(collection = D::collection_name(), %id, "delete_one");
        let result = self
            .backend
            .delete_one(vec![(ID_FIELD.to_string(), Bson::ObjectId(id))], D::collection_name())
            .await?;

        check_hook::<D>(
            HookStage::PostHardDelete,
            document.post_hard_delete(&self.backend).await,
        )?;

        Ok(result)
    }

    /// Runs an aggregation pipeline over the `D` collection.
    pub async fn aggregate<D: Document>(
        &self,
        pipeline: Vec<BsonDocument>,
        options: Option<AggregateOptions>,
    ) -> DocumentStoreResult<DocumentCursor> {
        self.collection_of::<D>()
            .aggregate(pipeline, options)
            .await
    }

    /// Runs an aggregation pipeline over the `D` collection and returns one page of its output.
    pub async fn aggregate_paginated<D: Document>(
        &self,
        page_options: PageOptions,
        pipeline: Vec<BsonDocument>,
        options: Option<AggregateOptions>,
    ) -> DocumentStoreResult<AggregationPaginatedResult> {
        self.collection_of::<D>()
            .aggregate_paginated(page_options, pipeline, options)
            .await
    }

    /// Cleanly shuts down the backend.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    /// Refreshes the update timestamp and replaces the non-deleted stored copy.
    async fn replace_document<D: Document>(&self, document: &mut D) -> DocumentStoreResult<()> {
        let Some(id) = document.id() else {
            return Err(DocumentStoreError::NotSetUp);
        };

        let filters = prepare_read(QueryFilter::new().add_filter(ID_FIELD, id).into_filters(), None)?;

        document.before_update();

        debug!(collection = D::collection_name(), %id, "replace_one");
        let result = self
            .backend
            .replace_one(filters, document.to_bson_document()?, D::collection_name())
            .await?;

        if result.matched_count == 0 {
            return Err(DocumentStoreError::DocumentNotFound(D::collection_name().to_string()));
        }

        Ok(())
    }
}

/// Converts a hook outcome into the orchestrator's error, tagging the failed stage.
fn check_hook<D: Document>(stage: HookStage, result: HookResult) -> DocumentStoreResult<()> {
    result.map_err(|source| {
        debug!(collection = D::collection_name(), %stage, error = %source, "lifecycle hook failed");
        DocumentStoreError::Hook { stage, source }
    })
}
