//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON documents per collection, in insertion order,
//! behind an async-aware read-write lock.

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};

use docshape_core::{
    backend::{
        AggregateOptions, DeleteResult, FindOneOptions, FindOptions, StoreBackend,
        StoreBackendBuilder, UpdateOptions, UpdateResult,
    },
    cursor::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filters, ID_FIELD, Sort, SortDirection},
};

use crate::{
    error::InMemoryStoreError,
    evaluator::{matches, project, sort_documents},
    pipeline::run_pipeline,
    update::{apply_update, set_path},
};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Every request scans the whole collection; there are no indexes. It is meant
/// for development and tests.
///
/// # Example
///
/// ```ignore
/// use docshape_memory::InMemoryStore;
/// use docshape::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one(doc! { "name": "Alice", "is_deleted": false }, "users").await?;
///
/// let filters = vec![("name".to_string(), "Alice".into())];
/// assert_eq!(store.count_documents(filters, "users").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of stored documents in `collection`, deleted or not.
    pub async fn len(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

/// Documents matching `filter`, cloned, optionally sorted.
fn select(
    documents: &[Document],
    filter: &Filters,
    sort: Option<&[Sort]>,
) -> DocumentStoreResult<Vec<Document>> {
    let mut selected = Vec::new();
    for document in documents {
        if matches(document, filter)? {
            selected.push(document.clone());
        }
    }

    if let Some(sort) = sort {
        let keys = sort
            .iter()
            .map(|key| (key.field.clone(), key.direction))
            .collect::<Vec<(String, SortDirection)>>();
        sort_documents(&mut selected, &keys);
    }

    Ok(selected)
}

fn position(documents: &[Document], filter: &Filters) -> DocumentStoreResult<Option<usize>> {
    for (index, document) in documents.iter().enumerate() {
        if matches(document, filter)? {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

fn apply_projection(
    documents: Vec<Document>,
    projection: Option<&Document>,
) -> DocumentStoreResult<Vec<Document>> {
    match projection {
        Some(projection) => documents
            .into_iter()
            .map(|document| project(document, projection))
            .collect(),
        None => Ok(documents),
    }
}

fn id_key(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(
        &self,
        filter: Filters,
        options: FindOneOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };

        let selected = select(documents, &filter, options.sort.as_deref())?;

        selected
            .into_iter()
            .next()
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => Ok(document),
            })
            .transpose()
    }

    async fn find(
        &self,
        filter: Filters,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(DocumentCursor::from_documents(Vec::new()));
        };

        let selected = select(documents, &filter, options.sort.as_deref())?;

        let skip = options
            .skip
            .and_then(|skip| usize::try_from(skip).ok())
            .unwrap_or(0);
        // A zero limit means no limit; a negative one is treated as its absolute value.
        let limit = match options.limit {
            Some(limit) if limit != 0 => usize::try_from(limit.unsigned_abs()).unwrap_or(usize::MAX),
            _ => usize::MAX,
        };

        let page = selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect::<Vec<_>>();

        Ok(DocumentCursor::from_documents(apply_projection(
            page,
            options.projection.as_ref(),
        )?))
    }

    async fn count_documents(&self, filter: Filters, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(0);
        };

        let mut count = 0;
        for document in documents {
            if matches(document, &filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn insert_one(&self, mut document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            },
        };

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        if documents.iter().any(|existing| existing.get(ID_FIELD) == Some(&id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                id_key(&id),
                collection.to_string(),
            ));
        }

        documents.push(document);

        Ok(id)
    }

    async fn replace_one(
        &self,
        filter: Filters,
        replacement: Document,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        if replacement.keys().any(|key| key.starts_with('$')) {
            return Err(InMemoryStoreError::InvalidUpdate(
                "replacement documents cannot contain update operators".to_string(),
            )
            .into());
        }

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(UpdateResult::default());
        };
        let Some(index) = position(documents, &filter)? else {
            return Ok(UpdateResult::default());
        };

        let original_id = documents[index].get(ID_FIELD).cloned();
        if let (Some(new_id), Some(old_id)) = (replacement.get(ID_FIELD), original_id.as_ref()) {
            if new_id != old_id {
                return Err(InMemoryStoreError::InvalidUpdate("_id is immutable".to_string()).into());
            }
        }

        let mut replaced = Document::new();
        if let Some(id) = original_id {
            replaced.insert(ID_FIELD, id);
        }
        for (field, value) in replacement {
            if field != ID_FIELD {
                replaced.insert(field, value);
            }
        }

        let modified = replaced != documents[index];
        documents[index] = replaced;

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_id: None,
        })
    }

    async fn update_many(
        &self,
        filter: Filters,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        if update.is_empty() || update.keys().any(|key| !key.starts_with('$')) {
            return Err(InMemoryStoreError::InvalidUpdate(
                "update documents may only contain update operators".to_string(),
            )
            .into());
        }

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        let mut result = UpdateResult::default();

        for document in documents.iter_mut() {
            if !matches(document, &filter)? {
                continue;
            }

            result.matched_count += 1;

            let mut updated = document.clone();
            if apply_update(&mut updated, &update)? {
                *document = updated;
                result.modified_count += 1;
            }
        }

        if result.matched_count == 0 && options.upsert.unwrap_or(false) {
            let mut seeded = Document::new();
            for (field, value) in &filter {
                let is_operator = field.starts_with('$')
                    || matches!(value, Bson::Document(inner) if inner.keys().any(|key| key.starts_with('$')));

                if !is_operator {
                    set_path(&mut seeded, field, value.clone())?;
                }
            }

            apply_update(&mut seeded, &update)?;

            let id = match seeded.get(ID_FIELD) {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    seeded.insert(ID_FIELD, id.clone());
                    id
                },
            };

            documents.push(seeded);
            result.upserted_id = Some(id);
        }

        Ok(result)
    }

    async fn delete_one(&self, filter: Filters, collection: &str) -> DocumentStoreResult<DeleteResult> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };

        match position(documents, &filter)? {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteResult { deleted_count: 1 })
            },
            None => Ok(DeleteResult::default()),
        }
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        _options: AggregateOptions,
        collection: &str,
    ) -> DocumentStoreResult<DocumentCursor> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();

        Ok(DocumentCursor::from_documents(run_pipeline(documents, &pipeline)?))
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docshape_memory::InMemoryStore;
/// use docshape::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn filter(field: &str, value: impl Into<Bson>) -> Filters {
        vec![(field.to_string(), value.into())]
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::builder().build().await.unwrap();

        for (id, name, level) in [(1, "Ivy", 2), (2, "Asari", 1), (3, "Joseph", 3)] {
            store
                .insert_one(doc! { "_id": id, "name": name, "level": level, "is_deleted": false }, "users")
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn insert_assigns_id_and_rejects_duplicates() {
        let store = InMemoryStore::new();

        let id = store.insert_one(doc! { "name": "Ivy" }, "users").await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let err = store
            .insert_one(doc! { "_id": id.clone(), "name": "Asari" }, "users")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, ref c) if c == "users"));
        assert_eq!(store.len("users").await, 1);
    }

    #[tokio::test]
    async fn find_sorts_pages_and_projects() {
        let store = seeded().await;

        let options = FindOptions {
            projection: Some(doc! { "name": 1, "_id": 0 }),
            sort: Some(vec![Sort::desc("level")]),
            skip: Some(1),
            limit: Some(1),
        };

        let rows = store
            .find(filter("is_deleted", false), options, "users")
            .await
            .unwrap()
            .collect::<Document>()
            .await
            .unwrap();

        assert_eq!(rows, vec![doc! { "name": "Ivy" }]);
    }

    #[tokio::test]
    async fn find_one_and_count() {
        let store = seeded().await;

        let found = store
            .find_one(filter("level", doc! { "$gt": 1 }), FindOneOptions::default(), "users")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("name").unwrap(), "Ivy");

        assert!(store
            .find_one(filter("name", "Nobody"), FindOneOptions::default(), "users")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_one(filter("name", "Ivy"), FindOneOptions::default(), "missing")
            .await
            .unwrap()
            .is_none());

        assert_eq!(store.count_documents(filter("is_deleted", false), "users").await.unwrap(), 3);
        assert_eq!(store.count_documents(Vec::new(), "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_keeps_identity() {
        let store = seeded().await;

        let result = store
            .replace_one(filter("_id", 2), doc! { "name": "Asari", "level": 5 }, "users")
            .await
            .unwrap();
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);

        let replaced = store
            .find_one(filter("_id", 2), FindOneOptions::default(), "users")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced, doc! { "_id": 2, "name": "Asari", "level": 5 });

        let result = store
            .replace_one(filter("_id", 42), doc! { "name": "Nobody" }, "users")
            .await
            .unwrap();
        assert_eq!(result.matched_count, 0);

        assert!(store
            .replace_one(filter("_id", 1), doc! { "_id": 9, "name": "Ivy" }, "users")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_many_and_upsert() {
        let store = seeded().await;

        let result = store
            .update_many(
                filter("level", doc! { "$gte": 2 }),
                doc! { "$set": { "rank": "senior" }, "$inc": { "level": 1 } },
                UpdateOptions::default(),
                "users",
            )
            .await
            .unwrap();
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.modified_count, 2);
        assert_eq!(store.count_documents(filter("rank", "senior"), "users").await.unwrap(), 2);

        let result = store
            .update_many(
                filter("name", "Zainab"),
                doc! { "$set": { "level": 1 } },
                UpdateOptions { upsert: Some(true) },
                "users",
            )
            .await
            .unwrap();
        assert_eq!(result.matched_count, 0);
        assert!(result.upserted_id.is_some());
        assert_eq!(store.count_documents(filter("name", "Zainab"), "users").await.unwrap(), 1);

        assert!(store
            .update_many(Vec::new(), doc! { "name": "plain" }, UpdateOptions::default(), "users")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_one_removes_first_match() {
        let store = seeded().await;

        let result = store.delete_one(filter("_id", 3), "users").await.unwrap();
        assert_eq!(result.deleted_count, 1);

        let result = store.delete_one(filter("_id", 3), "users").await.unwrap();
        assert_eq!(result.deleted_count, 0);
        assert_eq!(store.len("users").await, 2);
    }

    #[tokio::test]
    async fn aggregate_runs_pipeline() {
        let store = seeded().await;

        let rows = store
            .aggregate(
                vec![doc! { "$match": { "level": { "$lt": 3 } } }, doc! { "$count": "total" }],
                AggregateOptions::default(),
                "users",
            )
            .await
            .unwrap()
            .collect::<Document>()
            .await
            .unwrap();

        assert_eq!(rows, vec![doc! { "total": 2 }]);
    }
}
