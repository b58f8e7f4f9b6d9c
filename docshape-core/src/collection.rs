//! Untyped collection handle for raw document operations.
//!
//! A [`Collection`] addresses one collection by name and works with raw BSON
//! documents. It carries the request shaping shared by every read: projection
//! validation, soft-delete filter injection, filter validation and the default
//! `_id` descending sort. The typed operations of
//! [`DocumentStore`](crate::store::DocumentStore) build on it.
//!
//! # Example
//!
//! ```ignore
//! use docshape::page::PageOptions;
//! use docshape::query::QueryFilter;
//!
//! let users = store.collection("users");
//!
//! let filters = QueryFilter::new().add_filter("last_name", "Cobhams").into_filters();
//! let page = users.find_paginated(PageOptions::new(1, 10), filters, None, None).await?;
//!
//! let rows = page.cursor.collect::<bson::Document>().await?;
//! ```

use bson::{Bson, Document};
use tracing::debug;

use crate::{
    backend::{AggregateOptions, FindOneOptions, FindOptions, StoreBackend, UpdateOptions, UpdateResult},
    cursor::DocumentCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    operator,
    page::{AggregationPaginatedResult, PageOptions, PaginatedResult, Paginator},
    query::{Filters, ID_FIELD, IS_DELETED_FIELD, Sort},
    update::UpdateManyBuilder,
};

/// An untyped collection with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first non-deleted document matching `filters`.
    ///
    /// An `is_deleted = false` constraint is appended unless `filters` already
    /// constrain `is_deleted`.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::InvalidProjection`] for a malformed projection
    /// * [`DocumentStoreError::EmptyFilterField`] if a constraint has no field name
    /// * [`DocumentStoreError::DocumentNotFound`] if nothing matches
    pub async fn find_one(
        &self,
        filters: Filters,
        projection: Option<Document>,
    ) -> DocumentStoreResult<Document> {
        let filters = prepare_read(filters, projection.as_ref())?;

        self.find_one_prepared(filters, projection).await
    }

    /// Dispatches a single-document read whose inputs were already validated.
    pub(crate) async fn find_one_prepared(
        &self,
        filters: Filters,
        projection: Option<Document>,
    ) -> DocumentStoreResult<Document> {
        debug!(collection = %self.name, filters = filters.len(), "find_one");

        let options = FindOneOptions { projection, sort: None };

        self.backend
            .find_one(filters, options, &self.name)
            .await?
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(self.name.clone()))
    }

    /// Returns a page of documents matching `filters`.
    ///
    /// The total row count is read first, then the page itself is requested
    /// with the paginator's offset and page size. `sort` defaults to `_id`
    /// descending.
    pub async fn find_paginated(
        &self,
        page_options: PageOptions,
        filters: Filters,
        projection: Option<Document>,
        sort: Option<Vec<Sort>>,
    ) -> DocumentStoreResult<PaginatedResult> {
        let filters = prepare_read(filters, projection.as_ref())?;

        let mut paginator = Paginator::new(page_options);
        paginator.set_offset();

        debug!(
            collection = %self.name,
            filters = filters.len(),
            page = paginator.current_page,
            per_page = paginator.per_page,
            "find_paginated"
        );

        let total_rows = self
            .backend
            .count_documents(filters.clone(), &self.name)
            .await?;

        let options = FindOptions {
            projection,
            sort: Some(sort.unwrap_or_else(default_sort)),
            skip: Some(u64::try_from(paginator.offset).unwrap_or_default()),
            limit: Some(paginator.per_page),
        };

        let cursor = self
            .backend
            .find(filters, options, &self.name)
            .await?;

        paginator.set_total_rows(i64::try_from(total_rows).unwrap_or(i64::MAX));

        Ok(PaginatedResult { paginator, cursor })
    }

    /// Returns a cursor over the `limit` most recently created matching documents.
    ///
    /// Recency follows identity order, which increases monotonically.
    pub async fn find_last_n(
        &self,
        limit: i64,
        filters: Filters,
        projection: Option<Document>,
    ) -> DocumentStoreResult<DocumentCursor> {
        let filters = prepare_read(filters, projection.as_ref())?;

        debug!(collection = %self.name, filters = filters.len(), limit, "find_last_n");

        let options = FindOptions {
            projection,
            sort: Some(default_sort()),
            limit: Some(limit),
            ..Default::default()
        };

        self.backend
            .find(filters, options, &self.name)
            .await
    }

    /// Returns a cursor over every matching document.
    ///
    /// There is no bound on the result size; prefer [`Collection::find_paginated`]
    /// for collections that can grow large.
    pub async fn find_all(
        &self,
        filters: Filters,
        projection: Option<Document>,
        sort: Option<Vec<Sort>>,
    ) -> DocumentStoreResult<DocumentCursor> {
        let filters = prepare_read(filters, projection.as_ref())?;

        debug!(collection = %self.name, filters = filters.len(), "find_all");

        let options = FindOptions {
            projection,
            sort: Some(sort.unwrap_or_else(default_sort)),
            ..Default::default()
        };

        self.backend
            .find(filters, options, &self.name)
            .await
    }

    /// Counts the documents matching `filters` as given.
    ///
    /// No soft-delete constraint is injected.
    pub async fn count_documents(&self, filters: Filters) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, filters = filters.len(), "count_documents");

        self.backend
            .count_documents(filters, &self.name)
            .await
    }

    /// Applies the accumulated operations of `builder` to every matching document.
    ///
    /// # Errors
    ///
    /// * [`DocumentStoreError::EmptyUpdate`] if the builder holds no operations
    /// * [`DocumentStoreError::EmptyFilterField`] if a constraint has no field name
    pub async fn update_many(
        &self,
        filters: Filters,
        builder: &UpdateManyBuilder,
        options: Option<UpdateOptions>,
    ) -> DocumentStoreResult<UpdateResult> {
        if !builder.has_values() {
            return Err(DocumentStoreError::EmptyUpdate);
        }
        validate_filters(&filters)?;

        let update = builder.to_document();
        debug!(
            collection = %self.name,
            filters = filters.len(),
            operators = update.len(),
            "update_many"
        );

        self.backend
            .update_many(filters, update, options.unwrap_or_default(), &self.name)
            .await
    }

    /// Runs an aggregation pipeline.
    ///
    /// Without explicit options, disk use is allowed.
    pub async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: Option<AggregateOptions>,
    ) -> DocumentStoreResult<DocumentCursor> {
        debug!(collection = %self.name, stages = pipeline.len(), "aggregate");

        self.backend
            .aggregate(pipeline, options.unwrap_or_else(default_aggregate_options), &self.name)
            .await
    }

    /// Runs an aggregation pipeline and returns one page of its output.
    ///
    /// A `$facet` stage is appended that computes the total under `meta` and
    /// the requested page under `data`. When either comes back empty the
    /// paginator carries only the requested page, size and offset.
    pub async fn aggregate_paginated(
        &self,
        page_options: PageOptions,
        mut pipeline: Vec<Document>,
        options: Option<AggregateOptions>,
    ) -> DocumentStoreResult<AggregationPaginatedResult> {
        let mut paginator = Paginator::new(page_options);
        paginator.set_offset();

        pipeline.push(facet_stage(&paginator));

        let mut cursor = self.aggregate(pipeline, options).await?;

        let mut last = None;
        while let Some(document) = cursor.next_document().await {
            last = Some(document?);
        }
        cursor.close().await;

        let (total, data) = match last {
            Some(result) => unpack_facet(result),
            None => (None, Vec::new()),
        };

        if let Some(total) = total {
            if !data.is_empty() {
                paginator.set_total_rows(total);
            }
        }

        Ok(AggregationPaginatedResult { paginator, data })
    }
}

/// Validates the projection, injects the soft-delete constraint and validates the filters.
pub(crate) fn prepare_read(
    filters: Filters,
    projection: Option<&Document>,
) -> DocumentStoreResult<Filters> {
    validate_projection(projection)?;

    let filters = apply_is_deleted_filter(filters);
    validate_filters(&filters)?;

    Ok(filters)
}

/// Appends `is_deleted = false` unless some constraint already targets `is_deleted`.
pub(crate) fn apply_is_deleted_filter(mut filters: Filters) -> Filters {
    if !filters.iter().any(|(field, _)| field == IS_DELETED_FIELD) {
        filters.push((IS_DELETED_FIELD.to_string(), Bson::Boolean(false)));
    }

    filters
}

pub(crate) fn validate_filters(filters: &Filters) -> DocumentStoreResult<()> {
    if filters.iter().any(|(field, _)| field.is_empty()) {
        return Err(DocumentStoreError::EmptyFilterField);
    }

    Ok(())
}

/// A projection maps field names to inclusion flags (numbers or booleans) or
/// to projection operator documents such as `{ "$slice": 5 }`.
pub(crate) fn validate_projection(projection: Option<&Document>) -> DocumentStoreResult<()> {
    let Some(projection) = projection else {
        return Ok(());
    };

    for (field, value) in projection {
        let valid = match value {
            Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Boolean(_) => true,
            Bson::Document(expression) => expression.keys().all(|key| key.starts_with('$')),
            _ => false,
        };

        if field.is_empty() || !valid {
            return Err(DocumentStoreError::InvalidProjection(format!(
                "field {field:?} has unsupported value {value}"
            )));
        }
    }

    Ok(())
}

pub(crate) fn default_sort() -> Vec<Sort> {
    vec![Sort::desc(ID_FIELD)]
}

fn default_aggregate_options() -> AggregateOptions {
    AggregateOptions { allow_disk_use: Some(true), ..Default::default() }
}

fn facet_stage(paginator: &Paginator) -> Document {
    let mut count = Document::new();
    count.insert(operator::COUNT, "total");

    let mut skip = Document::new();
    skip.insert(operator::SKIP, paginator.offset);

    let mut limit = Document::new();
    limit.insert(operator::LIMIT, paginator.per_page);

    let mut facet = Document::new();
    facet.insert("meta", vec![Bson::Document(count)]);
    facet.insert("data", vec![Bson::Document(skip), Bson::Document(limit)]);

    let mut stage = Document::new();
    stage.insert(operator::FACET, facet);
    stage
}

fn unpack_facet(result: Document) -> (Option<i64>, Vec<Document>) {
    let total = result
        .get_array("meta")
        .ok()
        .and_then(|meta| meta.first())
        .and_then(Bson::as_document)
        .and_then(|meta| meta.get("total"))
        .and_then(|total| match total {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            // Only whole, in-range doubles count as a total.
            Bson::Double(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
                Some(*n as i64)
            },
            _ => None,
        });

    let data = result
        .get_array("data")
        .map(|data| {
            data.iter()
                .filter_map(Bson::as_document)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    (total, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn is_deleted_filter_is_appended_once() {
        let filters = apply_is_deleted_filter(vec![("name".into(), "Ivy".into())]);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[1], ("is_deleted".to_string(), Bson::Boolean(false)));

        let filters = apply_is_deleted_filter(vec![("is_deleted".into(), true.into())]);
        assert_eq!(filters, vec![("is_deleted".to_string(), Bson::Boolean(true))]);
    }

    #[test]
    fn empty_field_names_are_rejected() {
        let filters = vec![("is_deleted".to_string(), Bson::Boolean(false)), (String::new(), Bson::Null)];

        assert!(matches!(
            validate_filters(&filters),
            Err(DocumentStoreError::EmptyFilterField)
        ));
        assert!(matches!(
            prepare_read(vec![(String::new(), "x".into())], None),
            Err(DocumentStoreError::EmptyFilterField)
        ));
    }

    #[test]
    fn projections_must_select_fields() {
        assert!(validate_projection(None).is_ok());
        assert!(validate_projection(Some(&doc! { "email": 1, "phone": true })).is_ok());
        assert!(validate_projection(Some(&doc! { "tags": { "$slice": 5 } })).is_ok());

        assert!(matches!(
            validate_projection(Some(&doc! { "email": "yes" })),
            Err(DocumentStoreError::InvalidProjection(_))
        ));
        assert!(matches!(
            validate_projection(Some(&doc! { "profile": { "name": 1 } })),
            Err(DocumentStoreError::InvalidProjection(_))
        ));
    }

    #[test]
    fn facet_stage_uses_paginator_window() {
        let mut paginator = Paginator::new(PageOptions::new(3, 10));
        paginator.set_offset();

        assert_eq!(
            facet_stage(&paginator),
            doc! {
                "$facet": {
                    "meta": [{ "$count": "total" }],
                    "data": [{ "$skip": 20_i64 }, { "$limit": 10_i64 }],
                }
            }
        );
    }

    #[test]
    fn facet_result_is_unpacked() {
        let (total, data) = unpack_facet(doc! {
            "meta": [{ "total": 3 }],
            "data": [{ "name": "Ivy" }],
        });
        assert_eq!(total, Some(3));
        assert_eq!(data, vec![doc! { "name": "Ivy" }]);

        let (total, _) = unpack_facet(doc! { "meta": [{ "total": 4.0 }], "data": [] });
        assert_eq!(total, Some(4));

        let (total, _) = unpack_facet(doc! { "meta": [{ "total": 4.5 }], "data": [] });
        assert_eq!(total, None);

        let (total, _) = unpack_facet(doc! { "meta": [{ "total": f64::NAN }], "data": [] });
        assert_eq!(total, None);

        let (total, data) = unpack_facet(doc! { "meta": [], "data": [] });
        assert_eq!(total, None);
        assert!(data.is_empty());
    }
}
