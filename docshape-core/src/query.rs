//! Query filter construction and sort specifications.
//!
//! Filters are an ordered list of `(field, value)` constraints. A value is either
//! a plain value (equality) or an operator document such as `{ "$gt": 3 }`.
//! Duplicated field names are allowed and kept in order.
//!
//! # Example
//!
//! ```ignore
//! use docshape::query::QueryFilter;
//! use docshape::operator;
//! use bson::doc;
//!
//! let filters = QueryFilter::new()
//!     .add_filter("last_name", "Cobhams")
//!     .add_filter("level", doc! { operator::GTE: 2 })
//!     .into_filters();
//!
//! // [("is_deleted", false), ("last_name", "Cobhams"), ("level", { "$gte": 2 })]
//! assert_eq!(filters.len(), 3);
//! ```

use bson::{Bson, Document};

/// Name of the identity field.
pub const ID_FIELD: &str = "_id";

/// Name of the soft-delete flag.
pub const IS_DELETED_FIELD: &str = "is_deleted";

/// An ordered list of `(field, value)` constraints.
pub type Filters = Vec<(String, Bson)>;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The numeric direction understood by the store (`1` or `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// Renders an ordered sort specification as a store sort document.
    pub fn to_document(sort: &[Sort]) -> Document {
        sort.iter()
            .map(|s| (s.field.clone(), Bson::Int32(s.direction.as_i32())))
            .collect()
    }
}

/// Builder for an ordered list of filter constraints.
///
/// [`QueryFilter::new`] seeds the list with `is_deleted = false`, so soft-deleted
/// documents are excluded by default. [`QueryFilter::including_deleted`] seeds it
/// with `is_deleted = true` instead, matching only soft-deleted documents.
///
/// The builder is not synchronized; it is meant to have a single owner.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    filters: Filters,
}

impl QueryFilter {
    /// Creates a filter list that excludes soft-deleted documents.
    pub fn new() -> Self {
        Self { filters: vec![(IS_DELETED_FIELD.to_string(), Bson::Boolean(false))] }
    }

    /// Creates a filter list that matches soft-deleted documents only.
    pub fn including_deleted() -> Self {
        Self { filters: vec![(IS_DELETED_FIELD.to_string(), Bson::Boolean(true))] }
    }

    /// Appends a constraint.
    ///
    /// A constraint with an empty field name is ignored and the builder is
    /// returned unchanged.
    pub fn add_filter(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        let field = field.into();
        if field.is_empty() {
            return self;
        }

        self.filters.push((field, value.into()));
        self
    }

    /// Returns the accumulated constraints in insertion order.
    pub fn filters(&self) -> &[(String, Bson)] {
        &self.filters
    }

    /// Consumes the builder and returns the owned constraint list.
    pub fn into_filters(self) -> Filters {
        self.filters
    }
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl From<QueryFilter> for Filters {
    fn from(filter: QueryFilter) -> Self {
        filter.into_filters()
    }
}
