//! Request translation from filter lists to MongoDB query documents.

use bson::{Bson, Document, doc};
use std::collections::HashSet;

use docshape_core::{operator, query::Sort};

/// Renders an ordered filter list as a MongoDB filter document.
///
/// A BSON document cannot hold the same key twice, so when a field name
/// repeats, every constraint becomes its own clause of a top-level `$and`.
/// Otherwise the constraints form one document in their original order.
pub(crate) fn filter_document(filters: &[(String, Bson)]) -> Document {
    let mut seen = HashSet::with_capacity(filters.len());
    let has_duplicates = filters
        .iter()
        .any(|(field, _)| !seen.insert(field.as_str()));

    if has_duplicates {
        let clauses = filters
            .iter()
            .map(|(field, value)| Bson::Document(doc! { field.as_str(): value.clone() }))
            .collect::<Vec<_>>();

        return doc! { operator::AND: clauses };
    }

    filters
        .iter()
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

/// Renders ordered sort keys as `{ field: 1 | -1, .. }`.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    Sort::to_document(sort)
}
