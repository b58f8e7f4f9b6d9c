//! Filter, projection and sort evaluation for in-memory documents.
//!
//! Filters are the ordered `(field, value)` lists used across the store. A
//! value is either matched for equality or, when it is a document whose keys
//! are all operators, evaluated operator by operator. Field names may be dotted
//! paths into embedded documents.

use bson::{Bson, DateTime, Document, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docshape_core::{error::DocumentStoreResult, operator, query::SortDirection};

use crate::error::InMemoryStoreError;

/// Comparable representation of BSON values.
///
/// Numeric types are normalized to `f64`. Values of different kinds are never
/// equal; for sorting they are ordered by kind.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's kind in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used by sorts.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// `true` if `document` satisfies every constraint in `filters`.
pub(crate) fn matches(document: &Document, filters: &[(String, Bson)]) -> DocumentStoreResult<bool> {
    for (field, expected) in filters {
        if !matches_constraint(document, field, expected)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Converts a filter document into an ordered constraint list.
pub(crate) fn to_filters(document: &Document) -> Vec<(String, Bson)> {
    document
        .iter()
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

fn matches_constraint(document: &Document, field: &str, expected: &Bson) -> DocumentStoreResult<bool> {
    match field {
        operator::AND | operator::OR | operator::NOR => {
            let Bson::Array(clauses) = expected else {
                return Err(InMemoryStoreError::UnsupportedOperator(format!("{field} requires an array")).into());
            };

            let mut results = Vec::with_capacity(clauses.len());
            for clause in clauses {
                let Bson::Document(clause) = clause else {
                    return Err(InMemoryStoreError::UnsupportedOperator(format!("{field} clauses must be documents")).into());
                };
                results.push(matches(document, &to_filters(clause))?);
            }

            Ok(match field {
                operator::AND => results.iter().all(|matched| *matched),
                operator::OR => results.iter().any(|matched| *matched),
                _ => !results.iter().any(|matched| *matched),
            })
        },
        _ => value_matches(lookup(document, field), expected),
    }
}

/// Matches a resolved field value (`None` when absent) against an expected
/// value or operator document.
pub(crate) fn value_matches(actual: Option<&Bson>, expected: &Bson) -> DocumentStoreResult<bool> {
    match expected {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (op, argument) in operators {
                if !apply_operator(actual, op, argument)? {
                    return Ok(false);
                }
            }

            Ok(true)
        },
        _ => Ok(equals(actual, expected)),
    }
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Equality, where an array field also matches when any element is equal and
/// a missing field matches `null`.
fn equals(actual: Option<&Bson>, expected: &Bson) -> bool {
    let Some(value) = actual else {
        return matches!(expected, Bson::Null);
    };

    let expected = Comparable::from(expected);
    if Comparable::from(value) == expected {
        return true;
    }

    match value {
        Bson::Array(items) => items.iter().any(|item| Comparable::from(item) == expected),
        _ => false,
    }
}

fn apply_operator(actual: Option<&Bson>, op: &str, argument: &Bson) -> DocumentStoreResult<bool> {
    match op {
        operator::EQ => Ok(equals(actual, argument)),
        operator::NE => Ok(!equals(actual, argument)),
        operator::GT | operator::GTE | operator::LT | operator::LTE => {
            let Some(value) = actual else {
                return Ok(false);
            };
            let argument = Comparable::from(argument);

            Ok(candidates(value).into_iter().any(|candidate| {
                match Comparable::from(candidate).partial_cmp(&argument) {
                    Some(ordering) => match op {
                        operator::GT => ordering == Ordering::Greater,
                        operator::GTE => ordering != Ordering::Less,
                        operator::LT => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }))
        },
        operator::IN => Ok(array_argument(op, argument)?
            .iter()
            .any(|value| equals(actual, value))),
        operator::NIN => Ok(!array_argument(op, argument)?
            .iter()
            .any(|value| equals(actual, value))),
        operator::ALL => Ok(array_argument(op, argument)?
            .iter()
            .all(|value| equals(actual, value))),
        operator::EXISTS => Ok(actual.is_some() == is_truthy(argument)),
        operator::SIZE => Ok(match (actual, as_i64(argument)) {
            (Some(Bson::Array(items)), Some(size)) => items.len() as i64 == size,
            _ => false,
        }),
        operator::NOT => Ok(!value_matches(actual, argument)?),
        other => Err(InMemoryStoreError::UnsupportedOperator(other.to_string()).into()),
    }
}

fn candidates(value: &Bson) -> Vec<&Bson> {
    match value {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn array_argument<'a>(op: &str, argument: &'a Bson) -> DocumentStoreResult<&'a Vec<Bson>> {
    match argument {
        Bson::Array(values) => Ok(values),
        _ => Err(InMemoryStoreError::UnsupportedOperator(format!("{op} requires an array")).into()),
    }
}

/// Numeric and boolean flags as used by `$exists` and projections.
pub(crate) fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

pub(crate) fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

/// Applies an inclusion or exclusion projection to top-level fields.
///
/// `_id` is kept unless explicitly excluded. Mixing inclusions and exclusions
/// of other fields is rejected.
pub(crate) fn project(document: Document, projection: &Document) -> DocumentStoreResult<Document> {
    if projection.is_empty() {
        return Ok(document);
    }

    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, value) in projection {
        if let Bson::Document(_) = value {
            return Err(InMemoryStoreError::UnsupportedOperator(format!("projection of {field}")).into());
        }

        match (field.as_str(), is_truthy(value)) {
            ("_id", flag) => include_id = flag,
            (_, true) => included.push(field.as_str()),
            (_, false) => excluded.push(field.as_str()),
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(InMemoryStoreError::InvalidProjection(
            "cannot mix inclusion and exclusion".to_string(),
        )
        .into());
    }

    Ok(document
        .into_iter()
        .filter(|(field, _)| {
            if field == "_id" {
                include_id
            } else if !included.is_empty() {
                included.contains(&field.as_str())
            } else {
                !excluded.contains(&field.as_str())
            }
        })
        .collect())
}

/// Stable sort by the given keys in order. Missing fields sort as `null`.
pub(crate) fn sort_documents(documents: &mut [Document], keys: &[(String, SortDirection)]) {
    documents.sort_by(|a, b| {
        keys.iter()
            .fold(Ordering::Equal, |ordering, (field, direction)| {
                ordering.then_with(|| {
                    let left = lookup(a, field)
                        .map(Comparable::from)
                        .unwrap_or(Comparable::Null);
                    let right = lookup(b, field)
                        .map(Comparable::from)
                        .unwrap_or(Comparable::Null);

                    match direction {
                        SortDirection::Asc => left.sort_cmp(&right),
                        SortDirection::Desc => right.sort_cmp(&left),
                    }
                })
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn filters(document: Document) -> Vec<(String, Bson)> {
        to_filters(&document)
    }

    #[test]
    fn equality_and_dotted_paths() {
        let document = doc! { "name": "Ivy", "profile": { "city": "Lagos" }, "tags": ["a", "b"] };

        assert!(matches(&document, &filters(doc! { "name": "Ivy" })).unwrap());
        assert!(matches(&document, &filters(doc! { "profile.city": "Lagos" })).unwrap());
        assert!(matches(&document, &filters(doc! { "tags": "b" })).unwrap());
        assert!(matches(&document, &filters(doc! { "missing": null })).unwrap());
        assert!(!matches(&document, &filters(doc! { "name": "Asari" })).unwrap());
    }

    #[test]
    fn comparison_operators() {
        let document = doc! { "level": 3, "score": 12.5 };

        assert!(matches(&document, &filters(doc! { "level": { "$gt": 2, "$lte": 3 } })).unwrap());
        assert!(matches(&document, &filters(doc! { "score": { "$gte": 12_i64 } })).unwrap());
        assert!(!matches(&document, &filters(doc! { "level": { "$lt": 3 } })).unwrap());
        assert!(matches(&document, &filters(doc! { "level": { "$ne": 4 } })).unwrap());
        assert!(!matches(&document, &filters(doc! { "level": { "$gt": "2" } })).unwrap());
    }

    #[test]
    fn set_membership_and_existence() {
        let document = doc! { "role": "admin", "deleted_at": null };

        assert!(matches(&document, &filters(doc! { "role": { "$in": ["admin", "owner"] } })).unwrap());
        assert!(matches(&document, &filters(doc! { "role": { "$nin": ["guest"] } })).unwrap());
        assert!(matches(&document, &filters(doc! { "deleted_at": { "$exists": true } })).unwrap());
        assert!(matches(&document, &filters(doc! { "email": { "$exists": false } })).unwrap());
    }

    #[test]
    fn logical_operators() {
        let document = doc! { "first_name": "Joseph", "level": 1 };

        assert!(matches(
            &document,
            &filters(doc! { "$or": [{ "first_name": "Ivy" }, { "level": 1 }] })
        )
        .unwrap());
        assert!(!matches(
            &document,
            &filters(doc! { "$nor": [{ "first_name": "Joseph" }] })
        )
        .unwrap());
    }

    #[test]
    fn duplicate_fields_must_all_match() {
        let document = doc! { "level": 5 };
        let constraints = vec![
            ("level".to_string(), Bson::Document(doc! { "$gt": 1 })),
            ("level".to_string(), Bson::Document(doc! { "$lt": 4 })),
        ];

        assert!(!matches(&document, &constraints).unwrap());
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let document = doc! { "name": "Ivy" };

        assert!(matches(&document, &filters(doc! { "name": { "$regex": "^I" } })).is_err());
    }

    #[test]
    fn projections() {
        let document = doc! { "_id": 1, "email": "ivy@example.com", "phone": "0801", "name": "Ivy" };

        let included = project(document.clone(), &doc! { "email": 1 }).unwrap();
        assert_eq!(included, doc! { "_id": 1, "email": "ivy@example.com" });

        let excluded = project(document.clone(), &doc! { "phone": 0, "_id": false }).unwrap();
        assert_eq!(excluded, doc! { "email": "ivy@example.com", "name": "Ivy" });

        assert!(project(document, &doc! { "email": 1, "phone": 0 }).is_err());
    }

    #[test]
    fn sorts_by_keys_in_order() {
        let mut documents = vec![
            doc! { "name": "b", "level": 1 },
            doc! { "name": "a", "level": 2 },
            doc! { "name": "c", "level": 2 },
            doc! { "level": 3 },
        ];

        sort_documents(
            &mut documents,
            &[("level".to_string(), SortDirection::Desc), ("name".to_string(), SortDirection::Asc)],
        );

        let levels = documents.iter().map(|d| d.get_i32("level").unwrap()).collect::<Vec<_>>();
        assert_eq!(levels, vec![3, 2, 2, 1]);
        assert_eq!(documents[1].get_str("name").unwrap(), "a");
    }
}
