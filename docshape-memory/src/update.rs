//! Update operator application for in-memory documents.

use bson::{Bson, Document};

use docshape_core::{error::DocumentStoreResult, operator};

use crate::{error::InMemoryStoreError, evaluator::value_matches};

const EACH: &str = "$each";

/// Applies an operator update document such as `{ "$set": { .. }, "$inc": { .. } }`.
///
/// Returns `true` when the document changed.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<bool> {
    let before = document.clone();

    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(InMemoryStoreError::InvalidUpdate(format!("{op} expects a document of fields")).into());
        };

        for (path, value) in fields {
            if path == "_id" {
                return Err(InMemoryStoreError::InvalidUpdate("_id is immutable".to_string()).into());
            }

            apply_field(document, op, path, value)?;
        }
    }

    Ok(*document != before)
}

fn apply_field(document: &mut Document, op: &str, path: &str, value: &Bson) -> DocumentStoreResult<()> {
    match op {
        operator::SET => set_path(document, path, value.clone()),
        operator::UNSET => {
            remove_path(document, path);
            Ok(())
        },
        operator::INC => {
            let current = get_path(document, path).cloned().unwrap_or(Bson::Int32(0));
            let next = arithmetic(&current, value, Arithmetic::Add)
                .ok_or_else(|| non_numeric(op, path))?;
            set_path(document, path, next)
        },
        operator::MUL => {
            let current = get_path(document, path).cloned().unwrap_or(Bson::Int32(0));
            let next = arithmetic(&current, value, Arithmetic::Mul)
                .ok_or_else(|| non_numeric(op, path))?;
            set_path(document, path, next)
        },
        operator::RENAME => {
            let Bson::String(target) = value else {
                return Err(InMemoryStoreError::InvalidUpdate(format!("{op} target for {path} must be a string")).into());
            };

            if let Some(moved) = remove_path(document, path) {
                set_path(document, target, moved)?;
            }
            Ok(())
        },
        operator::PUSH | operator::ADD_TO_SET => {
            let items = match value {
                Bson::Document(modifiers) if modifiers.contains_key(EACH) => match modifiers.get(EACH) {
                    Some(Bson::Array(items)) => items.clone(),
                    _ => return Err(InMemoryStoreError::InvalidUpdate(format!("{EACH} requires an array")).into()),
                },
                other => vec![other.clone()],
            };

            let mut array = existing_array(document, op, path)?;
            for item in items {
                if op == operator::PUSH || !array.contains(&item) {
                    array.push(item);
                }
            }
            set_path(document, path, Bson::Array(array))
        },
        operator::PULL => {
            let array = existing_array(document, op, path)?;
            let mut kept = Vec::with_capacity(array.len());
            for item in array {
                if !value_matches(Some(&item), value)? {
                    kept.push(item);
                }
            }
            set_path(document, path, Bson::Array(kept))
        },
        other => Err(InMemoryStoreError::UnsupportedOperator(other.to_string()).into()),
    }
}

fn existing_array(document: &Document, op: &str, path: &str) -> DocumentStoreResult<Vec<Bson>> {
    match get_path(document, path) {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(items)) => Ok(items.clone()),
        Some(_) => Err(InMemoryStoreError::InvalidUpdate(format!("{op} on non-array field {path}")).into()),
    }
}

fn non_numeric(op: &str, path: &str) -> docshape_core::error::DocumentStoreError {
    InMemoryStoreError::InvalidUpdate(format!("{op} on non-numeric field {path}")).into()
}

enum Arithmetic {
    Add,
    Mul,
}

/// Integer arithmetic widens to 64 bits on overflow; any double makes the result a double.
fn arithmetic(current: &Bson, operand: &Bson, kind: Arithmetic) -> Option<Bson> {
    let result = match (current, operand) {
        (Bson::Int32(a), Bson::Int32(b)) => {
            let wide = match kind {
                Arithmetic::Add => i64::from(*a) + i64::from(*b),
                Arithmetic::Mul => i64::from(*a) * i64::from(*b),
            };
            i32::try_from(wide)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(wide))
        },
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            let (a, b) = (integer(current)?, integer(operand)?);
            Bson::Int64(match kind {
                Arithmetic::Add => a.checked_add(b)?,
                Arithmetic::Mul => a.checked_mul(b)?,
            })
        },
        _ => {
            let (a, b) = (float(current)?, float(operand)?);
            Bson::Double(match kind {
                Arithmetic::Add => a + b,
                Arithmetic::Mul => a * b,
            })
        },
    };

    Some(result)
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn float(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => document.get(path),
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => get_path(inner, rest),
            _ => None,
        },
    }
}

/// Sets a dotted path, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        },
        Some((head, rest)) => {
            if !document.contains_key(head) || matches!(document.get(head), Some(Bson::Null)) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(InMemoryStoreError::InvalidUpdate(format!("cannot traverse non-document field {head}")).into()),
            }
        },
    }
}

fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_unset_and_rename() {
        let mut document = doc! { "_id": 1, "name": "Ivy", "email": "ivy@example.com" };

        let changed = apply_update(
            &mut document,
            &doc! {
                "$set": { "name": "Asari", "profile.city": "Lagos" },
                "$unset": { "email": "" },
                "$rename": { "name": "first_name" },
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            document,
            doc! { "_id": 1, "profile": { "city": "Lagos" }, "first_name": "Asari" }
        );
    }

    #[test]
    fn numeric_updates() {
        let mut document = doc! { "count": 2, "score": 1.5 };

        apply_update(
            &mut document,
            &doc! { "$inc": { "count": 3, "visits": 1 }, "$mul": { "score": 2 } },
        )
        .unwrap();

        assert_eq!(document.get_i32("count").unwrap(), 5);
        assert_eq!(document.get_i32("visits").unwrap(), 1);
        assert_eq!(document.get_f64("score").unwrap(), 3.0);

        let mut document = doc! { "count": i32::MAX };
        apply_update(&mut document, &doc! { "$inc": { "count": 1 } }).unwrap();
        assert_eq!(document.get_i64("count").unwrap(), i64::from(i32::MAX) + 1);

        let mut document = doc! { "name": "Ivy" };
        assert!(apply_update(&mut document, &doc! { "$inc": { "name": 1 } }).is_err());
    }

    #[test]
    fn array_updates() {
        let mut document = doc! { "tags": ["a"] };

        apply_update(&mut document, &doc! { "$push": { "tags": "b" } }).unwrap();
        apply_update(&mut document, &doc! { "$addToSet": { "tags": { "$each": ["a", "c"] } } }).unwrap();
        assert_eq!(document.get_array("tags").unwrap(), &vec![Bson::from("a"), "b".into(), "c".into()]);

        apply_update(&mut document, &doc! { "$pull": { "tags": { "$in": ["a", "b"] } } }).unwrap();
        assert_eq!(document.get_array("tags").unwrap(), &vec![Bson::from("c")]);
    }

    #[test]
    fn unchanged_document_reports_no_modification() {
        let mut document = doc! { "name": "Ivy" };

        assert!(!apply_update(&mut document, &doc! { "$set": { "name": "Ivy" } }).unwrap());
    }

    #[test]
    fn rejects_id_updates_and_unknown_operators() {
        let mut document = doc! { "_id": 1 };

        assert!(apply_update(&mut document, &doc! { "$set": { "_id": 2 } }).is_err());
        assert!(apply_update(&mut document, &doc! { "$currentDate": { "at": true } }).is_err());
    }
}
