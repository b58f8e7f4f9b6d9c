//! Accumulator for update-many commands.
//!
//! Updates are grouped per operator. Adding to an operator that was already
//! used appends to its batch instead of creating a second entry, and the order
//! in which operators were first used is preserved.
//!
//! ```ignore
//! use docshape::{operator, update::UpdateManyBuilder};
//!
//! let builder = UpdateManyBuilder::new();
//! builder
//!     .add(operator::SET, [("name", "Asari".into())])
//!     .add(operator::MUL, [("count", 2.into())])
//!     .add(operator::SET, [("email", "asari@example.com".into())]);
//!
//! // { "$set": { "name": "Asari", "email": "asari@example.com" }, "$mul": { "count": 2 } }
//! let update = builder.to_document();
//! ```

use bson::{Bson, Document};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// A `(field, value)` update operation.
pub type FieldUpdate = (String, Bson);

/// Ordered mapping of operator token to its ordered field updates.
pub type UpdateOperations = Vec<(String, Vec<FieldUpdate>)>;

/// Lock-protected accumulator for update-many operations.
///
/// `add` may be called concurrently from several threads on a shared instance.
#[derive(Debug, Default)]
pub struct UpdateManyBuilder {
    operations: Mutex<UpdateOperations>,
}

impl UpdateManyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds field updates under `operator`.
    ///
    /// Calling this with no updates is ignored.
    pub fn add<I, F>(&self, operator: &str, updates: I) -> &Self
    where
        I: IntoIterator<Item = (F, Bson)>,
        F: Into<String>,
    {
        let mut updates = updates
            .into_iter()
            .map(|(field, value)| (field.into(), value))
            .collect::<Vec<FieldUpdate>>();

        if updates.is_empty() {
            warn!(operator, "update builder called with zero fields, ignoring");
            return self;
        }

        let mut operations = self.lock();

        match operations.iter_mut().find(|(key, _)| key == operator) {
            Some((_, existing)) => existing.append(&mut updates),
            None => operations.push((operator.to_string(), updates)),
        }

        self
    }

    /// Returns a snapshot of the accumulated operations in first-use order.
    pub fn get(&self) -> UpdateOperations {
        self.lock().clone()
    }

    /// Returns `true` if at least one operator entry exists.
    pub fn has_values(&self) -> bool {
        !self.lock().is_empty()
    }

    /// Renders the accumulated operations as an update document.
    ///
    /// A field repeated under the same operator keeps its last value.
    pub fn to_document(&self) -> Document {
        self.lock()
            .iter()
            .map(|(operator, updates)| {
                (
                    operator.clone(),
                    Bson::Document(updates.iter().cloned().collect()),
                )
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, UpdateOperations> {
        // A poisoned lock still holds consistent data: every mutation is a single push/append.
        self.operations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator;
    use bson::doc;
    use std::{sync::Arc, thread};

    #[test]
    fn add_get_has_values() {
        let b = UpdateManyBuilder::new();
        assert!(!b.has_values());

        b.add(operator::SET, Vec::<(String, Bson)>::new());
        assert_eq!(b.get().len(), 0);

        b.add(operator::SET, [("name", Bson::from("asari")), ("score", Bson::from(500))])
            .add(operator::UNSET, [("email", Bson::from("asari@example.com"))])
            .add(operator::MUL, [("count", Bson::from(2))]);

        let ops = b.get();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].1.len(), 2);
        assert_eq!(ops[1].1.len(), 1);
        assert_eq!(ops[2].1.len(), 1);
        assert!(b.has_values());
    }

    #[test]
    fn repeated_operator_merges_into_first_entry() {
        let b = UpdateManyBuilder::new();
        b.add(operator::SET, [("name", Bson::from("Asari"))])
            .add(operator::MUL, [("count", Bson::from(2))])
            .add(operator::SET, [("email", Bson::from("asari@example.com"))]);

        let ops = b.get();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].0, "$set");
        assert_eq!(ops[0].1[0].0, "name");
        assert_eq!(ops[0].1[1].0, "email");
        assert_eq!(ops[1].0, "$mul");

        assert_eq!(
            b.to_document(),
            doc! {
                "$set": { "name": "Asari", "email": "asari@example.com" },
                "$mul": { "count": 2 },
            }
        );
    }

    #[test]
    fn concurrent_adds_are_serialized() {
        let b = Arc::new(UpdateManyBuilder::new());

        let handles = (0..8)
            .map(|i| {
                let b = Arc::clone(&b);
                thread::spawn(move || {
                    b.add(operator::SET, [(format!("field_{i}"), Bson::from(i))]);
                    b.add(operator::INC, [(format!("counter_{i}"), Bson::from(1))]);
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        let ops = b.get();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops.iter().map(|(_, u)| u.len()).sum::<usize>(), 16);
    }
}
