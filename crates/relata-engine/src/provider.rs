//! Provider traits the engine is parameterized over.
//!
//! The engine never touches a database or an HTTP client directly. It asks
//! a [`SchemaProvider`] what a table looks like, a [`PersistenceProvider`]
//! to apply row operations, and a [`SessionProvider`] who the caller is and
//! which server-side filters apply. Test doubles and production adapters
//! implement the same three traits.

use relata_core::{FieldDescriptor, FieldType, IdentifierSet, Record, RelationDescriptor, Result, Value};

use crate::filter::{Criteria, PolicySet};
use crate::identifier::ResolvedId;

/// One row-level operation against a table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOp {
    /// Insert a new row.
    Create {
        /// Fully parsed row values.
        record: Record,
    },
    /// Replace a row wholesale.
    Update {
        /// Identifier of the target row.
        id: ResolvedId,
        /// Fully parsed replacement values.
        record: Record,
    },
    /// Merge values into a row, leaving absent fields alone.
    Patch {
        /// Identifier of the target row.
        id: ResolvedId,
        /// Parsed values to merge.
        record: Record,
    },
    /// Delete a row.
    Delete {
        /// Identifier of the target row.
        id: ResolvedId,
    },
    /// Fetch a single row.
    Retrieve {
        /// Identifier of the target row.
        id: ResolvedId,
    },
}

/// A group of operations against one table, staged for atomic application.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBatch {
    /// Target table.
    pub table: String,
    /// Operations in submission order.
    pub ops: Vec<TableOp>,
}

impl StagedBatch {
    /// Create an empty staged batch for a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ops: Vec::new(),
        }
    }

    /// Stage one operation.
    pub fn push(&mut self, op: TableOp) {
        self.ops.push(op);
    }

    /// Number of staged operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Row storage for the local store.
///
/// Implementations map [`TableOp`]s onto whatever actually holds the data.
/// `apply` must return the resulting row: creates echo generated values,
/// updates and patches echo the post-write row, deletes echo the row as it
/// was before removal.
pub trait PersistenceProvider: Send + Sync {
    /// Apply one operation and return the affected row.
    fn apply(&self, table: &str, op: TableOp) -> Result<Record>;

    /// Apply every staged operation or none of them.
    ///
    /// If any operation fails the store must leave no trace of the others.
    fn apply_batch(&self, batch: &StagedBatch) -> Result<Vec<Record>>;

    /// Select rows matching criteria.
    fn select(&self, table: &str, criteria: &Criteria) -> Result<Vec<Record>>;
}

/// Table metadata discovery.
pub trait SchemaProvider: Send + Sync {
    /// Field descriptors for a table, in column order.
    fn field_descriptors(&self, table: &str) -> Result<Vec<FieldDescriptor>>;

    /// The identifier set for a table.
    ///
    /// `requested_fields`/`requested_types` let a caller override the
    /// declared identifiers with ad-hoc key fields for one operation, as
    /// the by-ids operations allow. Implementations validate the override
    /// against the table's descriptors.
    fn identifier_set(
        &self,
        table: &str,
        requested_fields: Option<&[String]>,
        requested_types: Option<&[FieldType]>,
    ) -> Result<IdentifierSet>;

    /// Declared relationships of a table.
    fn relation_descriptors(&self, table: &str) -> Result<Vec<RelationDescriptor>>;

    /// Coerce one raw value into a field's declared type. The default
    /// delegates to the descriptor's type; stores with richer type systems
    /// can override.
    fn typecast(&self, field: &FieldDescriptor, value: &Value) -> Result<Value> {
        field.field_type.coerce(value)
    }
}

/// The operation class a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Record creation.
    Create,
    /// Record retrieval.
    Read,
    /// Record update or patch.
    Update,
    /// Record deletion.
    Delete,
}

/// Ambient request context: caller identity and server-side filters.
///
/// Every method has a permissive default so tests and embedded callers can
/// implement only what they exercise.
pub trait SessionProvider: Send + Sync {
    /// The authenticated caller's identifier, if any. Stamped into
    /// user-tracking fields during parsing.
    fn user_id(&self) -> Option<Value> {
        None
    }

    /// Server-side filter policy for an action on a resource. `None`
    /// means unrestricted.
    fn policy(&self, action: PolicyAction, service: Option<&str>, resource: &str) -> Option<PolicySet> {
        let _ = (action, service, resource);
        None
    }

    /// Substitute a symbolic filter literal (a lookup key such as a
    /// session variable name) with its value. `None` leaves the literal
    /// as plain text.
    fn substitute_lookup(&self, key: &str) -> Option<Value> {
        let _ = key;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareSession;
    impl SessionProvider for BareSession {}

    #[test]
    fn test_session_defaults_are_permissive() {
        let session = BareSession;
        assert!(session.user_id().is_none());
        assert!(session.policy(PolicyAction::Read, None, "orders").is_none());
        assert!(session.substitute_lookup("current_user").is_none());
    }

    #[test]
    fn test_staged_batch_push() {
        let mut batch = StagedBatch::new("orders");
        assert!(batch.is_empty());
        batch.push(TableOp::Delete {
            id: ResolvedId::Single(Value::Int(5)),
        });
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.table, "orders");
    }
}
