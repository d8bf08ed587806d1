//! Relationship metadata.
//!
//! Relations are declared per table by the schema provider and drive both
//! related-record retrieval and nested-payload reconciliation. The engine
//! supports the four canonical foreign-key topologies; a relation may point
//! at a table living in a different backing service, which the dispatch
//! gateway hides.

use crate::field::FieldDescriptor;

/// The four supported relationship topologies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationKind {
    /// The owning record carries the foreign key (`order.customer_id`).
    #[default]
    BelongsTo,
    /// One child record carries a foreign key back to the owner.
    HasOne,
    /// Many child records carry a foreign key back to the owner.
    HasMany,
    /// Owner and related records are linked through a junction table.
    ManyToMany,
}

/// Junction-table metadata for [`RelationKind::ManyToMany`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunctionInfo {
    /// Service hosting the junction table; `None` means the local store.
    pub service: Option<String>,
    /// Junction table name.
    pub table: String,
    /// Junction column pointing at the owning table.
    pub local_column: String,
    /// Junction column pointing at the referenced table.
    pub remote_column: String,
}

impl JunctionInfo {
    /// Create junction metadata for a local-store junction table.
    pub fn new(
        table: impl Into<String>,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Self {
            service: None,
            table: table.into(),
            local_column: local_column.into(),
            remote_column: remote_column.into(),
        }
    }

    /// Set the hosting service.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// One declared relationship on a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationDescriptor {
    /// Relation name; also the key of the nested sub-payload in records.
    pub name: String,
    /// Topology.
    pub kind: RelationKind,
    /// Column on the owning table participating in the relation. For
    /// `BelongsTo` this is the foreign key itself; for the other kinds it
    /// is the referenced local key (usually the primary key).
    pub local_field: String,
    /// Service hosting the referenced table; `None` means the local store.
    pub service: Option<String>,
    /// Referenced table name.
    pub ref_table: String,
    /// Column on the referenced table. For `BelongsTo` this is the
    /// referenced key; for `HasOne`/`HasMany` it is the child-side foreign
    /// key; for `ManyToMany` it is the referenced key matched by the
    /// junction's remote column.
    pub ref_field: String,
    /// Junction metadata; present only for `ManyToMany`.
    pub junction: Option<JunctionInfo>,
    /// Primary-key descriptor of the referenced table when it lives in
    /// another service, where the local schema provider cannot answer.
    /// Unset, a cross-service reference falls back to an auto-generated
    /// `id` column; declare it here when the remote table uses a
    /// client-assigned or differently named key.
    pub remote_key: Option<FieldDescriptor>,
    /// Fetch this relation on every retrieve without being asked.
    pub always_fetch: bool,
    /// Whether the child-side foreign key may be set NULL. Controls
    /// disown-versus-cascade-delete when children are dropped.
    pub allow_null: bool,
    /// Declared in metadata only; no physical constraint backs it.
    pub virtual_relation: bool,
}

impl RelationDescriptor {
    /// Create a relation with required fields.
    pub fn new(
        name: impl Into<String>,
        kind: RelationKind,
        local_field: impl Into<String>,
        ref_table: impl Into<String>,
        ref_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            local_field: local_field.into(),
            service: None,
            ref_table: ref_table.into(),
            ref_field: ref_field.into(),
            junction: None,
            remote_key: None,
            always_fetch: false,
            allow_null: false,
            virtual_relation: false,
        }
    }

    /// Set the hosting service of the referenced table.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attach junction metadata (ManyToMany).
    #[must_use]
    pub fn junction(mut self, junction: JunctionInfo) -> Self {
        self.junction = Some(junction);
        self
    }

    /// Declare the referenced table's key for a cross-service relation.
    #[must_use]
    pub fn remote_key(mut self, key: FieldDescriptor) -> Self {
        self.remote_key = Some(key);
        self
    }

    /// Enable always-fetch.
    #[must_use]
    pub fn always_fetch(mut self, value: bool) -> Self {
        self.always_fetch = value;
        self
    }

    /// Set the allow-null (disown instead of delete) flag.
    #[must_use]
    pub fn allow_null(mut self, value: bool) -> Self {
        self.allow_null = value;
        self
    }

    /// Mark the relation as metadata-only.
    #[must_use]
    pub fn virtual_relation(mut self, value: bool) -> Self {
        self.virtual_relation = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_builder_chain() {
        let relation = RelationDescriptor::new(
            "customer",
            RelationKind::BelongsTo,
            "customer_id",
            "customers",
            "id",
        )
        .service("crm")
        .remote_key(FieldDescriptor::new("customer_no"))
        .allow_null(true)
        .always_fetch(true);

        assert_eq!(relation.name, "customer");
        assert_eq!(
            relation.remote_key.as_ref().map(|k| k.name.as_str()),
            Some("customer_no")
        );
        assert_eq!(relation.kind, RelationKind::BelongsTo);
        assert_eq!(relation.local_field, "customer_id");
        assert_eq!(relation.service.as_deref(), Some("crm"));
        assert!(relation.allow_null);
        assert!(relation.always_fetch);
        assert!(relation.junction.is_none());
    }

    #[test]
    fn test_junction_info() {
        let relation = RelationDescriptor::new(
            "tags",
            RelationKind::ManyToMany,
            "id",
            "tags",
            "id",
        )
        .junction(JunctionInfo::new("item_tags", "item_id", "tag_id"));

        let junction = relation.junction.unwrap();
        assert_eq!(junction.table, "item_tags");
        assert_eq!(junction.local_column, "item_id");
        assert_eq!(junction.remote_column, "tag_id");
        assert!(junction.service.is_none());
    }
}
