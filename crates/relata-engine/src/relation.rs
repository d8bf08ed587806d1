//! Relationship resolution: related-record expansion on reads and
//! nested-payload reconciliation on writes.
//!
//! Expansion batches its lookups: one fetch per relation for the whole
//! record set, never one per record. Reconciliation runs after the owning
//! record is committed, so child rows always point at a key that exists.

use std::collections::HashMap;

use relata_core::{
    Error, FieldDescriptor, Record, RelationDescriptor, RelationKind, Result, Value,
};

use crate::filter::{Combinator, CompareOp, Criteria, FilterTriple};
use crate::gateway::{Gateway, RemoteCall, ServiceRegistry, Verb};
use crate::provider::SchemaProvider;

/// Marks a nested many-to-many entry for unlinking instead of membership.
pub const UNLINK_FIELD: &str = "_unlink";

/// Which relations a retrieval should expand.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RelatedSpec {
    /// Only relations declared always-fetch.
    #[default]
    None,
    /// Every declared relation.
    All,
    /// The named relations, plus always-fetch ones.
    Named(Vec<String>),
}

impl RelatedSpec {
    /// Whether a relation should be expanded under this spec.
    #[must_use]
    pub fn wants(&self, relation: &RelationDescriptor) -> bool {
        if relation.always_fetch {
            return true;
        }
        match self {
            RelatedSpec::None => false,
            RelatedSpec::All => true,
            RelatedSpec::Named(names) => names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(&relation.name)),
        }
    }
}

/// Executes relationship reads and writes through the dispatch gateway.
pub struct RelationshipEngine<'a> {
    schema: &'a dyn SchemaProvider,
    gateway: Gateway<'a>,
}

impl<'a> RelationshipEngine<'a> {
    /// Create an engine over a schema provider and service registry.
    #[must_use]
    pub fn new(schema: &'a dyn SchemaProvider, registry: &'a dyn ServiceRegistry) -> Self {
        Self {
            schema,
            gateway: Gateway::new(registry),
        }
    }

    /// Expand the wanted relations of a table onto a set of retrieved
    /// records, one batched fetch per relation.
    pub fn expand(&self, table: &str, records: &mut [Record], spec: &RelatedSpec) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for relation in self.schema.relation_descriptors(table)? {
            if !spec.wants(&relation) {
                continue;
            }
            check_single_column(&relation)?;
            match relation.kind {
                RelationKind::BelongsTo => self.expand_belongs_to(&relation, records)?,
                RelationKind::HasOne | RelationKind::HasMany => {
                    self.expand_has(&relation, records)?;
                }
                RelationKind::ManyToMany => self.expand_many_to_many(&relation, records)?,
            }
        }
        Ok(())
    }

    fn expand_belongs_to(
        &self,
        relation: &RelationDescriptor,
        records: &mut [Record],
    ) -> Result<()> {
        let keys = collect_keys(records, &relation.local_field);
        if keys.is_empty() {
            for record in records.iter_mut() {
                record.set(&relation.name, Value::Null);
            }
            return Ok(());
        }
        let children = self.gateway.fetch(
            relation.service.as_deref(),
            &relation.ref_table,
            Criteria::by_ids(&relation.ref_field, keys),
        )?;
        let by_key = index_by(&children, &relation.ref_field);
        for record in records.iter_mut() {
            let child = record
                .get(&relation.local_field)
                .filter(|v| !v.is_null())
                .and_then(|key| by_key.get(&key.to_string()));
            match child {
                Some(child) => record.set(&relation.name, Value::Json(child.to_json())),
                None => record.set(&relation.name, Value::Null),
            }
        }
        Ok(())
    }

    fn expand_has(&self, relation: &RelationDescriptor, records: &mut [Record]) -> Result<()> {
        let keys = collect_keys(records, &relation.local_field);
        let children = if keys.is_empty() {
            Vec::new()
        } else {
            self.gateway.fetch(
                relation.service.as_deref(),
                &relation.ref_table,
                Criteria::by_ids(&relation.ref_field, keys),
            )?
        };
        let mut grouped: HashMap<String, Vec<&Record>> = HashMap::new();
        for child in &children {
            if let Some(fk) = child.get(&relation.ref_field).filter(|v| !v.is_null()) {
                grouped.entry(fk.to_string()).or_default().push(child);
            }
        }
        for record in records.iter_mut() {
            let matched = record
                .get(&relation.local_field)
                .filter(|v| !v.is_null())
                .and_then(|key| grouped.get(&key.to_string()));
            let value = match relation.kind {
                RelationKind::HasOne => matched
                    .and_then(|children| children.first())
                    .map_or(Value::Null, |child| Value::Json(child.to_json())),
                _ => Value::Json(serde_json::Value::Array(
                    matched
                        .map(|children| children.iter().map(|c| c.to_json()).collect())
                        .unwrap_or_default(),
                )),
            };
            record.set(&relation.name, value);
        }
        Ok(())
    }

    fn expand_many_to_many(
        &self,
        relation: &RelationDescriptor,
        records: &mut [Record],
    ) -> Result<()> {
        let junction = junction_of(relation)?;
        let keys = collect_keys(records, &relation.local_field);
        let links = if keys.is_empty() {
            Vec::new()
        } else {
            self.gateway.fetch(
                junction.service.as_deref(),
                &junction.table,
                Criteria::by_ids(&junction.local_column, keys),
            )?
        };
        let remote_keys = collect_keys(&links, &junction.remote_column);
        let referenced = if remote_keys.is_empty() {
            Vec::new()
        } else {
            self.gateway.fetch(
                relation.service.as_deref(),
                &relation.ref_table,
                Criteria::by_ids(&relation.ref_field, remote_keys),
            )?
        };
        let by_key = index_by(&referenced, &relation.ref_field);
        for record in records.iter_mut() {
            let Some(local) = record.get(&relation.local_field).filter(|v| !v.is_null()) else {
                record.set(&relation.name, Value::Json(serde_json::Value::Array(Vec::new())));
                continue;
            };
            let local_text = local.to_string();
            let members: Vec<serde_json::Value> = links
                .iter()
                .filter(|link| {
                    link.get(&junction.local_column)
                        .is_some_and(|v| v.to_string() == local_text)
                })
                .filter_map(|link| link.get(&junction.remote_column))
                .filter_map(|remote| by_key.get(&remote.to_string()))
                .map(|member| member.to_json())
                .collect();
            record.set(&relation.name, Value::Json(serde_json::Value::Array(members)));
        }
        Ok(())
    }

    /// Reconcile one relation's nested payload after the owning record has
    /// been committed.
    ///
    /// `parent` is the committed owner row; for a `BelongsTo` payload its
    /// foreign key may be rewritten here, both in the store and in the
    /// in-memory record.
    pub fn reconcile(
        &self,
        parent_table: &str,
        parent: &mut Record,
        relation: &RelationDescriptor,
        payload: &Value,
        for_update: bool,
    ) -> Result<()> {
        if relation.virtual_relation {
            return Ok(());
        }
        check_single_column(relation)?;
        tracing::debug!(
            table = parent_table,
            relation = %relation.name,
            kind = ?relation.kind,
            "reconciling nested payload"
        );
        match relation.kind {
            RelationKind::BelongsTo => {
                self.reconcile_belongs_to(parent_table, parent, relation, payload)
            }
            RelationKind::HasOne | RelationKind::HasMany => {
                self.reconcile_has(parent, relation, payload)
            }
            RelationKind::ManyToMany => {
                self.reconcile_many_to_many(parent, relation, payload, for_update)
            }
        }
    }

    fn reconcile_belongs_to(
        &self,
        parent_table: &str,
        parent: &mut Record,
        relation: &RelationDescriptor,
        payload: &Value,
    ) -> Result<()> {
        let mut children = payload_records(&relation.name, payload)?;
        if children.len() > 1 {
            return Err(Error::bad_request(format!(
                "relation '{}' accepts a single nested record",
                relation.name
            )));
        }
        let Some(mut child) = children.pop() else {
            return Ok(());
        };
        let pk = self.child_key_of(relation)?;

        let supplied_key = child.get(&pk.name).filter(|v| !v.is_null()).cloned();
        let child_key = match supplied_key {
            None => {
                let created = self.write_one(
                    relation.service.as_deref(),
                    &relation.ref_table,
                    Verb::Post,
                    child,
                )?;
                created
                    .get(&pk.name)
                    .cloned()
                    .ok_or_else(|| Error::internal(format!(
                        "created '{}' record came back without its '{}' key",
                        relation.ref_table, pk.name
                    )))?
            }
            Some(key) => {
                let key = pk.field_type.coerce(&key)?;
                let existing = self.gateway.fetch(
                    relation.service.as_deref(),
                    &relation.ref_table,
                    Criteria::by_ids(&pk.name, vec![key.clone()]),
                )?;
                if existing.is_empty() {
                    self.write_one(
                        relation.service.as_deref(),
                        &relation.ref_table,
                        Verb::Post,
                        child,
                    )?;
                } else if child.iter().count() > 1 {
                    child.remove(&pk.name);
                    self.patch_by_id(
                        relation.service.as_deref(),
                        &relation.ref_table,
                        &pk.name,
                        &key,
                        child,
                    )?;
                }
                key
            }
        };

        let current = parent.get(&relation.local_field).filter(|v| !v.is_null());
        let needs_repoint =
            current.is_none_or(|v| !crate::filter::values_equal(v, &child_key));
        if needs_repoint {
            let parent_pk = self.single_key_of(parent_table)?;
            let parent_key = parent.get(&parent_pk.name).cloned().ok_or_else(|| {
                Error::internal(format!(
                    "parent '{parent_table}' record is missing its '{}' key",
                    parent_pk.name
                ))
            })?;
            let mut repoint = Record::new();
            repoint.set(&relation.local_field, child_key.clone());
            self.patch_by_id(None, parent_table, &parent_pk.name, &parent_key, repoint)?;
            parent.set(&relation.local_field, child_key);
        }
        Ok(())
    }

    fn reconcile_has(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        payload: &Value,
    ) -> Result<()> {
        // An explicit null on a has-one clears the slot: the current child
        // is disowned or deleted per allow_null, same as an entry-level
        // null foreign key would be.
        if payload.is_null() && matches!(relation.kind, RelationKind::HasOne) {
            return self.release_children(parent, relation);
        }
        let children = payload_records(&relation.name, payload)?;
        if matches!(relation.kind, RelationKind::HasOne) && children.len() > 1 {
            return Err(Error::bad_request(format!(
                "relation '{}' accepts a single nested record",
                relation.name
            )));
        }
        let parent_key = parent
            .get(&relation.local_field)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::internal(format!(
                    "owning record is missing field '{}' needed by relation '{}'",
                    relation.local_field, relation.name
                ))
            })?;
        let pk = self.child_key_of(relation)?;

        // Buckets, applied in a fixed order so inserts and deletes never
        // race each other through the store.
        let mut inserts: Vec<Record> = Vec::new();
        let mut deletes: Vec<Value> = Vec::new();
        let mut updates: Vec<(Value, Record)> = Vec::new();
        let mut relates: Vec<Value> = Vec::new();
        let mut disowns: Vec<Value> = Vec::new();
        let mut unverified: Vec<(Value, Record)> = Vec::new();

        for mut child in children {
            let key = child
                .get(&pk.name)
                .filter(|v| !v.is_null())
                .map(|v| pk.field_type.coerce(v))
                .transpose()
                .map_err(|_| {
                    Error::bad_request(format!(
                        "nested '{}' record has an invalid '{}' key",
                        relation.name, pk.name
                    ))
                })?;
            let explicit_null_fk = child.get(&relation.ref_field) == Some(&Value::Null);

            match key {
                None => {
                    child.set(&relation.ref_field, parent_key.clone());
                    inserts.push(child);
                }
                Some(key) if explicit_null_fk => {
                    if relation.allow_null {
                        disowns.push(key);
                    } else {
                        deletes.push(key);
                    }
                }
                Some(key) => {
                    child.remove(&pk.name);
                    let has_fields = !child.is_empty();
                    if !pk.auto_generated {
                        // The key says nothing about existence when clients
                        // assign it; verified in one batched lookup below.
                        unverified.push((key, child));
                    } else if has_fields {
                        child.set(&relation.ref_field, parent_key.clone());
                        updates.push((key, child));
                    } else {
                        relates.push(key);
                    }
                }
            }
        }

        if !unverified.is_empty() {
            let keys: Vec<Value> = unverified.iter().map(|(k, _)| k.clone()).collect();
            let existing = self.gateway.fetch(
                relation.service.as_deref(),
                &relation.ref_table,
                Criteria::by_ids(&pk.name, keys),
            )?;
            let existing_keys: Vec<String> = existing
                .iter()
                .filter_map(|r| r.get(&pk.name))
                .map(Value::to_string)
                .collect();
            for (key, mut child) in unverified {
                if existing_keys.contains(&key.to_string()) {
                    child.set(&relation.ref_field, parent_key.clone());
                    updates.push((key, child));
                } else {
                    child.set(&pk.name, key);
                    child.set(&relation.ref_field, parent_key.clone());
                    inserts.push(child);
                }
            }
        }

        for child in inserts {
            self.write_one(relation.service.as_deref(), &relation.ref_table, Verb::Post, child)?;
        }
        if !deletes.is_empty() {
            let call = RemoteCall::write(
                relation.service.clone(),
                relation.ref_table.clone(),
                Verb::Delete,
                Vec::new(),
            )
            .criteria(Criteria::by_ids(&pk.name, deletes));
            self.gateway.dispatch(&call)?;
        }
        for (key, child) in updates {
            self.patch_by_id(
                relation.service.as_deref(),
                &relation.ref_table,
                &pk.name,
                &key,
                child,
            )?;
        }
        for key in relates {
            let mut claim = Record::new();
            claim.set(&relation.ref_field, parent_key.clone());
            self.patch_by_id(
                relation.service.as_deref(),
                &relation.ref_table,
                &pk.name,
                &key,
                claim,
            )?;
        }
        for key in disowns {
            let mut release = Record::new();
            release.set(&relation.ref_field, Value::Null);
            self.patch_by_id(
                relation.service.as_deref(),
                &relation.ref_table,
                &pk.name,
                &key,
                release,
            )?;
        }
        Ok(())
    }

    /// Drop every child currently pointing at the owner: null its foreign
    /// key when the relation allows it, otherwise delete the row.
    fn release_children(&self, parent: &Record, relation: &RelationDescriptor) -> Result<()> {
        let Some(parent_key) = parent
            .get(&relation.local_field)
            .filter(|v| !v.is_null())
            .cloned()
        else {
            return Ok(());
        };
        let pk = self.child_key_of(relation)?;
        let existing = self.gateway.fetch(
            relation.service.as_deref(),
            &relation.ref_table,
            Criteria::by_ids(&relation.ref_field, vec![parent_key]),
        )?;
        let keys: Vec<Value> = existing
            .iter()
            .filter_map(|child| child.get(&pk.name))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        if keys.is_empty() {
            return Ok(());
        }
        if relation.allow_null {
            for key in keys {
                let mut release = Record::new();
                release.set(&relation.ref_field, Value::Null);
                self.patch_by_id(
                    relation.service.as_deref(),
                    &relation.ref_table,
                    &pk.name,
                    &key,
                    release,
                )?;
            }
        } else {
            let call = RemoteCall::write(
                relation.service.clone(),
                relation.ref_table.clone(),
                Verb::Delete,
                Vec::new(),
            )
            .criteria(Criteria::by_ids(&pk.name, keys));
            self.gateway.dispatch(&call)?;
        }
        Ok(())
    }

    fn reconcile_many_to_many(
        &self,
        parent: &Record,
        relation: &RelationDescriptor,
        payload: &Value,
        for_update: bool,
    ) -> Result<()> {
        let junction = junction_of(relation)?.clone();
        let parent_key = parent
            .get(&relation.local_field)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::internal(format!(
                    "owning record is missing field '{}' needed by relation '{}'",
                    relation.local_field, relation.name
                ))
            })?;
        let pk = self.child_key_of(relation)?;

        // The payload is the authoritative membership list. Entries
        // flagged for unlinking are excluded from the desired set, which
        // makes detachment explicit rather than inferred from absence of
        // other entries.
        let mut desired: Vec<Value> = Vec::new();
        for mut child in payload_records(&relation.name, payload)? {
            let unlink = child
                .get(UNLINK_FIELD)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            child.remove(UNLINK_FIELD);
            let key = child.get(&pk.name).filter(|v| !v.is_null()).cloned();
            let key = match key {
                Some(key) => pk.field_type.coerce(&key)?,
                None if unlink => {
                    return Err(Error::bad_request(format!(
                        "nested '{}' entry flagged for unlinking must carry its '{}' key",
                        relation.name, pk.name
                    )));
                }
                None => {
                    let created = self.write_one(
                        relation.service.as_deref(),
                        &relation.ref_table,
                        Verb::Post,
                        child,
                    )?;
                    created.get(&pk.name).cloned().ok_or_else(|| {
                        Error::internal(format!(
                            "created '{}' record came back without its '{}' key",
                            relation.ref_table, pk.name
                        ))
                    })?
                }
            };
            if !unlink {
                desired.push(key);
            }
        }

        let current_links = if for_update {
            self.gateway.fetch(
                junction.service.as_deref(),
                &junction.table,
                Criteria::by_ids(&junction.local_column, vec![parent_key.clone()]),
            )?
        } else {
            Vec::new()
        };
        let current: Vec<Value> = current_links
            .iter()
            .filter_map(|link| link.get(&junction.remote_column))
            .cloned()
            .collect();

        let missing: Vec<&Value> = desired
            .iter()
            .filter(|key| !current.iter().any(|c| crate::filter::values_equal(c, key)))
            .collect();
        let surplus: Vec<Value> = current
            .iter()
            .filter(|key| !desired.iter().any(|d| crate::filter::values_equal(d, key)))
            .cloned()
            .collect();

        for key in missing {
            let mut link = Record::new();
            link.set(&junction.local_column, parent_key.clone());
            link.set(&junction.remote_column, key.clone());
            self.write_one(junction.service.as_deref(), &junction.table, Verb::Post, link)?;
        }
        if !surplus.is_empty() {
            let criteria = Criteria {
                filters: vec![FilterTriple::new(
                    &junction.local_column,
                    CompareOp::Eq,
                    parent_key,
                )],
                combinator: Combinator::And,
                ids: Some(surplus),
                id_field: Some(junction.remote_column.clone()),
                fields: None,
            };
            let call = RemoteCall::write(
                junction.service.clone(),
                junction.table.clone(),
                Verb::Delete,
                Vec::new(),
            )
            .criteria(criteria);
            self.gateway.dispatch(&call)?;
        }
        Ok(())
    }

    /// Key of the table a relation points at. A local table asks the
    /// schema provider; a cross-service table uses the relation's declared
    /// `remote_key`, falling back to a conventional auto-generated `id`.
    fn child_key_of(&self, relation: &RelationDescriptor) -> Result<FieldDescriptor> {
        if relation.service.is_some() {
            return Ok(relation
                .remote_key
                .clone()
                .unwrap_or_else(|| FieldDescriptor::new("id").auto_generated(true)));
        }
        self.single_key_of(&relation.ref_table)
    }

    fn single_key_of(&self, table: &str) -> Result<FieldDescriptor> {
        let ids = self.schema.identifier_set(table, None, None)?;
        if ids.is_empty() {
            return Err(Error::internal(format!(
                "table '{table}' declares no identifier and cannot host related records"
            )));
        }
        ids.single().cloned().ok_or_else(|| {
            Error::not_implemented(format!(
                "related records in table '{table}' with a composite key are not supported"
            ))
        })
    }

    fn write_one(
        &self,
        service: Option<&str>,
        table: &str,
        verb: Verb,
        record: Record,
    ) -> Result<Record> {
        let call = RemoteCall::write(service.map(String::from), table, verb, vec![record]);
        let replied = self.gateway.dispatch(&call)?.unwrap_or_default();
        replied
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal(format!("write to '{table}' returned no record")))
    }

    fn patch_by_id(
        &self,
        service: Option<&str>,
        table: &str,
        id_field: &str,
        id: &Value,
        record: Record,
    ) -> Result<()> {
        let call = RemoteCall::write(service.map(String::from), table, Verb::Patch, vec![record])
            .criteria(Criteria::by_ids(id_field, vec![id.clone()]));
        self.gateway.dispatch(&call)?;
        Ok(())
    }
}

fn check_single_column(relation: &RelationDescriptor) -> Result<()> {
    let multi = relation.local_field.contains(',')
        || relation.ref_field.contains(',')
        || relation.junction.as_ref().is_some_and(|j| {
            j.local_column.contains(',') || j.remote_column.contains(',')
        });
    if multi {
        return Err(Error::not_implemented(format!(
            "relation '{}' uses a multi-column key, which is not supported",
            relation.name
        )));
    }
    Ok(())
}

fn junction_of(relation: &RelationDescriptor) -> Result<&relata_core::JunctionInfo> {
    relation.junction.as_ref().ok_or_else(|| {
        Error::internal(format!(
            "many-to-many relation '{}' declares no junction table",
            relation.name
        ))
    })
}

fn collect_keys(records: &[Record], field: &str) -> Vec<Value> {
    let mut seen: Vec<String> = Vec::new();
    let mut keys = Vec::new();
    for record in records {
        if let Some(value) = record.get(field).filter(|v| !v.is_null()) {
            let text = value.to_string();
            if !seen.contains(&text) {
                seen.push(text);
                keys.push(value.clone());
            }
        }
    }
    keys
}

fn index_by<'r>(records: &'r [Record], field: &str) -> HashMap<String, &'r Record> {
    let mut map = HashMap::new();
    for record in records {
        if let Some(value) = record.get(field).filter(|v| !v.is_null()) {
            map.entry(value.to_string()).or_insert(record);
        }
    }
    map
}

/// Normalize a nested relation payload into records.
///
/// Accepts a single JSON object, a JSON array of objects, or null (which
/// reconciles to nothing). Anything else is a client error.
fn payload_records(relation: &str, payload: &Value) -> Result<Vec<Record>> {
    let invalid = || {
        Error::bad_request(format!(
            "relation '{relation}' payload must be an object or an array of objects"
        ))
    };
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Json(serde_json::Value::Object(_)) => {
            Ok(vec![Record::from_json(&payload.to_json())?])
        }
        Value::Json(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| Record::from_json(item).map_err(|_| invalid()))
            .collect(),
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Json(obj @ serde_json::Value::Object(_)) => Record::from_json(obj),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn belongs_to() -> RelationDescriptor {
        RelationDescriptor::new("customer", RelationKind::BelongsTo, "customer_id", "customers", "id")
    }

    #[test]
    fn test_related_spec_wants() {
        let plain = belongs_to();
        assert!(!RelatedSpec::None.wants(&plain));
        assert!(RelatedSpec::All.wants(&plain));
        assert!(RelatedSpec::Named(vec!["customer".to_string()]).wants(&plain));
        assert!(RelatedSpec::Named(vec!["CUSTOMER".to_string()]).wants(&plain));
        assert!(!RelatedSpec::Named(vec!["tags".to_string()]).wants(&plain));

        let eager = belongs_to().always_fetch(true);
        assert!(RelatedSpec::None.wants(&eager));
        assert!(RelatedSpec::Named(vec!["tags".to_string()]).wants(&eager));
    }

    #[test]
    fn test_multi_column_relation_rejected() {
        let relation = RelationDescriptor::new(
            "lines",
            RelationKind::HasMany,
            "id,tenant",
            "order_lines",
            "order_id",
        );
        let err = check_single_column(&relation).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn test_collect_keys_dedupes_and_skips_null() {
        let records = vec![
            Record::from([("customer_id", Value::Int(3))]),
            Record::from([("customer_id", Value::Null)]),
            Record::from([("customer_id", Value::Int(3))]),
            Record::from([("customer_id", Value::Int(5))]),
        ];
        assert_eq!(
            collect_keys(&records, "customer_id"),
            vec![Value::Int(3), Value::Int(5)]
        );
    }

    #[test]
    fn test_payload_records_shapes() {
        let object = Value::Json(serde_json::json!({"id": 1}));
        assert_eq!(payload_records("r", &object).unwrap().len(), 1);

        let array = Value::Json(serde_json::json!([{"id": 1}, {"id": 2}]));
        assert_eq!(payload_records("r", &array).unwrap().len(), 2);

        assert!(payload_records("r", &Value::Null).unwrap().is_empty());
        assert!(payload_records("r", &Value::Int(5)).is_err());
        let mixed = Value::Json(serde_json::json!([{"id": 1}, 7]));
        assert!(payload_records("r", &mixed).is_err());
    }
}
