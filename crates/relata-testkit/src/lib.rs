//! In-memory provider implementations for tests and examples.
//!
//! [`MemoryBackend`] plays every role the engine needs: schema provider,
//! persistence provider, session provider, service endpoint, and registry.
//! A test registers table definitions, seeds rows, and hands the same
//! backend to all four seams of a `DataService`. Additional backends can
//! be linked in under service names to exercise cross-service relations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use relata_core::{
    Error, FieldDescriptor, FieldType, IdentifierSet, Record, RelationDescriptor, Result, Value,
};
use relata_engine::{
    matches_record, values_equal, Criteria, PersistenceProvider, PolicyAction, PolicySet,
    RemoteCall, RemoteReply, ResolvedId, SchemaProvider, ServiceEndpoint, ServiceRegistry,
    SessionProvider, StagedBatch, TableOp, Verb,
};

/// One registered table: its metadata plus seed rows.
#[derive(Debug, Clone, Default)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Field descriptors in column order.
    pub fields: Vec<FieldDescriptor>,
    /// Declared relationships.
    pub relations: Vec<RelationDescriptor>,
}

impl TableDef {
    /// Define a table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct TableState {
    fields: Vec<FieldDescriptor>,
    relations: Vec<RelationDescriptor>,
    rows: Vec<Record>,
    next_id: i64,
}

impl TableState {
    fn pk_name(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.kind.is_identifier())
            .map_or("id", |f| f.name.as_str())
    }
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, TableState>,
    policies: Vec<(PolicyAction, String, PolicySet)>,
    user: Option<Value>,
    lookups: HashMap<String, Value>,
}

/// An in-memory store that implements every provider trait.
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
    services: HashMap<String, Arc<MemoryBackend>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table definition.
    pub fn register(&self, def: TableDef) {
        let mut inner = self.inner.write().unwrap();
        inner.tables.insert(
            def.name,
            TableState {
                fields: def.fields,
                relations: def.relations,
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Link another backend under a service name. Must happen before the
    /// backend is shared, hence `&mut self`.
    pub fn link_service(&mut self, name: impl Into<String>, backend: Arc<MemoryBackend>) {
        self.services.insert(name.into(), backend);
    }

    /// Seed a row directly, bypassing the engine pipeline.
    pub fn insert_row(&self, table: &str, record: Record) {
        let mut inner = self.inner.write().unwrap();
        if let Some(state) = inner.tables.get_mut(table) {
            bump_next_id(state, &record);
            state.rows.push(record);
        }
    }

    /// Snapshot a table's rows.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        let inner = self.inner.read().unwrap();
        inner
            .tables
            .get(table)
            .map(|state| state.rows.clone())
            .unwrap_or_default()
    }

    /// Set the session user.
    pub fn set_user(&self, user: Value) {
        self.inner.write().unwrap().user = Some(user);
    }

    /// Register a server-side filter policy for an action on a table.
    pub fn set_policy(&self, action: PolicyAction, table: impl Into<String>, policy: PolicySet) {
        self.inner
            .write()
            .unwrap()
            .policies
            .push((action, table.into(), policy));
    }

    /// Register a lookup-key substitution for filter literals.
    pub fn set_lookup(&self, key: impl Into<String>, value: Value) {
        self.inner.write().unwrap().lookups.insert(key.into(), value);
    }
}

fn bump_next_id(state: &mut TableState, record: &Record) {
    let pk = state.pk_name().to_string();
    if let Some(id) = record.get(&pk).and_then(Value::as_int) {
        if id >= state.next_id {
            state.next_id = id + 1;
        }
    }
}

fn table_of<'i>(inner: &'i Inner, table: &str) -> Result<&'i TableState> {
    inner
        .tables
        .get(table)
        .ok_or_else(|| Error::not_found(format!("unknown table '{table}'")))
}

fn table_of_mut<'i>(inner: &'i mut Inner, table: &str) -> Result<&'i mut TableState> {
    inner
        .tables
        .get_mut(table)
        .ok_or_else(|| Error::not_found(format!("unknown table '{table}'")))
}

fn find_row(state: &TableState, id: &ResolvedId) -> Result<usize> {
    let pk = state.pk_name();
    state
        .rows
        .iter()
        .position(|row| id.matches(row, pk))
        .ok_or_else(|| Error::not_found(format!("record with id '{id}' not found")))
}

fn apply_locked(inner: &mut Inner, table: &str, op: TableOp) -> Result<Record> {
    let state = table_of_mut(inner, table)?;
    match op {
        TableOp::Create { record } => {
            let mut row = record;
            for field in &state.fields {
                let absent = row.get(&field.name).is_none_or(Value::is_null);
                if field.kind.is_identifier() && field.auto_generated && absent {
                    row.set(&field.name, Value::Int(state.next_id));
                    state.next_id += 1;
                }
            }
            bump_next_id(state, &row);
            state.rows.push(row.clone());
            Ok(row)
        }
        TableOp::Update { id, record } | TableOp::Patch { id, record } => {
            let index = find_row(state, &id)?;
            state.rows[index].merge(&record);
            Ok(state.rows[index].clone())
        }
        TableOp::Delete { id } => {
            let index = find_row(state, &id)?;
            Ok(state.rows.remove(index))
        }
        TableOp::Retrieve { id } => {
            let index = find_row(state, &id)?;
            Ok(state.rows[index].clone())
        }
    }
}

fn select_rows(state: &TableState, criteria: &Criteria) -> Vec<Record> {
    let id_field = criteria
        .id_field
        .clone()
        .unwrap_or_else(|| state.pk_name().to_string());
    state
        .rows
        .iter()
        .filter(|row| match &criteria.ids {
            Some(ids) => row
                .get(&id_field)
                .is_some_and(|v| ids.iter().any(|id| values_equal(v, id))),
            None => true,
        })
        .filter(|row| matches_record(&criteria.filters, criteria.combinator, row))
        .map(|row| {
            let mut row = row.clone();
            if let Some(fields) = &criteria.fields {
                row.retain(|name| fields.iter().any(|f| f.eq_ignore_ascii_case(name)));
            }
            row
        })
        .collect()
}

impl SchemaProvider for MemoryBackend {
    fn field_descriptors(&self, table: &str) -> Result<Vec<FieldDescriptor>> {
        let inner = self.inner.read().unwrap();
        Ok(table_of(&inner, table)?.fields.clone())
    }

    fn identifier_set(
        &self,
        table: &str,
        requested_fields: Option<&[String]>,
        requested_types: Option<&[FieldType]>,
    ) -> Result<IdentifierSet> {
        let inner = self.inner.read().unwrap();
        let state = table_of(&inner, table)?;
        if let Some(names) = requested_fields {
            let mut fields = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let mut field = state
                    .fields
                    .iter()
                    .find(|f| f.matches_input_name(name))
                    .cloned()
                    .ok_or_else(|| {
                        Error::internal(format!(
                            "requested identifier field '{name}' does not exist in '{table}'"
                        ))
                    })?;
                if let Some(ty) = requested_types.and_then(|types| types.get(i)) {
                    field.field_type = *ty;
                }
                fields.push(field);
            }
            return Ok(IdentifierSet::new(fields));
        }
        Ok(IdentifierSet::new(
            state
                .fields
                .iter()
                .filter(|f| f.kind.is_identifier())
                .cloned()
                .collect(),
        ))
    }

    fn relation_descriptors(&self, table: &str) -> Result<Vec<RelationDescriptor>> {
        let inner = self.inner.read().unwrap();
        Ok(table_of(&inner, table)?.relations.clone())
    }
}

impl PersistenceProvider for MemoryBackend {
    fn apply(&self, table: &str, op: TableOp) -> Result<Record> {
        let mut inner = self.inner.write().unwrap();
        apply_locked(&mut inner, table, op)
    }

    fn apply_batch(&self, batch: &StagedBatch) -> Result<Vec<Record>> {
        let mut inner = self.inner.write().unwrap();
        let snapshot = inner.tables.clone();
        let mut results = Vec::with_capacity(batch.ops.len());
        for op in &batch.ops {
            match apply_locked(&mut inner, &batch.table, op.clone()) {
                Ok(record) => results.push(record),
                Err(e) => {
                    inner.tables = snapshot;
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    fn select(&self, table: &str, criteria: &Criteria) -> Result<Vec<Record>> {
        let inner = self.inner.read().unwrap();
        Ok(select_rows(table_of(&inner, table)?, criteria))
    }
}

impl SessionProvider for MemoryBackend {
    fn user_id(&self) -> Option<Value> {
        self.inner.read().unwrap().user.clone()
    }

    fn policy(&self, action: PolicyAction, _service: Option<&str>, resource: &str) -> Option<PolicySet> {
        let inner = self.inner.read().unwrap();
        inner
            .policies
            .iter()
            .find(|(a, table, _)| *a == action && table.eq_ignore_ascii_case(resource))
            .map(|(_, _, policy)| policy.clone())
    }

    fn substitute_lookup(&self, key: &str) -> Option<Value> {
        self.inner.read().unwrap().lookups.get(key).cloned()
    }
}

impl ServiceEndpoint for MemoryBackend {
    fn call(&self, request: &RemoteCall) -> Result<RemoteReply> {
        match self.handle(request) {
            Ok(reply) => Ok(reply),
            Err(e) => Ok(reply_for_error(&e)),
        }
    }
}

fn reply_for_error(error: &Error) -> RemoteReply {
    let status = match error {
        Error::NotFound(_) => 404,
        Error::BadRequest(_) => 400,
        Error::Forbidden(_) => 403,
        _ => 500,
    };
    RemoteReply::error(status, None, error.to_string())
}

impl MemoryBackend {
    fn handle(&self, request: &RemoteCall) -> Result<RemoteReply> {
        let criteria = request.criteria.clone().unwrap_or_default();
        match request.verb {
            Verb::Get => {
                let found = {
                    let inner = self.inner.read().unwrap();
                    select_rows(table_of(&inner, &request.resource)?, &criteria)
                };
                Ok(RemoteReply::ok(found))
            }
            Verb::Post => {
                let mut created = Vec::with_capacity(request.records.len());
                for record in &request.records {
                    created.push(self.apply(
                        &request.resource,
                        TableOp::Create {
                            record: record.clone(),
                        },
                    )?);
                }
                Ok(RemoteReply::created(created))
            }
            Verb::Put | Verb::Patch => {
                let payload = request
                    .records
                    .first()
                    .ok_or_else(|| Error::bad_request("write call carries no record"))?;
                let ids = criteria
                    .ids
                    .clone()
                    .ok_or_else(|| Error::bad_request("write call names no target ids"))?;
                let mut updated = Vec::with_capacity(ids.len());
                for id in ids {
                    updated.push(self.apply(
                        &request.resource,
                        TableOp::Patch {
                            id: ResolvedId::Single(id),
                            record: payload.clone(),
                        },
                    )?);
                }
                Ok(RemoteReply::ok(updated))
            }
            Verb::Delete => {
                // Criteria-addressed delete; junction rows have no key of
                // their own, so removal matches the whole criteria set.
                let mut inner = self.inner.write().unwrap();
                let state = table_of_mut(&mut inner, &request.resource)?;
                let matched = select_rows(state, &criteria);
                state.rows.retain(|row| !matched.contains(row));
                Ok(RemoteReply::ok(matched))
            }
        }
    }
}

impl ServiceRegistry for MemoryBackend {
    fn resolve(&self, service: Option<&str>) -> Result<&dyn ServiceEndpoint> {
        match service {
            None => Ok(self),
            Some(name) => self
                .services
                .get(name)
                .map(|backend| backend.as_ref() as &dyn ServiceEndpoint)
                .ok_or_else(|| Error::not_found(format!("unknown service '{name}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_core::FieldKind;

    fn orders_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.register(
            TableDef::new("orders")
                .field(
                    FieldDescriptor::new("id")
                        .kind(FieldKind::Identifier)
                        .field_type(FieldType::Integer)
                        .auto_generated(true),
                )
                .field(FieldDescriptor::new("status")),
        );
        backend
    }

    #[test]
    fn test_create_assigns_ids() {
        let backend = orders_backend();
        let first = backend
            .apply("orders", TableOp::Create { record: Record::from([("status", Value::from("a"))]) })
            .unwrap();
        let second = backend
            .apply("orders", TableOp::Create { record: Record::from([("status", Value::from("b"))]) })
            .unwrap();
        assert_eq!(first.get("id"), Some(&Value::Int(1)));
        assert_eq!(second.get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_patch_and_delete_by_id() {
        let backend = orders_backend();
        backend.insert_row("orders", Record::from([("id", Value::Int(5)), ("status", Value::from("pending"))]));

        let patched = backend
            .apply(
                "orders",
                TableOp::Patch {
                    id: ResolvedId::Single(Value::Int(5)),
                    record: Record::from([("status", Value::from("shipped"))]),
                },
            )
            .unwrap();
        assert_eq!(patched.get("status"), Some(&Value::Text("shipped".into())));

        let removed = backend
            .apply("orders", TableOp::Delete { id: ResolvedId::Single(Value::Int(5)) })
            .unwrap();
        assert_eq!(removed.get("id"), Some(&Value::Int(5)));
        assert!(backend.rows("orders").is_empty());

        let missing = backend
            .apply("orders", TableOp::Delete { id: ResolvedId::Single(Value::Int(5)) })
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));
    }

    #[test]
    fn test_apply_batch_is_atomic() {
        let backend = orders_backend();
        backend.insert_row("orders", Record::from([("id", Value::Int(1)), ("status", Value::from("a"))]));

        let mut batch = StagedBatch::new("orders");
        batch.push(TableOp::Delete { id: ResolvedId::Single(Value::Int(1)) });
        batch.push(TableOp::Delete { id: ResolvedId::Single(Value::Int(99)) });

        assert!(backend.apply_batch(&batch).is_err());
        // The first delete was rolled back with the failure.
        assert_eq!(backend.rows("orders").len(), 1);
    }

    #[test]
    fn test_select_by_ids_and_fields() {
        let backend = orders_backend();
        backend.insert_row("orders", Record::from([("id", Value::Int(1)), ("status", Value::from("a"))]));
        backend.insert_row("orders", Record::from([("id", Value::Int(2)), ("status", Value::from("b"))]));

        let criteria = Criteria {
            ids: Some(vec![Value::Int(2)]),
            id_field: Some("id".to_string()),
            fields: Some(vec!["status".to_string()]),
            ..Criteria::default()
        };
        let found = backend.select("orders", &criteria).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("status"), Some(&Value::Text("b".into())));
        assert!(!found[0].contains("id"));
    }

    #[test]
    fn test_endpoint_errors_become_replies() {
        let backend = orders_backend();
        let call = RemoteCall::get(None, "nonexistent", Criteria::all());
        let reply = backend.call(&call).unwrap();
        assert_eq!(reply.status, 404);
        assert!(reply.error.is_some());
    }

    #[test]
    fn test_identifier_override() {
        let backend = orders_backend();
        let ids = backend
            .identifier_set("orders", Some(&["status".to_string()]), Some(&[FieldType::Text]))
            .unwrap();
        assert_eq!(ids.single().map(|f| f.name.as_str()), Some("status"));

        let err = backend
            .identifier_set("orders", Some(&["missing".to_string()]), None)
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
