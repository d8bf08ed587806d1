//! The batch coordinator: every record operation runs through here.
//!
//! All operations are batch-shaped; a single-record call is a batch of
//! one. The coordinator owns the per-item pipeline (identifier resolution,
//! parsing, staging, relationship reconciliation, field selection) and the
//! three failure modes: fail-fast (default), rollback, and
//! continue-on-error. Configuration-class errors always abort regardless
//! of mode.

use relata_core::{Error, FieldType, IdentifierSet, ItemOutcome, Record, RelationDescriptor, Result, Value};

use crate::filter::{
    interpret_filter_value, matches_record, Combinator, Criteria, FilterTriple, PolicySet,
};
use crate::gateway::ServiceRegistry;
use crate::identifier::{resolve_id, IdInput, IdResolution, ResolvedId};
use crate::parse::{parse_record, ParseContext};
use crate::provider::{
    PersistenceProvider, PolicyAction, SchemaProvider, SessionProvider, StagedBatch, TableOp,
};
use crate::relation::{RelatedSpec, RelationshipEngine};

/// Per-request options shared by every batch operation.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Project result records to these fields; identifier fields are always
    /// kept. `["*"]` or `None` means all fields.
    pub fields: Option<Vec<String>>,
    /// Stage every write and commit atomically; the first failure discards
    /// everything.
    pub rollback: bool,
    /// Keep going past per-record failures, reporting them per index.
    pub continue_on_error: bool,
    /// Override the table's declared identifier fields for this operation.
    pub id_fields: Option<Vec<String>>,
    /// Declared types of the identifier override, aligned with `id_fields`.
    pub id_types: Option<Vec<FieldType>>,
    /// Which relations to expand on returned records.
    pub related: RelatedSpec,
    /// Confirmation flag required by destructive whole-table operations.
    pub force: bool,
}

impl BatchOptions {
    /// Reject contradictory option combinations.
    pub fn validate(&self) -> Result<()> {
        if self.rollback && self.continue_on_error {
            return Err(Error::bad_request(
                "the rollback and continue-on-error modes are mutually exclusive",
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated identifier list ("5,6,9") into typed values.
#[must_use]
pub fn ids_from_csv(text: &str) -> Vec<Value> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| interpret_filter_value(s, None))
        .collect()
}

/// One write-batch item: its pre-resolved identifier (when addressing came
/// from outside the record) and the payload, or the per-index error that
/// addressing produced. Errors flow through the batch machinery so the
/// failure modes see them at their index instead of aborting the batch.
type StagedWrite = Result<(Option<ResolvedId>, Record)>;

enum WriteMode {
    Create,
    Update,
    Patch,
}

impl WriteMode {
    const fn verb(&self) -> &'static str {
        match self {
            WriteMode::Create => "created",
            WriteMode::Update => "updated",
            WriteMode::Patch => "patched",
        }
    }

    const fn for_update(&self) -> bool {
        !matches!(self, WriteMode::Create)
    }

    const fn action(&self) -> PolicyAction {
        match self {
            WriteMode::Create => PolicyAction::Create,
            WriteMode::Update | WriteMode::Patch => PolicyAction::Update,
        }
    }
}

/// Request-scoped coordinator over the four provider seams.
pub struct Coordinator<'a> {
    schema: &'a dyn SchemaProvider,
    store: &'a dyn PersistenceProvider,
    session: &'a dyn SessionProvider,
    registry: &'a dyn ServiceRegistry,
}

impl<'a> Coordinator<'a> {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        schema: &'a dyn SchemaProvider,
        store: &'a dyn PersistenceProvider,
        session: &'a dyn SessionProvider,
        registry: &'a dyn ServiceRegistry,
    ) -> Self {
        Self {
            schema,
            store,
            session,
            registry,
        }
    }

    /// Create records.
    pub fn create(&self, table: &str, items: Vec<Record>, options: &BatchOptions) -> Result<Vec<Record>> {
        let items: Vec<StagedWrite> = items.into_iter().map(|r| Ok((None, r))).collect();
        self.run_writes(table, items, &WriteMode::Create, options)
    }

    /// Update records, each addressed by the identifier it carries.
    pub fn update(&self, table: &str, items: Vec<Record>, options: &BatchOptions) -> Result<Vec<Record>> {
        let items: Vec<StagedWrite> = items.into_iter().map(|r| Ok((None, r))).collect();
        self.run_writes(table, items, &WriteMode::Update, options)
    }

    /// Patch records, each addressed by the identifier it carries.
    pub fn patch(&self, table: &str, items: Vec<Record>, options: &BatchOptions) -> Result<Vec<Record>> {
        let items: Vec<StagedWrite> = items.into_iter().map(|r| Ok((None, r))).collect();
        self.run_writes(table, items, &WriteMode::Patch, options)
    }

    /// Apply one payload as an update to every listed identifier.
    pub fn update_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        let items = self.spread_payload(table, ids, payload, options)?;
        self.run_writes(table, items, &WriteMode::Update, options)
    }

    /// Apply one payload as a patch to every listed identifier.
    pub fn patch_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        let items = self.spread_payload(table, ids, payload, options)?;
        self.run_writes(table, items, &WriteMode::Patch, options)
    }

    /// Update every record matching a filter with one payload.
    pub fn update_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        let items = self.spread_over_filter(table, filters, combinator, payload, options)?;
        self.run_writes(table, items, &WriteMode::Update, options)
    }

    /// Patch every record matching a filter with one payload.
    pub fn patch_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        let items = self.spread_over_filter(table, filters, combinator, payload, options)?;
        self.run_writes(table, items, &WriteMode::Patch, options)
    }

    fn spread_over_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<StagedWrite>> {
        let ids = self.identifiers(table, options)?;
        let matched = self.select_with_policy(table, Criteria::by_filter(filters, combinator))?;
        Ok(matched
            .into_iter()
            .map(|mut found| {
                let resolved =
                    resolve_id(IdInput::Record(&mut found), &ids, None, false, false);
                match resolved {
                    IdResolution::Resolved(id) => Ok((Some(id), payload.clone())),
                    _ => Err(Error::internal(format!(
                        "store returned a '{table}' record without its identifier"
                    ))),
                }
            })
            .collect())
    }

    /// Delete records, each addressed by the identifier it carries.
    pub fn delete(&self, table: &str, items: Vec<Record>, options: &BatchOptions) -> Result<Vec<Record>> {
        options.validate()?;
        let ids = self.identifiers(table, options)?;
        let mut resolved = Vec::with_capacity(items.len());
        for mut item in items {
            resolved.push(resolve_id(IdInput::Record(&mut item), &ids, None, false, true));
        }
        self.run_deletes(table, resolved, &ids, options)
    }

    /// Delete the listed identifiers.
    pub fn delete_by_ids(&self, table: &str, values: Vec<Value>, options: &BatchOptions) -> Result<Vec<Record>> {
        options.validate()?;
        let ids = self.identifiers(table, options)?;
        let resolved = values
            .iter()
            .map(|value| resolve_id(IdInput::Value(value), &ids, None, false, false))
            .collect();
        self.run_deletes(table, resolved, &ids, options)
    }

    /// Delete every record matching a filter.
    pub fn delete_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        options.validate()?;
        let ids = self.identifiers(table, options)?;
        let matched = self.select_with_policy(table, Criteria::by_filter(filters, combinator))?;
        let resolved = matched
            .into_iter()
            .map(|mut found| resolve_id(IdInput::Record(&mut found), &ids, None, false, false))
            .collect();
        self.run_deletes(table, resolved, &ids, options)
    }

    /// Delete every record of a table. Requires the force flag.
    pub fn truncate(&self, table: &str, options: &BatchOptions) -> Result<Vec<Record>> {
        if !options.force {
            return Err(Error::bad_request(
                "refusing to empty a table without the force option",
            ));
        }
        self.delete_by_filter(table, Vec::new(), Combinator::And, options)
    }

    /// Retrieve the listed identifiers, preserving list order.
    ///
    /// An id that does not resolve or does not match a row is reported at
    /// its index through a batch error; it never silently shrinks the
    /// result. Fail-fast stops at the first such index, continue-on-error
    /// reports every index.
    pub fn retrieve_by_ids(&self, table: &str, values: Vec<Value>, options: &BatchOptions) -> Result<Vec<Record>> {
        options.validate()?;
        let ids = self.identifiers(table, options)?;
        let id_field = ids
            .single()
            .map(|f| f.name.clone())
            .ok_or_else(|| Error::internal(format!(
                "table '{table}' has a composite identifier; address records by filter instead"
            )))?;
        let resolved: Vec<Result<Value>> = values
            .iter()
            .map(|value| match resolve_id(IdInput::Value(value), &ids, None, false, false) {
                IdResolution::Resolved(ResolvedId::Single(v)) => Ok(v),
                _ => Err(Error::bad_request(format!(
                    "'{value}' is not a valid identifier for table '{table}'"
                ))),
            })
            .collect();
        let wanted: Vec<Value> = resolved.iter().filter_map(|r| r.as_ref().ok().cloned()).collect();
        let found = if wanted.is_empty() {
            Vec::new()
        } else {
            self.select_with_policy(table, Criteria::by_ids(&id_field, wanted))?
        };
        // One outcome per requested id, in the caller's order.
        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(values.len());
        for entry in resolved {
            let outcome = match entry {
                Ok(id) => found
                    .iter()
                    .find(|record| {
                        record
                            .get(&id_field)
                            .is_some_and(|v| crate::filter::values_equal(v, &id))
                    })
                    .cloned()
                    .map_or_else(
                        || {
                            ItemOutcome::Error(Error::not_found(format!(
                                "record '{id}' not found in '{table}'"
                            )))
                        },
                        ItemOutcome::Record,
                    ),
                Err(e) => ItemOutcome::Error(e),
            };
            let failed = outcome.is_error();
            outcomes.push(outcome);
            if failed && !options.continue_on_error {
                break;
            }
        }
        if outcomes.iter().any(ItemOutcome::is_error) {
            return Err(batch_error("retrieved", outcomes));
        }
        let records = outcomes
            .into_iter()
            .filter_map(|o| match o {
                ItemOutcome::Record(r) => Some(r),
                ItemOutcome::Error(_) => None,
            })
            .collect();
        self.finish_reads(table, records, options)
    }

    /// Retrieve every record matching a filter.
    pub fn retrieve_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        options.validate()?;
        let found = self.select_with_policy(table, Criteria::by_filter(filters, combinator))?;
        self.finish_reads(table, found, options)
    }

    fn spread_payload(
        &self,
        table: &str,
        values: Vec<Value>,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<StagedWrite>> {
        let ids = self.identifiers(table, options)?;
        // An unresolvable id stays a per-index failure so the batch's
        // failure mode decides what happens to the rest of the list.
        Ok(values
            .iter()
            .map(|value| match resolve_id(IdInput::Value(value), &ids, None, false, false) {
                IdResolution::Resolved(id) => Ok((Some(id), payload.clone())),
                _ => Err(Error::bad_request(format!(
                    "'{value}' is not a valid identifier for table '{table}'"
                ))),
            })
            .collect())
    }

    fn identifiers(&self, table: &str, options: &BatchOptions) -> Result<IdentifierSet> {
        let ids = self.schema.identifier_set(
            table,
            options.id_fields.as_deref(),
            options.id_types.as_deref(),
        )?;
        if ids.is_empty() {
            return Err(Error::internal(format!(
                "table '{table}' declares no identifier; record-addressed operations are impossible"
            )));
        }
        Ok(ids)
    }

    fn policy_for(&self, action: PolicyAction, table: &str) -> Option<PolicySet> {
        self.session.policy(action, None, table)
    }

    /// In-memory read-policy screen applied on top of whatever the store
    /// returned.
    fn select_with_policy(&self, table: &str, criteria: Criteria) -> Result<Vec<Record>> {
        let records = self.store.select(table, &criteria)?;
        match self.policy_for(PolicyAction::Read, table) {
            Some(policy) => Ok(records
                .into_iter()
                .filter(|r| matches_record(&policy.filters, policy.combinator, r))
                .collect()),
            None => Ok(records),
        }
    }

    fn finish_reads(&self, table: &str, mut records: Vec<Record>, options: &BatchOptions) -> Result<Vec<Record>> {
        let engine = RelationshipEngine::new(self.schema, self.registry);
        engine.expand(table, &mut records, &options.related)?;
        let ids = self.schema.identifier_set(table, None, None)?;
        for record in &mut records {
            apply_field_selection(record, options.fields.as_deref(), &ids);
        }
        Ok(records)
    }

    fn run_writes(
        &self,
        table: &str,
        items: Vec<StagedWrite>,
        mode: &WriteMode,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        options.validate()?;
        let descriptors = self.schema.field_descriptors(table)?;
        let ids = if mode.for_update() {
            self.identifiers(table, options)?
        } else {
            self.schema.identifier_set(table, None, None)?
        };
        let relations = self.schema.relation_descriptors(table)?;
        let policy = self.policy_for(mode.action(), table);
        let user_id = self.session.user_id();
        let timestamp = unix_now();
        let engine = RelationshipEngine::new(self.schema, self.registry);
        let total = items.len();

        tracing::debug!(
            table,
            items = total,
            verb = mode.verb(),
            rollback = options.rollback,
            continue_on_error = options.continue_on_error,
            "running batch"
        );

        let stage = |pre_resolved: Option<ResolvedId>,
                     mut input: Record|
         -> Result<(TableOp, Vec<(RelationDescriptor, Value)>)> {
            let nested = extract_relation_payloads(&mut input, &relations);
            // On create a client-assigned key stays in the payload and
            // flows through parsing like any other field.
            let resolved = match pre_resolved {
                Some(id) => IdResolution::Resolved(id),
                None if mode.for_update() => {
                    resolve_id(IdInput::Record(&mut input), &ids, None, false, true)
                }
                None => IdResolution::Unset,
            };
            let id = match (mode.for_update(), resolved) {
                (true, IdResolution::Resolved(id)) => Some(id),
                (true, _) => {
                    return Err(Error::bad_request(
                        "record is missing a usable identifier",
                    ));
                }
                (false, _) => None,
            };
            let old = match (&id, &policy) {
                (Some(id), Some(_)) => self
                    .store
                    .select(table, &criteria_for_id(id, &ids))?
                    .into_iter()
                    .next(),
                _ => None,
            };
            let ctx = ParseContext {
                schema: self.schema,
                for_update: mode.for_update(),
                old_record: old.as_ref(),
                user_id: user_id.clone(),
                policy: policy.as_ref(),
                timestamp,
            };
            let parsed = parse_record(&input, &descriptors, &ctx)?;
            if parsed.is_empty() && nested.is_empty() {
                return Err(Error::bad_request("record payload is empty"));
            }
            let op = match (mode, id) {
                (WriteMode::Create, _) => TableOp::Create { record: parsed },
                (WriteMode::Update, Some(id)) => TableOp::Update { id, record: parsed },
                (WriteMode::Patch, Some(id)) => TableOp::Patch { id, record: parsed },
                _ => return Err(Error::internal("write staging reached an impossible state")),
            };
            Ok((op, nested))
        };

        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);

        if options.rollback {
            let mut staged = StagedBatch::new(table);
            let mut staged_nested = Vec::with_capacity(total);
            for item in items {
                match item.and_then(|(pre_resolved, input)| stage(pre_resolved, input)) {
                    Ok((op, nested)) => {
                        staged.push(op);
                        staged_nested.push(nested);
                    }
                    Err(e) if e.is_configuration() => return Err(e),
                    Err(e) => {
                        // Everything staged so far is discarded; report the
                        // prior items as rolled back alongside the failure.
                        for _ in 0..staged.len() {
                            outcomes.push(ItemOutcome::Error(Error::bad_request(
                                "rolled back because another record in the batch failed",
                            )));
                        }
                        outcomes.push(ItemOutcome::Error(e));
                        return Err(batch_error(mode.verb(), outcomes));
                    }
                }
            }
            // Prior row state, captured so a relationship failure after the
            // commit can put the owning table back.
            let mut priors = Vec::with_capacity(staged.ops.len());
            for op in &staged.ops {
                let prior = match op {
                    TableOp::Update { id, .. } | TableOp::Patch { id, .. } => self
                        .store
                        .select(table, &criteria_for_id(id, &ids))?
                        .into_iter()
                        .next(),
                    _ => None,
                };
                priors.push(prior);
            }
            let mut committed = self.store.apply_batch(&staged)?;
            for (index, nested) in staged_nested.into_iter().enumerate() {
                if let Err(e) = self.reconcile_all(
                    &engine,
                    table,
                    &mut committed[index],
                    nested,
                    mode.for_update(),
                ) {
                    self.undo_committed(table, &ids, &staged.ops, &priors, &committed);
                    return Err(e);
                }
            }
            for record in committed {
                outcomes.push(ItemOutcome::Record(record));
            }
        } else {
            for item in items {
                let applied = item
                    .and_then(|(pre_resolved, input)| stage(pre_resolved, input))
                    .and_then(|(op, nested)| {
                        let mut record = self.store.apply(table, op)?;
                        self.reconcile_all(&engine, table, &mut record, nested, mode.for_update())?;
                        Ok(record)
                    });
                match applied {
                    Ok(record) => outcomes.push(ItemOutcome::Record(record)),
                    Err(e) if e.is_configuration() => return Err(e),
                    Err(e) => {
                        outcomes.push(ItemOutcome::Error(e));
                        if !options.continue_on_error {
                            break;
                        }
                    }
                }
            }
        }

        if outcomes.iter().any(ItemOutcome::is_error) {
            return Err(batch_error(mode.verb(), outcomes));
        }

        let mut records: Vec<Record> = outcomes
            .into_iter()
            .filter_map(|o| match o {
                ItemOutcome::Record(r) => Some(r),
                ItemOutcome::Error(_) => None,
            })
            .collect();
        engine.expand(table, &mut records, &options.related)?;
        let declared_ids = self.schema.identifier_set(table, None, None)?;
        for record in &mut records {
            apply_field_selection(record, options.fields.as_deref(), &declared_ids);
        }
        Ok(records)
    }

    /// Reverse an already-committed batch after a relationship failure so
    /// rollback mode leaves no trace of the owning-table writes. Creates
    /// are deleted, updates and patches are restored from their prior row.
    /// A failure here is logged and swallowed; the caller reports the
    /// relationship error that triggered the undo.
    fn undo_committed(
        &self,
        table: &str,
        ids: &IdentifierSet,
        ops: &[TableOp],
        priors: &[Option<Record>],
        committed: &[Record],
    ) {
        let mut undo = StagedBatch::new(table);
        for index in (0..ops.len()).rev() {
            match &ops[index] {
                TableOp::Create { .. } => {
                    let mut row = committed[index].clone();
                    if let IdResolution::Resolved(id) =
                        resolve_id(IdInput::Record(&mut row), ids, None, false, false)
                    {
                        undo.push(TableOp::Delete { id });
                    }
                }
                TableOp::Update { id, .. } | TableOp::Patch { id, .. } => {
                    if let Some(prior) = &priors[index] {
                        undo.push(TableOp::Update {
                            id: id.clone(),
                            record: prior.clone(),
                        });
                    }
                }
                TableOp::Delete { .. } | TableOp::Retrieve { .. } => {}
            }
        }
        if undo.is_empty() {
            return;
        }
        if let Err(e) = self.store.apply_batch(&undo) {
            tracing::warn!(
                table,
                error = %e,
                "failed to restore a committed batch after a relationship failure"
            );
        }
    }

    fn reconcile_all(
        &self,
        engine: &RelationshipEngine<'_>,
        table: &str,
        record: &mut Record,
        nested: Vec<(RelationDescriptor, Value)>,
        for_update: bool,
    ) -> Result<()> {
        for (relation, payload) in nested {
            engine.reconcile(table, record, &relation, &payload, for_update)?;
        }
        Ok(())
    }

    fn run_deletes(
        &self,
        table: &str,
        resolved: Vec<IdResolution>,
        ids: &IdentifierSet,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        let policy = self.policy_for(PolicyAction::Delete, table);
        let total = resolved.len();
        tracing::debug!(table, items = total, "running delete batch");

        let stage = |resolution: IdResolution| -> Result<TableOp> {
            let IdResolution::Resolved(id) = resolution else {
                return Err(Error::bad_request("record is missing a usable identifier"));
            };
            if let Some(policy) = &policy {
                let old = self
                    .store
                    .select(table, &criteria_for_id(&id, ids))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::not_found(format!("record '{id}' not found in '{table}'")))?;
                crate::filter::enforce_policy(policy, &old, None)?;
            }
            Ok(TableOp::Delete { id })
        };

        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);

        if options.rollback {
            let mut staged = StagedBatch::new(table);
            for resolution in resolved {
                match stage(resolution) {
                    Ok(op) => staged.push(op),
                    Err(e) if e.is_configuration() => return Err(e),
                    Err(e) => {
                        for _ in 0..staged.len() {
                            outcomes.push(ItemOutcome::Error(Error::bad_request(
                                "rolled back because another record in the batch failed",
                            )));
                        }
                        outcomes.push(ItemOutcome::Error(e));
                        return Err(batch_error("deleted", outcomes));
                    }
                }
            }
            for record in self.store.apply_batch(&staged)? {
                outcomes.push(ItemOutcome::Record(record));
            }
        } else {
            for resolution in resolved {
                let applied = stage(resolution).and_then(|op| self.store.apply(table, op));
                match applied {
                    Ok(record) => outcomes.push(ItemOutcome::Record(record)),
                    Err(e) if e.is_configuration() => return Err(e),
                    Err(e) => {
                        outcomes.push(ItemOutcome::Error(e));
                        if !options.continue_on_error {
                            break;
                        }
                    }
                }
            }
        }

        if outcomes.iter().any(ItemOutcome::is_error) {
            return Err(batch_error("deleted", outcomes));
        }
        Ok(outcomes
            .into_iter()
            .filter_map(|o| match o {
                ItemOutcome::Record(r) => Some(r),
                ItemOutcome::Error(_) => None,
            })
            .collect())
    }
}

fn batch_error(verb: &str, outcomes: Vec<ItemOutcome>) -> Error {
    Error::batch(
        format!("Batch Error: Not all records could be {verb}."),
        outcomes,
    )
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Pull nested relation payloads out of an inbound record before parsing.
fn extract_relation_payloads(
    input: &mut Record,
    relations: &[RelationDescriptor],
) -> Vec<(RelationDescriptor, Value)> {
    let mut nested = Vec::new();
    for relation in relations {
        if let Some(payload) = input.remove(&relation.name) {
            nested.push((relation.clone(), payload));
        }
    }
    nested
}

/// Criteria addressing exactly one record by its resolved identifier.
fn criteria_for_id(id: &ResolvedId, ids: &IdentifierSet) -> Criteria {
    match id {
        ResolvedId::Single(value) => {
            let field = ids.single().map_or("id", |f| f.name.as_str());
            Criteria::by_ids(field, vec![value.clone()])
        }
        ResolvedId::Composite(pairs) => Criteria::by_filter(
            pairs
                .iter()
                .map(|(field, value)| {
                    FilterTriple::new(field, crate::filter::CompareOp::Eq, value.clone())
                })
                .collect(),
            Combinator::And,
        ),
    }
}

/// Project a record to the requested fields, always keeping identifiers so
/// callers can address the record again and relations can hang off it.
fn apply_field_selection(record: &mut Record, fields: Option<&[String]>, ids: &IdentifierSet) {
    let Some(fields) = fields else { return };
    if fields.iter().any(|f| f == "*") {
        return;
    }
    let id_names = ids.names();
    record.retain(|name| {
        fields.iter().any(|f| f.eq_ignore_ascii_case(name))
            || id_names.iter().any(|id| id.eq_ignore_ascii_case(name))
    });
}
