//! The record API surface.
//!
//! `DataService` wires the four provider seams together and exposes the
//! batch operations plus single-record conveniences. Every call builds a
//! request-scoped [`Coordinator`], so a service handle is cheap to clone
//! and safe to share.

use std::sync::Arc;

use relata_core::{Error, ItemOutcome, Record, Result, Value};
use relata_engine::{
    BatchOptions, Combinator, Coordinator, FilterTriple, PersistenceProvider, SchemaProvider,
    ServiceRegistry, SessionProvider,
};

/// Facade over the engine, bound to one set of providers.
#[derive(Clone)]
pub struct DataService {
    schema: Arc<dyn SchemaProvider>,
    store: Arc<dyn PersistenceProvider>,
    session: Arc<dyn SessionProvider>,
    registry: Arc<dyn ServiceRegistry>,
}

impl DataService {
    /// Bind a service to its providers.
    #[must_use]
    pub fn new(
        schema: Arc<dyn SchemaProvider>,
        store: Arc<dyn PersistenceProvider>,
        session: Arc<dyn SessionProvider>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        Self {
            schema,
            store,
            session,
            registry,
        }
    }

    fn coordinator(&self) -> Coordinator<'_> {
        Coordinator::new(
            self.schema.as_ref(),
            self.store.as_ref(),
            self.session.as_ref(),
            self.registry.as_ref(),
        )
    }

    /// Create a batch of records.
    pub fn create_records(
        &self,
        table: &str,
        items: Vec<Record>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().create(table, items, options)
    }

    /// Update a batch of records, each addressed by the identifier it
    /// carries.
    pub fn update_records(
        &self,
        table: &str,
        items: Vec<Record>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().update(table, items, options)
    }

    /// Apply one payload as an update to every listed identifier.
    pub fn update_records_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().update_by_ids(table, ids, payload, options)
    }

    /// Patch a batch of records.
    pub fn patch_records(
        &self,
        table: &str,
        items: Vec<Record>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().patch(table, items, options)
    }

    /// Apply one payload as a patch to every listed identifier.
    pub fn patch_records_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().patch_by_ids(table, ids, payload, options)
    }

    /// Update every record matching a filter with one payload.
    pub fn update_records_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator()
            .update_by_filter(table, filters, combinator, payload, options)
    }

    /// Patch every record matching a filter with one payload.
    pub fn patch_records_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator()
            .patch_by_filter(table, filters, combinator, payload, options)
    }

    /// Delete a batch of records, each addressed by the identifier it
    /// carries.
    pub fn delete_records(
        &self,
        table: &str,
        items: Vec<Record>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().delete(table, items, options)
    }

    /// Delete the listed identifiers.
    pub fn delete_records_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().delete_by_ids(table, ids, options)
    }

    /// Delete every record matching a filter.
    pub fn delete_records_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator()
            .delete_by_filter(table, filters, combinator, options)
    }

    /// Delete every record of a table. Requires the force option.
    pub fn truncate_table(&self, table: &str, options: &BatchOptions) -> Result<Vec<Record>> {
        self.coordinator().truncate(table, options)
    }

    /// Retrieve every record of a table.
    pub fn retrieve_records(&self, table: &str, options: &BatchOptions) -> Result<Vec<Record>> {
        self.coordinator()
            .retrieve_by_filter(table, Vec::new(), Combinator::And, options)
    }

    /// Retrieve the listed identifiers, in list order.
    pub fn retrieve_records_by_ids(
        &self,
        table: &str,
        ids: Vec<Value>,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator().retrieve_by_ids(table, ids, options)
    }

    /// Retrieve every record matching a filter.
    pub fn retrieve_records_by_filter(
        &self,
        table: &str,
        filters: Vec<FilterTriple>,
        combinator: Combinator,
        options: &BatchOptions,
    ) -> Result<Vec<Record>> {
        self.coordinator()
            .retrieve_by_filter(table, filters, combinator, options)
    }

    /// Create one record.
    pub fn create_record(&self, table: &str, item: Record, options: &BatchOptions) -> Result<Record> {
        unwrap_single(self.create_records(table, vec![item], options))
    }

    /// Retrieve one record by identifier.
    pub fn retrieve_record_by_id(&self, table: &str, id: Value, options: &BatchOptions) -> Result<Record> {
        unwrap_single(self.retrieve_records_by_ids(table, vec![id], options))
    }

    /// Update one record by identifier.
    pub fn update_record_by_id(
        &self,
        table: &str,
        id: Value,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Record> {
        unwrap_single(self.update_records_by_ids(table, vec![id], payload, options))
    }

    /// Patch one record by identifier.
    pub fn patch_record_by_id(
        &self,
        table: &str,
        id: Value,
        payload: &Record,
        options: &BatchOptions,
    ) -> Result<Record> {
        unwrap_single(self.patch_records_by_ids(table, vec![id], payload, options))
    }

    /// Delete one record by identifier.
    pub fn delete_record_by_id(&self, table: &str, id: Value, options: &BatchOptions) -> Result<Record> {
        unwrap_single(self.delete_records_by_ids(table, vec![id], options))
    }
}

/// Collapse a batch-of-one result into a single-record result, unwrapping
/// the aggregate error down to the item's own error.
fn unwrap_single(result: Result<Vec<Record>>) -> Result<Record> {
    match result {
        Ok(records) => records
            .into_iter()
            .next()
            .ok_or_else(|| Error::internal("single-record operation returned no record")),
        Err(Error::Batch { message, results }) => {
            match results.into_iter().find_map(|outcome| match outcome {
                ItemOutcome::Error(e) => Some(e),
                ItemOutcome::Record(_) => None,
            }) {
                Some(error) => Err(error),
                None => Err(Error::internal(message)),
            }
        }
        Err(other) => Err(other),
    }
}
