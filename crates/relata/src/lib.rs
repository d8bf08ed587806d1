//! Relata: a storage-agnostic record operation and relationship
//! resolution engine.
//!
//! Relata sits between an API surface and whatever actually stores the
//! data. Clients send schema-less record payloads; the engine resolves
//! identifiers, validates and coerces fields against discovered metadata,
//! applies server-side filter policies, and reconciles nested relationship
//! payloads across `belongs_to`, `has_one`, `has_many`, and
//! `many_to_many` topologies, including relations hosted by other
//! services.
//!
//! Every operation is batch-shaped with three failure modes: fail fast
//! (default), roll back atomically, or continue past per-record failures
//! and report them per index.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use relata::{BatchOptions, DataService, Record, Value};
//! use relata_testkit::MemoryBackend;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let service = DataService::new(
//!     backend.clone(),
//!     backend.clone(),
//!     backend.clone(),
//!     backend,
//! );
//! let order = service.create_record(
//!     "orders",
//!     Record::from([("status", Value::from("pending"))]),
//!     &BatchOptions::default(),
//! )?;
//! # Ok::<(), relata::Error>(())
//! ```

pub mod service;

pub use relata_core::{
    Error, FieldDescriptor, FieldKind, FieldType, FunctionContext, IdentifierSet, ItemOutcome,
    JunctionInfo, OnFail, Record, RelationDescriptor, RelationKind, Result, RuleCheck,
    ValidationOutcome, ValidationRule, Value,
};
pub use relata_engine::{
    ids_from_csv, BatchOptions, Combinator, CompareOp, Criteria, FilterTriple,
    PersistenceProvider, PolicyAction, PolicySet, RelatedSpec, RemoteCall, RemoteError,
    RemoteReply, SchemaProvider, ServiceEndpoint, ServiceRegistry, SessionProvider, StagedBatch,
    TableOp, Verb,
};
pub use service::DataService;
