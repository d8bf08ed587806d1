//! Core types for the Relata record engine.
//!
//! `relata-core` is the foundation layer for the workspace. It defines the
//! data model every other crate builds on and performs no I/O.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value` and `Record` represent schema-less rows moving
//!   between clients, the engine, and backing stores.
//! - **Metadata**: `FieldDescriptor`, `IdentifierSet`, and
//!   `RelationDescriptor` describe what the schema provider discovered about
//!   a table; records are validated against them at operation time.
//! - **Validation**: field-level rules with per-rule failure policies.
//! - **Errors**: the shared taxonomy, including the batch aggregate that
//!   carries per-index outcomes.
//!
//! # Who Uses This Crate
//!
//! - `relata-engine` consumes the metadata and rules to resolve identifiers,
//!   coerce records, and reconcile relationships.
//! - `relata` (the facade) exposes the record API in terms of these types.
//! - `relata-testkit` registers descriptor sets to stand in for a real
//!   schema provider during tests.

pub mod error;
pub mod field;
pub mod record;
pub mod relation;
pub mod validate;
pub mod value;

pub use error::{Error, ItemOutcome, Result};
pub use field::{FieldDescriptor, FieldKind, FieldType, FunctionContext, IdentifierSet};
pub use record::Record;
pub use relation::{JunctionInfo, RelationDescriptor, RelationKind};
pub use validate::{OnFail, RuleCheck, ValidationOutcome, ValidationRule};
pub use value::Value;
