//! The record operation and relationship resolution engine.
//!
//! `relata-engine` turns inbound record payloads into staged, validated
//! row operations and reconciles nested relationship payloads after the
//! owning rows commit. It is storage-agnostic: everything it needs from
//! the outside world arrives through the provider traits in [`provider`]
//! and the dispatch seams in [`gateway`].
//!
//! # Pipeline
//!
//! 1. [`batch::Coordinator`] receives a batch (singles are a batch of one)
//!    and validates the option set.
//! 2. [`identifier`] pulls each record's key out of the payload.
//! 3. [`parse`] validates, coerces, and stamps the remaining fields
//!    against the table's descriptors, enforcing any server-side policy
//!    from [`filter`].
//! 4. Writes are applied per item, or staged and committed atomically in
//!    rollback mode.
//! 5. [`relation::RelationshipEngine`] reconciles nested payloads and
//!    expands related records onto retrievals, dispatching cross-service
//!    work through [`gateway::Gateway`].

pub mod batch;
pub mod filter;
pub mod gateway;
pub mod identifier;
pub mod parse;
pub mod provider;
pub mod relation;

pub use batch::{ids_from_csv, BatchOptions, Coordinator};
pub use filter::{
    compare, enforce_policy, interpret_filter_value, like_pattern, matches_record, values_equal,
    Combinator, CompareOp, Criteria, FilterTriple, PolicySet,
};
pub use gateway::{Gateway, RemoteCall, RemoteError, RemoteReply, ServiceEndpoint, ServiceRegistry, Verb};
pub use identifier::{resolve_id, IdInput, IdResolution, ResolvedId};
pub use parse::{parse_record, ParseContext};
pub use provider::{
    PersistenceProvider, PolicyAction, SchemaProvider, SessionProvider, StagedBatch, TableOp,
};
pub use relation::{RelatedSpec, RelationshipEngine, UNLINK_FIELD};
