//! Identifier extraction from inbound records and bare values.
//!
//! Resolution never errors: a record with a malformed or missing key is a
//! normal state the batch coordinator routes to the right operation
//! (create versus update) or reports per item. Resolution is idempotent so
//! the coordinator may call it again on a record it already stripped.

use relata_core::{IdentifierSet, Record, Value};

use crate::filter::values_equal;

/// A fully resolved identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedId {
    /// One coerced value of a single-field identifier.
    Single(Value),
    /// Field-name/value pairs of a composite identifier, in declaration
    /// order.
    Composite(Vec<(String, Value)>),
}

impl ResolvedId {
    /// True when a record carries this identifier.
    ///
    /// `single_field` names the identifier column for the single-value
    /// form, where the resolved id no longer remembers it.
    #[must_use]
    pub fn matches(&self, record: &Record, single_field: &str) -> bool {
        match self {
            ResolvedId::Single(value) => record
                .get(single_field)
                .is_some_and(|found| values_equal(found, value)),
            ResolvedId::Composite(pairs) => pairs.iter().all(|(field, value)| {
                record
                    .get(field)
                    .is_some_and(|found| values_equal(found, value))
            }),
        }
    }

    /// The single value, if this is the single-field form.
    #[must_use]
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            ResolvedId::Single(value) => Some(value),
            ResolvedId::Composite(_) => None,
        }
    }
}

impl std::fmt::Display for ResolvedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedId::Single(value) => write!(f, "{value}"),
            ResolvedId::Composite(pairs) => {
                for (i, (field, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{field}={value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum IdResolution {
    /// A usable identifier was found.
    Resolved(ResolvedId),
    /// Key material was present but unusable, for instance a value the
    /// identifier type cannot coerce or a composite with a required part
    /// missing on create.
    Incomplete,
    /// No key material at all.
    Unset,
}

impl IdResolution {
    /// True for [`IdResolution::Resolved`].
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, IdResolution::Resolved(_))
    }
}

/// What the identifier is being pulled from.
pub enum IdInput<'a> {
    /// An inbound record; resolution may strip identifier fields from it.
    Record(&'a mut Record),
    /// A bare identifier value.
    Value(&'a Value),
}

/// Resolve the identifier for one item.
///
/// Single-field identifiers coerce the value to the declared type; a value
/// that will not coerce is `Incomplete` rather than an error. Composite
/// identifiers collect each declared part from the record, falling back to
/// `extras` (typically query-string parameters) for parts the record
/// omits. `strip` removes consumed identifier fields from the record so
/// they do not flow into the parsed payload.
pub fn resolve_id(
    input: IdInput<'_>,
    ids: &IdentifierSet,
    extras: Option<&Record>,
    on_create: bool,
    strip: bool,
) -> IdResolution {
    match input {
        IdInput::Value(value) => {
            if value.is_null() {
                return IdResolution::Unset;
            }
            let Some(field) = ids.single() else {
                return IdResolution::Incomplete;
            };
            match field.field_type.coerce(value) {
                Ok(coerced) => IdResolution::Resolved(ResolvedId::Single(coerced)),
                Err(_) => IdResolution::Incomplete,
            }
        }
        IdInput::Record(record) => {
            if ids.is_composite() {
                resolve_composite(record, ids, extras, on_create, strip)
            } else {
                resolve_single(record, ids, strip)
            }
        }
    }
}

fn resolve_single(record: &mut Record, ids: &IdentifierSet, strip: bool) -> IdResolution {
    let Some(field) = ids.single() else {
        return IdResolution::Unset;
    };
    let Some(name) = record
        .keys()
        .find(|key| field.matches_input_name(key))
        .map(String::from)
    else {
        return IdResolution::Unset;
    };
    let value = record.get(&name).cloned().unwrap_or(Value::Null);
    if strip {
        record.remove(&name);
    }
    if value.is_null() {
        return IdResolution::Unset;
    }
    match field.field_type.coerce(&value) {
        Ok(coerced) => IdResolution::Resolved(ResolvedId::Single(coerced)),
        Err(_) => IdResolution::Incomplete,
    }
}

fn resolve_composite(
    record: &mut Record,
    ids: &IdentifierSet,
    extras: Option<&Record>,
    on_create: bool,
    strip: bool,
) -> IdResolution {
    let mut pairs = Vec::with_capacity(ids.len());
    let mut consumed = Vec::new();
    for field in ids.fields() {
        let from_record = record
            .keys()
            .find(|key| field.matches_input_name(key))
            .map(String::from);
        let raw = match &from_record {
            Some(name) => record.get(name).cloned(),
            None => extras.and_then(|e| {
                e.iter()
                    .find(|(key, _)| field.matches_input_name(key))
                    .map(|(_, value)| value.clone())
            }),
        };
        let Some(raw) = raw else {
            // On create a required composite part must be supplied; its
            // absence makes the key unusable rather than merely unset.
            if on_create && field.required {
                return IdResolution::Incomplete;
            }
            return IdResolution::Unset;
        };
        if let Some(name) = from_record {
            consumed.push(name);
        }
        if raw.is_null() {
            return IdResolution::Unset;
        }
        let Ok(coerced) = field.field_type.coerce(&raw) else {
            return IdResolution::Incomplete;
        };
        pairs.push((field.name.clone(), coerced));
    }
    if strip {
        for name in consumed {
            record.remove(&name);
        }
    }
    IdResolution::Resolved(ResolvedId::Composite(pairs))
}
