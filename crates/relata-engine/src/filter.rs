//! Comparison operators, filter-literal interpretation, and server-side
//! policy evaluation.
//!
//! The same operator grammar serves three callers: client filter
//! expressions forwarded to a store, the in-memory evaluator used by
//! policy checks, and the relationship engine's batched key fetches.

use relata_core::{Error, Record, Result, Value};

use crate::provider::SessionProvider;

/// The fixed comparison-operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// String starts with.
    StartsWith,
    /// String ends with.
    EndsWith,
    /// String contains.
    Contains,
    /// Member of list.
    In,
    /// Not a member of list.
    NotIn,
    /// Value is null.
    IsNull,
    /// Value is not null.
    IsNotNull,
    /// Field is present on the record.
    Exists,
    /// Field is absent from the record.
    NotExists,
}

impl CompareOp {
    /// Parse an operator spelling.
    ///
    /// Unknown text is a configuration error, not a user-facing one: the
    /// operator set is fixed and filter grammars are validated upstream.
    pub fn parse(text: &str) -> Result<Self> {
        let normalized = text.trim().to_ascii_lowercase().replace(' ', "_");
        match normalized.as_str() {
            "=" | "==" | "eq" | "equal" => Ok(CompareOp::Eq),
            "!=" | "<>" | "ne" | "not_equal" => Ok(CompareOp::Ne),
            ">" | "gt" | "greater" => Ok(CompareOp::Gt),
            ">=" | "gte" | "greater_equal" => Ok(CompareOp::Gte),
            "<" | "lt" | "less" => Ok(CompareOp::Lt),
            "<=" | "lte" | "less_equal" => Ok(CompareOp::Lte),
            "starts_with" | "sw" => Ok(CompareOp::StartsWith),
            "ends_with" | "ew" => Ok(CompareOp::EndsWith),
            "contains" | "cs" => Ok(CompareOp::Contains),
            "in" => Ok(CompareOp::In),
            "not_in" | "nin" => Ok(CompareOp::NotIn),
            "is_null" => Ok(CompareOp::IsNull),
            "is_not_null" => Ok(CompareOp::IsNotNull),
            "exists" => Ok(CompareOp::Exists),
            "not_exists" => Ok(CompareOp::NotExists),
            _ => Err(Error::internal(format!(
                "invalid comparison operator '{text}'"
            ))),
        }
    }

    /// True for the string-predicate operators that rewrite to LIKE
    /// patterns when forwarded to a SQL-ish store.
    #[must_use]
    pub const fn is_string_op(&self) -> bool {
        matches!(
            self,
            CompareOp::StartsWith | CompareOp::EndsWith | CompareOp::Contains
        )
    }
}

/// Loose value equality: integers compare exactly, mixed numerics compare
/// through float math, text compares exactly, null equals null.
///
/// Integer pairs never touch f64, which cannot distinguish adjacent i64
/// values above 2^53.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_null() && right.is_null() {
        return true;
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(_), _) | (_, Value::Float(_)) => {
            match (left.as_float(), right.as_float()) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            }
        }
        _ => left == right,
    }
}

fn values_cmp(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return a.partial_cmp(&b);
    }
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    None
}

/// Evaluate one comparison.
///
/// `found` reports whether the field was present on the record at all; it
/// drives `Exists`/`NotExists` and defeats every binary operator when
/// false.
#[must_use]
pub fn compare(op: CompareOp, found: bool, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Exists => found,
        CompareOp::NotExists => !found,
        CompareOp::IsNull => found && left.is_null(),
        CompareOp::IsNotNull => found && !left.is_null(),
        _ if !found => false,
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Gt => values_cmp(left, right) == Some(std::cmp::Ordering::Greater),
        CompareOp::Gte => matches!(
            values_cmp(left, right),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        CompareOp::Lt => values_cmp(left, right) == Some(std::cmp::Ordering::Less),
        CompareOp::Lte => matches!(
            values_cmp(left, right),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        CompareOp::StartsWith => left.to_string().starts_with(&right.to_string()),
        CompareOp::EndsWith => left.to_string().ends_with(&right.to_string()),
        CompareOp::Contains => left.to_string().contains(&right.to_string()),
        CompareOp::In => match right {
            Value::List(items) => items.iter().any(|item| values_equal(left, item)),
            other => values_equal(left, other),
        },
        CompareOp::NotIn => match right {
            Value::List(items) => !items.iter().any(|item| values_equal(left, item)),
            other => !values_equal(left, other),
        },
    }
}

/// Interpret a raw filter literal.
///
/// Matching single or double quotes unwrap to a plain string; unquoted
/// `true`/`false`/`null` (any case) become typed literals; numeric text
/// becomes int or float; anything else is offered to the session provider
/// for lookup-key substitution and passes through as text otherwise.
#[must_use]
pub fn interpret_filter_value(raw: &str, session: Option<&dyn SessionProvider>) -> Value {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        let first = bytes[0];
        let last = bytes[trimmed.len() - 1];
        if first == last && (first == b'\'' || first == b'"') {
            return Value::Text(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    if let Some(substituted) = session.and_then(|s| s.substitute_lookup(trimmed)) {
        return substituted;
    }
    Value::Text(trimmed.to_string())
}

/// Rewrite a string-operator comparison value with SQL-style wildcards for
/// callers forwarding it into a LIKE-style predicate. Non-string operators
/// return `None`.
#[must_use]
pub fn like_pattern(op: CompareOp, value: &str) -> Option<String> {
    match op {
        CompareOp::StartsWith => Some(format!("{value}%")),
        CompareOp::EndsWith => Some(format!("%{value}")),
        CompareOp::Contains => Some(format!("%{value}%")),
        _ => None,
    }
}

/// How a list of filter triples combines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Combinator {
    /// Every triple must pass.
    #[default]
    And,
    /// Any single triple passing allows the whole set.
    Or,
}

/// One `(field, operator, value)` filter term.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTriple {
    /// Field name.
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Comparison value.
    pub value: Value,
}

impl FilterTriple {
    /// Build a triple.
    pub fn new(field: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

/// A server-side filter policy: ordered triples plus a combinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    /// Ordered filter terms.
    pub filters: Vec<FilterTriple>,
    /// Combination mode.
    pub combinator: Combinator,
}

/// Selection criteria handed to stores and endpoints: filters, an optional
/// id list, and optional field projection. This is the typed form of the
/// query string a REST-ish store would receive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    /// Filter terms.
    pub filters: Vec<FilterTriple>,
    /// Combination mode for `filters`.
    pub combinator: Combinator,
    /// Restrict to these identifier values.
    pub ids: Option<Vec<Value>>,
    /// Field holding the identifier, when `ids` is set.
    pub id_field: Option<String>,
    /// Project results to these fields.
    pub fields: Option<Vec<String>>,
}

impl Criteria {
    /// Match-everything criteria.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Criteria selecting specific ids of the named identifier field.
    #[must_use]
    pub fn by_ids(id_field: impl Into<String>, ids: Vec<Value>) -> Self {
        Self {
            ids: Some(ids),
            id_field: Some(id_field.into()),
            ..Self::default()
        }
    }

    /// Criteria from filter triples.
    #[must_use]
    pub fn by_filter(filters: Vec<FilterTriple>, combinator: Combinator) -> Self {
        Self {
            filters,
            combinator,
            ..Self::default()
        }
    }

    /// Evaluate only the filter-triple part against a record in memory.
    /// Id-list matching is the store's business since it knows the table's
    /// identifier field.
    #[must_use]
    pub fn matches_filters(&self, record: &Record) -> bool {
        matches_record(&self.filters, self.combinator, record)
    }
}

/// Evaluate filter triples against a record in memory.
#[must_use]
pub fn matches_record(filters: &[FilterTriple], combinator: Combinator, record: &Record) -> bool {
    if filters.is_empty() {
        return true;
    }
    let evaluate = |triple: &FilterTriple| {
        let value = record.get(&triple.field);
        let found = record.contains(&triple.field);
        compare(
            triple.op,
            found,
            value.unwrap_or(&Value::Null),
            &triple.value,
        )
    };
    match combinator {
        Combinator::And => filters.iter().all(evaluate),
        Combinator::Or => filters.iter().any(evaluate),
    }
}

/// Enforce a server-side policy against a parsed record.
///
/// Fields missing from the new record fall back to the prior record state
/// (updates legitimately omit unchanged fields). AND mode raises on the
/// first failing triple; OR mode allows on the first success and raises
/// only after exhausting every triple.
pub fn enforce_policy(policy: &PolicySet, record: &Record, old: Option<&Record>) -> Result<()> {
    if policy.filters.is_empty() {
        return Ok(());
    }
    for triple in &policy.filters {
        let (found, value) = match record.get(&triple.field) {
            Some(v) => (true, v.clone()),
            None => match old.and_then(|o| o.get(&triple.field)) {
                Some(v) => (true, v.clone()),
                None => (false, Value::Null),
            },
        };
        let passed = compare(triple.op, found, &value, &triple.value);
        match policy.combinator {
            Combinator::And => {
                if !passed {
                    return Err(Error::forbidden(format!(
                        "access to this record is denied by a server-side filter on field '{}'",
                        triple.field
                    )));
                }
            }
            Combinator::Or => {
                if passed {
                    return Ok(());
                }
            }
        }
    }
    match policy.combinator {
        Combinator::And => Ok(()),
        Combinator::Or => Err(Error::forbidden(
            "access to this record is denied by server-side filters",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operator_spellings() {
        assert_eq!(CompareOp::parse("=").unwrap(), CompareOp::Eq);
        assert_eq!(CompareOp::parse("not in").unwrap(), CompareOp::NotIn);
        assert_eq!(CompareOp::parse("STARTS_WITH").unwrap(), CompareOp::StartsWith);
        assert_eq!(CompareOp::parse("is null").unwrap(), CompareOp::IsNull);
    }

    #[test]
    fn test_unknown_operator_is_internal() {
        let err = CompareOp::parse("approximately").unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_compare_starts_with() {
        // From the contract: starts_with("daniel@example.com", "dan") is true.
        assert!(compare(
            CompareOp::StartsWith,
            true,
            &Value::from("daniel@example.com"),
            &Value::from("dan")
        ));
        assert!(!compare(
            CompareOp::StartsWith,
            true,
            &Value::from("daniel@example.com"),
            &Value::from("x")
        ));
    }

    #[test]
    fn test_compare_numeric_cross_type() {
        assert!(compare(CompareOp::Eq, true, &Value::Int(5), &Value::Float(5.0)));
        assert!(compare(CompareOp::Gt, true, &Value::Float(5.5), &Value::Int(5)));
        assert!(compare(CompareOp::Lte, true, &Value::Int(5), &Value::Int(5)));
    }

    #[test]
    fn test_large_int_identifiers_compare_exactly() {
        // Adjacent i64 values above 2^53 collapse to the same f64; integer
        // pairs must not go through float math.
        let a = Value::Int(9_007_199_254_740_993);
        let b = Value::Int(9_007_199_254_740_992);
        assert!(!values_equal(&a, &b));
        assert!(values_equal(&a, &Value::Int(9_007_199_254_740_993)));
        assert!(compare(CompareOp::Gt, true, &a, &b));
        assert!(!compare(CompareOp::Gt, true, &b, &a));
    }

    #[test]
    fn test_compare_in_list() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert!(compare(CompareOp::In, true, &Value::Int(2), &list));
        assert!(!compare(CompareOp::In, true, &Value::Int(3), &list));
        assert!(compare(CompareOp::NotIn, true, &Value::Int(3), &list));
    }

    #[test]
    fn test_compare_existence() {
        assert!(compare(CompareOp::Exists, true, &Value::Null, &Value::Null));
        assert!(compare(CompareOp::NotExists, false, &Value::Null, &Value::Null));
        assert!(compare(CompareOp::IsNull, true, &Value::Null, &Value::Null));
        assert!(!compare(CompareOp::IsNull, false, &Value::Null, &Value::Null));
        // A binary comparison on an absent field never passes.
        assert!(!compare(CompareOp::Eq, false, &Value::Null, &Value::Null));
    }

    #[test]
    fn test_interpret_quoted_null_stays_text() {
        // '"null"' is the string "null", while bare null is the literal.
        assert_eq!(
            interpret_filter_value("'null'", None),
            Value::Text("null".to_string())
        );
        assert_eq!(interpret_filter_value("null", None), Value::Null);
    }

    #[test]
    fn test_interpret_literals() {
        assert_eq!(interpret_filter_value("TRUE", None), Value::Bool(true));
        assert_eq!(interpret_filter_value("42", None), Value::Int(42));
        assert_eq!(interpret_filter_value("4.5", None), Value::Float(4.5));
        assert_eq!(
            interpret_filter_value("\"quoted\"", None),
            Value::Text("quoted".to_string())
        );
        assert_eq!(
            interpret_filter_value("plain", None),
            Value::Text("plain".to_string())
        );
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(
            like_pattern(CompareOp::Contains, "dan"),
            Some("%dan%".to_string())
        );
        assert_eq!(
            like_pattern(CompareOp::StartsWith, "dan"),
            Some("dan%".to_string())
        );
        assert_eq!(
            like_pattern(CompareOp::EndsWith, "dan"),
            Some("%dan".to_string())
        );
        assert_eq!(like_pattern(CompareOp::Eq, "dan"), None);
    }

    #[test]
    fn test_policy_and_mode_first_failure_raises() {
        let record = Record::from([("owner_id", Value::Int(7))]);
        let policy = PolicySet {
            filters: vec![
                FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(9)),
                FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(7)),
            ],
            combinator: Combinator::And,
        };
        let err = enforce_policy(&policy, &record, None).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_policy_or_mode_short_circuits() {
        let record = Record::from([("owner_id", Value::Int(7))]);
        let policy = PolicySet {
            filters: vec![
                FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(9)),
                FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(7)),
            ],
            combinator: Combinator::Or,
        };
        assert!(enforce_policy(&policy, &record, None).is_ok());

        let denied = PolicySet {
            filters: vec![FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(9))],
            combinator: Combinator::Or,
        };
        assert!(enforce_policy(&denied, &record, None).is_err());
    }

    #[test]
    fn test_policy_falls_back_to_old_record() {
        let new = Record::from([("status", Value::from("open"))]);
        let old = Record::from([("owner_id", Value::Int(7))]);
        let policy = PolicySet {
            filters: vec![FilterTriple::new("owner_id", CompareOp::Eq, Value::Int(7))],
            combinator: Combinator::And,
        };
        assert!(enforce_policy(&policy, &new, Some(&old)).is_ok());
        assert!(enforce_policy(&policy, &new, None).is_err());
    }

    #[test]
    fn test_matches_record_combinators() {
        let record = Record::from([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let filters = vec![
            FilterTriple::new("a", CompareOp::Eq, Value::Int(1)),
            FilterTriple::new("b", CompareOp::Eq, Value::Int(3)),
        ];
        assert!(!matches_record(&filters, Combinator::And, &record));
        assert!(matches_record(&filters, Combinator::Or, &record));
        assert!(matches_record(&[], Combinator::And, &record));
    }
}
