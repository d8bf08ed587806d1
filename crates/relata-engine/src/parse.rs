//! Record parsing: the validate/coerce/stamp pipeline every inbound
//! payload passes through before any row operation is staged.
//!
//! Parsing walks the table's field descriptors in declaration order, so
//! the output record is always in schema order with canonical field names
//! regardless of how the client spelled or ordered the payload. Input
//! fields matching no descriptor are discarded.

use relata_core::{
    Error, FieldDescriptor, FieldKind, FunctionContext, Record, Result, ValidationOutcome, Value,
};

use crate::filter::{enforce_policy, PolicySet};
use crate::provider::SchemaProvider;

/// Everything one parse pass needs beyond the payload itself.
pub struct ParseContext<'a> {
    /// Schema provider, consulted for typecasting.
    pub schema: &'a dyn SchemaProvider,
    /// Update/patch context versus create.
    pub for_update: bool,
    /// Prior row state, when the operation targets an existing row.
    pub old_record: Option<&'a Record>,
    /// Authenticated caller, stamped into user-tracking fields.
    pub user_id: Option<Value>,
    /// Server-side filter policy to enforce on the parsed result.
    pub policy: Option<&'a PolicySet>,
    /// Unix timestamp stamped into timestamp-tracking fields. One value
    /// per batch so every record in it carries the same stamp.
    pub timestamp: i64,
}

/// Parse one payload against a descriptor set.
///
/// On success the returned record contains only schema fields, coerced and
/// validated, with generated fields stamped. Any rejection is a
/// [`Error::BadRequest`] naming the offending field.
pub fn parse_record(
    input: &Record,
    descriptors: &[FieldDescriptor],
    ctx: &ParseContext<'_>,
) -> Result<Record> {
    let mut parsed = Record::new();

    for field in descriptors {
        match field.kind {
            FieldKind::TimestampOnCreate => {
                if !ctx.for_update {
                    parsed.set(&field.name, Value::Int(ctx.timestamp));
                }
                continue;
            }
            FieldKind::TimestampOnUpdate => {
                if ctx.for_update {
                    parsed.set(&field.name, Value::Int(ctx.timestamp));
                }
                continue;
            }
            FieldKind::UserIdOnCreate => {
                if !ctx.for_update {
                    if let Some(user) = &ctx.user_id {
                        parsed.set(&field.name, user.clone());
                    }
                }
                continue;
            }
            FieldKind::UserIdOnUpdate => {
                if ctx.for_update {
                    if let Some(user) = &ctx.user_id {
                        parsed.set(&field.name, user.clone());
                    }
                }
                continue;
            }
            // Never client-settable; silently discarded.
            FieldKind::Virtual => continue,
            // The identifier travels separately on update/patch; on create
            // a client-supplied key participates like any other field.
            FieldKind::Identifier if ctx.for_update => continue,
            _ => {}
        }

        if field.read_only {
            continue;
        }

        let supplied = input
            .iter()
            .find(|(key, _)| field.matches_input_name(key))
            .map(|(_, value)| value.clone());

        let Some(raw) = supplied else {
            if !ctx.for_update && field.required && !field.auto_generated {
                return Err(Error::bad_request(format!(
                    "required field '{}' is missing",
                    field.name
                )));
            }
            continue;
        };

        if raw.is_null() && !field.nullable {
            return Err(Error::bad_request(format!(
                "field '{}' value can not be null",
                field.name
            )));
        }

        let mut dropped = false;
        for rule in &field.rules {
            match rule.apply(&field.name, &raw, &field.picklist, ctx.for_update) {
                Ok(()) => {}
                Err(ValidationOutcome::Reject(message)) => {
                    return Err(Error::bad_request(message));
                }
                Err(ValidationOutcome::Drop) => {
                    dropped = true;
                    break;
                }
            }
        }
        if dropped {
            continue;
        }

        let context = if ctx.for_update {
            FunctionContext::Update
        } else {
            FunctionContext::Insert
        };
        let value = if let Some(expr) = field.function_for(context) {
            let coerced = ctx.schema.typecast(field, &raw)?;
            Value::Expr(expr.replace("{value}", &coerced.to_string()))
        } else {
            ctx.schema.typecast(field, &raw)?
        };
        parsed.set(&field.name, value);
    }

    if let Some(policy) = ctx.policy {
        enforce_policy(policy, &parsed, ctx.old_record)?;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_core::{
        FieldDescriptor, FieldKind, FieldType, IdentifierSet, OnFail, RelationDescriptor,
        RuleCheck, ValidationRule,
    };

    use crate::filter::{Combinator, CompareOp, FilterTriple};

    struct FixedSchema(Vec<FieldDescriptor>);

    impl SchemaProvider for FixedSchema {
        fn field_descriptors(&self, _table: &str) -> Result<Vec<FieldDescriptor>> {
            Ok(self.0.clone())
        }

        fn identifier_set(
            &self,
            _table: &str,
            _requested_fields: Option<&[String]>,
            _requested_types: Option<&[FieldType]>,
        ) -> Result<IdentifierSet> {
            Ok(IdentifierSet::default())
        }

        fn relation_descriptors(&self, _table: &str) -> Result<Vec<RelationDescriptor>> {
            Ok(Vec::new())
        }
    }

    fn order_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("id")
                .kind(FieldKind::Identifier)
                .field_type(FieldType::Integer)
                .auto_generated(true),
            FieldDescriptor::new("status")
                .required(true)
                .picklist(["pending", "shipped"])
                .rule(ValidationRule::new(RuleCheck::Picklist)),
            FieldDescriptor::new("total")
                .field_type(FieldType::Float)
                .nullable(true),
            FieldDescriptor::new("created_at")
                .kind(FieldKind::TimestampOnCreate)
                .field_type(FieldType::Timestamp),
            FieldDescriptor::new("updated_at")
                .kind(FieldKind::TimestampOnUpdate)
                .field_type(FieldType::Timestamp),
            FieldDescriptor::new("created_by").kind(FieldKind::UserIdOnCreate),
            FieldDescriptor::new("display_total").kind(FieldKind::Virtual),
        ]
    }

    fn ctx<'a>(schema: &'a FixedSchema, for_update: bool) -> ParseContext<'a> {
        ParseContext {
            schema,
            for_update,
            old_record: None,
            user_id: Some(Value::Int(99)),
            policy: None,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_create_stamps_and_coerces() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([
            ("STATUS", Value::from("pending")),
            ("total", Value::from("12.5")),
            ("display_total", Value::from("ignored")),
            ("unknown_field", Value::from("ignored")),
        ]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap();

        // Canonical names, schema order, coerced types.
        assert_eq!(parsed.get("status"), Some(&Value::Text("pending".into())));
        assert_eq!(parsed.get("total"), Some(&Value::Float(12.5)));
        assert_eq!(parsed.get("created_at"), Some(&Value::Int(1_700_000_000)));
        assert_eq!(parsed.get("created_by"), Some(&Value::Int(99)));
        assert!(!parsed.contains("updated_at"));
        assert!(!parsed.contains("display_total"));
        assert!(!parsed.contains("unknown_field"));
    }

    #[test]
    fn test_update_stamps_update_side_only() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([("status", Value::from("shipped")), ("id", Value::Int(4))]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, true)).unwrap();

        assert_eq!(parsed.get("updated_at"), Some(&Value::Int(1_700_000_000)));
        assert!(!parsed.contains("created_at"));
        assert!(!parsed.contains("created_by"));
        // The key travels separately on update.
        assert!(!parsed.contains("id"));
    }

    #[test]
    fn test_required_missing_on_create() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([("total", Value::Float(1.0))]);
        let err = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap_err();
        assert!(matches!(err, Error::BadRequest(msg) if msg.contains("status")));
    }

    #[test]
    fn test_required_missing_allowed_on_update() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([("total", Value::Float(1.0))]);
        assert!(parse_record(&input, &schema.0, &ctx(&schema, true)).is_ok());
    }

    #[test]
    fn test_null_on_non_nullable_rejected() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([("status", Value::Null)]);
        let err = parse_record(&input, &schema.0, &ctx(&schema, true)).unwrap_err();
        assert!(matches!(err, Error::BadRequest(msg) if msg.contains("null")));

        // Nullable fields accept an explicit null.
        let input = Record::from([("status", Value::from("pending")), ("total", Value::Null)]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap();
        assert_eq!(parsed.get("total"), Some(&Value::Null));
    }

    #[test]
    fn test_rule_reject_and_drop() {
        let schema = FixedSchema(order_fields());
        let input = Record::from([("status", Value::from("bogus"))]);
        let err = parse_record(&input, &schema.0, &ctx(&schema, true)).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let fields = vec![
            FieldDescriptor::new("email")
                .nullable(true)
                .rule(ValidationRule::new(RuleCheck::Email).on_fail(OnFail::DropField)),
        ];
        let schema = FixedSchema(fields);
        let input = Record::from([("email", Value::from("not-an-email"))]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap();
        assert!(!parsed.contains("email"));
    }

    #[test]
    fn test_read_only_discarded() {
        let fields = vec![FieldDescriptor::new("balance")
            .field_type(FieldType::Float)
            .read_only(true)];
        let schema = FixedSchema(fields);
        let input = Record::from([("balance", Value::Float(9.99))]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_insert_function_wraps_expression() {
        let fields = vec![FieldDescriptor::new("code")
            .function(FunctionContext::Insert, "UPPER('{value}')")];
        let schema = FixedSchema(fields);
        let input = Record::from([("code", Value::from("ab12"))]);
        let parsed = parse_record(&input, &schema.0, &ctx(&schema, false)).unwrap();
        assert_eq!(
            parsed.get("code"),
            Some(&Value::Expr("UPPER('ab12')".into()))
        );
    }

    #[test]
    fn test_policy_enforced_after_parse() {
        let schema = FixedSchema(order_fields());
        let policy = PolicySet {
            filters: vec![FilterTriple::new(
                "status",
                CompareOp::Eq,
                Value::from("pending"),
            )],
            combinator: Combinator::And,
        };
        let base = ctx(&schema, false);
        let guarded = ParseContext {
            policy: Some(&policy),
            ..base
        };
        let allowed = Record::from([("status", Value::from("pending"))]);
        assert!(parse_record(&allowed, &schema.0, &guarded).is_ok());
        let denied = Record::from([("status", Value::from("shipped"))]);
        let err = parse_record(&denied, &schema.0, &guarded).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }
}
