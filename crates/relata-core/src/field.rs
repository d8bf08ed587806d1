//! Field descriptors: the per-column metadata records are validated and
//! coerced against at operation time.

use crate::error::{Error, Result};
use crate::validate::ValidationRule;
use crate::value::Value;

/// What a field *is* to the engine, beyond its storage type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain data column.
    #[default]
    Ordinary,
    /// Primary-key (or primary-key component) column.
    Identifier,
    /// Timestamp stamped by the engine when the record is created.
    TimestampOnCreate,
    /// Timestamp stamped by the engine when the record is updated.
    TimestampOnUpdate,
    /// Active user id stamped on create.
    UserIdOnCreate,
    /// Active user id stamped on update.
    UserIdOnUpdate,
    /// Declared in metadata only; no physical column. Never client-settable.
    Virtual,
    /// Foreign-key / reference column.
    Reference,
}

impl FieldKind {
    /// True for kinds whose value the engine generates rather than accepts.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(
            self,
            FieldKind::TimestampOnCreate
                | FieldKind::TimestampOnUpdate
                | FieldKind::UserIdOnCreate
                | FieldKind::UserIdOnUpdate
        )
    }

    /// True for primary-key columns.
    #[must_use]
    pub const fn is_identifier(&self) -> bool {
        matches!(self, FieldKind::Identifier)
    }
}

/// Native storage type used for coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldType {
    /// Integral column.
    Integer,
    /// Floating-point column.
    Float,
    /// Boolean column.
    Boolean,
    /// Text column.
    #[default]
    Text,
    /// Unix-time timestamp column.
    Timestamp,
    /// JSON / document column.
    Json,
}

impl FieldType {
    /// Coerce a value to this native type.
    ///
    /// Null passes through untouched (nullability is the validator's
    /// business), as do raw expressions and composite values.
    pub fn coerce(&self, value: &Value) -> Result<Value> {
        if value.is_null() || value.is_composite() || matches!(value, Value::Expr(_)) {
            return Ok(value.clone());
        }
        match self {
            FieldType::Integer | FieldType::Timestamp => match value {
                Value::Int(_) => Ok(value.clone()),
                Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Text(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| Error::bad_request(format!("'{s}' is not a valid integer"))),
                _ => Err(Error::bad_request("value is not a valid integer")),
            },
            FieldType::Float => match value {
                Value::Float(_) => Ok(value.clone()),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Text(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| Error::bad_request(format!("'{s}' is not a valid float"))),
                _ => Err(Error::bad_request("value is not a valid float")),
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Int(0) => Ok(Value::Bool(false)),
                Value::Int(1) => Ok(Value::Bool(true)),
                Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(Error::bad_request(format!("'{s}' is not a valid boolean"))),
                },
                _ => Err(Error::bad_request("value is not a valid boolean")),
            },
            FieldType::Text => match value {
                Value::Text(_) => Ok(value.clone()),
                other => Ok(Value::Text(other.to_string())),
            },
            FieldType::Json => Ok(Value::Json(value.to_json())),
        }
    }
}

/// The operation context a DB-side field expression applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionContext {
    /// Applied when selecting the field.
    Select,
    /// Applied when the field is used in a filter.
    Filter,
    /// Applied when inserting the field.
    Insert,
    /// Applied when updating the field.
    Update,
}

/// Metadata for one field of a schema-discovered table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDescriptor {
    /// Column name.
    pub name: String,
    /// Alternative name accepted in client payloads.
    pub alias: Option<String>,
    /// Field kind.
    pub kind: FieldKind,
    /// Native type for coercion.
    pub field_type: FieldType,
    /// Whether NULL is storable.
    pub nullable: bool,
    /// Whether the field must be present on create.
    pub required: bool,
    /// Whether the store generates the value (auto-increment and friends).
    pub auto_generated: bool,
    /// Whether clients may never set the field through the API.
    pub read_only: bool,
    /// Field-level validation rules, applied in order.
    pub rules: Vec<ValidationRule>,
    /// Enumerated allowed values, consulted by picklist rules.
    pub picklist: Vec<String>,
    /// Per-context database-side expressions.
    pub functions: Vec<(FunctionContext, String)>,
}

impl FieldDescriptor {
    /// Create a descriptor with defaults: ordinary, text, non-nullable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the field kind.
    #[must_use]
    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the native type.
    #[must_use]
    pub fn field_type(mut self, ty: FieldType) -> Self {
        self.field_type = ty;
        self
    }

    /// Set the payload alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set nullability.
    #[must_use]
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set the required-on-create flag.
    #[must_use]
    pub fn required(mut self, value: bool) -> Self {
        self.required = value;
        self
    }

    /// Set the auto-generated flag.
    #[must_use]
    pub fn auto_generated(mut self, value: bool) -> Self {
        self.auto_generated = value;
        self
    }

    /// Set the API-read-only flag.
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Append a validation rule.
    #[must_use]
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the picklist of allowed values.
    #[must_use]
    pub fn picklist(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.picklist = values.into_iter().map(Into::into).collect();
        self
    }

    /// Declare a DB-side expression for one usage context.
    #[must_use]
    pub fn function(mut self, context: FunctionContext, expr: impl Into<String>) -> Self {
        self.functions.push((context, expr.into()));
        self
    }

    /// Look up the DB-side expression for a context, if declared.
    #[must_use]
    pub fn function_for(&self, context: FunctionContext) -> Option<&str> {
        self.functions
            .iter()
            .find(|(c, _)| *c == context)
            .map(|(_, e)| e.as_str())
    }

    /// Whether an input key addresses this field (name or alias,
    /// case-insensitive).
    #[must_use]
    pub fn matches_input_name(&self, input: &str) -> bool {
        if input.eq_ignore_ascii_case(&self.name) {
            return true;
        }
        self.alias
            .as_deref()
            .is_some_and(|a| input.eq_ignore_ascii_case(a))
    }
}

/// The ordered field set that uniquely addresses a record in a table.
///
/// Single for the common case, composite when the table has a compound
/// primary key. Emptiness before an update/patch/delete/retrieve-by-id is a
/// fatal configuration error, enforced at the coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierSet {
    fields: Vec<FieldDescriptor>,
}

impl IdentifierSet {
    /// Build from descriptor list.
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Number of identifier fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no identifier fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True for compound keys.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// The sole field of a single-column key.
    #[must_use]
    pub fn single(&self) -> Option<&FieldDescriptor> {
        if self.fields.len() == 1 {
            self.fields.first()
        } else {
            None
        }
    }

    /// All identifier fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl From<Vec<FieldDescriptor>> for IdentifierSet {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder_chain() {
        let field = FieldDescriptor::new("status")
            .field_type(FieldType::Text)
            .nullable(true)
            .picklist(["open", "closed"])
            .function(FunctionContext::Insert, "UPPER({value})");

        assert_eq!(field.name, "status");
        assert!(field.nullable);
        assert_eq!(field.picklist, vec!["open", "closed"]);
        assert_eq!(
            field.function_for(FunctionContext::Insert),
            Some("UPPER({value})")
        );
        assert_eq!(field.function_for(FunctionContext::Update), None);
    }

    #[test]
    fn test_matches_input_name() {
        let field = FieldDescriptor::new("first_name").alias("firstName");
        assert!(field.matches_input_name("first_name"));
        assert!(field.matches_input_name("FIRST_NAME"));
        assert!(field.matches_input_name("firstname")); // alias, case-folded
        assert!(!field.matches_input_name("last_name"));
    }

    #[test]
    fn test_coerce_integer() {
        let ty = FieldType::Integer;
        assert_eq!(ty.coerce(&Value::Text("42".into())).unwrap(), Value::Int(42));
        assert_eq!(ty.coerce(&Value::Float(7.0)).unwrap(), Value::Int(7));
        assert_eq!(ty.coerce(&Value::Bool(true)).unwrap(), Value::Int(1));
        assert!(ty.coerce(&Value::Text("seven".into())).is_err());
    }

    #[test]
    fn test_coerce_passthrough_cases() {
        let ty = FieldType::Integer;
        assert_eq!(ty.coerce(&Value::Null).unwrap(), Value::Null);
        let expr = Value::Expr("NOW()".into());
        assert_eq!(ty.coerce(&expr).unwrap(), expr);
        let list = Value::List(vec![Value::Int(1)]);
        assert_eq!(ty.coerce(&list).unwrap(), list);
    }

    #[test]
    fn test_coerce_boolean_spellings() {
        let ty = FieldType::Boolean;
        assert_eq!(ty.coerce(&Value::Text("TRUE".into())).unwrap(), Value::Bool(true));
        assert_eq!(ty.coerce(&Value::Int(0)).unwrap(), Value::Bool(false));
        assert!(ty.coerce(&Value::Int(2)).is_err());
    }

    #[test]
    fn test_coerce_text_stringifies() {
        let ty = FieldType::Text;
        assert_eq!(ty.coerce(&Value::Int(5)).unwrap(), Value::Text("5".into()));
    }

    #[test]
    fn test_identifier_set_shapes() {
        let single = IdentifierSet::new(vec![FieldDescriptor::new("id")]);
        assert!(!single.is_composite());
        assert_eq!(single.single().map(|f| f.name.as_str()), Some("id"));

        let composite = IdentifierSet::new(vec![
            FieldDescriptor::new("order_id"),
            FieldDescriptor::new("line_no"),
        ]);
        assert!(composite.is_composite());
        assert!(composite.single().is_none());
        assert_eq!(composite.names(), vec!["order_id", "line_no"]);

        assert!(IdentifierSet::default().is_empty());
    }
}
