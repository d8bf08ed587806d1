//! Field-level validation rules.
//!
//! Each rule carries its own failure policy: reject with the default
//! message, reject with an author-supplied message, or silently drop the
//! field from the payload. Failure is an explicit value
//! ([`ValidationOutcome`]), never control flow, so the record parser can
//! distinguish "refuse this record" from "forget this field".

use std::sync::OnceLock;

use regex::Regex;

use crate::value::Value;

/// Thread-safe cache of compiled regex patterns.
///
/// Avoids recompiling on every validation call; patterns compile lazily on
/// first use and live for the program lifetime.
struct RegexCache {
    cache: std::sync::RwLock<std::collections::HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap();
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap();
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check a string against a cached pattern; invalid patterns are treated
/// as a non-match rather than a panic.
fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "invalid regex pattern in validation rule, treating as non-match"
            );
            false
        }
    }
}

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// What to do when a rule fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OnFail {
    /// Reject the record with the rule's default message.
    #[default]
    Reject,
    /// Reject the record with a custom message.
    RejectWith(String),
    /// Drop the field from the payload and carry on.
    DropField,
}

/// The outcome of a failed rule, after its policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The record must be refused, with this message.
    Reject(String),
    /// The field must be removed from the payload.
    Drop,
}

/// The predicate a rule enforces.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCheck {
    /// The field may be set on create only.
    CreateOnly,
    /// The value must not be null.
    NotNull,
    /// The value must not be null or an empty string.
    NotEmpty,
    /// The value must not be numerically zero.
    NotZero,
    /// The value must be a well-formed email address.
    Email,
    /// The value must be a well-formed URL.
    Url {
        /// Require a non-root path component.
        require_path: bool,
        /// Require a non-empty query string.
        require_query: bool,
    },
    /// The value must be an integer, optionally ranged; `allow_radix`
    /// accepts `0x`/`0o` prefixed text.
    Integer {
        /// Inclusive lower bound.
        min: Option<i64>,
        /// Inclusive upper bound.
        max: Option<i64>,
        /// Accept hex/octal text forms.
        allow_radix: bool,
    },
    /// The value must be a float; `decimal_sep` names the separator used in
    /// text forms (locale payloads).
    Float {
        /// Decimal separator accepted in text input.
        decimal_sep: char,
    },
    /// The value must be a boolean (or a recognized boolean spelling).
    Boolean,
    /// The value must match this regex.
    Pattern {
        /// Regex source.
        pattern: String,
    },
    /// The value must be one of the descriptor's picklist entries.
    Picklist,
    /// The value is a delimited list; every element must be a picklist
    /// entry and the selection count must stay in range.
    MultiPicklist {
        /// Element delimiter.
        delimiter: char,
        /// Minimum selection count.
        min: Option<usize>,
        /// Maximum selection count.
        max: Option<usize>,
    },
}

/// One configured validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRule {
    /// The predicate.
    pub check: RuleCheck,
    /// Failure policy.
    pub on_fail: OnFail,
}

impl ValidationRule {
    /// Create a rule with the default reject policy.
    #[must_use]
    pub fn new(check: RuleCheck) -> Self {
        Self {
            check,
            on_fail: OnFail::Reject,
        }
    }

    /// Set the failure policy.
    #[must_use]
    pub fn on_fail(mut self, policy: OnFail) -> Self {
        self.on_fail = policy;
        self
    }

    /// Apply the rule to a field value.
    ///
    /// `picklist` supplies the allowed set for the picklist checks;
    /// `for_update` distinguishes create from update context.
    pub fn apply(
        &self,
        field: &str,
        value: &Value,
        picklist: &[String],
        for_update: bool,
    ) -> Result<(), ValidationOutcome> {
        match self.evaluate(field, value, picklist, for_update) {
            Ok(()) => Ok(()),
            Err(default_message) => Err(match &self.on_fail {
                OnFail::Reject => ValidationOutcome::Reject(default_message),
                OnFail::RejectWith(message) => ValidationOutcome::Reject(message.clone()),
                OnFail::DropField => ValidationOutcome::Drop,
            }),
        }
    }

    fn evaluate(
        &self,
        field: &str,
        value: &Value,
        picklist: &[String],
        for_update: bool,
    ) -> Result<(), String> {
        // Null is handled only by the rules that target it; format rules
        // pass nulls through and leave nullability to the parser.
        let skip_null = !matches!(
            self.check,
            RuleCheck::NotNull | RuleCheck::NotEmpty | RuleCheck::CreateOnly
        );
        if skip_null && value.is_null() {
            return Ok(());
        }

        match &self.check {
            RuleCheck::CreateOnly => {
                if for_update {
                    Err(format!("field '{field}' can only be set on record creation"))
                } else {
                    Ok(())
                }
            }
            RuleCheck::NotNull => {
                if value.is_null() {
                    Err(format!("field '{field}' value can not be null"))
                } else {
                    Ok(())
                }
            }
            RuleCheck::NotEmpty => match value {
                Value::Null => Err(format!("field '{field}' value can not be empty")),
                Value::Text(s) if s.trim().is_empty() => {
                    Err(format!("field '{field}' value can not be empty"))
                }
                Value::List(items) if items.is_empty() => {
                    Err(format!("field '{field}' value can not be empty"))
                }
                _ => Ok(()),
            },
            RuleCheck::NotZero => {
                let zero = match value {
                    Value::Int(i) => *i == 0,
                    Value::Float(f) => *f == 0.0,
                    Value::Text(s) => s.trim().parse::<f64>() == Ok(0.0),
                    _ => false,
                };
                if zero {
                    Err(format!("field '{field}' value can not be zero"))
                } else {
                    Ok(())
                }
            }
            RuleCheck::Email => {
                let ok = value
                    .as_str()
                    .is_some_and(|s| matches_pattern(s, EMAIL_PATTERN));
                if ok {
                    Ok(())
                } else {
                    Err(format!("field '{field}' must be a valid email address"))
                }
            }
            RuleCheck::Url {
                require_path,
                require_query,
            } => check_url(field, value, *require_path, *require_query),
            RuleCheck::Integer {
                min,
                max,
                allow_radix,
            } => check_integer(field, value, *min, *max, *allow_radix),
            RuleCheck::Float { decimal_sep } => {
                let parsed = match value {
                    Value::Int(_) | Value::Float(_) => Some(()),
                    Value::Text(s) => {
                        let normalized = s.trim().replace(*decimal_sep, ".");
                        normalized.parse::<f64>().ok().map(|_| ())
                    }
                    _ => None,
                };
                parsed.ok_or_else(|| format!("field '{field}' must be a valid float"))
            }
            RuleCheck::Boolean => {
                let ok = match value {
                    Value::Bool(_) | Value::Int(0 | 1) => true,
                    Value::Text(s) => matches!(
                        s.trim().to_ascii_lowercase().as_str(),
                        "true" | "false" | "0" | "1"
                    ),
                    _ => false,
                };
                if ok {
                    Ok(())
                } else {
                    Err(format!("field '{field}' must be a valid boolean"))
                }
            }
            RuleCheck::Pattern { pattern } => {
                let text = value.to_string();
                if matches_pattern(&text, pattern) {
                    Ok(())
                } else {
                    Err(format!("field '{field}' value is invalid"))
                }
            }
            RuleCheck::Picklist => {
                let ok = value.as_str().is_some_and(|s| {
                    picklist.iter().any(|allowed| allowed == s)
                });
                if ok {
                    Ok(())
                } else {
                    Err(format!(
                        "field '{field}' value is invalid, must be one of the allowed values"
                    ))
                }
            }
            RuleCheck::MultiPicklist {
                delimiter,
                min,
                max,
            } => check_multi_picklist(field, value, picklist, *delimiter, *min, *max),
        }
    }
}

fn check_url(
    field: &str,
    value: &Value,
    require_path: bool,
    require_query: bool,
) -> Result<(), String> {
    let err = || format!("field '{field}' must be a valid URL");
    let Some(text) = value.as_str() else {
        return Err(err());
    };
    let Some((scheme, rest)) = text.split_once("://") else {
        return Err(err());
    };
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(err());
    }
    let (before_query, query) = match rest.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (rest, None),
    };
    let (host, path) = match before_query.split_once('/') {
        Some((h, p)) => (h, Some(p)),
        None => (before_query, None),
    };
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(err());
    }
    if require_path && path.is_none_or(str::is_empty) {
        return Err(format!("field '{field}' URL must include a path"));
    }
    if require_query && query.is_none_or(str::is_empty) {
        return Err(format!("field '{field}' URL must include a query string"));
    }
    Ok(())
}

fn check_integer(
    field: &str,
    value: &Value,
    min: Option<i64>,
    max: Option<i64>,
    allow_radix: bool,
) -> Result<(), String> {
    let parsed = match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::Text(s) => {
            let s = s.trim();
            if allow_radix {
                if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    i64::from_str_radix(hex, 16).ok()
                } else if let Some(oct) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
                    i64::from_str_radix(oct, 8).ok()
                } else {
                    s.parse::<i64>().ok()
                }
            } else {
                s.parse::<i64>().ok()
            }
        }
        _ => None,
    };
    let Some(number) = parsed else {
        return Err(format!("field '{field}' must be a valid integer"));
    };
    if min.is_some_and(|m| number < m) {
        return Err(format!("field '{field}' value must be at least {}", min.unwrap()));
    }
    if max.is_some_and(|m| number > m) {
        return Err(format!("field '{field}' value must be at most {}", max.unwrap()));
    }
    Ok(())
}

fn check_multi_picklist(
    field: &str,
    value: &Value,
    picklist: &[String],
    delimiter: char,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), String> {
    let Some(text) = value.as_str() else {
        return Err(format!("field '{field}' value is invalid"));
    };
    let selections: Vec<&str> = text
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if min.is_some_and(|m| selections.len() < m) {
        return Err(format!(
            "field '{field}' requires at least {} selections",
            min.unwrap()
        ));
    }
    if max.is_some_and(|m| selections.len() > m) {
        return Err(format!(
            "field '{field}' allows at most {} selections",
            max.unwrap()
        ));
    }
    for selection in selections {
        if !picklist.iter().any(|allowed| allowed == selection) {
            return Err(format!(
                "field '{field}' selection '{selection}' is not an allowed value"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject_msg(result: Result<(), ValidationOutcome>) -> String {
        match result {
            Err(ValidationOutcome::Reject(msg)) => msg,
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[test]
    fn test_create_only() {
        let rule = ValidationRule::new(RuleCheck::CreateOnly);
        assert!(rule.apply("sku", &Value::from("A1"), &[], false).is_ok());
        let msg = reject_msg(rule.apply("sku", &Value::from("A1"), &[], true));
        assert!(msg.contains("creation"));
    }

    #[test]
    fn test_not_null_and_not_empty() {
        let not_null = ValidationRule::new(RuleCheck::NotNull);
        assert!(not_null.apply("name", &Value::Null, &[], false).is_err());
        assert!(not_null.apply("name", &Value::from("x"), &[], false).is_ok());

        let not_empty = ValidationRule::new(RuleCheck::NotEmpty);
        assert!(not_empty.apply("name", &Value::from("  "), &[], false).is_err());
        assert!(not_empty.apply("name", &Value::Null, &[], false).is_err());
        assert!(not_empty.apply("name", &Value::from("x"), &[], false).is_ok());
    }

    #[test]
    fn test_not_zero() {
        let rule = ValidationRule::new(RuleCheck::NotZero);
        assert!(rule.apply("qty", &Value::Int(0), &[], false).is_err());
        assert!(rule.apply("qty", &Value::Float(0.0), &[], false).is_err());
        assert!(rule.apply("qty", &Value::from("0"), &[], false).is_err());
        assert!(rule.apply("qty", &Value::Int(3), &[], false).is_ok());
    }

    #[test]
    fn test_email() {
        let rule = ValidationRule::new(RuleCheck::Email);
        assert!(rule.apply("email", &Value::from("a@b.co"), &[], false).is_ok());
        assert!(rule.apply("email", &Value::from("not-an-email"), &[], false).is_err());
        // null skips format rules
        assert!(rule.apply("email", &Value::Null, &[], false).is_ok());
    }

    #[test]
    fn test_url_flags() {
        let plain = ValidationRule::new(RuleCheck::Url {
            require_path: false,
            require_query: false,
        });
        assert!(plain.apply("u", &Value::from("https://example.com"), &[], false).is_ok());
        assert!(plain.apply("u", &Value::from("example.com"), &[], false).is_err());

        let with_path = ValidationRule::new(RuleCheck::Url {
            require_path: true,
            require_query: false,
        });
        assert!(with_path.apply("u", &Value::from("https://example.com"), &[], false).is_err());
        assert!(with_path
            .apply("u", &Value::from("https://example.com/docs"), &[], false)
            .is_ok());

        let with_query = ValidationRule::new(RuleCheck::Url {
            require_path: false,
            require_query: true,
        });
        assert!(with_query
            .apply("u", &Value::from("https://example.com/s?q=1"), &[], false)
            .is_ok());
        assert!(with_query
            .apply("u", &Value::from("https://example.com/s"), &[], false)
            .is_err());
    }

    #[test]
    fn test_integer_range_and_radix() {
        let rule = ValidationRule::new(RuleCheck::Integer {
            min: Some(1),
            max: Some(255),
            allow_radix: true,
        });
        assert!(rule.apply("n", &Value::from("0x1F"), &[], false).is_ok());
        assert!(rule.apply("n", &Value::from("0o17"), &[], false).is_ok());
        assert!(rule.apply("n", &Value::Int(0), &[], false).is_err());
        assert!(rule.apply("n", &Value::Int(256), &[], false).is_err());

        let no_radix = ValidationRule::new(RuleCheck::Integer {
            min: None,
            max: None,
            allow_radix: false,
        });
        assert!(no_radix.apply("n", &Value::from("0x1F"), &[], false).is_err());
    }

    #[test]
    fn test_float_decimal_separator() {
        let rule = ValidationRule::new(RuleCheck::Float { decimal_sep: ',' });
        assert!(rule.apply("price", &Value::from("12,50"), &[], false).is_ok());
        assert!(rule.apply("price", &Value::from("abc"), &[], false).is_err());
        assert!(rule.apply("price", &Value::Float(1.25), &[], false).is_ok());
    }

    #[test]
    fn test_boolean() {
        let rule = ValidationRule::new(RuleCheck::Boolean);
        assert!(rule.apply("b", &Value::Bool(false), &[], false).is_ok());
        assert!(rule.apply("b", &Value::from("TRUE"), &[], false).is_ok());
        assert!(rule.apply("b", &Value::Int(1), &[], false).is_ok());
        assert!(rule.apply("b", &Value::Int(2), &[], false).is_err());
        assert!(rule.apply("b", &Value::from("yes"), &[], false).is_err());
    }

    #[test]
    fn test_pattern() {
        let rule = ValidationRule::new(RuleCheck::Pattern {
            pattern: r"^[A-Z]{2}\d{4}$".to_string(),
        });
        assert!(rule.apply("code", &Value::from("AB1234"), &[], false).is_ok());
        assert!(rule.apply("code", &Value::from("ab1234"), &[], false).is_err());
    }

    #[test]
    fn test_invalid_pattern_fails_closed() {
        let rule = ValidationRule::new(RuleCheck::Pattern {
            pattern: r"[unclosed".to_string(),
        });
        assert!(rule.apply("code", &Value::from("anything"), &[], false).is_err());
    }

    #[test]
    fn test_picklist() {
        let allowed = vec!["open".to_string(), "closed".to_string()];
        let rule = ValidationRule::new(RuleCheck::Picklist);
        assert!(rule.apply("status", &Value::from("open"), &allowed, false).is_ok());
        assert!(rule.apply("status", &Value::from("pending"), &allowed, false).is_err());
    }

    #[test]
    fn test_multi_picklist() {
        let allowed = vec!["red".to_string(), "green".to_string(), "blue".to_string()];
        let rule = ValidationRule::new(RuleCheck::MultiPicklist {
            delimiter: ',',
            min: Some(1),
            max: Some(2),
        });
        assert!(rule.apply("colors", &Value::from("red, blue"), &allowed, false).is_ok());
        assert!(rule.apply("colors", &Value::from(""), &allowed, false).is_err());
        assert!(rule
            .apply("colors", &Value::from("red,green,blue"), &allowed, false)
            .is_err());
        assert!(rule.apply("colors", &Value::from("red,black"), &allowed, false).is_err());
    }

    #[test]
    fn test_on_fail_policies() {
        let custom = ValidationRule::new(RuleCheck::NotNull)
            .on_fail(OnFail::RejectWith("name is mandatory".to_string()));
        assert_eq!(
            reject_msg(custom.apply("name", &Value::Null, &[], false)),
            "name is mandatory"
        );

        let drop = ValidationRule::new(RuleCheck::Email).on_fail(OnFail::DropField);
        assert_eq!(
            drop.apply("email", &Value::from("bad"), &[], false),
            Err(ValidationOutcome::Drop)
        );
    }
}
