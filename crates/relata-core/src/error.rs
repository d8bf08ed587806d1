//! Error taxonomy for the engine.
//!
//! Two classes of failure flow through here and they propagate differently:
//! per-record errors (bad input, missing row) are caught at the batch
//! coordinator boundary and recorded per index, while configuration-class
//! errors (`Internal`, `NotImplemented`) always abort the whole operation
//! because they mean the metadata itself is wrong.

use crate::record::Record;

/// Convenience alias used across all engine crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Per-index outcome of one item in a batch, carried by [`Error::Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The item succeeded; the result record.
    Record(Record),
    /// The item failed; its own error.
    Error(Error),
}

impl ItemOutcome {
    /// True if this outcome is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, ItemOutcome::Error(_))
    }

    /// Borrow the record for a successful outcome.
    #[must_use]
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            ItemOutcome::Record(r) => Some(r),
            ItemOutcome::Error(_) => None,
        }
    }

    /// Borrow the error for a failed outcome.
    #[must_use]
    pub const fn as_error(&self) -> Option<&Error> {
        match self {
            ItemOutcome::Error(e) => Some(e),
            ItemOutcome::Record(_) => None,
        }
    }
}

/// Engine error taxonomy.
///
/// Errors are `Clone` on purpose: a batch aggregate embeds the per-index
/// error objects alongside successful records.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Malformed input: empty payload, missing required id, conflicting
    /// batch options.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unknown table or record.
    #[error("not found: {0}")]
    NotFound(String),

    /// A server-side filter policy denied the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Declared but unsupported configuration, e.g. multi-column foreign
    /// keys.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Broken metadata or an invalid operator: a bug in configuration, not
    /// in the request.
    #[error("internal error: {0}")]
    Internal(String),

    /// A cross-service dispatch returned a non-2xx reply.
    #[error("remote operation failed with status {status}: {message}")]
    Remote {
        /// Remote HTTP-shaped status.
        status: u16,
        /// Remote application error code, if the body carried one.
        code: Option<String>,
        /// Remote error message.
        message: String,
    },

    /// Aggregate batch failure: per-index outcomes plus a summary.
    #[error("{message}")]
    Batch {
        /// Summary message.
        message: String,
        /// Per-index mix of results and errors, aligned with the input.
        results: Vec<ItemOutcome>,
    },
}

impl Error {
    /// Build a [`Error::BadRequest`].
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    /// Build a [`Error::NotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Build a [`Error::Forbidden`].
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }

    /// Build a [`Error::NotImplemented`].
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Build a [`Error::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Build a batch aggregate error.
    pub fn batch(msg: impl Into<String>, results: Vec<ItemOutcome>) -> Self {
        Error::Batch {
            message: msg.into(),
            results,
        }
    }

    /// True for errors that indicate broken configuration rather than a bad
    /// record; these always abort the whole operation.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::NotImplemented(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_configuration_class() {
        assert!(Error::internal("x").is_configuration());
        assert!(Error::not_implemented("x").is_configuration());
        assert!(!Error::bad_request("x").is_configuration());
        assert!(!Error::not_found("x").is_configuration());
    }

    #[test]
    fn test_batch_carries_mixed_outcomes() {
        let ok = Record::from([("id", Value::Int(5))]);
        let err = Error::not_found("record with id 6 not found");
        let batch = Error::batch(
            "not all records could be updated",
            vec![
                ItemOutcome::Record(ok.clone()),
                ItemOutcome::Error(err.clone()),
            ],
        );
        let Error::Batch { results, .. } = &batch else {
            panic!("expected batch variant");
        };
        assert_eq!(results[0].as_record(), Some(&ok));
        assert_eq!(results[1].as_error(), Some(&err));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::bad_request("empty payload").to_string(),
            "bad request: empty payload"
        );
        let remote = Error::Remote {
            status: 503,
            code: None,
            message: "service busy".to_string(),
        };
        assert_eq!(
            remote.to_string(),
            "remote operation failed with status 503: service busy"
        );
    }
}
