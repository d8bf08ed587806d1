//! Cross-service dispatch.
//!
//! A relation may reference a table hosted by a different backing service.
//! The gateway hides that: callers describe what they want as a
//! [`RemoteCall`] and the [`ServiceRegistry`] routes it to the right
//! [`ServiceEndpoint`], with `None` always meaning the local store. Replies
//! are HTTP-shaped regardless of the transport behind the endpoint.

use relata_core::{Error, Record, Result};
use serde::{Deserialize, Serialize};

use crate::filter::Criteria;

/// The operation verb of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    /// Retrieve records.
    Get,
    /// Create records.
    Post,
    /// Replace records.
    Put,
    /// Merge into records.
    Patch,
    /// Delete records.
    Delete,
}

/// One outbound call to a service.
#[derive(Debug, Clone)]
pub struct RemoteCall {
    /// Target service; `None` routes to the local store.
    pub service: Option<String>,
    /// Target table or resource name.
    pub resource: String,
    /// Operation verb.
    pub verb: Verb,
    /// Record payloads, for the writing verbs.
    pub records: Vec<Record>,
    /// Selection criteria, for retrieval and criteria-addressed writes.
    pub criteria: Option<Criteria>,
}

impl RemoteCall {
    /// A retrieval call.
    #[must_use]
    pub fn get(service: Option<String>, resource: impl Into<String>, criteria: Criteria) -> Self {
        Self {
            service,
            resource: resource.into(),
            verb: Verb::Get,
            records: Vec::new(),
            criteria: Some(criteria),
        }
    }

    /// A record-writing call.
    #[must_use]
    pub fn write(
        service: Option<String>,
        resource: impl Into<String>,
        verb: Verb,
        records: Vec<Record>,
    ) -> Self {
        Self {
            service,
            resource: resource.into(),
            verb,
            records,
            criteria: None,
        }
    }

    /// Attach criteria to a writing call (criteria-addressed patch/delete).
    #[must_use]
    pub fn criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }
}

/// Application-level error details in a reply body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Application error code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}

/// An HTTP-shaped reply from an endpoint.
#[derive(Debug, Clone, Default)]
pub struct RemoteReply {
    /// Status code; 2xx is success.
    pub status: u16,
    /// Result records, when the body carried any.
    pub records: Option<Vec<Record>>,
    /// Error details, when the body carried them.
    pub error: Option<RemoteError>,
}

impl RemoteReply {
    /// 200 with records.
    #[must_use]
    pub fn ok(records: Vec<Record>) -> Self {
        Self {
            status: 200,
            records: Some(records),
            error: None,
        }
    }

    /// 201 with the created records.
    #[must_use]
    pub fn created(records: Vec<Record>) -> Self {
        Self {
            status: 201,
            records: Some(records),
            error: None,
        }
    }

    /// 204 with no body.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            status: 204,
            records: None,
            error: None,
        }
    }

    /// Failure reply with an error body.
    #[must_use]
    pub fn error(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            records: None,
            error: Some(RemoteError {
                code,
                message: Some(message.into()),
            }),
        }
    }

    /// True for any 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// One reachable service.
pub trait ServiceEndpoint: Send + Sync {
    /// Execute a call and return the reply. `Err` is reserved for
    /// transport-level failure; application failures travel in the reply
    /// status and error body.
    fn call(&self, request: &RemoteCall) -> Result<RemoteReply>;
}

/// Service-name routing.
pub trait ServiceRegistry: Send + Sync {
    /// Resolve a service name to its endpoint. `None` is the local store
    /// and must always resolve; an unknown name is a `NotFound`.
    fn resolve(&self, service: Option<&str>) -> Result<&dyn ServiceEndpoint>;
}

/// Thin dispatch wrapper turning replies into typed results.
pub struct Gateway<'a> {
    registry: &'a dyn ServiceRegistry,
}

impl<'a> Gateway<'a> {
    /// Wrap a registry.
    #[must_use]
    pub fn new(registry: &'a dyn ServiceRegistry) -> Self {
        Self { registry }
    }

    /// Dispatch a call.
    ///
    /// A 2xx reply yields the body records (`None` for an empty body); a
    /// non-2xx reply becomes [`Error::Remote`] carrying the status and
    /// whatever the error body offered.
    pub fn dispatch(&self, request: &RemoteCall) -> Result<Option<Vec<Record>>> {
        let endpoint = self.registry.resolve(request.service.as_deref())?;
        tracing::debug!(
            service = request.service.as_deref().unwrap_or("local"),
            resource = %request.resource,
            verb = ?request.verb,
            records = request.records.len(),
            "dispatching service call"
        );
        let reply = endpoint.call(request)?;
        if reply.is_success() {
            return Ok(reply.records);
        }
        let (code, message) = match reply.error {
            Some(body) => (
                body.code,
                body.message
                    .unwrap_or_else(|| "remote operation failed".to_string()),
            ),
            None => (None, "remote operation failed".to_string()),
        };
        tracing::warn!(
            service = request.service.as_deref().unwrap_or("local"),
            resource = %request.resource,
            status = reply.status,
            "service call failed"
        );
        Err(Error::Remote {
            status: reply.status,
            code,
            message,
        })
    }

    /// Dispatch a retrieval and return the records, empty when the body
    /// was.
    pub fn fetch(
        &self,
        service: Option<&str>,
        resource: &str,
        criteria: Criteria,
    ) -> Result<Vec<Record>> {
        let call = RemoteCall::get(service.map(String::from), resource, criteria);
        Ok(self.dispatch(&call)?.unwrap_or_default())
    }
}
