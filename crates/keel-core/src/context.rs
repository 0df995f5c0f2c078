use std::sync::{Arc, OnceLock};

use http::Method;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier from the auth provider
    pub user_id: String,
    /// Role name (e.g. "admin", "user")
    pub role: String,
    /// Granted permission names
    pub permissions: Vec<String>,
}

impl Identity {
    /// Whether the identity holds the named permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Distributed trace identifiers of the request span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceIds {
    pub trace_id: String,
    pub span_id: String,
}

/// Per-request state accumulated by the middleware chain
///
/// Cloning is cheap and every clone observes the same state. Each field can
/// be set at most once; later attempts are ignored and reported as `false`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    request_id: String,
    method: Method,
    path: String,
    client_ip: String,
    identity: OnceLock<Identity>,
    auth_failure: OnceLock<String>,
    trace: OnceLock<TraceIds>,
    logger: OnceLock<tracing::Span>,
}

impl RequestContext {
    /// Start a context for an inbound request
    pub fn new(request_id: impl Into<String>, method: Method, path: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                request_id: request_id.into(),
                method,
                path: path.into(),
                client_ip: client_ip.into(),
                identity: OnceLock::new(),
                auth_failure: OnceLock::new(),
                trace: OnceLock::new(),
                logger: OnceLock::new(),
            }),
        }
    }

    /// Create a context for calls that did not pass through the middleware chain
    ///
    /// Gets a freshly generated request id and no identity
    pub fn empty() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), Method::GET, "/", "unknown")
    }

    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn client_ip(&self) -> &str {
        &self.inner.client_ip
    }

    /// Authenticated identity, `None` for anonymous requests
    pub fn identity(&self) -> Option<&Identity> {
        self.inner.identity.get()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity().map(|i| i.user_id.as_str())
    }

    /// Reason a presented credential was rejected
    pub fn auth_failure(&self) -> Option<&str> {
        self.inner.auth_failure.get().map(String::as_str)
    }

    pub fn trace(&self) -> Option<&TraceIds> {
        self.inner.trace.get()
    }

    /// Request-scoped logger
    ///
    /// Falls back to the current span until the context stage installs one
    pub fn logger(&self) -> tracing::Span {
        self.inner.logger.get().cloned().unwrap_or_else(tracing::Span::current)
    }

    pub fn set_identity(&self, identity: Identity) -> bool {
        self.inner.identity.set(identity).is_ok()
    }

    pub fn set_auth_failure(&self, reason: impl Into<String>) -> bool {
        self.inner.auth_failure.set(reason.into()).is_ok()
    }

    pub fn set_trace(&self, trace: TraceIds) -> bool {
        self.inner.trace.set(trace).is_ok()
    }

    pub fn set_logger(&self, logger: tracing::Span) -> bool {
        self.inner.logger.set(logger).is_ok()
    }
}
