//! Typed request dispatch
//!
//! A [`Dispatch`] turns a business function
//! `async fn(state, RequestContext, Input) -> Result<Output, AppError>` into an
//! axum handler. Every request goes through the same steps: authorization
//! guard, binding, validation, the function itself, then either error
//! translation or response shaping according to the route's [`Envelope`].
//!
//! ```ignore
//! let routes = Router::new()
//!     .route("/users", post(Dispatch::json_with_status("create_user", StatusCode::CREATED, create_user)))
//!     .route("/users/{id}", delete(Dispatch::no_content("delete_user", delete_user).permission("users:delete")));
//! ```
//!
//! Path, query and form values bind as strings; numeric fields read from them
//! need `#[serde_as(as = "DisplayFromStr")]` or a string type.

mod bind;
mod envelope;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRef, Request};
use axum::handler::Handler;
use axum::response::Response;
use futures::future::BoxFuture;
use http::StatusCode;
use keel_core::validation::{self, Validate};
use keel_core::{AppError, HttpError, Observability, Phase, RequestContext};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub use envelope::{Envelope, FileBody, FileDownload, JsonBody, NoContent};

use crate::client_ip::client_ip;
use crate::formatter::{app_error_response, error_response};

/// Route handler built from a business function and a response shape
pub struct Dispatch<F, E, I, O> {
    operation: &'static str,
    handler: F,
    envelope: E,
    access: Access,
    _types: PhantomData<fn(I) -> O>,
}

/// Marker distinguishing [`Dispatch`] from axum's function handlers
#[doc(hidden)]
pub enum Dispatched {}

/// Input for routes that take nothing from the request
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

impl<'de> Deserialize<'de> for Empty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde::de::IgnoredAny::deserialize(deserializer).map(|_| Self)
    }
}

impl Validate for Empty {
    fn rules(&self, _: &mut validation::Validator) {}
}

/// Who may call a route
#[derive(Debug, Clone, Default)]
enum Access {
    #[default]
    Public,
    Authenticated,
    Permission(Arc<str>),
}

impl Access {
    fn check(&self, context: &RequestContext) -> Result<(), HttpError> {
        if matches!(self, Self::Public) {
            return Ok(());
        }

        let Some(identity) = context.identity() else {
            let message = if context.auth_failure().is_some() {
                "invalid or expired credentials"
            } else {
                "authentication required"
            };
            return Err(HttpError::unauthorized(message));
        };

        if let Self::Permission(permission) = self
            && !identity.has_permission(permission)
        {
            return Err(HttpError::forbidden(format!("missing permission '{permission}'")));
        }

        Ok(())
    }
}

impl<F, I, O> Dispatch<F, JsonBody, I, O> {
    /// Respond with the output as JSON and `200 OK`
    pub fn json<S, Fut>(operation: &'static str, handler: F) -> Self
    where
        F: Fn(S, RequestContext, I) -> Fut,
        Fut: Future<Output = Result<O, AppError>>,
    {
        Self::json_with_status(operation, StatusCode::OK, handler)
    }

    /// Respond with the output as JSON and a route-specific status
    pub fn json_with_status<S, Fut>(operation: &'static str, status: StatusCode, handler: F) -> Self
    where
        F: Fn(S, RequestContext, I) -> Fut,
        Fut: Future<Output = Result<O, AppError>>,
    {
        Self::with_envelope(operation, JsonBody { status }, handler)
    }
}

impl<F, I> Dispatch<F, NoContent, I, ()> {
    /// Respond with an empty `204 No Content`
    pub fn no_content<S, Fut>(operation: &'static str, handler: F) -> Self
    where
        F: Fn(S, RequestContext, I) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        Self::with_envelope(operation, NoContent, handler)
    }
}

impl<F, I> Dispatch<F, FileBody, I, FileDownload> {
    /// Respond with the returned file as a download
    pub fn file<S, Fut>(operation: &'static str, handler: F) -> Self
    where
        F: Fn(S, RequestContext, I) -> Fut,
        Fut: Future<Output = Result<FileDownload, AppError>>,
    {
        Self::with_envelope(operation, FileBody, handler)
    }
}

impl<F, E, I, O> Dispatch<F, E, I, O> {
    const fn with_envelope(operation: &'static str, envelope: E, handler: F) -> Self {
        Self {
            operation,
            handler,
            envelope,
            access: Access::Public,
            _types: PhantomData,
        }
    }

    /// Reject anonymous callers with `401`
    #[must_use]
    pub fn authenticated(mut self) -> Self {
        if matches!(self.access, Access::Public) {
            self.access = Access::Authenticated;
        }
        self
    }

    /// Require an identity holding `permission`; `403` otherwise
    #[must_use]
    pub fn permission(mut self, permission: impl Into<Arc<str>>) -> Self {
        self.access = Access::Permission(permission.into());
        self
    }

    /// Operation name used for metrics
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}

impl<F: Clone, E: Clone, I, O> Clone for Dispatch<F, E, I, O> {
    fn clone(&self) -> Self {
        Self {
            operation: self.operation,
            handler: self.handler.clone(),
            envelope: self.envelope.clone(),
            access: self.access.clone(),
            _types: PhantomData,
        }
    }
}

impl<F, Fut, E, I, O, S> Handler<(Dispatched, I, O), S> for Dispatch<F, E, I, O>
where
    F: Fn(S, RequestContext, I) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<O, AppError>> + Send + 'static,
    E: Envelope<O>,
    I: DeserializeOwned + Validate + Send + 'static,
    O: Send + 'static,
    S: Clone + Send + Sync + 'static,
    Arc<dyn Observability>: FromRef<S>,
{
    type Future = BoxFuture<'static, Response>;

    fn call(self, request: Request, state: S) -> Self::Future {
        Box::pin(self.run(request, state))
    }
}

impl<F, E, I, O> Dispatch<F, E, I, O>
where
    E: Envelope<O>,
    I: DeserializeOwned + Validate,
{
    async fn run<S, Fut>(self, request: Request, state: S) -> Response
    where
        F: Fn(S, RequestContext, I) -> Fut,
        Fut: Future<Output = Result<O, AppError>>,
        Arc<dyn Observability>: FromRef<S>,
    {
        let sink = <Arc<dyn Observability> as FromRef<S>>::from_ref(&state);
        let context = request
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| detached_context(&request));

        let bind = PhaseTimer::start(Arc::clone(&sink), self.operation, Phase::Bind);
        let input = match self.prepare(&context, request).await {
            Ok(input) => {
                bind.finish(StatusCode::OK);
                input
            }
            Err(err) => {
                tracing::debug!(operation = self.operation, code = %err.code(), "request input rejected");
                let response = error_response(err);
                bind.finish(response.status());
                return response;
            }
        };

        let call = PhaseTimer::start(sink, self.operation, Phase::Handler);
        let response = match (self.handler)(state, context, input).await {
            Ok(output) => self.envelope.respond(output),
            Err(err) => app_error_response(&err),
        };
        call.finish(response.status());

        response
    }

    /// Guard, bind and validate
    async fn prepare(&self, context: &RequestContext, request: Request) -> Result<I, HttpError> {
        self.access.check(context)?;
        let input: I = bind::bind(request).await?;
        validation::validate(&input)?;
        Ok(input)
    }
}

/// Context for a route mounted outside the middleware chain
fn detached_context(request: &Request) -> RequestContext {
    RequestContext::new(
        uuid::Uuid::new_v4().to_string(),
        request.method().clone(),
        request.uri().path(),
        client_ip(request),
    )
}

/// Records one phase exactly once, including when the future is dropped
struct PhaseTimer {
    sink: Arc<dyn Observability>,
    operation: &'static str,
    phase: Phase,
    started: Instant,
    recorded: bool,
}

impl PhaseTimer {
    fn start(sink: Arc<dyn Observability>, operation: &'static str, phase: Phase) -> Self {
        Self {
            sink,
            operation,
            phase,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn finish(mut self, status: StatusCode) {
        self.record(status.as_u16());
    }

    fn record(&mut self, status: u16) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        let duration_ms = self.started.elapsed().as_secs_f64() * 1_000.0;
        self.sink.record_duration(self.operation, self.phase, duration_ms, status);
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        // unwinding means a panic; otherwise the request was cancelled
        let status = if std::thread::panicking() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        self.record(status.as_u16());
    }
}
