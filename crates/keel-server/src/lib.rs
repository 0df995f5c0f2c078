mod auth;
mod client_ip;
mod cors;
mod deadline;
pub mod dispatch;
mod fallback;
mod formatter;
mod rate_limit;
mod recovery;
mod request_context;
mod request_id;
mod request_logger;
mod security_headers;
mod status;
mod trace;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use keel_auth::AuthProvider;
use keel_config::{Config, CorsConfig};
use keel_core::{HealthCheck, Observability};
use keel_jobs::JobQueue;
use keel_ratelimit::RequestLimiter;
use keel_storage::{Cache, Database};
use keel_telemetry::OtelObservability;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub use client_ip::client_ip;
pub use deadline::TIMEOUT_MESSAGE;
pub use dispatch::{Dispatch, Empty, FileDownload};
pub use formatter::{ShapedBody, app_error_response, error_response, keep_body};
pub use rate_limit::RATE_LIMIT_HIT;
pub use recovery::install_panic_hook;
pub use request_id::REQUEST_ID_HEADER;
pub use status::StatusState;

/// Collaborators handed to business handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub database: Database,
    pub cache: Cache,
    pub jobs: JobQueue,
    pub observability: Arc<dyn Observability>,
}

/// Everything the server needs besides configuration
///
/// [`Server::new`] builds the real ones; tests substitute their own.
pub struct Collaborators {
    pub state: AppState,
    /// Probe reported as `checks.database` by `/status`
    pub database_check: Arc<dyn HealthCheck>,
    /// Probe reported as `checks.redis` by `/status`
    pub cache_check: Arc<dyn HealthCheck>,
    /// Credential verifier; every request is anonymous without one
    pub auth: Option<Arc<dyn AuthProvider>>,
}

/// Settings for the middleware chain
struct Chain {
    limiter: Option<Arc<RequestLimiter>>,
    cors: CorsConfig,
    auth: Option<Arc<dyn AuthProvider>>,
    observability: Arc<dyn Observability>,
    deadline: Duration,
    body_limit: usize,
    trace_requests: bool,
}

/// Assembled server with all routes and middleware
pub struct Server {
    routes: Router,
    state: AppState,
    chain: Chain,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server and its collaborators from configuration
    ///
    /// Storage connections are lazy, so an unreachable database or cache
    /// does not prevent startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator cannot be constructed from its
    /// configuration
    pub fn new(config: &Config, jobs: JobQueue) -> anyhow::Result<Self> {
        let database = Database::connect_lazy(&config.database)?;
        let cache = Cache::new(&config.redis)?;
        let auth = keel_auth::from_config(config.auth.as_ref())?;
        let observability: Arc<dyn Observability> = Arc::new(OtelObservability::new());

        let collaborators = Collaborators {
            database_check: Arc::new(database.clone()),
            cache_check: Arc::new(cache.clone()),
            state: AppState {
                database,
                cache,
                jobs,
                observability,
            },
            auth,
        };

        Self::from_parts(config, collaborators)
    }

    /// Build the server around existing collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if the rate limiter cannot be created
    pub fn from_parts(config: &Config, collaborators: Collaborators) -> anyhow::Result<Self> {
        let rate_limit = &config.server.rate_limit;
        let limiter = if rate_limit.enabled {
            Some(Arc::new(RequestLimiter::new(rate_limit, config.redis.url.as_str())?))
        } else {
            tracing::warn!("rate limiting disabled");
            None
        };

        let status = StatusState {
            environment: Arc::from(config.server.environment.as_str()),
            database: collaborators.database_check,
            cache: collaborators.cache_check,
        };

        let routes = Router::new()
            .route("/status", axum::routing::get(status::status_handler))
            .with_state(status);

        Ok(Self {
            routes,
            chain: Chain {
                limiter,
                cors: config.server.cors.clone(),
                auth: collaborators.auth,
                observability: Arc::clone(&collaborators.state.observability),
                deadline: config.server.request_deadline(),
                body_limit: config.server.body_limit,
                trace_requests: config.telemetry.tracing.enabled,
            },
            state: collaborators.state,
            listen_address: config.server.listen_address,
        })
    }

    /// Add application routes
    ///
    /// They share the system routes' middleware chain and receive
    /// [`AppState`].
    #[must_use]
    pub fn merge(mut self, routes: Router<AppState>) -> Self {
        self.routes = self.routes.merge(routes.with_state(self.state.clone()));
        self
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Override the listen address
    #[must_use]
    pub const fn with_listen_address(mut self, listen_address: SocketAddr) -> Self {
        self.listen_address = listen_address;
        self
    }

    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Consume the server and return the router wrapped in the full chain
    ///
    /// Useful for testing when the caller manages the listener. Serve it with
    /// `into_make_service_with_connect_info::<SocketAddr>()` so peer addresses
    /// are available to the rate limiter.
    pub fn into_router(self) -> Router {
        let Chain {
            limiter,
            cors,
            auth,
            observability,
            deadline,
            body_limit,
            trace_requests,
        } = self.chain;

        let mut app = self
            .routes
            .fallback(fallback::not_found)
            .method_not_allowed_fallback(fallback::method_not_allowed);

        // Apply middleware layers (innermost first)

        // Global error formatter (innermost, sees handler and framework errors)
        app = app.layer(axum::middleware::from_fn(formatter::format_errors_middleware));

        // Panic recovery
        app = app.layer(CatchPanicLayer::custom(recovery::recover));

        // Request deadline
        app = app.layer(axum::middleware::from_fn(move |req, next| async move {
            deadline::deadline_middleware(deadline, req, next).await
        }));

        // Request logger
        app = app.layer(axum::middleware::from_fn(request_logger::request_logger_middleware));

        // Authentication
        if let Some(provider) = auth {
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let provider = Arc::clone(&provider);
                async move { auth::auth_middleware(provider, req, next).await }
            }));
        }

        // Context enrichment (per-request logger)
        app = app.layer(axum::middleware::from_fn(request_context::request_context_middleware));

        // Trace enrichment
        app = app.layer(axum::middleware::from_fn(trace::trace_enrichment_middleware));

        // Tracing
        if trace_requests {
            app = app.layer(TraceLayer::new_for_http().make_span_with(trace::RequestSpan));
        }

        // Request ID (creates the request context)
        app = app.layer(axum::middleware::from_fn(request_id::request_id_middleware));

        // Security headers
        app = app.layer(axum::middleware::from_fn(security_headers::security_headers_middleware));

        // CORS
        app = app.layer(cors::cors_layer(&cors));

        // Rate limiting (outermost stage, before any context exists)
        if let Some(limiter) = limiter {
            let state = rate_limit::RateLimitState { limiter, observability };
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let state = state.clone();
                async move { rate_limit::rate_limit_middleware(state, req, next).await }
            }));
        }

        app = app.layer(DefaultBodyLimit::max(body_limit));

        // Last-resort guards for failures before the request id stage
        app = app.layer(CatchPanicLayer::custom(recovery::recover));
        app.layer(axum::middleware::from_fn(request_id::ensure_request_id_middleware))
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let app = self.into_router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
