//! Test server wrapper that starts keel on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use keel_auth::AuthProvider;
use keel_config::Config;
use keel_core::Observability;
use keel_jobs::TaskRegistry;
use keel_server::{AppState, Collaborators, Server};
use keel_storage::{Cache, Database};
use tokio_util::sync::CancellationToken;

use super::routes;
use super::stubs::{RecordingObservability, StubAuth, StubProbe};

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    observability: Arc<RecordingObservability>,
}

/// Choices for the collaborators of a [`TestServer`]
pub struct TestServerBuilder {
    config: Config,
    routes: Option<Router<AppState>>,
    auth: bool,
    database_up: bool,
    cache_up: bool,
}

impl TestServerBuilder {
    /// Mount the sample business routes
    pub fn with_app_routes(mut self) -> Self {
        self.routes = Some(routes::app());
        self
    }

    /// Verify bearer tokens with [`StubAuth`]
    pub fn with_auth(mut self) -> Self {
        self.auth = true;
        self
    }

    /// Fixed answers for the `/status` probes
    pub fn with_probes(mut self, database_up: bool, cache_up: bool) -> Self {
        self.database_up = database_up;
        self.cache_up = cache_up;
        self
    }

    pub async fn start(self) -> anyhow::Result<TestServer> {
        let observability = Arc::new(RecordingObservability::default());
        let sink: Arc<dyn Observability> = observability.clone();

        let (jobs, _workers) = keel_jobs::channel(&self.config.jobs, TaskRegistry::new());
        let auth: Option<Arc<dyn AuthProvider>> = if self.auth { Some(Arc::new(StubAuth)) } else { None };

        let collaborators = Collaborators {
            state: AppState {
                database: Database::connect_lazy(&self.config.database)?,
                cache: Cache::new(&self.config.redis)?,
                jobs,
                observability: sink,
            },
            database_check: Arc::new(StubProbe(self.database_up)),
            cache_check: Arc::new(StubProbe(self.cache_up)),
            auth,
        };

        let mut server = Server::from_parts(&self.config, collaborators)?;
        if let Some(routes) = self.routes {
            server = server.merge(routes);
        }

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = server.into_router();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(TestServer {
            addr,
            shutdown,
            client: reqwest::Client::new(),
            observability,
        })
    }
}

impl TestServer {
    pub fn builder(config: Config) -> TestServerBuilder {
        TestServerBuilder {
            config,
            routes: None,
            auth: false,
            database_up: true,
            cache_up: true,
        }
    }

    /// Start with the sample routes, stub auth and healthy probes
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        Self::builder(config).with_app_routes().with_auth().start().await
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Everything the server recorded through its observability sink
    pub fn observability(&self) -> &RecordingObservability {
        &self.observability
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
