use async_trait::async_trait;

/// Phase of a dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Authorization guard, binding and validation
    Bind,
    /// Business logic and response shaping
    Handler,
}

/// Sink for metrics and events emitted on the request path
pub trait Observability: Send + Sync {
    /// Count a named event
    fn record_event(&self, name: &str, attributes: &[(&str, String)]);

    /// Record how long a phase took and how it ended
    fn record_duration(&self, operation: &str, phase: Phase, duration_ms: f64, status: u16);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObservability;

impl Observability for NoopObservability {
    fn record_event(&self, _: &str, _: &[(&str, String)]) {}

    fn record_duration(&self, _: &str, _: Phase, _: f64, _: u16) {}
}

/// Reachability check for an external dependency
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Succeeds when the dependency answers
    async fn check(&self) -> anyhow::Result<()>;
}
