//! In-process stand-ins for external collaborators

use std::sync::Mutex;

use async_trait::async_trait;
use keel_auth::{AuthError, AuthProvider};
use keel_core::{HealthCheck, Identity, Observability, Phase};

/// Health probe with a fixed answer
pub struct StubProbe(pub bool);

#[async_trait]
impl HealthCheck for StubProbe {
    async fn check(&self) -> anyhow::Result<()> {
        if self.0 { Ok(()) } else { anyhow::bail!("connection refused") }
    }
}

/// Accepts a fixed set of bearer tokens
///
/// - `admin-token`: user `admin` with `reports:read` and `users:delete`
/// - `user-token`: user `alice` without permissions
/// - `outage`: provider failure
pub struct StubAuth;

#[async_trait]
impl AuthProvider for StubAuth {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        match credential {
            "admin-token" => Ok(Identity {
                user_id: "admin".to_owned(),
                role: "admin".to_owned(),
                permissions: vec!["reports:read".to_owned(), "users:delete".to_owned()],
            }),
            "user-token" => Ok(Identity {
                user_id: "alice".to_owned(),
                role: "user".to_owned(),
                permissions: Vec::new(),
            }),
            "outage" => Err(AuthError::Provider("identity service unreachable".to_owned())),
            _ => Err(AuthError::InvalidCredential("unknown token".to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDuration {
    pub operation: String,
    pub phase: Phase,
    pub status: u16,
}

/// Observability sink that keeps everything in memory
#[derive(Default)]
pub struct RecordingObservability {
    events: Mutex<Vec<RecordedEvent>>,
    durations: Mutex<Vec<RecordedDuration>>,
}

impl RecordingObservability {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn durations(&self) -> Vec<RecordedDuration> {
        self.durations.lock().unwrap().clone()
    }

    /// Durations recorded for one operation, in recording order
    pub fn durations_for(&self, operation: &str) -> Vec<RecordedDuration> {
        self.durations()
            .into_iter()
            .filter(|d| d.operation == operation)
            .collect()
    }
}

impl Observability for RecordingObservability {
    fn record_event(&self, name: &str, attributes: &[(&str, String)]) {
        self.events.lock().unwrap().push(RecordedEvent {
            name: name.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        });
    }

    fn record_duration(&self, operation: &str, phase: Phase, _duration_ms: f64, status: u16) {
        self.durations.lock().unwrap().push(RecordedDuration {
            operation: operation.to_owned(),
            phase,
            status,
        });
    }
}
