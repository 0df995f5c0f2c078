use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use keel_core::HealthCheck;
use serde::Serialize;

/// Upper bound for each dependency probe
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Dependencies probed by `GET /status`
#[derive(Clone)]
pub struct StatusState {
    pub environment: Arc<str>,
    pub database: Arc<dyn HealthCheck>,
    pub cache: Arc<dyn HealthCheck>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    timestamp: String,
    environment: String,
    checks: Checks,
}

#[derive(Debug, Serialize)]
struct Checks {
    database: CheckStatus,
    redis: CheckStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Fail,
}

/// Report reachability of the database and the cache
///
/// Both probes run concurrently; any failure answers `503`.
pub async fn status_handler(State(state): State<StatusState>) -> Response {
    let (database, redis) = tokio::join!(probe("database", &*state.database), probe("redis", &*state.cache));

    let healthy = database == CheckStatus::Ok && redis == CheckStatus::Ok;
    let body = StatusBody {
        status: if healthy { "ok" } else { "degraded" },
        timestamp: jiff::Timestamp::now().to_string(),
        environment: state.environment.to_string(),
        checks: Checks { database, redis },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    // a 503 here carries the checks, not an error envelope
    crate::formatter::keep_body((status, axum::Json(body)).into_response())
}

async fn probe(name: &'static str, check: &dyn HealthCheck) -> CheckStatus {
    match tokio::time::timeout(CHECK_TIMEOUT, check.check()).await {
        Ok(Ok(())) => CheckStatus::Ok,
        Ok(Err(e)) => {
            tracing::warn!(dependency = name, error = %e, "health check failed");
            CheckStatus::Fail
        }
        Err(_) => {
            tracing::warn!(dependency = name, timeout = ?CHECK_TIMEOUT, "health check timed out");
            CheckStatus::Fail
        }
    }
}
