use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use keel_auth::{AuthError, AuthProvider};
use keel_core::RequestContext;

/// Verify a presented bearer credential and record the outcome
///
/// Never rejects on its own: routes that require an identity are guarded at
/// dispatch, so anonymous and failed requests keep flowing here.
pub async fn auth_middleware(provider: Arc<dyn AuthProvider>, request: Request, next: Next) -> Response {
    if let Some(context) = request.extensions().get::<RequestContext>() {
        match bearer_credential(request.headers()) {
            Credential::Missing => {}
            Credential::Unsupported => {
                tracing::debug!("unsupported authorization scheme");
                context.set_auth_failure("unsupported authorization scheme");
            }
            Credential::Bearer(credential) => match provider.verify(credential).await {
                Ok(identity) => {
                    tracing::debug!(user_id = %identity.user_id, role = %identity.role, "request authenticated");
                    context.set_identity(identity);
                }
                Err(AuthError::InvalidCredential(reason)) => {
                    tracing::info!(reason = %reason, "credential rejected");
                    context.set_auth_failure(reason);
                }
                Err(e) => {
                    tracing::error!(error = %e, "credential verification failed");
                    context.set_auth_failure(e.to_string());
                }
            },
        }
    }

    next.run(request).await
}

#[derive(Debug, PartialEq, Eq)]
enum Credential<'a> {
    Missing,
    Unsupported,
    Bearer(&'a str),
}

fn bearer_credential(headers: &HeaderMap) -> Credential<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Credential::Missing;
    };

    let Ok(value) = value.to_str() else {
        return Credential::Unsupported;
    };

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Credential::Bearer(token.trim())
        }
        _ => Credential::Unsupported,
    }
}
