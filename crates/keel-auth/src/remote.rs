use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use keel_config::RemoteAuthConfig;
use keel_core::Identity;
use mini_moka::sync::Cache;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{AuthError, AuthProvider, jwt::DEFAULT_ROLE};

/// Identity document returned by the verification endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifiedIdentity {
    user_id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

/// Verifies credentials by calling an HTTP endpoint, with caching
///
/// Positive results are cached for the configured TTL under the SHA-256 of
/// the credential; raw credentials are never kept in memory.
#[derive(Clone)]
pub struct RemoteAuthProvider {
    http: reqwest::Client,
    url: url::Url,
    cache: Cache<String, Arc<Identity>>,
}

impl RemoteAuthProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &RemoteAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        let cache = Cache::builder()
            .time_to_live(config.cache_ttl)
            .max_capacity(config.cache_capacity)
            .build();

        Ok(Self {
            http,
            url: config.url.clone(),
            cache,
        })
    }

    /// Forget a cached verification (e.g. after revocation)
    pub fn invalidate(&self, credential: &str) {
        self.cache.invalidate(&sha256_hex(credential));
    }

    async fn fetch(&self, credential: &str) -> Result<Identity, AuthError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&serde_json::json!({ "token": credential }))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::NOT_FOUND {
            return Err(AuthError::InvalidCredential("rejected by auth provider".to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "auth provider failed");
            return Err(AuthError::Provider(format!("auth provider returned {status}: {body}")));
        }

        let verified: VerifiedIdentity = response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("failed to parse auth provider response: {e}")))?;

        Ok(Identity {
            user_id: verified.user_id,
            role: verified.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            permissions: verified.permissions,
        })
    }
}

#[async_trait]
impl AuthProvider for RemoteAuthProvider {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let cache_key = sha256_hex(credential);

        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::trace!(user_id = %cached.user_id, "identity served from cache");
            return Ok(Identity::clone(&cached));
        }

        let identity = self.fetch(credential).await?;
        self.cache.insert(cache_key, Arc::new(identity.clone()));

        Ok(identity)
    }
}

/// Compute the SHA-256 hex digest of a string
fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        // Writing hex to a String is infallible
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
