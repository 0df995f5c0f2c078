mod error;
mod jwt;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use keel_config::{AuthConfig, AuthProviderConfig};
use keel_core::Identity;

pub use error::AuthError;
pub use jwt::{DEFAULT_ROLE, JwtAuthProvider, KeelClaims};
pub use remote::RemoteAuthProvider;

/// Turns a bearer credential into an identity
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verify `credential` (the bearer token without its scheme)
    ///
    /// # Errors
    ///
    /// `InvalidCredential` when the credential is rejected, `Provider` when
    /// verification could not be performed
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}

/// Build the configured provider, or `None` when auth is absent or disabled
///
/// # Errors
///
/// Returns an error if the remote provider's HTTP client cannot be built
pub fn from_config(config: Option<&AuthConfig>) -> anyhow::Result<Option<Arc<dyn AuthProvider>>> {
    let Some(config) = config.filter(|c| c.enabled) else {
        return Ok(None);
    };

    let provider: Arc<dyn AuthProvider> = match &config.provider {
        AuthProviderConfig::Jwt(jwt) => Arc::new(JwtAuthProvider::new(jwt)),
        AuthProviderConfig::Remote(remote) => Arc::new(RemoteAuthProvider::new(remote)?),
    };

    Ok(Some(provider))
}
