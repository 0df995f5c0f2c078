use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Bearer credential verification
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    pub provider: AuthProviderConfig,
}

/// Which verifier checks presented credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthProviderConfig {
    /// Locally verified HS256 tokens
    Jwt(JwtConfig),
    /// Delegate verification to an HTTP endpoint
    Remote(RemoteAuthConfig),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    /// HMAC signing secret
    pub secret: SecretString,
    /// Expected `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerated when checking `exp`, in seconds
    #[serde(default = "default_leeway")]
    pub leeway: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAuthConfig {
    /// Verification endpoint receiving `{"token": ...}`
    pub url: Url,
    /// How long a verified credential stays cached
    #[serde(default = "default_cache_ttl", with = "crate::duration")]
    pub cache_ttl: Duration,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_request_timeout", with = "crate::duration")]
    pub timeout: Duration,
}

const fn default_leeway() -> u64 {
    30
}

const fn default_cache_ttl() -> Duration {
    Duration::from_secs(30)
}

const fn default_cache_capacity() -> u64 {
    10_000
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}
