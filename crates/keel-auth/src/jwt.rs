use async_trait::async_trait;
use jwt_compact::{
    AlgorithmExt, TimeOptions, UntrustedToken,
    alg::{Hs256, Hs256Key},
};
use keel_config::JwtConfig;
use keel_core::Identity;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthProvider};

/// Role assumed when a token carries none
pub const DEFAULT_ROLE: &str = "user";

const MAX_LEEWAY_SECS: u64 = 86_400;

/// Claims keel reads from a bearer token
#[serde_with::serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeelClaims {
    #[serde(default, rename = "sub")]
    pub subject: Option<String>,
    #[serde(default, rename = "iss", skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Single value or array
    #[serde_as(deserialize_as = "Option<serde_with::OneOrMany<_>>")]
    #[serde(default, rename = "aud", skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Verifies HS256 tokens locally
pub struct JwtAuthProvider {
    key: Hs256Key,
    issuer: Option<String>,
    audience: Option<String>,
    leeway: chrono::Duration,
}

impl JwtAuthProvider {
    pub fn new(config: &JwtConfig) -> Self {
        let leeway = i64::try_from(config.leeway.min(MAX_LEEWAY_SECS)).unwrap_or(0);

        Self {
            key: Hs256Key::new(config.secret.expose_secret().as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway: chrono::Duration::seconds(leeway),
        }
    }

    fn time_options(&self) -> TimeOptions {
        TimeOptions::new(self.leeway, chrono::Utc::now)
    }

    fn check_claims(&self, claims: &KeelClaims) -> Result<(), AuthError> {
        if let Some(ref expected) = self.issuer
            && claims.issuer.as_ref() != Some(expected)
        {
            return Err(AuthError::InvalidCredential("unexpected issuer".to_string()));
        }

        if let Some(ref expected) = self.audience
            && !claims.audience.iter().flatten().any(|aud| aud == expected)
        {
            return Err(AuthError::InvalidCredential("unexpected audience".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let untrusted =
            UntrustedToken::new(credential).map_err(|e| AuthError::InvalidCredential(format!("malformed token: {e}")))?;

        let token = Hs256
            .validator::<KeelClaims>(&self.key)
            .validate(&untrusted)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        let claims = token.claims();
        claims
            .validate_expiration(&self.time_options())
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        let custom = &claims.custom;
        self.check_claims(custom)?;

        let user_id = custom
            .subject
            .clone()
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::InvalidCredential("token has no subject".to_string()))?;

        Ok(Identity {
            user_id,
            role: custom.role.clone().unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            permissions: custom.permissions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use jwt_compact::{Claims, Header};
    use secrecy::SecretString;

    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy";

    fn config(issuer: Option<&str>, audience: Option<&str>) -> JwtConfig {
        JwtConfig {
            secret: SecretString::from(SECRET.to_string()),
            issuer: issuer.map(str::to_owned),
            audience: audience.map(str::to_owned),
            leeway: 0,
        }
    }

    fn sign(claims: KeelClaims, lifetime: Option<chrono::Duration>, secret: &str) -> String {
        let mut claims = Claims::new(claims);
        if let Some(lifetime) = lifetime {
            claims = claims.set_duration_and_issuance(&TimeOptions::default(), lifetime);
        }
        Hs256
            .token(&Header::empty(), &claims, &Hs256Key::new(secret.as_bytes()))
            .unwrap()
    }

    fn alice() -> KeelClaims {
        KeelClaims {
            subject: Some("usr_alice".to_string()),
            issuer: Some("keel".to_string()),
            audience: Some(vec!["api".to_string()]),
            role: Some("admin".to_string()),
            permissions: vec!["reports:read".to_string()],
        }
    }

    #[tokio::test]
    async fn valid_token_yields_identity() {
        let provider = JwtAuthProvider::new(&config(Some("keel"), Some("api")));
        let token = sign(alice(), Some(chrono::Duration::minutes(5)), SECRET);

        let identity = provider.verify(&token).await.unwrap();
        assert_eq!(identity.user_id, "usr_alice");
        assert_eq!(identity.role, "admin");
        assert_eq!(identity.permissions, ["reports:read"]);
    }

    #[tokio::test]
    async fn role_defaults_to_user() {
        let provider = JwtAuthProvider::new(&config(None, None));
        let claims = KeelClaims {
            subject: Some("usr_bob".to_string()),
            ..KeelClaims::default()
        };
        let token = sign(claims, Some(chrono::Duration::minutes(5)), SECRET);

        let identity = provider.verify(&token).await.unwrap();
        assert_eq!(identity.role, DEFAULT_ROLE);
        assert!(identity.permissions.is_empty());
    }

    #[tokio::test]
    async fn rejects_wrong_signature() {
        let provider = JwtAuthProvider::new(&config(None, None));
        let token = sign(alice(), Some(chrono::Duration::minutes(5)), "another-secret");

        assert!(matches!(provider.verify(&token).await, Err(AuthError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn rejects_expired_and_missing_expiry() {
        let provider = JwtAuthProvider::new(&config(None, None));

        let expired = sign(alice(), Some(chrono::Duration::minutes(-5)), SECRET);
        assert!(matches!(provider.verify(&expired).await, Err(AuthError::InvalidCredential(_))));

        let no_exp = sign(alice(), None, SECRET);
        assert!(matches!(provider.verify(&no_exp).await, Err(AuthError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn rejects_issuer_and_audience_mismatch() {
        let token = sign(alice(), Some(chrono::Duration::minutes(5)), SECRET);

        let wrong_issuer = JwtAuthProvider::new(&config(Some("other"), None));
        assert!(wrong_issuer.verify(&token).await.is_err());

        let wrong_audience = JwtAuthProvider::new(&config(None, Some("admin-console")));
        assert!(wrong_audience.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let provider = JwtAuthProvider::new(&config(None, None));
        assert!(matches!(provider.verify("not-a-jwt").await, Err(AuthError::InvalidCredential(_))));
    }
}
