/// Credential verification errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Credential was rejected (bad signature, expired, unknown)
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The verifier itself failed; the credential may still be valid
    #[error("auth provider error: {0}")]
    Provider(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(format!("verification request failed: {err}"))
    }
}
