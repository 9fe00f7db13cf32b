//! Credential injection for the streaming client.

use async_trait::async_trait;

use crate::options::SecretString;

/// Supplies the bearer token for each request and is told when the server
/// rejects it.
#[async_trait]
pub trait CredentialProvider: Send + Sync + std::fmt::Debug {
    /// Current bearer token, or `None` when the user is not signed in.
    async fn token(&self) -> Option<SecretString>;

    /// Called once when a request is answered with 401 or 403, before the
    /// error is returned. Implementations typically start a login flow here.
    fn on_auth_required(&self, _status: u16) {}
}

/// A fixed bearer token.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<SecretString>,
}

impl StaticToken {
    /// Create a provider for the given token.
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A provider with no token; every request fails with `AuthMissing`.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read the token from an environment variable. A missing or empty
    /// variable yields a provider without a token.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::new(value.trim().to_string()),
            _ => Self::none(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn token(&self) -> Option<SecretString> {
        self.token.clone()
    }
}
