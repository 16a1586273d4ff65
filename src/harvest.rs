//! Session cookie harvesting.

use crate::browser::CdpClient;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Exact name of the session cookie on the target application
pub const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

/// Opaque session token read from the cookie store. Ephemeral: lives for
/// one sync attempt, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keep token values out of logs
        write!(f, "SessionToken(<{} bytes>)", self.0.len())
    }
}

/// Where cookies come from. Backed by CDP in production, by fixtures in
/// tests.
#[async_trait]
pub trait CookieSource: Send + Sync {
    /// All cookie values with the given exact name, in store order
    async fn cookie_values(&self, name: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl CookieSource for CdpClient {
    async fn cookie_values(&self, name: &str) -> Result<Vec<String>> {
        CdpClient::cookie_values(self, name).await
    }
}

/// Harvest outcome. Together with `Result`, callers observe exactly one
/// of {token, absent, error}.
#[derive(Debug)]
pub enum Harvest {
    Token(SessionToken),
    NotAuthenticated,
}

/// Read the session cookie. Zero matches is not an error: the user is
/// simply not signed in yet.
pub async fn harvest_session_token(source: &dyn CookieSource) -> Result<Harvest> {
    let values = source.cookie_values(SESSION_COOKIE).await?;
    match values.into_iter().next() {
        Some(value) => Ok(Harvest::Token(SessionToken::new(value))),
        None => {
            tracing::warn!(cookie = SESSION_COOKIE, "session cookie not found; not authenticated");
            Ok(Harvest::NotAuthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCookies(Vec<String>);

    #[async_trait]
    impl CookieSource for FixedCookies {
        async fn cookie_values(&self, _name: &str) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let source = FixedCookies(vec!["tok_A".into(), "tok_B".into()]);
        match harvest_session_token(&source).await.unwrap() {
            Harvest::Token(t) => assert_eq!(t.as_str(), "tok_A"),
            other => panic!("expected token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_authenticated() {
        let source = FixedCookies(vec![]);
        assert!(matches!(
            harvest_session_token(&source).await.unwrap(),
            Harvest::NotAuthenticated
        ));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::new("super-secret-value");
        assert!(!format!("{:?}", token).contains("super-secret-value"));
    }
}
