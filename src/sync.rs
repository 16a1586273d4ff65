//! Token sync client.
//!
//! One POST per harvested token, fire-and-forget: every failure mode is
//! logged and absorbed, and the keep-alive reload cycle produces the
//! next attempt.

use crate::harvest::{self, CookieSource, Harvest, SessionToken};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<SyncData>,
}

#[derive(Debug, Deserialize)]
pub struct SyncData {
    pub email: String,
    /// "created" for a new account, "updated" for a refreshed one
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Backend accepted the token
    Accepted { email: String, action: String },
    /// Backend answered but reported failure, or the body was malformed
    Rejected,
    /// Non-success status or transport failure
    Failed,
}

pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/tokens/sync", self.base_url.trim_end_matches('/'))
    }

    /// Relay one session token to the backend. Never propagates errors;
    /// the outcome is logged and returned for observability.
    pub async fn sync(&self, token: &SessionToken) -> SyncOutcome {
        let response = match self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({ "st": token.as_str() }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("token sync request failed: {}", e);
                return SyncOutcome::Failed;
            }
        };

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "token sync rejected by backend");
            return SyncOutcome::Failed;
        }

        match response.json::<SyncResponse>().await {
            Ok(SyncResponse {
                success: true,
                data: Some(data),
            }) => {
                tracing::info!(email = %data.email, action = %data.action, "session token synced");
                SyncOutcome::Accepted {
                    email: data.email,
                    action: data.action,
                }
            }
            Ok(body) => {
                tracing::error!(success = body.success, "backend reported sync failure");
                SyncOutcome::Rejected
            }
            Err(e) => {
                tracing::error!("failed to parse sync response: {}", e);
                SyncOutcome::Rejected
            }
        }
    }
}

/// Harvest the session cookie and, when present, sync it. `None` means no
/// sync was attempted (no cookie, or the cookie store was unreachable).
pub async fn sync_from_cookies(
    source: &dyn CookieSource,
    client: &SyncClient,
) -> Option<SyncOutcome> {
    match harvest::harvest_session_token(source).await {
        Ok(Harvest::Token(token)) => Some(client.sync(&token).await),
        Ok(Harvest::NotAuthenticated) => None,
        Err(e) => {
            tracing::error!("cookie store read failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = SyncClient::new("http://127.0.0.1:8000/", "k");
        assert_eq!(client.endpoint(), "http://127.0.0.1:8000/api/tokens/sync");
    }

    #[test]
    fn test_response_parsing() {
        let ok: SyncResponse = serde_json::from_str(
            r#"{"success": true, "data": {"email": "a@b.com", "action": "created"}}"#,
        )
        .unwrap();
        assert!(ok.success);
        assert_eq!(ok.data.as_ref().unwrap().email, "a@b.com");

        let failed: SyncResponse =
            serde_json::from_str(r#"{"success": false, "error": "ST invalid"}"#).unwrap();
        assert!(!failed.success);
        assert!(failed.data.is_none());
    }
}
