//! ANBIMA API credentials.
//!
//! The feed endpoint accepts anonymous calls for public data; registered
//! clients authenticate with an OAuth2 client-credentials token sent as
//! `client_id` / `access_token` headers. The token is cached together with its
//! expiry and refreshed shortly before it runs out.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;

pub const TOKEN_URL: &str = "https://api.anbima.com.br/oauth/access-token";

/// A token is refreshed this long before its reported expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the token response carries no `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Supplies the headers to attach to every feed request.
pub trait CredentialProvider {
    fn headers(&self, client: &Client) -> Result<Vec<(String, String)>, AppError>;
}

/// No authentication headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn headers(&self, _client: &Client) -> Result<Vec<(String, String)>, AppError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    /// Usable at `now`, leaving `REFRESH_MARGIN` before expiry.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth2 client-credentials flow with a cached token.
#[derive(Debug)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token_url: String,
    cached: RefCell<Option<AccessToken>>,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: TOKEN_URL.to_string(),
            cached: RefCell::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Seed the cache, e.g. with a token obtained elsewhere.
    pub fn with_token(self, token: AccessToken) -> Self {
        *self.cached.borrow_mut() = Some(token);
        self
    }

    /// Return the cached token while fresh, otherwise request a new one.
    pub fn token(&self, client: &Client) -> Result<String, AppError> {
        let now = Instant::now();
        if let Some(token) = self.cached.borrow().as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token(client, now)?;
        let value = token.value.clone();
        *self.cached.borrow_mut() = Some(token);
        Ok(value)
    }

    fn request_token(&self, client: &Client, now: Instant) -> Result<AccessToken, AppError> {
        debug!(url = %self.token_url, "requesting access token");

        let resp = client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .json(&serde_json::json!({ "grant_type": "client_credentials" }))
            .send()
            .map_err(|e| AppError::new(4, format!("ANBIMA token request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("ANBIMA token request failed with status {}.", resp.status()),
            ));
        }

        let body: TokenResponse = resp
            .json()
            .map_err(|e| AppError::new(4, format!("Failed to parse ANBIMA token response: {e}")))?;

        Ok(AccessToken {
            value: body.access_token,
            expires_at: token_expiry(now, body.expires_in),
        })
    }
}

/// Expiry of a token issued at `now` with the reported `expires_in` seconds.
///
/// A missing or unrepresentable lifetime falls back to
/// `DEFAULT_TOKEN_LIFETIME`.
fn token_expiry(now: Instant, expires_in: Option<u64>) -> Instant {
    expires_in
        .and_then(|secs| now.checked_add(Duration::from_secs(secs)))
        .unwrap_or(now + DEFAULT_TOKEN_LIFETIME)
}

impl CredentialProvider for ClientCredentials {
    fn headers(&self, client: &Client) -> Result<Vec<(String, String)>, AppError> {
        let token = self.token(client)?;
        Ok(vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("access_token".to_string(), token),
        ])
    }
}

/// Pick credentials from `ANBIMA_CLIENT_ID` / `ANBIMA_CLIENT_SECRET`.
///
/// Missing or empty variables select anonymous access.
pub fn from_env() -> Box<dyn CredentialProvider> {
    let id = std::env::var("ANBIMA_CLIENT_ID").ok().filter(|s| !s.trim().is_empty());
    let secret = std::env::var("ANBIMA_CLIENT_SECRET")
        .ok()
        .filter(|s| !s.trim().is_empty());
    match (id, secret) {
        (Some(id), Some(secret)) => {
            debug!("using ANBIMA client credentials");
            Box::new(ClientCredentials::new(id, secret))
        }
        _ => {
            debug!("no ANBIMA credentials, using anonymous access");
            Box::new(Anonymous)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_stale_inside_refresh_margin() {
        let now = Instant::now();
        let fresh = AccessToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(600),
        };
        let closing = AccessToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(30),
        };
        assert!(fresh.is_fresh(now));
        assert!(!closing.is_fresh(now));
    }

    #[test]
    fn fresh_cached_token_is_reused_without_network() {
        let creds = ClientCredentials::new("id", "secret").with_token(AccessToken {
            value: "cached-token".into(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        });
        let client = Client::new();

        let headers = creds.headers(&client).unwrap();
        assert_eq!(
            headers,
            vec![
                ("client_id".to_string(), "id".to_string()),
                ("access_token".to_string(), "cached-token".to_string()),
            ]
        );
    }

    #[test]
    fn token_expiry_survives_huge_lifetimes() {
        let now = Instant::now();
        assert_eq!(token_expiry(now, Some(120)), now + Duration::from_secs(120));
        assert_eq!(token_expiry(now, None), now + DEFAULT_TOKEN_LIFETIME);
        assert_eq!(token_expiry(now, Some(u64::MAX)), now + DEFAULT_TOKEN_LIFETIME);
    }

    #[test]
    fn anonymous_sends_nothing() {
        assert!(Anonymous.headers(&Client::new()).unwrap().is_empty());
    }
}
