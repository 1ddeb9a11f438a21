//! Bearer-token session for the WIWB API.
//!
//! A [`Session`] exchanges client credentials for an access token on first use and
//! again whenever the cached token is within a minute of its expiry. The token is
//! refreshed in place, so every request sharing the session sees the current token.
//!
//! The expiry is read from the token's `exp` claim without verifying the signature;
//! the service is the one that checks it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, WiwbError};
use crate::transport::HttpClient;

/// HydroNET OpenID-Connect token endpoint
pub const AUTH_URL: &str =
    "https://login.hydronet.com/auth/realms/hydronet/protocol/openid-connect/token";

/// A token needs at least this much remaining lifetime to be used
pub const TOKEN_MARGIN_SECS: i64 = 60;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Claims {
    exp: f64,
}

/// An access token with its decoded expiry
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Decode the `exp` claim of a JWT.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let expires_at = decode_expiry(&value)?;
        Ok(Self { value, expires_at })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token stays valid for at least [`TOKEN_MARGIN_SECS`] after `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_MARGIN_SECS)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let payload = token.split('.').nth(1).ok_or_else(|| WiwbError::Token {
        message: "token is not a JWT".to_string(),
    })?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| WiwbError::Token {
            message: format!("payload is not base64url: {}", e),
        })?;

    let claims: Claims = serde_json::from_slice(&bytes).map_err(|e| WiwbError::Token {
        message: format!("payload has no readable 'exp' claim: {}", e),
    })?;

    DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).ok_or_else(|| WiwbError::Token {
        message: format!("'exp' claim out of range: {}", claims.exp),
    })
}

/// Credentials plus the cached token
pub struct Session {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: Arc<dyn HttpClient>,
    token: Mutex<Option<AccessToken>>,
}

impl Session {
    /// Create a session. Fails if either credential is missing or empty.
    ///
    /// No token is fetched until the first request needs one.
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        token_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let client_id = client_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            WiwbError::configuration(
                "Invalid 'client_id'. Provide it in the config or as WIWB_CLIENT_ID",
            )
        })?;
        let client_secret = client_secret.filter(|s| !s.is_empty()).ok_or_else(|| {
            WiwbError::configuration(
                "Invalid 'client_secret'. Provide it in the config or as WIWB_CLIENT_SECRET",
            )
        })?;

        Ok(Self {
            client_id,
            client_secret,
            token_url: token_url.into(),
            http,
            token: Mutex::new(None),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether a cached token exists and is usable right now.
    ///
    /// Never waits: while a token exchange holds the lock this reports `false`.
    pub fn token_valid(&self) -> bool {
        self.token.try_lock().is_some_and(|cached| {
            cached
                .as_ref()
                .is_some_and(|token| token.is_valid_at(Utc::now()))
        })
    }

    /// Return a valid access token, exchanging credentials if the cached one is stale.
    pub fn token(&self) -> Result<String> {
        let mut cached = self.token.lock();
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.value().to_string());
            }
            debug!(expires_at = %token.expires_at(), "Access token is stale");
        }

        let token = self.exchange()?;
        let value = token.value().to_string();
        *cached = Some(token);
        Ok(value)
    }

    /// Exchange credentials for a fresh token, replacing any cached one.
    pub fn get_token(&self) -> Result<String> {
        let token = self.exchange()?;
        let value = token.value().to_string();
        *self.token.lock() = Some(token);
        Ok(value)
    }

    /// Headers for WIWB API requests
    pub fn headers(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", self.token()?)),
        ])
    }

    fn exchange(&self) -> Result<AccessToken> {
        let response = self.http.post_form(
            &self.token_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ],
        )?;

        if !response.is_success() {
            return Err(WiwbError::Auth {
                status: response.status,
                body: response.text(),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)?;
        let token = AccessToken::parse(parsed.access_token)?;
        info!(
            client_id = %self.client_id,
            expires_at = %token.expires_at(),
            "Obtained access token"
        );
        Ok(token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("token", &*self.token.lock())
            .finish_non_exhaustive()
    }
}
