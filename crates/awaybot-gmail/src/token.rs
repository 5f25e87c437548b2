//! Access-token lifecycle: code exchange, refresh, and caching.
//!
//! The persisted bundle only carries a refresh token. `TokenManager` trades
//! it for short-lived access tokens on demand and caches each one until a
//! minute before it expires.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use awaybot_core::utils::mask_secret;

use crate::credentials::{ClientIdentity, CredentialBundle};
use crate::error::CredentialError;

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_MARGIN_S: i64 = 60;

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

/// Token endpoint response, for both the code exchange and refresh grants.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Granted scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// An `expires_in` that does not fit the calendar counts as unknown.
    pub fn into_access_token(self, now: DateTime<Utc>) -> AccessToken {
        let expires_at = self
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        AccessToken {
            value: self.access_token,
            expires_at,
        }
    }
}

/// A bearer token with expiry tracking.
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    /// `None` means unknown; treated as expired.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp
                .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_S))
                .map_or(true, |deadline| now >= deadline),
            None => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &mask_secret(&self.value))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Grants
// ─────────────────────────────────────────────

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_url: &str,
    client: &ClientIdentity,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<TokenResponse, CredentialError> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", client.client_id.as_str()),
        ("client_secret", client.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("code_verifier", code_verifier),
    ];
    post_token_form(http, token_url, &form)
        .await
        .map_err(CredentialError::Authorization)
}

/// Trade a refresh token for a new access token.
pub async fn refresh_grant(
    http: &reqwest::Client,
    token_url: &str,
    bundle: &CredentialBundle,
) -> Result<TokenResponse, CredentialError> {
    if bundle.refresh_token.is_empty() {
        return Err(CredentialError::Refresh(
            "no refresh token available; re-run `awaybot authorize`".to_string(),
        ));
    }
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", bundle.refresh_token.as_str()),
        ("client_id", bundle.client_id.as_str()),
        ("client_secret", bundle.client_secret.as_str()),
    ];
    post_token_form(http, token_url, &form)
        .await
        .map_err(CredentialError::Refresh)
}

async fn post_token_form(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, String> {
    let response = http
        .post(token_url)
        .form(form)
        .send()
        .await
        .map_err(|e| format!("request to {token_url} failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(format!("{status}: {}", body.trim()));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| format!("invalid token response: {e}"))
}

// ─────────────────────────────────────────────
// TokenManager
// ─────────────────────────────────────────────

/// Hands out valid access tokens for one credential bundle.
///
/// Shared read-only across all concurrent workflows; refreshes are
/// serialized behind the write lock so a burst of callers triggers one
/// token request.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    bundle: CredentialBundle,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, token_url: impl Into<String>, bundle: CredentialBundle) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            bundle,
            cached: RwLock::new(None),
        }
    }

    /// Seed the cache with a token obtained during authorization.
    pub fn with_token(self, token: AccessToken) -> Self {
        Self {
            cached: RwLock::new(Some(token)),
            ..self
        }
    }

    /// A token valid for at least the expiry margin, refreshing if needed.
    pub async fn access_token(&self) -> Result<String, CredentialError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call refreshes.
    ///
    /// Only clears the cache while it still holds `rejected`; a token another
    /// caller already refreshed is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.write().await;
        if cached.as_ref().is_some_and(|t| t.value == rejected) {
            warn!("access token rejected, forcing refresh");
            *cached = None;
        } else {
            debug!("rejected token already replaced");
        }
    }

    async fn fetch(&self) -> Result<AccessToken, CredentialError> {
        debug!(client_id = %mask_secret(&self.bundle.client_id), "refreshing access token");
        let response = refresh_grant(&self.http, &self.token_url, &self.bundle).await?;
        let token = response.into_access_token(Utc::now());
        info!(expires_at = ?token.expires_at, "access token refreshed");
        Ok(token)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
