// src/oauth.rs
//! Google OAuth for the Gmail source: one-time authorization-code exchange
//! when a user connects their inbox, then transparent refresh before use.
//! Credentials are persisted per owner per source kind via the content store.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Client registration for the authorization-code flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
}

impl OAuthConfig {
    pub fn google(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Reads `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` / `GOOGLE_REDIRECT_URI`.
    /// Returns `None` when the integration is not configured.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("GOOGLE_REDIRECT_URI")
            .unwrap_or_else(|_| "urn:ietf:wg:oauth:2.0:oob".to_string());
        Some(Self::google(client_id, client_secret, redirect_uri))
    }
}

/// Stored credential shape, one row per (owner, source kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds after which the access token must be refreshed.
    pub expires_at: i64,
}

impl StoredCredentials {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(Utc::now().timestamp())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

pub struct OAuthClient {
    http: reqwest::Client,
    cfg: OAuthConfig,
}

impl OAuthClient {
    pub fn new(cfg: OAuthConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, cfg }
    }

    /// First connect: exchange the authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredCredentials> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.cfg.client_id.as_str()),
            ("client_secret", self.cfg.client_secret.as_str()),
            ("redirect_uri", self.cfg.redirect_uri.as_str()),
        ];
        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&params)
            .send()
            .await
            .context("oauth code exchange")?;
        if !resp.status().is_success() {
            return Err(anyhow!("oauth code exchange failed: HTTP {}", resp.status()));
        }
        let body: TokenResponse = resp.json().await.context("oauth token json")?;
        Ok(to_credentials(body, None))
    }

    /// Mint a fresh access token from a refresh token. The provider may omit
    /// the refresh token in its response; the previous one is kept.
    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredCredentials> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.cfg.client_id.as_str()),
            ("client_secret", self.cfg.client_secret.as_str()),
        ];
        let resp = self
            .http
            .post(&self.cfg.token_url)
            .form(&params)
            .send()
            .await
            .context("oauth refresh")?;
        if !resp.status().is_success() {
            return Err(anyhow!("oauth refresh failed: HTTP {}", resp.status()));
        }
        let body: TokenResponse = resp.json().await.context("oauth refresh json")?;
        Ok(to_credentials(body, Some(refresh_token.to_string())))
    }
}

fn to_credentials(resp: TokenResponse, fallback_refresh: Option<String>) -> StoredCredentials {
    StoredCredentials {
        access_token: resp.access_token,
        refresh_token: resp.refresh_token.or(fallback_refresh),
        expires_at: Utc::now().timestamp() + resp.expires_in.unwrap_or(3600),
    }
}
