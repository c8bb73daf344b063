//! OAuth 2.0 authorization-code session.
//!
//! [`AuthSession`] owns the credential lifecycle: it builds the consent URL,
//! exchanges the one-time authorization code, keeps the access token fresh
//! through the refresh grant, and revokes on logout. The session is
//! constructed with injected configuration and a [`TokenStore`] and passed by
//! handle to request handlers; there is no module-level credential state.
//!
//! # Lifecycle
//!
//! 1. `authorize_url()` — consent URL with offline access; no side effects
//! 2. `exchange_code(code)` — code becomes a persisted [`Credential`]
//! 3. `ensure_valid()` — returns a live credential, refreshing when expired
//! 4. `revoke()` — deletes the credential; the flow starts over

use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::error::{DriveError, DriveResult};
use crate::tokens::{Credential, TokenStore};

/// Google OAuth endpoints.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth session for the authorization-code grant.
#[derive(Debug)]
pub struct AuthSession {
    config: OAuthConfig,
    store: TokenStore,
    http: reqwest::Client,
    token_url: String,
}

impl AuthSession {
    /// Creates a session from validated configuration and a token store.
    ///
    /// Any credential already on disk is loaded; a failed load is logged and
    /// treated as an absent credential (the user re-authorizes).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when client id, secret, or redirect URI
    /// is missing — callers treat this as fatal at startup.
    pub fn new(config: OAuthConfig, store: TokenStore) -> DriveResult<Self> {
        config.validate()?;

        if let Err(e) = store.load() {
            warn!("ignoring unreadable token file: {}", e);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DriveError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            store,
            http,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the token endpoint URL (Google-compatible endpoints, tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Builds the provider authorization URL requesting offline access.
    ///
    /// Pure URL construction; nothing is stored and no network call is made.
    pub fn authorize_url(&self) -> String {
        let scope = self.config.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope),
        )
    }

    /// Exchanges a one-time authorization code for a credential and
    /// persists it.
    pub async fn exchange_code(&self, code: &str) -> DriveResult<Credential> {
        if code.is_empty() {
            return Err(DriveError::invalid_grant("authorization code is missing"));
        }

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DriveError::network(format!("token exchange request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriveError::network(format!("failed to read token response: {}", e)))?;

        if status.is_client_error() {
            return Err(DriveError::invalid_grant(format!(
                "token exchange rejected ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(DriveError::server(format!(
                "token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| DriveError::invalid_response(format!("invalid token response: {}", e)))?;

        let credential = Credential::new(token.access_token, token.refresh_token, token.expires_in);
        self.store.set(credential.clone())?;

        info!("authorization code exchanged, credential stored");
        Ok(credential)
    }

    /// Returns the stored credential, if one with an access token exists.
    ///
    /// The credential may be expired; use [`ensure_valid`](Self::ensure_valid)
    /// when a live token is needed.
    pub fn current_credential(&self) -> Option<Credential> {
        self.store.get().filter(Credential::is_usable)
    }

    /// Returns a credential whose access token is live, refreshing it first
    /// when expired.
    ///
    /// # Errors
    ///
    /// `ReauthenticationRequired` when no credential is stored, or the
    /// credential is expired without a refresh token, or the provider
    /// rejected the refresh grant. Transport failures during refresh keep
    /// the credential and surface as network errors so the caller can retry
    /// later.
    pub async fn ensure_valid(&self) -> DriveResult<Credential> {
        let credential = self.current_credential().ok_or_else(|| {
            DriveError::reauthentication_required("no stored credential - authorization required")
        })?;

        if !credential.is_expired() {
            return Ok(credential);
        }

        let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
            DriveError::reauthentication_required(
                "access token expired and no refresh token is available",
            )
        })?;

        debug!("access token expired, refreshing");
        let (access_token, expires_in) = self.refresh_access_token(refresh_token).await?;
        self.store.rotate_access_token(&access_token, expires_in)?;

        self.store
            .get()
            .ok_or_else(|| DriveError::internal("credential disappeared during refresh"))
    }

    /// Deletes the persisted credential and clears in-memory state.
    /// Idempotent.
    pub fn revoke(&self) -> DriveResult<()> {
        self.store.clear()?;
        info!("credential revoked");
        Ok(())
    }

    /// Returns true when a credential exists that is live or refreshable.
    pub fn is_authenticated(&self) -> bool {
        match self.current_credential() {
            Some(credential) => !credential.is_expired() || credential.refresh_token.is_some(),
            None => false,
        }
    }

    /// Performs a single refresh-token grant. Never retried: a rejected
    /// refresh means the grant was revoked and the user must re-authorize.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> DriveResult<(String, Option<i64>)> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DriveError::network(format!("token refresh request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DriveError::network(format!("failed to read token response: {}", e)))?;

        if status.is_client_error() {
            return Err(DriveError::reauthentication_required(format!(
                "token refresh rejected ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(DriveError::server(format!(
                "token refresh failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| DriveError::invalid_response(format!("invalid token response: {}", e)))?;

        info!("access token refreshed");
        Ok((token.access_token, token.expires_in))
    }
}

/// Response from the provider's token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
