//! Credential record and its persistent store.
//!
//! The service holds exactly one credential at a time. It is written to a
//! single JSON file (optionally sealed with a passphrase, see [`crate::crypto`])
//! and cached in memory. Writes go through a temp file and rename so a crash
//! can never leave a half-written record — a corrupted credential is
//! unrecoverable without a full re-authorization.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::crypto;
use crate::error::{DriveError, DriveResult};

/// How long before the recorded expiry a token is already treated as
/// expired, so a refresh happens before the provider starts rejecting it.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth credential: access token, optional refresh token, expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The access token sent as a bearer token on API requests.
    pub access_token: String,

    /// The refresh token used to obtain new access tokens, if the provider
    /// issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires. Absent means the token does not
    /// expire.
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry_date: expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Returns true if the access token is usable at all.
    ///
    /// A credential without an access token is never valid.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expiry_date {
            Some(expiry) => Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS) >= expiry,
            None => false,
        }
    }

    /// Replaces the access token and expiry after a refresh. The refresh
    /// token is kept.
    pub fn rotate_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expiry_date = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
    }
}

/// File-backed store for the single credential record.
#[derive(Debug)]
pub struct TokenStore {
    /// Path to the token file.
    path: PathBuf,

    /// Passphrase for at-rest encryption, when configured.
    passphrase: Option<String>,

    /// In-memory cache of the current credential.
    credential: RwLock<Option<Credential>>,
}

impl TokenStore {
    /// Creates a store backed by the given path, storing plaintext JSON.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            passphrase: None,
            credential: RwLock::new(None),
        }
    }

    /// Enables at-rest encryption with the given passphrase.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Loads the credential from disk into memory.
    ///
    /// Returns `Ok(true)` if a credential was loaded, `Ok(false)` if no file
    /// exists.
    pub fn load(&self) -> DriveResult<bool> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| DriveError::configuration(format!("failed to read token file: {}", e)))?;

        let plaintext = match &self.passphrase {
            Some(passphrase) => String::from_utf8(crypto::open(passphrase, &content)?)
                .map_err(|e| DriveError::configuration(format!("invalid token record: {}", e)))?,
            None => content,
        };

        let credential: Credential = serde_json::from_str(&plaintext)
            .map_err(|e| DriveError::configuration(format!("failed to parse token file: {}", e)))?;

        info!("loaded credential from {:?}", self.path);
        *self.credential.write().unwrap() = Some(credential);
        Ok(true)
    }

    /// Returns a clone of the current credential, if any.
    pub fn get(&self) -> Option<Credential> {
        self.credential.read().unwrap().clone()
    }

    /// Stores a new credential and persists it.
    pub fn set(&self, credential: Credential) -> DriveResult<()> {
        *self.credential.write().unwrap() = Some(credential);
        self.save()
    }

    /// Rotates the access token after a refresh and persists the record.
    pub fn rotate_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> DriveResult<()> {
        {
            let mut guard = self.credential.write().unwrap();
            let credential = guard
                .as_mut()
                .ok_or_else(|| DriveError::internal("no credential to rotate"))?;
            credential.rotate_access_token(access_token, expires_in_secs);
        }
        self.save()
    }

    /// Removes the credential from memory and disk. Idempotent: a missing
    /// file is not an error.
    pub fn clear(&self) -> DriveResult<()> {
        *self.credential.write().unwrap() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                DriveError::configuration(format!("failed to remove token file: {}", e))
            })?;
            info!("cleared credential at {:?}", self.path);
        }
        Ok(())
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> DriveResult<()> {
        let guard = self.credential.read().unwrap();
        let credential = guard
            .as_ref()
            .ok_or_else(|| DriveError::internal("no credential to save"))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DriveError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let plaintext = serde_json::to_string_pretty(credential)
            .map_err(|e| DriveError::internal(format!("failed to serialize credential: {}", e)))?;

        let content = match &self.passphrase {
            Some(passphrase) => crypto::seal(passphrase, plaintext.as_bytes())?,
            None => plaintext,
        };

        // Temp file plus rename keeps the write atomic.
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .map_err(|e| DriveError::configuration(format!("failed to write token file: {}", e)))?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            DriveError::configuration(format!("failed to rename token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!("saved credential to {:?}", self.path);
        Ok(())
    }
}
