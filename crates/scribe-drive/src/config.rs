//! Configuration for the OAuth session and the project repository.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DriveError, DriveResult};

/// OAuth 2.0 client configuration for the authorization-code flow.
///
/// The browser app is redirected to Google's consent page and back to
/// `redirect_uri`, which must match the URI registered in the Google Cloud
/// Console.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The OAuth 2.0 client ID from the Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Redirect URI for the authorization callback.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Timeout applied to every token endpoint call.
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Default timeout in seconds for token endpoint calls.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default scope: per-file Drive access for files this app creates.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/drive.file";

    /// Creates a new OAuth configuration.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the token endpoint timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// Missing client id, secret, or redirect URI is a fatal startup
    /// condition, not a per-request error.
    pub fn validate(&self) -> DriveResult<()> {
        if self.client_id.is_empty() {
            return Err(DriveError::configuration("OAuth client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(DriveError::configuration("OAuth client_secret is required"));
        }
        if self.redirect_uri.is_empty() {
            return Err(DriveError::configuration("OAuth redirect_uri is required"));
        }
        if self.scopes.is_empty() {
            return Err(DriveError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        Ok(())
    }
}

/// What `create_project` does when a folder with that name already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `AlreadyExists` (default).
    #[default]
    Reject,
    /// Return the existing folder reference instead of failing.
    ReturnExisting,
}

/// Configuration for the Drive-backed project repository.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Name of the root folder all projects live under.
    pub root_folder: String,
    /// Name of the single content file inside each project folder.
    pub content_file: String,
    /// Body written to a freshly created content file.
    pub placeholder_text: String,
    /// Behavior on duplicate project names.
    pub duplicate_policy: DuplicatePolicy,
    /// Whether a snapshot of the previous content is kept on each save.
    pub backups_enabled: bool,
    /// Maximum number of backup snapshots retained per project.
    pub backup_retention: usize,
    /// How long the folder cache is trusted before it is cleared wholesale.
    pub cache_ttl: Duration,
    /// Timeout applied to every Drive API call.
    pub timeout: Duration,
    /// Override for the Drive API base URL (tests only).
    pub api_base_url: Option<String>,
}

impl RepositoryConfig {
    /// Default root folder name.
    pub const DEFAULT_ROOT_FOLDER: &'static str = "Scribe";

    /// Default content file name.
    pub const DEFAULT_CONTENT_FILE: &'static str = "content.txt";

    /// Default placeholder text for new projects.
    pub const DEFAULT_PLACEHOLDER: &'static str = "Welcome to your new project!";

    /// Default number of backup snapshots kept per project.
    pub const DEFAULT_BACKUP_RETENTION: usize = 9;

    /// Default folder cache lifetime.
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

    /// Sets the root folder name.
    pub fn with_root_folder(mut self, name: impl Into<String>) -> Self {
        self.root_folder = name.into();
        self
    }

    /// Sets the duplicate-name policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Enables or disables backup snapshots.
    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups_enabled = enabled;
        self
    }

    /// Sets the backup retention count.
    pub fn with_backup_retention(mut self, retention: usize) -> Self {
        self.backup_retention = retention;
        self
    }

    /// Sets the folder cache lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the Drive API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root_folder: Self::DEFAULT_ROOT_FOLDER.to_string(),
            content_file: Self::DEFAULT_CONTENT_FILE.to_string(),
            placeholder_text: Self::DEFAULT_PLACEHOLDER.to_string(),
            duplicate_policy: DuplicatePolicy::default(),
            backups_enabled: true,
            backup_retention: Self::DEFAULT_BACKUP_RETENTION,
            cache_ttl: Self::DEFAULT_CACHE_TTL,
            timeout: Duration::from_secs(OAuthConfig::DEFAULT_TIMEOUT_SECS),
            api_base_url: None,
        }
    }
}

/// Returns the default token storage path
/// (`~/.local/share/scribe/google-tokens.json`).
pub fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".local").join("share"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scribe")
        .join("google-tokens.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_oauth() -> OAuthConfig {
        OAuthConfig::new(
            "client.apps.googleusercontent.com",
            "secret",
            "http://localhost:5000/auth/callback",
        )
    }

    #[test]
    fn oauth_defaults() {
        let config = test_oauth();
        assert_eq!(config.scopes, vec![OAuthConfig::DEFAULT_SCOPE.to_string()]);
        assert_eq!(
            config.timeout,
            Duration::from_secs(OAuthConfig::DEFAULT_TIMEOUT_SECS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oauth_validation_rejects_missing_fields() {
        let missing_id = OAuthConfig::new("", "secret", "http://localhost/cb");
        assert!(missing_id.validate().is_err());

        let missing_secret = OAuthConfig::new("id", "", "http://localhost/cb");
        assert!(missing_secret.validate().is_err());

        let missing_redirect = OAuthConfig::new("id", "secret", "");
        assert!(missing_redirect.validate().is_err());

        let no_scopes = test_oauth().with_scopes(vec![]);
        assert!(no_scopes.validate().is_err());
    }

    #[test]
    fn repository_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.root_folder, "Scribe");
        assert_eq!(config.content_file, "content.txt");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(config.backups_enabled);
        assert_eq!(config.backup_retention, 9);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn repository_builders() {
        let config = RepositoryConfig::default()
            .with_root_folder("Drafts")
            .with_duplicate_policy(DuplicatePolicy::ReturnExisting)
            .with_backups(false)
            .with_backup_retention(3)
            .with_cache_ttl(Duration::from_secs(60));

        assert_eq!(config.root_folder, "Drafts");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::ReturnExisting);
        assert!(!config.backups_enabled);
        assert_eq!(config.backup_retention, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
    }
}
