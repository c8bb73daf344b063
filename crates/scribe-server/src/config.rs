//! Gateway configuration from the environment.
//!
//! `CLIENT_ID`, `CLIENT_SECRET`, and `REDIRECT_URL` are required; everything
//! else has a default. A `.env` file is honored when present (loaded by the
//! binary before this runs).

use std::path::PathBuf;

use scribe_drive::{
    DriveError, DriveResult, DuplicatePolicy, OAuthConfig, RepositoryConfig, default_token_path,
};

/// Default port the gateway listens on.
const DEFAULT_PORT: u16 = 5000;

/// Default frontend the auth callback redirects back to.
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Frontend URL the auth callback redirects to, with an `auth` flag.
    pub frontend_url: String,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// OAuth client configuration.
    pub oauth: OAuthConfig,
    /// Where the credential record is stored.
    pub token_path: PathBuf,
    /// Passphrase for credential encryption at rest, when set.
    pub token_passphrase: Option<String>,
    /// Repository behavior.
    pub repository: RepositoryConfig,
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> DriveResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary lookup function.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DriveResult<Self> {
        let client_id = lookup("CLIENT_ID")
            .ok_or_else(|| DriveError::configuration("CLIENT_ID is required"))?;
        let client_secret = lookup("CLIENT_SECRET")
            .ok_or_else(|| DriveError::configuration("CLIENT_SECRET is required"))?;
        let redirect_url = lookup("REDIRECT_URL")
            .ok_or_else(|| DriveError::configuration("REDIRECT_URL is required"))?;

        let oauth = OAuthConfig::new(client_id, client_secret, redirect_url);
        oauth.validate()?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| DriveError::configuration(format!("invalid PORT value {:?}", raw)))?,
            None => DEFAULT_PORT,
        };

        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        let allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty() && is_plausible_origin(origin))
                .map(String::from)
                .collect(),
            None => vec![frontend_url.clone()],
        };

        let mut repository = RepositoryConfig::default();
        if let Some(root) = lookup("DRIVE_ROOT_FOLDER") {
            repository = repository.with_root_folder(root);
        }
        if let Some(raw) = lookup("ON_DUPLICATE") {
            repository = repository.with_duplicate_policy(parse_duplicate_policy(&raw)?);
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            frontend_url,
            allowed_origins,
            oauth,
            token_path: lookup("TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_token_path),
            token_passphrase: lookup("TOKEN_PASSPHRASE"),
            repository,
        })
    }
}

/// Rejects origin values that cannot be an origin (header injection guard).
fn is_plausible_origin(origin: &str) -> bool {
    origin
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || ":/.-".contains(c))
}

fn parse_duplicate_policy(raw: &str) -> DriveResult<DuplicatePolicy> {
    match raw {
        "reject" => Ok(DuplicatePolicy::Reject),
        "returnExisting" | "return-existing" => Ok(DuplicatePolicy::ReturnExisting),
        other => Err(DriveError::configuration(format!(
            "invalid ON_DUPLICATE value {:?} (expected \"reject\" or \"returnExisting\")",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("CLIENT_ID", "client.apps.googleusercontent.com"),
            ("CLIENT_SECRET", "secret"),
            ("REDIRECT_URL", "http://localhost:5000/auth/callback"),
        ])
    }

    fn config_from(vars: HashMap<&str, &str>) -> DriveResult<ServerConfig> {
        ServerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(base_vars()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:3000"]);
        assert!(config.token_passphrase.is_none());
        assert_eq!(config.repository.root_folder, "Scribe");
    }

    #[test]
    fn missing_oauth_variables_are_fatal() {
        for missing in ["CLIENT_ID", "CLIENT_SECRET", "REDIRECT_URL"] {
            let mut vars = base_vars();
            vars.remove(missing);
            let err = config_from(vars).unwrap_err();
            assert!(err.message().contains(missing), "{missing}");
        }
    }

    #[test]
    fn origins_are_split_and_filtered() {
        let mut vars = base_vars();
        vars.insert(
            "ALLOWED_ORIGINS",
            "http://localhost:3000, https://scribe.example.com,bad origin\r\n,",
        );
        let config = config_from(vars).unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://scribe.example.com"]
        );
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut vars = base_vars();
        vars.insert("PORT", "not-a-port");
        assert!(config_from(vars).is_err());
    }

    #[test]
    fn duplicate_policy_parsing() {
        let mut vars = base_vars();
        vars.insert("ON_DUPLICATE", "returnExisting");
        let config = config_from(vars).unwrap();
        assert_eq!(
            config.repository.duplicate_policy,
            DuplicatePolicy::ReturnExisting
        );

        let mut vars = base_vars();
        vars.insert("ON_DUPLICATE", "merge");
        assert!(config_from(vars).is_err());
    }

    #[test]
    fn overrides_apply() {
        let mut vars = base_vars();
        vars.insert("PORT", "8080");
        vars.insert("HOST", "127.0.0.1");
        vars.insert("FRONTEND_URL", "https://scribe.example.com");
        vars.insert("DRIVE_ROOT_FOLDER", "Drafts");
        vars.insert("TOKEN_PATH", "/var/lib/scribe/tokens.json");
        vars.insert("TOKEN_PASSPHRASE", "hunter2");

        let config = config_from(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.frontend_url, "https://scribe.example.com");
        assert_eq!(config.allowed_origins, vec!["https://scribe.example.com"]);
        assert_eq!(config.repository.root_folder, "Drafts");
        assert_eq!(config.token_path, PathBuf::from("/var/lib/scribe/tokens.json"));
        assert_eq!(config.token_passphrase.as_deref(), Some("hunter2"));
    }
}
