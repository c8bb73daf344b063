//! Error types for auth and storage operations.
//!
//! Every failure in this crate is a [`DriveError`] carrying an [`ErrorKind`].
//! The kind is what the HTTP layer maps to a status code, and what the retry
//! policy consults to decide whether an operation may be reattempted.

use std::fmt;

use thiserror::Error;

use scribe_core::ProjectNameError;

/// High-level classification of a [`DriveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The authorization code was missing, expired, or already used.
    InvalidGrant,
    /// No usable credential and refresh is impossible; the user must
    /// re-drive the authorization flow.
    ReauthenticationRequired,
    /// An operation was attempted without a valid credential, or the
    /// provider rejected the credential.
    Unauthorized,
    /// The project or content resource does not exist.
    NotFound,
    /// A project with that name already exists.
    AlreadyExists,
    /// Multiple content resources match where exactly one is expected.
    Conflict,
    /// Retries against the remote provider were exhausted.
    StorageUnavailable,
    /// Input validation failed before contacting the provider.
    InvalidInput,
    /// Network failure: connection, DNS, timeout.
    Network,
    /// The provider rate-limited the request.
    RateLimited,
    /// The provider returned a 5xx response.
    Server,
    /// The provider response could not be parsed.
    InvalidResponse,
    /// Missing or invalid configuration.
    Configuration,
    /// Unexpected internal state.
    Internal,
}

impl ErrorKind {
    /// Returns true if the error is transient and the operation may be
    /// retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// Returns a stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidGrant => "invalid_grant",
            Self::ReauthenticationRequired => "reauthentication_required",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Conflict => "conflict",
            Self::StorageUnavailable => "storage_unavailable",
            Self::InvalidInput => "invalid_input",
            Self::Network => "network_error",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error from the auth session, token store, or project repository.
#[derive(Debug, Error)]
pub struct DriveError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DriveError {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid-grant error.
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGrant, message)
    }

    /// Creates a reauthentication-required error.
    pub fn reauthentication_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReauthenticationRequired, message)
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates an already-exists error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates a storage-unavailable error.
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageUnavailable, message)
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Creates a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if the error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<ProjectNameError> for DriveError {
    fn from(err: ProjectNameError) -> Self {
        Self::new(ErrorKind::InvalidInput, err.to_string())
    }
}

/// A specialized Result type for auth and storage operations.
pub type DriveResult<T> = Result<T, DriveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_retryable() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::StorageUnavailable.is_retryable());
    }

    #[test]
    fn error_creation() {
        let err = DriveError::not_found("project \"Ghost\" not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "project \"Ghost\" not found");
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = DriveError::already_exists("project \"Notes\" already exists");
        let display = format!("{}", err);
        assert!(display.contains("already_exists"));
        assert!(display.contains("Notes"));
    }

    #[test]
    fn error_from_name_validation() {
        let name_err = scribe_core::ProjectName::parse("bad/name").unwrap_err();
        let err: DriveError = name_err.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn error_with_source() {
        use std::error::Error;
        let io_err = std::io::Error::other("disk full");
        let err = DriveError::configuration("failed to persist tokens").with_source(io_err);
        assert!(err.source().is_some());
    }
}
