//! OAuth session and Drive-backed project storage.
//!
//! This crate is the core of the scribe backend: it keeps one Google
//! credential alive and maps named projects onto Drive folders.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ensure_valid()      ┌───────────────────┐
//! │ AuthSession  │────────────────────────▶│ ProjectRepository │
//! │  TokenStore  │                         │    FolderCache    │
//! └──────┬───────┘                         └─────────┬─────────┘
//!        │ token endpoint                            │ DriveClient
//!        ▼                                           ▼
//!  Google OAuth 2.0                           Google Drive v3
//! ```
//!
//! [`AuthSession`] owns the credential lifecycle (authorize, exchange,
//! refresh, revoke) backed by a file-based [`TokenStore`].
//! [`ProjectRepository`] resolves project names to folders under a
//! conventional root and performs load/save/create/delete against them,
//! with bounded retries and an advisory folder cache.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scribe_core::ProjectName;
//! use scribe_drive::{AuthSession, OAuthConfig, ProjectRepository, RepositoryConfig, TokenStore};
//!
//! let store = TokenStore::new(scribe_drive::default_token_path());
//! let session = Arc::new(AuthSession::new(
//!     OAuthConfig::new(client_id, client_secret, redirect_uri),
//!     store,
//! )?);
//! let repository = ProjectRepository::new(session.clone(), RepositoryConfig::default());
//!
//! let name = ProjectName::parse("My Notes")?;
//! repository.create_project(&name).await?;
//! let content = repository.load_project(&name).await?;
//! ```

pub mod client;
pub mod config;
mod crypto;
pub mod error;
pub mod repository;
pub mod retry;
pub mod session;
pub mod tokens;

pub use client::{DriveClient, FileRef};
pub use config::{DuplicatePolicy, OAuthConfig, RepositoryConfig, default_token_path};
pub use error::{DriveError, DriveResult, ErrorKind};
pub use repository::ProjectRepository;
pub use retry::RetryPolicy;
pub use session::AuthSession;
pub use tokens::{Credential, TokenStore};
