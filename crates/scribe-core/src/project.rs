//! Project naming rules and summaries.
//!
//! A project is identified by its name. Names double as Drive folder names,
//! so they are restricted to a conservative character set and rejected early,
//! before any provider call is made.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a project name, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Characters allowed in a project name: alphanumerics, space, dash,
/// underscore, and period.
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 ._-]+$").expect("invalid name regex"));

/// Names rejected regardless of the character set (legacy device names that
/// confuse downstream tooling when synced to disk).
const RESERVED_NAMES: &[&str] = &["con", "nul", "prn", "aux", "com1", "lpt1"];

/// Errors produced by project name validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectNameError {
    /// The name is empty or only whitespace.
    #[error("project name is empty")]
    Empty,

    /// The name exceeds [`MAX_NAME_LENGTH`].
    #[error("project name exceeds {MAX_NAME_LENGTH} characters")]
    TooLong,

    /// The name contains characters outside the allow-list.
    #[error(
        "project name may only contain alphanumeric characters, spaces, dashes, underscores, and periods"
    )]
    InvalidCharacters,

    /// The name is a reserved system name.
    #[error("project name {0:?} is reserved")]
    Reserved(String),
}

/// A validated project name.
///
/// Construction goes through [`ProjectName::parse`], so holding one is proof
/// that the name passed the allow-list. Comparison is exact (names are the
/// project identity, matched verbatim against the provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectName(String);

impl ProjectName {
    /// Validates and wraps a project name.
    pub fn parse(name: impl Into<String>) -> Result<Self, ProjectNameError> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(ProjectNameError::Empty);
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ProjectNameError::TooLong);
        }
        if !NAME_REGEX.is_match(&name) {
            return Err(ProjectNameError::InvalidCharacters);
        }
        if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            return Err(ProjectNameError::Reserved(name));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A project as listed from the storage provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    /// Opaque provider identifier of the project folder.
    pub id: String,
    /// The project name (the folder name).
    pub name: String,
    /// When the project folder was created, if the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["My Notes", "draft-2", "chapter_1", "notes.v2", "a"] {
            assert!(ProjectName::parse(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(ProjectName::parse(""), Err(ProjectNameError::Empty));
        assert_eq!(ProjectName::parse("   "), Err(ProjectNameError::Empty));
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(MAX_NAME_LENGTH + 1);
        assert_eq!(ProjectName::parse(name), Err(ProjectNameError::TooLong));
        assert!(ProjectName::parse("a".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn rejects_disallowed_characters() {
        for name in ["slash/name", "quote'name", "semi;colon", "emoji🎉", "tab\tname"] {
            assert_eq!(
                ProjectName::parse(name),
                Err(ProjectNameError::InvalidCharacters),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_reserved_names_case_insensitively() {
        assert!(matches!(
            ProjectName::parse("CON"),
            Err(ProjectNameError::Reserved(_))
        ));
        assert!(matches!(
            ProjectName::parse("nul"),
            Err(ProjectNameError::Reserved(_))
        ));
        // Reserved names are exact matches, not prefixes.
        assert!(ProjectName::parse("console").is_ok());
    }

    #[test]
    fn serializes_transparently() {
        let name = ProjectName::parse("My Notes").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"My Notes\"");
    }
}
