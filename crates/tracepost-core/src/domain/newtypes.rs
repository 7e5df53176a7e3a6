//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the values a reporter
//! is configured with. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;

/// Directory of the storage slot when none is configured
pub const DEFAULT_SLOT_DIR: &str = "stacktraces";

/// File name of the storage slot when none is configured
pub const DEFAULT_SLOT_FILE: &str = "stack.txt";

// ============================================================================
// Endpoint
// ============================================================================

/// Absolute http(s) URL that crash reports are POSTed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse and validate an endpoint URL
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEndpoint` if the string is not a URL or
    /// its scheme is not `http`/`https`.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let url = Url::parse(value.trim())
            .map_err(|e| DomainError::InvalidEndpoint(format!("{value}: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(DomainError::InvalidEndpoint(format!(
                "{value}: unsupported scheme '{other}'"
            ))),
        }
    }

    /// Get the underlying URL
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Get the URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Endpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0.into()
    }
}

// ============================================================================
// SlotPath
// ============================================================================

/// Location of the single crash record, relative to the local storage root
///
/// Made of a directory and a file name, e.g. `stacktraces/stack.txt`.
/// Both parts must be non-empty and relative, and neither may contain `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotPath {
    dir: String,
    file_name: String,
}

impl SlotPath {
    /// Create a validated slot path
    pub fn new(dir: impl Into<String>, file_name: impl Into<String>) -> Result<Self, DomainError> {
        let dir = dir.into();
        let file_name = file_name.into();

        validate_relative(&dir)?;
        validate_relative(&file_name)?;
        if Path::new(&file_name).components().count() != 1 {
            return Err(DomainError::InvalidStoragePath(format!(
                "file name must not contain separators: {file_name}"
            )));
        }

        Ok(Self { dir, file_name })
    }

    /// The directory part, relative to the storage root
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// The file name part
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `dir/file_name` as a relative path
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.file_name)
    }
}

impl Default for SlotPath {
    fn default() -> Self {
        Self {
            dir: DEFAULT_SLOT_DIR.to_string(),
            file_name: DEFAULT_SLOT_FILE.to_string(),
        }
    }
}

impl Display for SlotPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dir, self.file_name)
    }
}

fn validate_relative(part: &str) -> Result<(), DomainError> {
    if part.trim().is_empty() {
        return Err(DomainError::InvalidStoragePath(
            "path component must not be empty".to_string(),
        ));
    }

    let path = Path::new(part);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(DomainError::InvalidStoragePath(format!(
            "must be a relative path inside the storage root: {part}"
        )));
    }

    Ok(())
}
