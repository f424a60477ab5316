//! Shared types for the WebDAV access layer
//!
//! This module contains the entry representation produced by listings, the
//! connection configuration and the error type shared by the adapter, the
//! mutation facade and the navigation layer.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Remote file/directory entry
///
/// Created fresh on every listing; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DavEntry {
    /// Resource identifier as returned by the server (directories end in `/`)
    pub uri: String,
    /// Absolute, percent-encoded path on the server (directories end in `/`)
    pub path: String,
    /// Decoded final path segment
    pub name: String,
    /// Whether the server reported a collection resource type
    pub is_dir: bool,
    /// Content length in bytes (files only, `None` when unknown)
    pub size: Option<u64>,
    /// Content type (files only, `None` when the server omits it)
    pub mime: Option<String>,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Opaque permission string reported by the server
    pub permissions: Option<String>,
}

impl DavEntry {
    /// Create a new directory entry
    pub fn directory(name: &str, path: &str) -> Self {
        let path = crate::paths::with_trailing_slash(path);
        Self {
            uri: path.clone(),
            path,
            name: name.to_string(),
            is_dir: true,
            size: None,
            mime: None,
            modified: None,
            created: None,
            permissions: None,
        }
    }

    /// Create a new file entry
    pub fn file(name: &str, path: &str, size: u64) -> Self {
        Self {
            uri: path.to_string(),
            path: path.to_string(),
            name: name.to_string(),
            is_dir: false,
            size: Some(size),
            mime: None,
            modified: None,
            created: None,
            permissions: None,
        }
    }
}

/// Document-collaboration properties of a single file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WopiProperties {
    pub wopi_url: Option<String>,
    pub token: Option<String>,
    pub token_ttl: Option<String>,
}

/// WebDAV connection configuration
#[derive(Debug, Clone)]
pub struct WebDavConfig {
    /// Storage root (e.g., https://cloud.example.com/remote.php/dav/files/user/), always ends in `/`
    pub root_url: Url,
    pub username: String,
    pub password: SecretString,
}

impl WebDavConfig {
    pub fn new(root_url: &str, username: &str, password: SecretString) -> Result<Self, DavError> {
        let trimmed = root_url.trim();
        if trimmed.is_empty() {
            return Err(DavError::InvalidConfig("WebDAV root URL is not set".to_string()));
        }
        let with_slash = crate::paths::with_trailing_slash(trimmed);
        let root_url = Url::parse(&with_slash)
            .map_err(|e| DavError::InvalidConfig(format!("Invalid WebDAV root URL '{}': {}", trimmed, e)))?;
        if !matches!(root_url.scheme(), "http" | "https") {
            return Err(DavError::InvalidConfig(format!(
                "Unsupported WebDAV URL scheme: {}",
                root_url.scheme()
            )));
        }
        if username.is_empty() {
            return Err(DavError::InvalidConfig("WebDAV username is not set".to_string()));
        }
        Ok(Self {
            root_url,
            username: username.to_string(),
            password,
        })
    }

    /// Path component of the storage root (e.g., "/remote.php/dav/files/user/")
    pub fn root_path(&self) -> &str {
        self.root_url.path()
    }

    /// Build the absolute URL of a storage path
    ///
    /// The storage path is already in canonical percent-encoded form and is
    /// appended verbatim.
    pub fn resource_url(&self, storage_path: &str) -> Result<Url, DavError> {
        let base = self.root_url.as_str().trim_end_matches('/');
        let path = storage_path.trim_start_matches('/');
        let joined = if path.is_empty() {
            format!("{}/", base)
        } else {
            format!("{}/{}", base, path)
        };
        let url = Url::parse(&joined)
            .map_err(|e| DavError::InvalidPath(format!("{}: {}", storage_path, e)))?;
        // URL parsing resolves dot segments; the result must stay under the root
        if !url.path().starts_with(self.root_url.path()) {
            return Err(DavError::InvalidPath(format!(
                "{} resolves outside the storage root",
                storage_path
            )));
        }
        Ok(url)
    }
}

/// Coarse error classification used by callers to decide presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Protocol,
    MalformedResponse,
    Configuration,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::MalformedResponse => write!(f, "malformed response"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

/// WebDAV error type
#[derive(Error, Debug)]
pub enum DavError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

impl DavError {
    /// Map a non-success HTTP status to a protocol error
    pub fn from_status(status: u16, target: &str) -> Self {
        match status {
            401 | 403 => DavError::AuthenticationFailed(format!(
                "server refused access to {} ({})",
                target, status
            )),
            404 => DavError::NotFound(target.to_string()),
            405 => DavError::MethodNotAllowed(target.to_string()),
            409 => DavError::Conflict(target.to_string()),
            _ => DavError::Status {
                status,
                message: target.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DavError::NetworkError(_) | DavError::Timeout(_) | DavError::IoError(_) => {
                ErrorKind::Transport
            }
            DavError::AuthenticationFailed(_)
            | DavError::NotFound(_)
            | DavError::Conflict(_)
            | DavError::MethodNotAllowed(_)
            | DavError::Status { .. } => ErrorKind::Protocol,
            DavError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            DavError::InvalidConfig(_) => ErrorKind::Configuration,
            DavError::InvalidPath(_) | DavError::InvalidName(_) => ErrorKind::Validation,
        }
    }

    /// HTTP status behind a protocol error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DavError::NotFound(_) => Some(404),
            DavError::Conflict(_) => Some(409),
            DavError::MethodNotAllowed(_) => Some(405),
            DavError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DavError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DavError::Timeout(e.to_string())
        } else {
            DavError::NetworkError(e.to_string())
        }
    }
}
