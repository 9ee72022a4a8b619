//! Error types and result handling for nehnes-av.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scanner operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file: {path}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Detection Engine Errors =====
    #[error("Rule database not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("Failed to load rule database: {0}")]
    SignatureLoad(String),

    #[error("Rule compilation failed: {0}")]
    RuleCompilation(String),

    // ===== Scanning Errors =====
    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Scan worker failed: {0}")]
    ScanWorker(String),

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file delete error, promoting permission failures.
    pub fn file_delete(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::FileDelete { path, source },
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            source,
        }
    }

    /// Short human-readable reason, used in per-path outcome records.
    pub fn reason(&self) -> String {
        match self {
            Error::PathNotFound(_) => "file not found".to_string(),
            Error::PermissionDenied { .. } => "permission denied".to_string(),
            Error::FileRead { source, .. }
            | Error::FileDelete { source, .. }
            | Error::DirectoryAccess { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::PathNotFound(_) => Some("Check that the path exists and is accessible"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::DatabaseNotFound(_) => {
                Some("Place *.json rule files in the rules directory or pass --rules")
            }
            Error::SignatureLoad(_) | Error::RuleCompilation(_) => {
                Some("Fix or remove the offending rule file; scanning continues in basic mode")
            }
            Error::ScanInProgress => Some("Wait for the running scan to finish or cancel it"),
            _ => None,
        }
    }
}
