//! Error types for the vrsync CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=not_found, 5=partial, 6=remote, 7=config, ...)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::sync::SyncError;

/// Result type alias for vrsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Not Found (exit 3)
    PackageNotFound,
    DescriptorNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Partial failure / prerequisites (exit 5)
    PartialFailure,
    MissingGroups,
    EmptyManifest,

    // Remote (exit 6)
    ConnectionError,
    RemoteError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
    ArchiveError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::PackageNotFound => "PACKAGE_NOT_FOUND",
            Self::DescriptorNotFound => "DESCRIPTOR_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::PartialFailure => "PARTIAL_FAILURE",
            Self::MissingGroups => "MISSING_GROUPS",
            Self::EmptyManifest => "EMPTY_MANIFEST",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::ArchiveError => "ARCHIVE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::PackageNotFound | Self::DescriptorNotFound => 3,
            Self::InvalidArgument => 4,
            Self::PartialFailure | Self::MissingGroups | Self::EmptyManifest => 5,
            Self::ConnectionError | Self::RemoteError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::ArchiveError => 8,
        }
    }

    /// Whether running the same command again may succeed.
    ///
    /// True for transport failures and bad arguments, false for content
    /// problems that need the project to change.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError | Self::RemoteError | Self::InvalidArgument
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in vrsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Package descriptor not found: {}", path.display())]
    DescriptorNotFound { path: PathBuf },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DescriptorNotFound { .. } => ErrorCode::DescriptorNotFound,
            Self::Sync(e) => match e {
                SyncError::Io(_) => ErrorCode::IoError,
                SyncError::Json(_) => ErrorCode::JsonError,
                SyncError::Zip(_) => ErrorCode::ArchiveError,
                SyncError::Configuration(_) => ErrorCode::ConfigError,
                SyncError::Connection { .. } => ErrorCode::ConnectionError,
                SyncError::Remote(_) => ErrorCode::RemoteError,
                SyncError::EmptyManifest(_) => ErrorCode::EmptyManifest,
                SyncError::PackageNotFound(_) => ErrorCode::PackageNotFound,
                SyncError::Batch { .. } => ErrorCode::PartialFailure,
                SyncError::MissingGroups { .. } => ErrorCode::MissingGroups,
            },
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::DescriptorNotFound { path } => Some(format!(
                "Create {} listing the content to export, or pass --descriptor.",
                path.display()
            )),

            Self::Config(msg) if msg.contains("validation failed") => Some(
                "Set the missing values with flags, VRSYNC_* environment variables \
                 or ~/.vrsync/config.json"
                    .to_string(),
            ),

            Self::Sync(SyncError::Connection { channel, .. }) => Some(format!(
                "Check SSH access to the server. For troubleshooting run: {channel}"
            )),

            Self::Sync(SyncError::MissingGroups { missing, .. }) => Some(format!(
                "Create the user groups {} on the server or remove them from \
                 dashboards/dashboardSharingMetadata.vrops.json",
                missing.join(", ")
            )),

            Self::Sync(SyncError::EmptyManifest(kind)) => Some(format!(
                "Remove '{kind}' from content.yaml or check the account's permissions."
            )),

            Self::Sync(SyncError::PackageNotFound(path)) => Some(format!(
                "No file or directory at {}. Build the package first.",
                path.display()
            )),

            Self::Remote(RemoteError::Status { status: 401, .. })
            | Self::Sync(SyncError::Remote(RemoteError::Status { status: 401, .. })) => Some(
                "The API token was rejected. Acquire a fresh token and set VRSYNC_TOKEN."
                    .to_string(),
            ),

            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        if let Self::Sync(SyncError::Batch { failures, .. }) = self {
            obj["error"]["failures"] = serde_json::to_value(failures).unwrap_or_default();
        }

        obj
    }
}
