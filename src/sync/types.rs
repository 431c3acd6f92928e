//! Sync types: errors, batch failure reports and run statistics.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::model::{AssetKind, Package};
use crate::remote::RemoteError;

/// One failed item inside a batch.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Category the item belongs to.
    pub kind: AssetKind,
    /// Asset name or file path that failed.
    pub item: String,
    /// Rendered error message.
    pub message: String,
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.item, self.message)
    }
}

/// Accumulates per-item failures so sibling items keep going.
///
/// Converted into a single [`SyncError::Batch`] by [`BatchReport::into_result`]
/// once every item of the batch has been attempted.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    failures: Vec<ItemFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and log it.
    pub fn record(&mut self, kind: AssetKind, item: impl Into<String>, error: impl std::fmt::Display) {
        let item = item.into();
        let message = error.to_string();
        tracing::error!(kind = %kind, item = %item, "{message}");
        self.failures.push(ItemFailure {
            kind,
            item,
            message,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// `Ok(())` when nothing failed, else one `Batch` error carrying every failure.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Batch`] if at least one failure was recorded.
    pub fn into_result(self, context: impl Into<String>) -> SyncResult<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Batch {
                context: context.into(),
                failures: self.failures,
            })
        }
    }
}

/// Statistics for an export operation: assets staged per category.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Staged asset count keyed by manifest key.
    pub assets: BTreeMap<String, usize>,
    /// Whether the staged tree was copied into the project.
    pub written: bool,
}

impl ExportStats {
    pub fn add(&mut self, kind: AssetKind, count: usize) {
        *self.assets.entry(kind.manifest_key().to_string()).or_default() += count;
    }

    #[must_use]
    pub fn count(&self, kind: AssetKind) -> usize {
        self.assets.get(kind.manifest_key()).copied().unwrap_or(0)
    }

    /// Total number of assets staged.
    #[must_use]
    pub fn total(&self) -> usize {
        self.assets.values().sum()
    }

    /// Returns true if nothing was exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn merge(&mut self, other: &Self) {
        for (key, count) in &other.assets {
            *self.assets.entry(key.clone()).or_default() += count;
        }
        self.written |= other.written;
    }
}

/// Statistics for an import operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Files registered on the command channel, keyed by manifest key.
    pub queued: BTreeMap<String, usize>,
    /// Assets pushed over the query API, keyed by manifest key.
    pub pushed: BTreeMap<String, usize>,
    /// Dashboards shared.
    pub shared: usize,
    /// Dashboards unshared.
    pub unshared: usize,
    /// Whether the channel batch was submitted.
    pub submitted: bool,
}

impl ImportStats {
    pub fn add_queued(&mut self, kind: AssetKind, count: usize) {
        *self.queued.entry(kind.manifest_key().to_string()).or_default() += count;
    }

    pub fn add_pushed(&mut self, kind: AssetKind, count: usize) {
        *self.pushed.entry(kind.manifest_key().to_string()).or_default() += count;
    }

    #[must_use]
    pub fn total_queued(&self) -> usize {
        self.queued.values().sum()
    }

    #[must_use]
    pub fn total_pushed(&self) -> usize {
        self.pushed.values().sum()
    }

    /// Total number of assets processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total_queued() + self.total_pushed() + self.shared + self.unshared
    }

    pub fn merge(&mut self, other: &Self) {
        for (key, count) in &other.queued {
            *self.queued.entry(key.clone()).or_default() += count;
        }
        for (key, count) in &other.pushed {
            *self.pushed.entry(key.clone()).or_default() += count;
        }
        self.shared += other.shared;
        self.unshared += other.unshared;
        self.submitted |= other.submitted;
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed XML, unexpected structure or a bad sidecar file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command channel failure (open or command).
    #[error("Connection error for package {package} using {channel}: {message}")]
    Connection {
        package: String,
        channel: String,
        message: String,
    },

    /// Query API failure.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The server returned no assets of a category that needs a manifest.
    #[error("No {} available on the server", .0.label())]
    EmptyManifest(AssetKind),

    /// A package path given for import does not exist.
    #[error("Package not found: {}", .0.display())]
    PackageNotFound(PathBuf),

    /// One or more items of a batch failed.
    #[error("{context}: {} item(s) failed: {}", .failures.len(), join_failures(.failures))]
    Batch {
        context: String,
        failures: Vec<ItemFailure>,
    },

    /// Dashboard sharing references groups the server does not know.
    #[error("Cannot {action} dashboard '{dashboard}': user groups not found on the server: {}", .missing.join(", "))]
    MissingGroups {
        action: String,
        dashboard: String,
        missing: Vec<String>,
    },
}

impl SyncError {
    /// Channel failure while working on `package`, logged at error.
    pub fn connection(package: &Package, channel: impl Into<String>, message: impl std::fmt::Display) -> Self {
        let err = Self::Connection {
            package: package.fq_name(),
            channel: channel.into(),
            message: message.to_string(),
        };
        tracing::error!("{err}");
        err
    }
}

fn join_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
