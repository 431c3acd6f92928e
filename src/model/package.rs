//! Package model.
//!
//! A package is a local content container: a project directory on export,
//! a zip archive (or expanded directory) on import.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Package type recorded in staging directory names.
pub const PACKAGE_TYPE: &str = "vrops";

/// A local package taking part in a synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Project directory (export) or package archive (import)
    pub filesystem_path: PathBuf,

    /// Logical package name
    pub name: String,

    /// Package type, always `vrops` for this store
    #[serde(default = "default_type")]
    pub package_type: String,

    /// Optional numeric id, used only to name staging directories
    pub id: Option<u64>,

    /// Package version
    pub version: String,
}

fn default_type() -> String {
    PACKAGE_TYPE.to_string()
}

impl Package {
    /// Create a package rooted at `path`.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            filesystem_path: path.into(),
            name: name.into(),
            package_type: default_type(),
            id: None,
            version: version.into(),
        }
    }

    /// Derive a package from a path, taking the name from the file stem.
    ///
    /// `my-content-1.0.0.zip` becomes name `my-content`, version `1.0.0`
    /// when the stem ends in a dotted version; otherwise the version is
    /// `0.0.0`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "package".to_string());

        let (name, version) = split_version(&stem);
        Self::new(path, name, version)
    }

    /// Fully qualified name used in log and error messages.
    #[must_use]
    pub fn fq_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.filesystem_path
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.fq_name(), self.filesystem_path.display())
    }
}

/// Split `name-1.2.3` into (`name`, `1.2.3`).
fn split_version(stem: &str) -> (String, String) {
    if let Some((name, version)) = stem.rsplit_once('-') {
        let looks_like_version = !version.is_empty()
            && version.split('.').all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        if looks_like_version && !name.is_empty() {
            return (name.to_string(), version.to_string());
        }
    }
    (stem.to_string(), "0.0.0".to_string())
}
