//! Sidecar metadata files.
//!
//! Two JSON files live beside the exported content and round-trip between
//! export and import:
//!
//! - `policies/policiesMetadata.vrops.json`: policy id to name, regenerated
//!   on every export so custom groups can be re-linked to policies by name
//!   on a server where the ids differ.
//! - `dashboards/dashboardSharingMetadata.vrops.json`: per action (`share`,
//!   `unshare`) the user groups of each dashboard. Seeded once with empty
//!   lists and then owned by the user.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::AssetKind;
use crate::sync::file::{atomic_write, write_json_pretty};
use crate::sync::types::{SyncError, SyncResult};

pub const POLICY_METADATA_FILENAME: &str = "policiesMetadata.vrops.json";
pub const SHARING_METADATA_FILENAME: &str = "dashboardSharingMetadata.vrops.json";

/// Policy id to policy name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyMetadata(BTreeMap<String, String>);

impl PolicyMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.0.insert(id.into(), name.into());
    }

    #[must_use]
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    /// Id of the policy called `name`, if any.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `<root>/policies/policiesMetadata.vrops.json`
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(AssetKind::Policy.dir_name()).join(POLICY_METADATA_FILENAME)
    }

    /// Overwrite the sidecar under `root` with this map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn store(&self, root: &Path) -> SyncResult<()> {
        let path = Self::path(root);
        info!("Generating policy metadata file '{POLICY_METADATA_FILENAME}'");
        write_json_pretty(&path, self)
    }

    /// Read the sidecar under `root`.
    ///
    /// A missing, unreadable or malformed file gives an empty map and a
    /// warning; custom groups then keep their policy references as is.
    #[must_use]
    pub fn load_or_empty(root: &Path) -> Self {
        let path = Self::path(root);
        if !path.exists() {
            if root.join(AssetKind::Policy.dir_name()).exists() {
                warn!("Policy metadata file '{POLICY_METADATA_FILENAME}' not found");
            }
            return Self::default();
        }

        info!("Reading policy metadata file '{POLICY_METADATA_FILENAME}'");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("An error occurred reading file {POLICY_METADATA_FILENAME}: {e}");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("An error occurred parsing metadata file {POLICY_METADATA_FILENAME}: {e}");
                Self::default()
            }
        }
    }
}

/// Sharing actions, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingAction {
    Share,
    Unshare,
}

impl SharingAction {
    pub const ALL: [Self; 2] = [Self::Share, Self::Unshare];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Share => "share",
            Self::Unshare => "unshare",
        }
    }
}

impl std::fmt::Display for SharingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard name to user group names.
pub type DashboardGroups = BTreeMap<String, Vec<String>>;

/// Dashboard sharing sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharingMetadata {
    #[serde(default)]
    pub share: DashboardGroups,
    #[serde(default)]
    pub unshare: DashboardGroups,
}

impl SharingMetadata {
    /// Template listing every dashboard under both actions with no groups.
    pub fn seed<S: AsRef<str>>(dashboards: &[S]) -> Self {
        let groups: DashboardGroups = dashboards
            .iter()
            .map(|d| (d.as_ref().to_string(), Vec::new()))
            .collect();
        Self {
            share: groups.clone(),
            unshare: groups,
        }
    }

    #[must_use]
    pub fn groups(&self, action: SharingAction) -> &DashboardGroups {
        match action {
            SharingAction::Share => &self.share,
            SharingAction::Unshare => &self.unshare,
        }
    }

    /// `<root>/dashboards/dashboardSharingMetadata.vrops.json`
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(AssetKind::Dashboard.dir_name()).join(SHARING_METADATA_FILENAME)
    }

    /// Write a seeded sidecar into `staging_root` unless one already exists
    /// there or in `project_root`. Returns `true` when a file was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the new file cannot be written.
    pub fn seed_if_absent<S: AsRef<str>>(
        staging_root: &Path,
        project_root: &Path,
        dashboards: &[S],
    ) -> SyncResult<bool> {
        let staged = Self::path(staging_root);
        if staged.exists() || Self::path(project_root).exists() {
            return Ok(false);
        }

        info!("Generating dashboard sharing metadata file '{SHARING_METADATA_FILENAME}'");
        let content = serde_json::to_vec_pretty(&Self::seed(dashboards))?;
        atomic_write(&staged, &content)?;
        Ok(true)
    }

    /// Read the sidecar under `root`.
    ///
    /// No dashboards directory or no file means nothing to share.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(root: &Path) -> SyncResult<Option<Self>> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(None);
        }

        info!("Reading dashboard sharing metadata file '{SHARING_METADATA_FILENAME}'");
        let content = fs::read_to_string(&path).map_err(|e| {
            SyncError::Configuration(format!(
                "An error occurred reading file '{SHARING_METADATA_FILENAME}': {e}"
            ))
        })?;
        serde_json::from_str(&content).map(Some).map_err(|e| {
            SyncError::Configuration(format!(
                "An error occurred parsing file '{SHARING_METADATA_FILENAME}': {e}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_policy_metadata_regenerated() {
        let temp_dir = TempDir::new().unwrap();
        let path = PolicyMetadata::path(temp_dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"1":"Old Name"}"#).unwrap();

        let mut metadata = PolicyMetadata::new();
        metadata.insert("2", "New Name");
        metadata.store(temp_dir.path()).unwrap();

        let loaded = PolicyMetadata::load_or_empty(temp_dir.path());
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.name_of("2"), Some("New Name"));
        assert!(loaded.name_of("1").is_none());
    }

    #[test]
    fn test_policy_lookup_by_name() {
        let mut metadata = PolicyMetadata::new();
        metadata.insert("42", "P1");
        metadata.insert("7", "Default Policy");

        assert_eq!(metadata.id_of("P1"), Some("42"));
        assert_eq!(metadata.id_of("Default Policy"), Some("7"));
        assert!(metadata.id_of("P9").is_none());
    }

    #[test]
    fn test_policy_metadata_bad_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = PolicyMetadata::path(temp_dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        assert!(PolicyMetadata::load_or_empty(temp_dir.path()).is_empty());
        assert!(PolicyMetadata::load_or_empty(&temp_dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_sharing_seed_shape() {
        let seeded = SharingMetadata::seed(&["Ops Overview", "Capacity"]);
        let json = serde_json::to_value(&seeded).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "share": {"Capacity": [], "Ops Overview": []},
                "unshare": {"Capacity": [], "Ops Overview": []}
            })
        );
    }

    #[test]
    fn test_sharing_seed_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("staging");
        let project = temp_dir.path().join("project");

        assert!(SharingMetadata::seed_if_absent(&staging, &project, &["D1"]).unwrap());

        let path = SharingMetadata::path(&staging);
        fs::write(&path, r#"{"share":{"D1":["Admins"]},"unshare":{}}"#).unwrap();
        assert!(!SharingMetadata::seed_if_absent(&staging, &project, &["D1", "D2"]).unwrap());

        let loaded = SharingMetadata::load(&staging).unwrap().unwrap();
        assert_eq!(loaded.share["D1"], vec!["Admins".to_string()]);
    }

    #[test]
    fn test_sharing_seed_skipped_when_project_has_file() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("staging");
        let project = temp_dir.path().join("project");
        let existing = SharingMetadata::path(&project);
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        fs::write(&existing, r#"{"share":{},"unshare":{}}"#).unwrap();

        assert!(!SharingMetadata::seed_if_absent(&staging, &project, &["D1"]).unwrap());
        assert!(!SharingMetadata::path(&staging).exists());
    }

    #[test]
    fn test_sharing_load_missing_and_malformed() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SharingMetadata::load(temp_dir.path()).unwrap().is_none());

        let path = SharingMetadata::path(temp_dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"share": ["not", "a", "map"]}"#).unwrap();
        assert!(matches!(
            SharingMetadata::load(temp_dir.path()),
            Err(SyncError::Configuration(_))
        ));
    }
}
