//! Package descriptor (`content.yaml`).
//!
//! Lists, per category, the name patterns to pull from the server. A
//! category that is absent from the file is not exported at all.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::asset::AssetKind;
use crate::sync::{SyncError, SyncResult};

/// Requested content per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    #[serde(default)]
    pub view: Option<Vec<String>>,
    #[serde(default)]
    pub dashboard: Option<Vec<String>>,
    #[serde(default)]
    pub report: Option<Vec<String>>,
    #[serde(default)]
    pub alert_definition: Option<Vec<String>>,
    #[serde(default)]
    pub symptom_definition: Option<Vec<String>>,
    #[serde(default)]
    pub recommendation: Option<Vec<String>>,
    #[serde(default)]
    pub policy: Option<Vec<String>>,
    #[serde(default)]
    pub custom_group: Option<Vec<String>>,
    #[serde(default)]
    pub super_metric: Option<Vec<String>>,
    #[serde(default)]
    pub metric_config: Option<Vec<String>>,
}

impl PackageDescriptor {
    /// Load a descriptor from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!(
                "Cannot read package descriptor {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            SyncError::Configuration(msg) => {
                SyncError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse a descriptor from YAML text. An empty document is an empty descriptor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the YAML is malformed.
    pub fn from_yaml(content: &str) -> SyncResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| SyncError::Configuration(format!("Invalid package descriptor: {e}")))
    }

    /// Patterns requested for `kind`, or `None` if the category is absent.
    #[must_use]
    pub fn patterns(&self, kind: AssetKind) -> Option<&[String]> {
        let list = match kind {
            AssetKind::View => &self.view,
            AssetKind::Dashboard => &self.dashboard,
            AssetKind::Report => &self.report,
            AssetKind::AlertDefinition => &self.alert_definition,
            AssetKind::SymptomDefinition => &self.symptom_definition,
            AssetKind::Recommendation => &self.recommendation,
            AssetKind::Policy => &self.policy,
            AssetKind::CustomGroup => &self.custom_group,
            AssetKind::SuperMetric => &self.super_metric,
            AssetKind::MetricConfig => &self.metric_config,
        };
        list.as_deref()
    }

    /// Set the patterns for `kind`.
    pub fn set_patterns(&mut self, kind: AssetKind, patterns: Vec<String>) {
        let slot = match kind {
            AssetKind::View => &mut self.view,
            AssetKind::Dashboard => &mut self.dashboard,
            AssetKind::Report => &mut self.report,
            AssetKind::AlertDefinition => &mut self.alert_definition,
            AssetKind::SymptomDefinition => &mut self.symptom_definition,
            AssetKind::Recommendation => &mut self.recommendation,
            AssetKind::Policy => &mut self.policy,
            AssetKind::CustomGroup => &mut self.custom_group,
            AssetKind::SuperMetric => &mut self.super_metric,
            AssetKind::MetricConfig => &mut self.metric_config,
        };
        *slot = Some(patterns);
    }

    /// Builder-style variant of [`set_patterns`](Self::set_patterns).
    #[must_use]
    pub fn with(mut self, kind: AssetKind, patterns: &[&str]) -> Self {
        self.set_patterns(kind, patterns.iter().map(|p| (*p).to_string()).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_content_yaml() {
        let yaml = r"
view: [Foo*, Cluster Capacity]
alertDefinition:
  - High CPU
customGroup: []
";
        let descriptor = PackageDescriptor::from_yaml(yaml).unwrap();

        assert_eq!(
            descriptor.patterns(AssetKind::View).unwrap(),
            ["Foo*".to_string(), "Cluster Capacity".to_string()]
        );
        assert_eq!(descriptor.patterns(AssetKind::AlertDefinition).unwrap().len(), 1);
        assert_eq!(descriptor.patterns(AssetKind::CustomGroup), Some(&[][..]));
        assert!(descriptor.patterns(AssetKind::Dashboard).is_none());
    }

    #[test]
    fn test_empty_document() {
        let descriptor = PackageDescriptor::from_yaml("  \n").unwrap();
        assert_eq!(descriptor, PackageDescriptor::default());
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let result = PackageDescriptor::from_yaml("view: [unclosed");
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = PackageDescriptor::load(&temp_dir.path().join("content.yaml"));
        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }

    #[test]
    fn test_builder() {
        let descriptor = PackageDescriptor::default()
            .with(AssetKind::MetricConfig, &["vm-metrics"])
            .with(AssetKind::Policy, &["Default*"]);
        assert_eq!(
            descriptor.patterns(AssetKind::MetricConfig).unwrap(),
            ["vm-metrics".to_string()]
        );
        assert!(descriptor.patterns(AssetKind::Policy).is_some());
    }
}
