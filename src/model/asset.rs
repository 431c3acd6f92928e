//! Asset categories and remote asset records.
//!
//! Every piece of content the synchronizer moves belongs to exactly one
//! [`AssetKind`]. The kind decides where the content lives in the project
//! tree and which remote channel carries it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of content categories handled by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    View,
    Dashboard,
    Report,
    AlertDefinition,
    SymptomDefinition,
    Recommendation,
    Policy,
    CustomGroup,
    SuperMetric,
    MetricConfig,
}

impl AssetKind {
    /// All kinds, in export order.
    pub const ALL: [Self; 10] = [
        Self::View,
        Self::Dashboard,
        Self::Report,
        Self::AlertDefinition,
        Self::SymptomDefinition,
        Self::Recommendation,
        Self::Policy,
        Self::CustomGroup,
        Self::SuperMetric,
        Self::MetricConfig,
    ];

    /// Subdirectory of the project tree holding this kind.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::View => "views",
            Self::Dashboard => "dashboards",
            Self::Report => "reports",
            Self::AlertDefinition => "alert_definitions",
            Self::SymptomDefinition => "symptom_definitions",
            Self::Recommendation => "recommendations",
            Self::Policy => "policies",
            Self::CustomGroup => "custom_groups",
            Self::SuperMetric => "supermetrics",
            Self::MetricConfig => "metricconfigs",
        }
    }

    /// Key used for this kind in `content.yaml`.
    #[must_use]
    pub const fn manifest_key(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Dashboard => "dashboard",
            Self::Report => "report",
            Self::AlertDefinition => "alertDefinition",
            Self::SymptomDefinition => "symptomDefinition",
            Self::Recommendation => "recommendation",
            Self::Policy => "policy",
            Self::CustomGroup => "customGroup",
            Self::SuperMetric => "superMetric",
            Self::MetricConfig => "metricConfig",
        }
    }

    /// Human-readable plural label for logs and summaries.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::View => "views",
            Self::Dashboard => "dashboards",
            Self::Report => "reports",
            Self::AlertDefinition => "alert definitions",
            Self::SymptomDefinition => "symptom definitions",
            Self::Recommendation => "recommendations",
            Self::Policy => "policies",
            Self::CustomGroup => "custom groups",
            Self::SuperMetric => "super metrics",
            Self::MetricConfig => "metric configs",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// The three definition categories exchanged as JSON over the query API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Symptom,
    Recommendation,
    Alert,
}

impl DefinitionKind {
    /// Import order. Later kinds may reference ids of earlier ones.
    pub const IMPORT_ORDER: [Self; 3] = [Self::Symptom, Self::Recommendation, Self::Alert];

    #[must_use]
    pub const fn asset_kind(self) -> AssetKind {
        match self {
            Self::Symptom => AssetKind::SymptomDefinition,
            Self::Recommendation => AssetKind::Recommendation,
            Self::Alert => AssetKind::AlertDefinition,
        }
    }

    /// JSON field carrying the display name. Recommendations have no name,
    /// so their description stands in for it.
    #[must_use]
    pub const fn name_key(self) -> &'static str {
        match self {
            Self::Recommendation => "description",
            Self::Symptom | Self::Alert => "name",
        }
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.asset_kind().fmt(f)
    }
}

/// A named entry of a remote manifest (views, reports, super metrics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

impl AssetSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// A policy as listed by the server. Its zip payload is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub id: String,
    pub name: String,
}

/// A JSON asset fetched from or pushed to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAsset {
    pub name: String,
    pub id: Option<String>,
    pub content: Value,
}

impl RemoteAsset {
    /// Build a definition asset from its server representation.
    ///
    /// Returns `None` when the name field for `kind` is missing or blank.
    #[must_use]
    pub fn from_definition(kind: DefinitionKind, content: Value) -> Option<Self> {
        let name = content
            .get(kind.name_key())
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())?
            .to_string();
        let id = content.get("id").and_then(Value::as_str).map(String::from);
        Some(Self { name, id, content })
    }

    /// Build a custom group asset; the name lives under `resourceKey.name`.
    #[must_use]
    pub fn from_custom_group(content: Value) -> Option<Self> {
        let name = content
            .pointer("/resourceKey/name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())?
            .to_string();
        let id = content.get("id").and_then(Value::as_str).map(String::from);
        Some(Self { name, id, content })
    }
}
