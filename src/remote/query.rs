//! Query API contract.
//!
//! Everything that is exchanged with the server as JSON (or, for policies,
//! as a zip payload over HTTP) goes through [`QueryApi`]. Implemented by
//! [`RestClient`](super::rest::RestClient); tests substitute in-memory fakes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{AssetSummary, DefinitionKind, PolicySummary, RemoteAsset};
use crate::sync::metadata::PolicyMetadata;

/// Errors raised by the query API.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure (connect, TLS, timeout).
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The payload handed to the client is unusable.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for query API calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Definitions accumulated across the ordered definition imports, keyed by
/// their id in the package.
///
/// Symptoms are imported first, then recommendations, then alerts. Each
/// step adds its own definitions here before pushing, so a later kind can
/// resolve references to definitions pushed earlier in the same run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependentDefinitions(BTreeMap<String, (DefinitionKind, Value)>);

impl DependentDefinitions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every `(id, definition)` pair of `definitions`, all of `kind`.
    pub fn extend_from(&mut self, kind: DefinitionKind, definitions: &BTreeMap<String, Value>) {
        for (id, definition) in definitions {
            self.0.insert(id.clone(), (kind, definition.clone()));
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(id, kind, definition)` for every accumulated definition.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DefinitionKind, &Value)> {
        self.0
            .iter()
            .map(|(id, (kind, definition))| (id.as_str(), *kind, definition))
    }

    /// Kinds present, in import order.
    #[must_use]
    pub fn kinds(&self) -> Vec<DefinitionKind> {
        DefinitionKind::IMPORT_ORDER
            .into_iter()
            .filter(|kind| self.0.values().any(|(k, _)| k == kind))
            .collect()
    }
}

/// JSON-level access to the server.
pub trait QueryApi {
    /// Views known to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_views(&self) -> RemoteResult<Vec<AssetSummary>>;

    /// Reports known to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_reports(&self) -> RemoteResult<Vec<AssetSummary>>;

    /// Super metrics known to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_super_metrics(&self) -> RemoteResult<Vec<AssetSummary>>;

    /// Policies known to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_policies(&self) -> RemoteResult<Vec<PolicySummary>>;

    /// Zip export of one policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn get_policy_content(&self, policy: &PolicySummary) -> RemoteResult<Vec<u8>>;

    /// Custom groups with their full definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_custom_groups(&self) -> RemoteResult<Vec<RemoteAsset>>;

    /// All definitions of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn list_definitions(&self, kind: DefinitionKind) -> RemoteResult<Vec<RemoteAsset>>;

    /// Create or update the definitions of `kind`, keyed by id.
    ///
    /// `dependents` holds every definition pushed so far in this run,
    /// including `definitions` itself. Implementations use it to rewrite
    /// references between definitions whose ids differ on the target.
    ///
    /// # Errors
    ///
    /// Returns an error if any definition cannot be pushed.
    fn import_definitions(
        &self,
        kind: DefinitionKind,
        definitions: &BTreeMap<String, Value>,
        dependents: &DependentDefinitions,
    ) -> RemoteResult<()>;

    /// Create or update a custom group.
    ///
    /// # Errors
    ///
    /// Returns an error if the group cannot be pushed.
    fn import_custom_group(
        &self,
        name: &str,
        payload: &Value,
        policies: &PolicyMetadata,
    ) -> RemoteResult<()>;

    /// Upload a policy zip.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    fn import_policy_archive(&self, name: &str, archive: &[u8], overwrite: bool)
    -> RemoteResult<()>;

    /// Names of the given user groups that exist on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn find_groups_by_name(&self, names: &[String]) -> RemoteResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dependents_accumulate() {
        let mut dependents = DependentDefinitions::new();

        let mut symptoms = BTreeMap::new();
        symptoms.insert("SymptomDefinition-1".to_string(), json!({"name": "CPU high"}));
        dependents.extend_from(DefinitionKind::Symptom, &symptoms);

        let mut alerts = BTreeMap::new();
        alerts.insert("AlertDefinition-1".to_string(), json!({"name": "VM CPU"}));
        dependents.extend_from(DefinitionKind::Alert, &alerts);

        assert_eq!(dependents.len(), 2);
        assert!(dependents.contains("SymptomDefinition-1"));
        assert_eq!(
            dependents.kinds(),
            vec![DefinitionKind::Symptom, DefinitionKind::Alert]
        );
        assert_eq!(
            dependents.ids().collect::<Vec<_>>(),
            vec!["AlertDefinition-1", "SymptomDefinition-1"]
        );
    }
}
