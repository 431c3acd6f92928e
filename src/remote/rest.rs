//! Suite API client.
//!
//! Blocking `reqwest` client against `https://<host>:<port>/suite-api`.
//! Authentication uses a pre-acquired token sent as
//! `Authorization: vRealizeOpsToken <token>`.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::query::{DependentDefinitions, QueryApi, RemoteError, RemoteResult};
use crate::config::ConnectionSettings;
use crate::model::{AssetSummary, DefinitionKind, PolicySummary, RemoteAsset};
use crate::sync::metadata::PolicyMetadata;

/// Header enabling endpoints outside the public API (views listing).
const UNSUPPORTED_HEADER: &str = "X-vRealizeOps-API-use-unsupported";

const PAGE_SIZE: &str = "10000";

/// Suite API client.
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a client for `base_url` (e.g. `https://ops.local:443/suite-api`).
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: &str,
        insecure: bool,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("vRealizeOpsToken {token}"))
            .map_err(|e| RemoteError::InvalidPayload(format!("invalid token: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let base_url = base_url.into();
        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(insecure)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from resolved connection settings.
    ///
    /// # Errors
    ///
    /// See [`RestClient::new`].
    pub fn from_settings(settings: &ConnectionSettings) -> RemoteResult<Self> {
        Self::new(
            settings.suite_api_url(),
            settings.token.as_deref().unwrap_or_default(),
            settings.insecure,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn send(&self, method: &str, url: &str, request: RequestBuilder) -> RemoteResult<Response> {
        debug!(method, url, "Suite API request");
        let response = request.send().map_err(|e| RemoteError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(response)
    }

    fn check(method: &str, url: &str, response: Response) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(RemoteError::Status {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    fn get_json(&self, path: &str, query: &[(&str, &str)], internal: bool) -> RemoteResult<Value> {
        let url = self.url(path);
        let mut request = self.client.get(&url).query(query);
        if internal {
            request = request.header(UNSUPPORTED_HEADER, "true");
        }
        let response = Self::check("GET", &url, self.send("GET", &url, request)?)?;
        response.json().map_err(|e| RemoteError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// PUT to update; on 404 POST to create.
    fn upsert_json(&self, path: &str, payload: &Value) -> RemoteResult<()> {
        let url = self.url(path);
        let response = self.send("PUT", &url, self.client.put(&url).json(payload))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "Not found on update, creating");
            let response = self.send("POST", &url, self.client.post(&url).json(payload))?;
            Self::check("POST", &url, response)?;
            return Ok(());
        }
        Self::check("PUT", &url, response)?;
        Ok(())
    }

    fn existing_group_id(&self, name: &str) -> RemoteResult<Option<String>> {
        let body = self.get_json("/api/resources/groups", &[("name", name), ("pageSize", PAGE_SIZE)], false)?;
        Ok(items(&body, "groups")
            .iter()
            .filter_map(|g| RemoteAsset::from_custom_group(g.clone()))
            .find(|g| g.name == name)
            .and_then(|g| g.id))
    }
}

/// API path and response array key of each definition kind.
const fn definition_endpoint(kind: DefinitionKind) -> (&'static str, &'static str) {
    match kind {
        DefinitionKind::Symptom => ("/api/symptomdefinitions", "symptomDefinitions"),
        DefinitionKind::Recommendation => ("/api/recommendations", "recommendations"),
        DefinitionKind::Alert => ("/api/alertdefinitions", "alertDefinitions"),
    }
}

fn items<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `{key: [{id, name}, ...]}` to summaries; entries without a name are dropped.
fn parse_summaries(body: &Value, key: &str) -> Vec<AssetSummary> {
    items(body, key)
        .iter()
        .filter_map(|item| {
            let name = item.get("name").and_then(Value::as_str)?;
            Some(AssetSummary {
                id: item.get("id").and_then(Value::as_str).map(String::from),
                name: name.to_string(),
            })
        })
        .collect()
}

fn parse_policies(body: &Value) -> Vec<PolicySummary> {
    items(body, "policySummaries")
        .iter()
        .filter_map(|item| {
            Some(PolicySummary {
                id: item.get("id").and_then(Value::as_str)?.to_string(),
                name: item.get("name").and_then(Value::as_str)?.to_string(),
            })
        })
        .collect()
}

/// Package id to target id for every dependent the target already knows
/// under a different id. Definitions are matched by kind and name.
fn target_ids(
    dependents: &DependentDefinitions,
    listings: &[(DefinitionKind, Vec<RemoteAsset>)],
) -> BTreeMap<String, String> {
    let mut remap = BTreeMap::new();
    for (id, kind, definition) in dependents.iter() {
        let Some(name) = definition.get(kind.name_key()).and_then(Value::as_str) else {
            continue;
        };
        let target = listings
            .iter()
            .filter(|(listed_kind, _)| *listed_kind == kind)
            .flat_map(|(_, assets)| assets)
            .find(|asset| asset.name == name)
            .and_then(|asset| asset.id.as_deref());
        if let Some(target) = target {
            if target != id {
                debug!(kind = %kind, name, from = id, to = target, "Definition id differs on target");
                remap.insert(id.to_string(), target.to_string());
            }
        }
    }
    remap
}

/// Replace every string value and object key equal to a remapped id.
fn remap_ids(value: &mut Value, remap: &BTreeMap<String, String>) {
    if remap.is_empty() {
        return;
    }
    match value {
        Value::String(s) => {
            if let Some(target) = remap.get(s.as_str()) {
                target.clone_into(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                remap_ids(item, remap);
            }
        }
        Value::Object(map) => {
            for (key, mut item) in std::mem::take(map) {
                remap_ids(&mut item, remap);
                let key = remap.get(&key).cloned().unwrap_or(key);
                map.insert(key, item);
            }
        }
        _ => {}
    }
}

impl QueryApi for RestClient {
    fn list_views(&self) -> RemoteResult<Vec<AssetSummary>> {
        let body = self.get_json("/internal/views", &[], true)?;
        Ok(parse_summaries(&body, "views"))
    }

    fn list_reports(&self) -> RemoteResult<Vec<AssetSummary>> {
        let body = self.get_json("/api/reportdefinitions", &[("pageSize", PAGE_SIZE)], false)?;
        Ok(parse_summaries(&body, "reportDefinitions"))
    }

    fn list_super_metrics(&self) -> RemoteResult<Vec<AssetSummary>> {
        let body = self.get_json("/api/supermetrics", &[("pageSize", PAGE_SIZE)], false)?;
        Ok(parse_summaries(&body, "superMetrics"))
    }

    fn list_policies(&self) -> RemoteResult<Vec<PolicySummary>> {
        let body = self.get_json("/api/policies", &[], false)?;
        Ok(parse_policies(&body))
    }

    fn get_policy_content(&self, policy: &PolicySummary) -> RemoteResult<Vec<u8>> {
        let url = self.url("/api/policies/export");
        let request = self
            .client
            .get(&url)
            .query(&[("id", policy.id.as_str())])
            .header(ACCEPT, "application/zip");
        let response = Self::check("GET", &url, self.send("GET", &url, request)?)?;
        let bytes = response.bytes().map_err(|e| RemoteError::Decode {
            url,
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    fn list_custom_groups(&self) -> RemoteResult<Vec<RemoteAsset>> {
        let body = self.get_json("/api/resources/groups", &[("pageSize", PAGE_SIZE)], false)?;
        Ok(items(&body, "groups")
            .iter()
            .filter_map(|g| RemoteAsset::from_custom_group(g.clone()))
            .collect())
    }

    fn list_definitions(&self, kind: DefinitionKind) -> RemoteResult<Vec<RemoteAsset>> {
        let (path, key) = definition_endpoint(kind);
        let body = self.get_json(path, &[("pageSize", PAGE_SIZE)], false)?;
        Ok(items(&body, key)
            .iter()
            .filter_map(|d| RemoteAsset::from_definition(kind, d.clone()))
            .collect())
    }

    fn import_definitions(
        &self,
        kind: DefinitionKind,
        definitions: &BTreeMap<String, Value>,
        dependents: &DependentDefinitions,
    ) -> RemoteResult<()> {
        let (path, _) = definition_endpoint(kind);
        let mut listings = Vec::new();
        for dependent_kind in dependents.kinds() {
            listings.push((dependent_kind, self.list_definitions(dependent_kind)?));
        }
        let remap = target_ids(dependents, &listings);
        debug!(kind = %kind, count = definitions.len(), remapped = remap.len(), "Pushing definitions");

        let mut failures = Vec::new();
        for (id, definition) in definitions {
            info!("Importing {kind}: '{id}'");
            let mut payload = definition.clone();
            remap_ids(&mut payload, &remap);
            if let Err(e) = self.upsert_json(path, &payload) {
                warn!("Unable to import {kind} '{id}': {e}");
                failures.push(format!("{id}: {e}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RemoteError::InvalidPayload(failures.join("; ")))
        }
    }

    fn import_custom_group(
        &self,
        name: &str,
        payload: &Value,
        policies: &PolicyMetadata,
    ) -> RemoteResult<()> {
        let mut payload = payload.clone();
        let Some(object) = payload.as_object_mut() else {
            return Err(RemoteError::InvalidPayload(format!(
                "custom group '{name}' is not a JSON object"
            )));
        };

        if let Some(policy) = object.get("policy").and_then(Value::as_str) {
            if !policies.is_empty() && policies.name_of(policy).is_none() {
                warn!("Custom group '{name}' references policy '{policy}' missing from policy metadata");
            }
        }

        let url = self.url("/api/resources/groups");
        match self.existing_group_id(name)? {
            Some(id) => {
                object.insert("id".to_string(), Value::String(id));
                let response = self.send("PUT", &url, self.client.put(&url).json(&payload))?;
                Self::check("PUT", &url, response)?;
            }
            None => {
                object.remove("id");
                let response = self.send("POST", &url, self.client.post(&url).json(&payload))?;
                Self::check("POST", &url, response)?;
            }
        }
        Ok(())
    }

    fn import_policy_archive(&self, name: &str, archive: &[u8], overwrite: bool) -> RemoteResult<()> {
        let url = self.url("/api/policies/import");
        let part = multipart::Part::bytes(archive.to_vec())
            .file_name(format!("{name}.zip"))
            .mime_str("application/zip")
            .map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;
        let form = multipart::Form::new().part("policy", part);
        let request = self
            .client
            .post(&url)
            .query(&[("forceImport", overwrite.to_string())])
            .multipart(form);
        Self::check("POST", &url, self.send("POST", &url, request)?)?;
        Ok(())
    }

    fn find_groups_by_name(&self, names: &[String]) -> RemoteResult<Vec<String>> {
        let body = self.get_json("/api/auth/usergroups", &[], false)?;
        Ok(items(&body, "userGroups")
            .iter()
            .filter_map(|g| g.get("name").and_then(Value::as_str))
            .filter(|n| names.iter().any(|wanted| wanted == n))
            .map(String::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_summaries_skips_unnamed() {
        let body = json!({
            "views": [
                {"id": "v-1", "name": "FooBar"},
                {"id": "v-2"},
                {"name": "Baz"}
            ]
        });
        let summaries = parse_summaries(&body, "views");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id.as_deref(), Some("v-1"));
        assert_eq!(summaries[1].name, "Baz");
    }

    #[test]
    fn test_parse_summaries_missing_key() {
        assert!(parse_summaries(&json!({}), "reportDefinitions").is_empty());
    }

    #[test]
    fn test_parse_policies() {
        let body = json!({"policySummaries": [{"id": "42", "name": "P1"}, {"name": "no id"}]});
        assert_eq!(
            parse_policies(&body),
            vec![PolicySummary {
                id: "42".to_string(),
                name: "P1".to_string()
            }]
        );
    }

    #[test]
    fn test_definition_endpoints() {
        assert_eq!(definition_endpoint(DefinitionKind::Alert).0, "/api/alertdefinitions");
        assert_eq!(definition_endpoint(DefinitionKind::Recommendation).1, "recommendations");
    }

    #[test]
    fn test_references_follow_target_ids() {
        let mut dependents = DependentDefinitions::new();
        let mut symptoms = BTreeMap::new();
        symptoms.insert("SymptomDefinition-1".to_string(), json!({"name": "CPU high"}));
        symptoms.insert("SymptomDefinition-2".to_string(), json!({"name": "Disk full"}));
        dependents.extend_from(DefinitionKind::Symptom, &symptoms);
        let mut recommendations = BTreeMap::new();
        recommendations.insert("Recommendation-1".to_string(), json!({"description": "Restart"}));
        dependents.extend_from(DefinitionKind::Recommendation, &recommendations);

        let listings = vec![
            (
                DefinitionKind::Symptom,
                vec![
                    RemoteAsset::from_definition(
                        DefinitionKind::Symptom,
                        json!({"id": "SymptomDefinition-77", "name": "CPU high"}),
                    )
                    .unwrap(),
                    RemoteAsset::from_definition(
                        DefinitionKind::Symptom,
                        json!({"id": "SymptomDefinition-2", "name": "Disk full"}),
                    )
                    .unwrap(),
                ],
            ),
            (
                DefinitionKind::Recommendation,
                vec![RemoteAsset::from_definition(
                    DefinitionKind::Recommendation,
                    json!({"id": "Recommendation-9", "description": "Restart"}),
                )
                .unwrap()],
            ),
        ];

        let remap = target_ids(&dependents, &listings);
        assert_eq!(remap.len(), 2);
        assert_eq!(remap["SymptomDefinition-1"], "SymptomDefinition-77");

        let mut alert = json!({
            "id": "AlertDefinition-1",
            "name": "VM CPU",
            "states": [{
                "base-symptom-set": {
                    "symptomDefinitionIds": ["SymptomDefinition-1", "SymptomDefinition-2"]
                },
                "recommendationPriorityMap": {"Recommendation-1": 1}
            }]
        });
        remap_ids(&mut alert, &remap);

        assert_eq!(alert["id"], "AlertDefinition-1");
        assert_eq!(
            alert["states"][0]["base-symptom-set"]["symptomDefinitionIds"],
            json!(["SymptomDefinition-77", "SymptomDefinition-2"])
        );
        assert_eq!(
            alert["states"][0]["recommendationPriorityMap"],
            json!({"Recommendation-9": 1})
        );
    }

    #[test]
    fn test_unknown_dependents_keep_their_ids() {
        let mut dependents = DependentDefinitions::new();
        let mut symptoms = BTreeMap::new();
        symptoms.insert("SymptomDefinition-1".to_string(), json!({"name": "New symptom"}));
        dependents.extend_from(DefinitionKind::Symptom, &symptoms);

        let remap = target_ids(&dependents, &[(DefinitionKind::Symptom, Vec::new())]);
        assert!(remap.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = RestClient::new(
            "https://ops.example.com:443/suite-api/",
            "token",
            false,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url("/api/policies"),
            "https://ops.example.com:443/suite-api/api/policies"
        );
    }
}
