//! In-memory server fakes shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use vrsync::model::{AssetSummary, DefinitionKind, PolicySummary, RemoteAsset};
use vrsync::remote::{
    ChannelError, ChannelResult, CommandChannel, DependentDefinitions, QueryApi, RemoteError,
    RemoteResult,
};
use vrsync::sync::PolicyMetadata;

/// Zip archive bytes holding `entries`.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Entries of the zip archive at `path`, sorted by name.
pub fn zip_entries(path: &Path) -> BTreeMap<String, String> {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = String::new();
        std::io::Read::read_to_string(&mut file, &mut content).unwrap();
        entries.insert(file.name().to_string(), content);
    }
    entries
}

/// Write `content` to `root/relative`, creating parents.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Minimal view XML with the given id.
pub fn view_xml(id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Content>
    <Views>
        <ViewDef id="{id}">
            <Title>view.{id}.title</Title>
        </ViewDef>
    </Views>
</Content>
"#
    )
}

// ── Query API ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionPush {
    pub kind: DefinitionKind,
    pub ids: Vec<String>,
    pub dependents: Vec<String>,
}

#[derive(Default)]
pub struct FakeQuery {
    pub views: Vec<AssetSummary>,
    pub reports: Vec<AssetSummary>,
    pub super_metrics: Vec<AssetSummary>,
    pub policies: Vec<PolicySummary>,
    pub policy_content: HashMap<String, Vec<u8>>,
    pub custom_groups: Vec<RemoteAsset>,
    pub definitions: HashMap<DefinitionKind, Vec<RemoteAsset>>,
    pub user_groups: Vec<String>,
    pub failing_policies: HashSet<String>,

    pub definition_pushes: RefCell<Vec<DefinitionPush>>,
    pub custom_group_pushes: RefCell<Vec<(String, Value)>>,
    pub policy_pushes: RefCell<Vec<(String, bool)>>,
    pub group_lookups: RefCell<Vec<Vec<String>>>,
}

impl FakeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_views(mut self, names: &[&str]) -> Self {
        self.views = names.iter().map(|n| AssetSummary::new(*n)).collect();
        self
    }

    pub fn with_reports(mut self, names: &[&str]) -> Self {
        self.reports = names.iter().map(|n| AssetSummary::new(*n)).collect();
        self
    }

    pub fn with_super_metrics(mut self, names: &[&str]) -> Self {
        self.super_metrics = names.iter().map(|n| AssetSummary::new(*n)).collect();
        self
    }

    pub fn with_policy(mut self, id: &str, name: &str, content: &[u8]) -> Self {
        self.policies.push(PolicySummary {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.policy_content.insert(id.to_string(), content.to_vec());
        self
    }

    pub fn with_definition(mut self, kind: DefinitionKind, content: Value) -> Self {
        let asset = RemoteAsset::from_definition(kind, content).unwrap();
        self.definitions.entry(kind).or_default().push(asset);
        self
    }

    pub fn with_custom_group(mut self, content: Value) -> Self {
        self.custom_groups
            .push(RemoteAsset::from_custom_group(content).unwrap());
        self
    }

    pub fn with_user_groups(mut self, names: &[&str]) -> Self {
        self.user_groups = names.iter().map(ToString::to_string).collect();
        self
    }
}

impl QueryApi for FakeQuery {
    fn list_views(&self) -> RemoteResult<Vec<AssetSummary>> {
        Ok(self.views.clone())
    }

    fn list_reports(&self) -> RemoteResult<Vec<AssetSummary>> {
        Ok(self.reports.clone())
    }

    fn list_super_metrics(&self) -> RemoteResult<Vec<AssetSummary>> {
        Ok(self.super_metrics.clone())
    }

    fn list_policies(&self) -> RemoteResult<Vec<PolicySummary>> {
        Ok(self.policies.clone())
    }

    fn get_policy_content(&self, policy: &PolicySummary) -> RemoteResult<Vec<u8>> {
        self.policy_content
            .get(&policy.id)
            .cloned()
            .ok_or_else(|| RemoteError::InvalidPayload(format!("no content for {}", policy.id)))
    }

    fn list_custom_groups(&self) -> RemoteResult<Vec<RemoteAsset>> {
        Ok(self.custom_groups.clone())
    }

    fn list_definitions(&self, kind: DefinitionKind) -> RemoteResult<Vec<RemoteAsset>> {
        Ok(self.definitions.get(&kind).cloned().unwrap_or_default())
    }

    fn import_definitions(
        &self,
        kind: DefinitionKind,
        definitions: &BTreeMap<String, Value>,
        dependents: &DependentDefinitions,
    ) -> RemoteResult<()> {
        self.definition_pushes.borrow_mut().push(DefinitionPush {
            kind,
            ids: definitions.keys().cloned().collect(),
            dependents: dependents.ids().map(String::from).collect(),
        });
        Ok(())
    }

    fn import_custom_group(
        &self,
        name: &str,
        payload: &Value,
        _policies: &PolicyMetadata,
    ) -> RemoteResult<()> {
        self.custom_group_pushes
            .borrow_mut()
            .push((name.to_string(), payload.clone()));
        Ok(())
    }

    fn import_policy_archive(
        &self,
        name: &str,
        _archive: &[u8],
        overwrite: bool,
    ) -> RemoteResult<()> {
        self.policy_pushes
            .borrow_mut()
            .push((name.to_string(), overwrite));
        if self.failing_policies.contains(name) {
            return Err(RemoteError::Status {
                method: "POST".to_string(),
                url: "/api/policies/import".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }

    fn find_groups_by_name(&self, names: &[String]) -> RemoteResult<Vec<String>> {
        self.group_lookups.borrow_mut().push(names.to_vec());
        Ok(names
            .iter()
            .filter(|n| self.user_groups.contains(n))
            .cloned()
            .collect())
    }
}

// ── Command channel ───────────────────────────────────────────

/// Command channel that serves canned exports and records every call.
#[derive(Default)]
pub struct FakeChannel {
    /// `<kind>:<name>` to the files the export produces, keyed by file name.
    pub exports: HashMap<String, Vec<(String, Vec<u8>)>>,
    pub fail_connect: bool,
    pub fail_commands: bool,

    pub calls: Vec<String>,
    pub queued: Vec<PathBuf>,
    pub connected: bool,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `<name>.zip` holding `entries` for an export of `kind`.
    pub fn with_zip_export(mut self, kind: &str, name: &str, entries: &[(&str, &str)]) -> Self {
        self.exports.insert(
            format!("{kind}:{name}"),
            vec![(format!("{name}.zip"), zip_bytes(entries))],
        );
        self
    }

    /// Serve plain files for an export of `kind`.
    pub fn with_file_export(mut self, kind: &str, name: &str, files: &[(&str, &str)]) -> Self {
        self.exports.insert(
            format!("{kind}:{name}"),
            files
                .iter()
                .map(|(f, c)| ((*f).to_string(), c.as_bytes().to_vec()))
                .collect(),
        );
        self
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    fn export(&mut self, kind: &str, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.calls.push(format!("export_{kind}:{name}"));
        if !self.connected {
            return Err(ChannelError::new(format!("export {kind}"), "not connected"));
        }
        if self.fail_commands {
            return Err(ChannelError::new(format!("export {kind}"), "exit status 1"));
        }
        let Some(files) = self.exports.get(&format!("{kind}:{name}")) else {
            return Err(ChannelError::new(format!("export {kind}"), format!("'{name}' not found")));
        };
        for (file, content) in files {
            let path = dest_dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        Ok(())
    }

    fn enqueue(&mut self, kind: &str, file: &Path) -> ChannelResult<()> {
        self.calls.push(format!("add_{kind}:{}", file.display()));
        if !file.is_file() {
            return Err(ChannelError::new("queue", format!("{} missing", file.display())));
        }
        self.queued.push(file.to_path_buf());
        Ok(())
    }
}

impl CommandChannel for FakeChannel {
    fn connect(&mut self) -> ChannelResult<()> {
        self.calls.push("connect".to_string());
        if self.fail_connect {
            return Err(ChannelError::new("connect", "connection refused"));
        }
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.calls.push("close".to_string());
        self.connected = false;
    }

    fn describe(&self) -> String {
        "ssh -p 22 root@fake-ops".to_string()
    }

    fn export_view(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.export("view", name, dest_dir)
    }

    fn export_dashboard(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.export("dashboard", name, dest_dir)
    }

    fn export_report(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.export("report", name, dest_dir)
    }

    fn export_super_metric(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.export("supermetric", name, dest_dir)
    }

    fn export_metric_config(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        self.export("metricconfig", name, dest_dir)
    }

    fn add_view_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue("view", file)
    }

    fn add_dashboard_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue("dashboard", file)
    }

    fn add_report_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue("report", file)
    }

    fn add_super_metric_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue("supermetric", file)
    }

    fn add_metric_config_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue("metricconfig", file)
    }

    fn import_files(&mut self) -> ChannelResult<()> {
        self.calls.push(format!("import_files:{}", self.queued.len()));
        if self.fail_commands {
            return Err(ChannelError::new("import", "exit status 1"));
        }
        Ok(())
    }

    fn share_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()> {
        self.calls.push(format!("share:{name}:{}", groups.join(",")));
        Ok(())
    }

    fn unshare_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()> {
        self.calls.push(format!("unshare:{name}:{}", groups.join(",")));
        Ok(())
    }

    fn has_any_commands(&self) -> bool {
        !self.queued.is_empty()
    }

    fn cleanup(&mut self) {
        self.calls.push("cleanup".to_string());
        self.queued.clear();
    }
}
