//! Import: a staged package pushed to the server.
//!
//! Archive-based content (views, dashboards, reports, super metrics and
//! metric configs) is queued on the command channel and submitted in one
//! round trip. Definitions, policies and custom groups go over the query
//! API. Dashboard sharing is applied last.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{AssetKind, DefinitionKind, Package, RemoteAsset};
use crate::remote::{ChannelResult, ChannelSession, CommandChannel, DependentDefinitions, QueryApi};
use crate::sync::archive::{build_dashboard_archive, build_report_archive, build_view_archive};
use crate::sync::file::{base_name, list_dirs, list_files};
use crate::sync::metadata::{PolicyMetadata, SharingAction, SharingMetadata, SHARING_METADATA_FILENAME};
use crate::sync::types::{BatchReport, ImportStats, SyncError, SyncResult};

/// Pushes one unpacked package to the server.
pub struct Importer<'a> {
    query: &'a dyn QueryApi,
    channel: &'a mut dyn CommandChannel,
    package: &'a Package,
    staging_root: &'a Path,
    dry_run: bool,
    stats: ImportStats,
}

impl<'a> Importer<'a> {
    /// Create an importer for the package unpacked under `staging_root`.
    pub fn new(
        query: &'a dyn QueryApi,
        channel: &'a mut dyn CommandChannel,
        package: &'a Package,
        staging_root: &'a Path,
        dry_run: bool,
    ) -> Self {
        Self {
            query,
            channel,
            package,
            staging_root,
            dry_run,
            stats: ImportStats::default(),
        }
    }

    /// Queue and submit the channel batch, then push everything else.
    ///
    /// On a dry run the batch is built and logged but nothing reaches the
    /// server.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or a batch error once every item of a
    /// category has been attempted.
    pub fn import(mut self) -> SyncResult<ImportStats> {
        info!("Importing package {}", self.package);

        self.queue_archives()?;
        self.submit_archives()?;

        if self.dry_run {
            info!("Dry run: skipping definitions, policies, custom groups and dashboard sharing");
            return Ok(self.stats);
        }

        let mut dependents = DependentDefinitions::new();
        self.import_definitions(&mut dependents)?;
        self.import_policies()?;
        self.import_custom_groups()?;
        self.apply_sharing()?;

        Ok(self.stats)
    }

    fn kind_dir(&self, kind: AssetKind) -> PathBuf {
        self.staging_root.join(kind.dir_name())
    }

    fn channel_error(&self, message: impl std::fmt::Display) -> SyncError {
        SyncError::connection(self.package, self.channel.describe(), message)
    }

    /// Register every channel-carried file found in the staging tree.
    fn queue_archives(&mut self) -> SyncResult<()> {
        for file in list_files(&self.kind_dir(AssetKind::View), Some("xml"))? {
            let archive = build_view_archive(&file)?;
            self.enqueue(AssetKind::View, &archive, |c, f| c.add_view_to_import_list(f))?;
        }

        for file in list_files(&self.kind_dir(AssetKind::Dashboard), Some("json"))? {
            if file.file_name().is_some_and(|n| n == SHARING_METADATA_FILENAME) {
                continue;
            }
            let archive = build_dashboard_archive(&file)?;
            self.enqueue(AssetKind::Dashboard, &archive, |c, f| {
                c.add_dashboard_to_import_list(f)
            })?;
        }

        for dir in list_dirs(&self.kind_dir(AssetKind::Report))? {
            let archive = build_report_archive(&dir)?;
            self.enqueue(AssetKind::Report, &archive, |c, f| c.add_report_to_import_list(f))?;
        }

        for file in list_files(&self.kind_dir(AssetKind::SuperMetric), Some("json"))? {
            self.enqueue(AssetKind::SuperMetric, &file, |c, f| {
                c.add_super_metric_to_import_list(f)
            })?;
        }

        for file in list_files(&self.kind_dir(AssetKind::MetricConfig), None)? {
            self.enqueue(AssetKind::MetricConfig, &file, |c, f| {
                c.add_metric_config_to_import_list(f)
            })?;
        }

        Ok(())
    }

    fn enqueue<F>(&mut self, kind: AssetKind, file: &Path, add: F) -> SyncResult<()>
    where
        F: FnOnce(&mut dyn CommandChannel, &Path) -> ChannelResult<()>,
    {
        debug!(file = %file.display(), "Queueing {kind} for import");
        add(&mut *self.channel, file)
            .map_err(|e| self.channel_error(format!("unable to queue {}: {e}", file.display())))?;
        self.stats.add_queued(kind, 1);
        Ok(())
    }

    fn submit_archives(&mut self) -> SyncResult<()> {
        if !self.channel.has_any_commands() {
            debug!("Nothing queued on the command channel");
            return Ok(());
        }

        if self.dry_run {
            info!(
                "Dry run: {} file(s) queued for import, not submitted",
                self.stats.total_queued()
            );
            return Ok(());
        }

        let describe = self.channel.describe();
        let package = self.package;
        let mut session = ChannelSession::open(&mut *self.channel)
            .map_err(|e| SyncError::connection(package, &describe, e))?;
        session
            .import_files()
            .map_err(|e| SyncError::connection(package, &describe, e))?;
        drop(session);

        info!("Imported {} file(s) through {describe}", self.stats.total_queued());
        self.stats.submitted = true;
        Ok(())
    }

    /// Push symptoms, then recommendations, then alerts.
    ///
    /// Every kind whose directory exists is pushed, even when an earlier
    /// file or push failed or none of its files could be read. The failures
    /// are raised together at the end.
    fn import_definitions(&mut self, dependents: &mut DependentDefinitions) -> SyncResult<()> {
        let mut report = BatchReport::new();

        for kind in DefinitionKind::IMPORT_ORDER {
            let asset_kind = kind.asset_kind();
            let dir = self.kind_dir(asset_kind);
            if !dir.is_dir() {
                continue;
            }

            let mut definitions = BTreeMap::new();
            for file in list_files(&dir, Some("json"))? {
                match read_definition(&file) {
                    Ok((id, content)) => {
                        definitions.insert(id, content);
                    }
                    Err(e) => report.record(asset_kind, file.display().to_string(), e),
                }
            }
            info!("Importing {} {}", definitions.len(), asset_kind.label());
            dependents.extend_from(kind, &definitions);
            match self.query.import_definitions(kind, &definitions, dependents) {
                Ok(()) => self.stats.add_pushed(asset_kind, definitions.len()),
                Err(e) => report.record(asset_kind, asset_kind.dir_name(), e),
            }
        }

        report.into_result(format!("Definition import of package '{}'", self.package.fq_name()))
    }

    fn import_policies(&mut self) -> SyncResult<()> {
        let mut report = BatchReport::new();
        let mut count = 0;

        for file in list_files(&self.kind_dir(AssetKind::Policy), Some("zip"))? {
            let name = base_name(&file);
            info!("Importing policy '{name}'");
            let result = fs::read(&file)
                .map_err(SyncError::from)
                .and_then(|bytes| Ok(self.query.import_policy_archive(&name, &bytes, true)?));
            match result {
                Ok(()) => count += 1,
                Err(e) => report.record(AssetKind::Policy, name, e),
            }
        }

        self.stats.add_pushed(AssetKind::Policy, count);
        report.into_result(format!("Policy import of package '{}'", self.package.fq_name()))
    }

    fn import_custom_groups(&mut self) -> SyncResult<()> {
        let dir = self.kind_dir(AssetKind::CustomGroup);
        if !dir.is_dir() {
            return Ok(());
        }

        let policies = PolicyMetadata::load_or_empty(self.staging_root);
        let mut report = BatchReport::new();
        let mut count = 0;

        for file in list_files(&dir, Some("json"))? {
            let fallback = base_name(&file);
            let result = read_json(&file).and_then(|mut payload| {
                let name = RemoteAsset::from_custom_group(payload.clone())
                    .map_or_else(|| fallback.clone(), |g| g.name);
                resolve_policy_reference(&mut payload, &policies);
                info!("Importing custom group '{name}'");
                self.query.import_custom_group(&name, &payload, &policies)?;
                Ok(())
            });
            match result {
                Ok(()) => count += 1,
                Err(e) => report.record(AssetKind::CustomGroup, fallback, e),
            }
        }

        self.stats.add_pushed(AssetKind::CustomGroup, count);
        report.into_result(format!("Custom group import of package '{}'", self.package.fq_name()))
    }

    /// Share, then unshare, every dashboard listed with groups in the
    /// sharing sidecar. All groups of a dashboard must exist on the server.
    fn apply_sharing(&mut self) -> SyncResult<()> {
        if !self.kind_dir(AssetKind::Dashboard).is_dir() {
            return Ok(());
        }
        let Some(sharing) = SharingMetadata::load(self.staging_root)? else {
            return Ok(());
        };

        let pending = SharingAction::ALL
            .iter()
            .any(|a| sharing.groups(*a).values().any(|g| !g.is_empty()));
        if !pending {
            debug!("No dashboard sharing to apply");
            return Ok(());
        }

        let describe = self.channel.describe();
        let package = self.package;
        let query = self.query;
        let mut session = ChannelSession::open(&mut *self.channel)
            .map_err(|e| SyncError::connection(package, &describe, e))?;

        for action in SharingAction::ALL {
            for (dashboard, groups) in sharing.groups(action) {
                if groups.is_empty() {
                    continue;
                }

                let found = query.find_groups_by_name(groups)?;
                let missing: Vec<String> = groups
                    .iter()
                    .filter(|g| !found.contains(g))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(SyncError::MissingGroups {
                        action: action.as_str().to_string(),
                        dashboard: dashboard.clone(),
                        missing,
                    });
                }

                info!("Applying '{action}' of dashboard '{dashboard}' for groups {groups:?}");
                let result = match action {
                    SharingAction::Share => session.share_dashboard(dashboard, groups),
                    SharingAction::Unshare => session.unshare_dashboard(dashboard, groups),
                };
                result.map_err(|e| SyncError::connection(package, &describe, e))?;

                match action {
                    SharingAction::Share => self.stats.shared += 1,
                    SharingAction::Unshare => self.stats.unshared += 1,
                }
            }
        }

        Ok(())
    }
}

fn read_json(path: &Path) -> SyncResult<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Definition file content keyed by its `id`, or by file name if it has none.
fn read_definition(path: &Path) -> SyncResult<(String, Value)> {
    let content = read_json(path)?;
    if !content.is_object() {
        return Err(SyncError::Configuration(format!(
            "Definition file '{}' does not hold a JSON object",
            path.display()
        )));
    }
    let id = content
        .get("id")
        .and_then(Value::as_str)
        .map_or_else(|| base_name(path), String::from);
    Ok((id, content))
}

/// Replace a policy name in `payload["policy"]` with its id.
///
/// References that are already ids, or unknown names, are left alone.
fn resolve_policy_reference(payload: &mut Value, policies: &PolicyMetadata) {
    let Some(reference) = payload.get("policy").and_then(Value::as_str) else {
        return;
    };
    if policies.name_of(reference).is_some() {
        return;
    }
    match policies.id_of(reference) {
        Some(id) => {
            debug!("Resolved policy '{reference}' to id '{id}'");
            payload["policy"] = Value::String(id.to_string());
        }
        None => warn!("Policy '{reference}' not found in policy metadata"),
    }
}
