//! Export: server content into a staged project tree.
//!
//! One pass per category requested by the package descriptor. Each pass
//! lists the server's content (where a listing exists), filters it with the
//! descriptor's patterns and writes the matches under the category's
//! directory of the staging root. The caller copies the staged tree into
//! the project once every pass has succeeded.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::model::{AssetKind, AssetSummary, DefinitionKind, Package, PackageDescriptor};
use crate::remote::{ChannelError, ChannelSession, CommandChannel, QueryApi};
use crate::sync::file::{atomic_write, move_file, write_json_pretty};
use crate::sync::localization::merge_resources;
use crate::sync::matcher::{is_wildcard, NameMatcher};
use crate::sync::metadata::{PolicyMetadata, SharingMetadata};
use crate::sync::types::{BatchReport, ExportStats, SyncError, SyncResult};
use crate::sync::workspace::{copy_tree, extract_zip, StagingDir};

/// Stages one package's content from the server.
pub struct Exporter<'a> {
    query: &'a dyn QueryApi,
    channel: &'a mut dyn CommandChannel,
    package: &'a Package,
    staging_root: &'a Path,
    scratch_root: &'a Path,
    stats: ExportStats,
}

impl<'a> Exporter<'a> {
    /// Create an exporter writing into `staging_root`.
    ///
    /// Per-asset scratch directories are created under `scratch_root`.
    pub fn new(
        query: &'a dyn QueryApi,
        channel: &'a mut dyn CommandChannel,
        package: &'a Package,
        staging_root: &'a Path,
        scratch_root: &'a Path,
    ) -> Self {
        Self {
            query,
            channel,
            package,
            staging_root,
            scratch_root,
            stats: ExportStats::default(),
        }
    }

    /// Run every requested category.
    ///
    /// # Errors
    ///
    /// Stops at the first category that fails: an empty manifest, a channel
    /// failure, a query failure or a batch of failed assets.
    pub fn export(mut self, descriptor: &PackageDescriptor) -> SyncResult<ExportStats> {
        info!("Exporting package {}", self.package);

        for kind in AssetKind::ALL {
            match descriptor.patterns(kind) {
                None => info!("No {} found in content.yaml", kind.label()),
                Some(patterns) => self.export_kind(kind, patterns)?,
            }
        }

        Ok(self.stats)
    }

    fn export_kind(&mut self, kind: AssetKind, patterns: &[String]) -> SyncResult<()> {
        match kind {
            AssetKind::View => self.export_views(patterns),
            AssetKind::Dashboard => self.export_dashboards(patterns),
            AssetKind::Report => self.export_reports(patterns),
            AssetKind::AlertDefinition => self.export_definitions(DefinitionKind::Alert, patterns),
            AssetKind::SymptomDefinition => {
                self.export_definitions(DefinitionKind::Symptom, patterns)
            }
            AssetKind::Recommendation => {
                self.export_definitions(DefinitionKind::Recommendation, patterns)
            }
            AssetKind::Policy => self.export_policies(patterns),
            AssetKind::CustomGroup => self.export_custom_groups(patterns),
            AssetKind::SuperMetric => self.export_super_metrics(patterns),
            AssetKind::MetricConfig => self.export_metric_configs(patterns),
        }
    }

    /// Create and return the staging directory of `kind`.
    fn kind_dir(&self, kind: AssetKind) -> SyncResult<PathBuf> {
        let dir = self.staging_root.join(kind.dir_name());
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Staging {}", kind.label());
        Ok(dir)
    }

    fn batch_context(&self, kind: AssetKind) -> String {
        format!("Export of {} in package '{}'", kind.label(), self.package.fq_name())
    }

    fn export_views(&mut self, patterns: &[String]) -> SyncResult<()> {
        let names = matched_names(AssetKind::View, &self.query.list_views()?, patterns)?;
        let dir = self.kind_dir(AssetKind::View)?;
        let context = self.batch_context(AssetKind::View);

        let count = run_channel_exports(
            &mut *self.channel,
            self.package,
            self.scratch_root,
            AssetKind::View,
            &names,
            &context,
            |channel, name, scratch| channel.export_view(name, scratch),
            |name, scratch| stage_view(name, scratch, &dir),
        )?;
        self.stats.add(AssetKind::View, count);
        Ok(())
    }

    fn export_dashboards(&mut self, patterns: &[String]) -> SyncResult<()> {
        let names = literal_names(AssetKind::Dashboard, patterns);
        let dir = self.kind_dir(AssetKind::Dashboard)?;
        let context = self.batch_context(AssetKind::Dashboard);

        let count = run_channel_exports(
            &mut *self.channel,
            self.package,
            self.scratch_root,
            AssetKind::Dashboard,
            &names,
            &context,
            |channel, name, scratch| channel.export_dashboard(name, scratch),
            |name, scratch| stage_dashboard(name, scratch, &dir),
        )?;
        self.stats.add(AssetKind::Dashboard, count);

        if let Err(e) = SharingMetadata::seed_if_absent(self.staging_root, self.package.path(), &names) {
            warn!("Error generating dashboard sharing metadata file: {e}");
        }
        Ok(())
    }

    fn export_reports(&mut self, patterns: &[String]) -> SyncResult<()> {
        let names = matched_names(AssetKind::Report, &self.query.list_reports()?, patterns)?;
        let dir = self.kind_dir(AssetKind::Report)?;
        let context = self.batch_context(AssetKind::Report);

        let count = run_channel_exports(
            &mut *self.channel,
            self.package,
            self.scratch_root,
            AssetKind::Report,
            &names,
            &context,
            |channel, name, scratch| channel.export_report(name, scratch),
            |name, scratch| stage_report(name, scratch, &dir),
        )?;
        self.stats.add(AssetKind::Report, count);
        Ok(())
    }

    fn export_super_metrics(&mut self, patterns: &[String]) -> SyncResult<()> {
        let names = matched_names(
            AssetKind::SuperMetric,
            &self.query.list_super_metrics()?,
            patterns,
        )?;
        let dir = self.kind_dir(AssetKind::SuperMetric)?;
        let context = self.batch_context(AssetKind::SuperMetric);

        let count = run_channel_exports(
            &mut *self.channel,
            self.package,
            self.scratch_root,
            AssetKind::SuperMetric,
            &names,
            &context,
            |channel, name, scratch| channel.export_super_metric(name, scratch),
            |name, scratch| stage_super_metric(name, scratch, &dir),
        )?;
        self.stats.add(AssetKind::SuperMetric, count);
        Ok(())
    }

    /// Metric configs may be stored with or without the `.xml` extension on
    /// the server, so both names are tried.
    fn export_metric_configs(&mut self, patterns: &[String]) -> SyncResult<()> {
        let names = literal_names(AssetKind::MetricConfig, patterns);
        let dir = self.kind_dir(AssetKind::MetricConfig)?;
        if names.is_empty() {
            return Ok(());
        }

        let describe = self.channel.describe();
        let mut session = ChannelSession::open(&mut *self.channel)
            .map_err(|e| connection_error(self.package, &describe, AssetKind::MetricConfig, &e))?;

        let mut report = BatchReport::new();
        let mut count = 0;
        for name in &names {
            let mut found = false;

            for candidate in [name.clone(), format!("{name}.xml")] {
                let scratch = StagingDir::create(self.scratch_root, "iac-metricconfig")?;
                if let Err(e) = session.export_metric_config(&candidate, scratch.path()) {
                    debug!("Metric config '{candidate}' not exported: {e}");
                    continue;
                }
                let content = scratch.join(&candidate);
                if content.is_file() {
                    move_file(&content, &dir.join(&candidate))?;
                    info!("Exported metric config '{candidate}'");
                    found = true;
                }
            }

            if found {
                count += 1;
            } else {
                report.record(
                    AssetKind::MetricConfig,
                    name.as_str(),
                    format!("not found on the server as '{name}' or '{name}.xml'"),
                );
            }
        }
        drop(session);

        self.stats.add(AssetKind::MetricConfig, count);
        report.into_result(self.batch_context(AssetKind::MetricConfig))
    }

    fn export_definitions(&mut self, kind: DefinitionKind, patterns: &[String]) -> SyncResult<()> {
        let asset_kind = kind.asset_kind();
        let dir = self.kind_dir(asset_kind)?;
        info!("Created directory '{}' for storing '{kind}'", dir.display());

        let matcher = NameMatcher::new(patterns);
        let mut report = BatchReport::new();
        let mut count = 0;

        for definition in self.query.list_definitions(kind)? {
            if !matcher.is_match(&definition.name) {
                continue;
            }
            info!("Exporting definition '{}' (type: '{kind}')", definition.name);
            let path = dir.join(format!("{}.json", definition.name));
            match write_json_pretty(&path, &definition.content) {
                Ok(()) => count += 1,
                Err(e) => report.record(asset_kind, definition.name.as_str(), e),
            }
        }

        self.stats.add(asset_kind, count);
        report.into_result(self.batch_context(asset_kind))
    }

    fn export_policies(&mut self, patterns: &[String]) -> SyncResult<()> {
        let dir = self.kind_dir(AssetKind::Policy)?;
        let matcher = NameMatcher::new(patterns);
        let mut metadata = PolicyMetadata::new();
        let mut report = BatchReport::new();
        let mut count = 0;

        for policy in self.query.list_policies()? {
            if !matcher.is_match(&policy.name) {
                continue;
            }
            metadata.insert(policy.id.clone(), policy.name.clone());

            info!("Exporting policy '{}'", policy.name);
            let result = self
                .query
                .get_policy_content(&policy)
                .map_err(SyncError::from)
                .and_then(|bytes| atomic_write(&dir.join(format!("{}.zip", policy.name)), &bytes));
            match result {
                Ok(()) => {
                    info!("Exported policy '{}'", policy.name);
                    count += 1;
                }
                Err(e) => report.record(AssetKind::Policy, policy.name.as_str(), e),
            }
        }

        metadata.store(self.staging_root)?;
        self.stats.add(AssetKind::Policy, count);
        report.into_result(self.batch_context(AssetKind::Policy))
    }

    fn export_custom_groups(&mut self, patterns: &[String]) -> SyncResult<()> {
        let dir = self.kind_dir(AssetKind::CustomGroup)?;
        let groups = self.query.list_custom_groups()?;
        if groups.is_empty() {
            error!("No custom groups found on the server");
            return Ok(());
        }

        let matcher = NameMatcher::new(patterns);
        let mut report = BatchReport::new();
        let mut count = 0;

        for group in groups.iter().filter(|g| matcher.is_match(&g.name)) {
            info!("Exporting custom group '{}'", group.name);
            match write_json_pretty(&dir.join(format!("{}.json", group.name)), &group.content) {
                Ok(()) => count += 1,
                Err(e) => report.record(AssetKind::CustomGroup, group.name.as_str(), e),
            }
        }

        self.stats.add(AssetKind::CustomGroup, count);
        report.into_result(self.batch_context(AssetKind::CustomGroup))
    }
}

/// Names from `manifest` matching any of `patterns`.
///
/// # Errors
///
/// Returns [`SyncError::EmptyManifest`] if the server listed nothing.
fn matched_names(
    kind: AssetKind,
    manifest: &[AssetSummary],
    patterns: &[String],
) -> SyncResult<Vec<String>> {
    if manifest.is_empty() {
        return Err(SyncError::EmptyManifest(kind));
    }
    let matcher = NameMatcher::new(patterns);
    let names: Vec<String> = matcher
        .filter(manifest.iter().map(|a| a.name.as_str()))
        .into_iter()
        .map(String::from)
        .collect();
    info!("Matched {} of {} {}", names.len(), manifest.len(), kind.label());
    Ok(names)
}

/// Patterns without wildcards; the others are skipped with a warning since
/// the category has no server listing to match against.
fn literal_names(kind: AssetKind, patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .filter(|p| {
            if is_wildcard(p) {
                warn!(
                    "Unable to export {} with pattern '{p}': the server export does not support patterns",
                    kind.label()
                );
                false
            } else {
                true
            }
        })
        .cloned()
        .collect()
}

fn connection_error(
    package: &Package,
    channel: &str,
    kind: AssetKind,
    err: &ChannelError,
) -> SyncError {
    SyncError::connection(package, channel, format!("unable to export {}: {err}", kind.label()))
}

/// Export each name through one channel session into its own scratch dir,
/// then stage it. Channel failures abort; staging failures are collected.
#[allow(clippy::too_many_arguments)]
fn run_channel_exports<E, S>(
    channel: &mut dyn CommandChannel,
    package: &Package,
    scratch_root: &Path,
    kind: AssetKind,
    names: &[String],
    context: &str,
    mut export: E,
    mut stage: S,
) -> SyncResult<usize>
where
    E: FnMut(&mut dyn CommandChannel, &str, &Path) -> Result<(), ChannelError>,
    S: FnMut(&str, &Path) -> SyncResult<()>,
{
    if names.is_empty() {
        return Ok(0);
    }

    let describe = channel.describe();
    let mut session = ChannelSession::open(channel)
        .map_err(|e| connection_error(package, &describe, kind, &e))?;

    let prefix = format!("iac-{}", kind.manifest_key().to_lowercase());
    let mut report = BatchReport::new();
    let mut count = 0;

    for name in names {
        let scratch = StagingDir::create(scratch_root, &prefix)?;
        export(session.channel(), name, scratch.path())
            .map_err(|e| connection_error(package, &describe, kind, &e))?;

        match stage(name, scratch.path()) {
            Ok(()) => {
                info!("Exported {} '{name}'", kind.manifest_key());
                count += 1;
            }
            Err(e) => report.record(kind, name.as_str(), e),
        }
    }
    drop(session);

    report.into_result(context)?;
    Ok(count)
}

fn stage_view(name: &str, scratch: &Path, dir: &Path) -> SyncResult<()> {
    let zip = scratch.join(format!("{name}.zip"));
    extract_zip(&zip, scratch)?;
    move_file(&scratch.join("content.xml"), &dir.join(format!("{name}.xml")))?;
    fs::remove_file(&zip)?;
    merge_resources(&scratch.join("resources"), &dir.join("resources"));
    Ok(())
}

fn stage_dashboard(name: &str, scratch: &Path, dir: &Path) -> SyncResult<()> {
    let zip = scratch.join(format!("{name}.zip"));
    extract_zip(&zip, scratch)?;
    let content_dir = scratch.join("dashboard");
    move_file(&content_dir.join("dashboard.json"), &dir.join(format!("{name}.json")))?;
    fs::remove_file(&zip)?;
    merge_resources(&content_dir.join("resources"), &dir.join("resources"));
    Ok(())
}

fn stage_report(name: &str, scratch: &Path, dir: &Path) -> SyncResult<()> {
    let zip = scratch.join(format!("{name}.zip"));
    let content_dir = scratch.join(name);
    extract_zip(&zip, &content_dir)?;
    copy_tree(&content_dir, &dir.join(name))?;
    Ok(())
}

fn stage_super_metric(name: &str, scratch: &Path, dir: &Path) -> SyncResult<()> {
    let file_name = format!("{name}.json");
    move_file(&scratch.join(&file_name), &dir.join(&file_name))?;
    merge_resources(&scratch.join("resources"), &dir.join("resources"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_names_empty_manifest() {
        let result = matched_names(AssetKind::View, &[], &["*".to_string()]);
        assert!(matches!(result, Err(SyncError::EmptyManifest(AssetKind::View))));
    }

    #[test]
    fn test_matched_names_keeps_manifest_order() {
        let manifest = vec![
            AssetSummary::new("FooBar"),
            AssetSummary::new("Baz"),
            AssetSummary::new("Foo"),
        ];
        let names = matched_names(AssetKind::Report, &manifest, &["Foo*".to_string()]).unwrap();
        assert_eq!(names, vec!["FooBar", "Foo"]);
    }

    #[test]
    fn test_literal_names_skip_wildcards() {
        let names = literal_names(
            AssetKind::Dashboard,
            &["Ops*".to_string(), "Capacity".to_string()],
        );
        assert_eq!(names, vec!["Capacity"]);
    }

    #[test]
    fn test_stage_report_keeps_directory() {
        use std::io::Write;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let scratch = temp_dir.path().join("scratch");
        let dir = temp_dir.path().join("reports");
        fs::create_dir_all(&scratch).unwrap();
        {
            let file = fs::File::create(scratch.join("Weekly.zip")).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::FileOptions::default();
            zip.start_file("content.xml", options).unwrap();
            zip.write_all(b"<Content/>").unwrap();
            zip.start_file("resources/content.properties", options).unwrap();
            zip.write_all(b"Weekly.name=W\n").unwrap();
            zip.finish().unwrap();
        }

        stage_report("Weekly", &scratch, &dir).unwrap();

        assert_eq!(fs::read_to_string(dir.join("Weekly/content.xml")).unwrap(), "<Content/>");
        assert!(dir.join("Weekly/resources/content.properties").is_file());
    }
}
