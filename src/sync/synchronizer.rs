//! Package-level driver for export and import.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::model::{Package, PackageDescriptor, PACKAGE_TYPE};
use crate::remote::{CleanupGuard, CommandChannel, QueryApi};
use crate::sync::export::Exporter;
use crate::sync::import::Importer;
use crate::sync::types::{ExportStats, ImportStats, SyncError, SyncResult};
use crate::sync::workspace::{copy_tree, unpack_package, StagingDir};

/// Name of the staging root inside an export workspace.
const EXPORT_STAGING_DIR: &str = "vrops-export";
/// Parent of every import workspace under the temp root.
const IMPORT_WORKSPACE_DIR: &str = "vrops-import";

/// Moves packages between project trees and one server.
pub struct PackageSynchronizer<Q, C> {
    query: Q,
    channel: C,
    temp_root: PathBuf,
}

impl<Q: QueryApi, C: CommandChannel> PackageSynchronizer<Q, C> {
    /// Create a synchronizer staging its work under `temp_root`.
    pub fn new(query: Q, channel: C, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            query,
            channel,
            temp_root: temp_root.into(),
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Pull the content selected by `descriptor` into `package`'s directory.
    ///
    /// Everything is staged first; the project tree is only touched once
    /// every category succeeded, and not at all on a dry run.
    ///
    /// # Errors
    ///
    /// Returns the first category error. The project tree is left unchanged.
    pub fn export_package(
        &mut self,
        package: &Package,
        descriptor: &PackageDescriptor,
        dry_run: bool,
    ) -> SyncResult<ExportStats> {
        let workspace = StagingDir::create(&self.temp_root, "vrsync-export")?;
        let staging_root = workspace.join(EXPORT_STAGING_DIR);
        std::fs::create_dir_all(&staging_root)?;
        debug!(staging = %staging_root.display(), "Export workspace created");

        let mut stats = Exporter::new(
            &self.query,
            &mut self.channel,
            package,
            &staging_root,
            workspace.path(),
        )
        .export(descriptor)?;

        if dry_run {
            info!("Dry run: {} asset(s) staged, project not updated", stats.total());
        } else {
            copy_tree(&staging_root, package.path())?;
            stats.written = true;
            info!(
                "Exported {} asset(s) into {}",
                stats.total(),
                package.path().display()
            );
        }

        Ok(stats)
    }

    /// Export several packages, loading each one's descriptor with
    /// `descriptor_for`.
    ///
    /// # Errors
    ///
    /// Stops at the first package that fails.
    pub fn export_all<F>(
        &mut self,
        packages: &[Package],
        mut descriptor_for: F,
        dry_run: bool,
    ) -> SyncResult<ExportStats>
    where
        F: FnMut(&Package) -> SyncResult<PackageDescriptor>,
    {
        let mut total = ExportStats::default();
        for package in packages {
            let descriptor = descriptor_for(package)?;
            total.merge(&self.export_package(package, &descriptor, dry_run)?);
        }
        Ok(total)
    }

    /// Push one package archive or directory to the server.
    ///
    /// The channel is cleaned up and the staging directory removed whatever
    /// the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PackageNotFound`] for a missing package, else
    /// the first fatal or batch error of the import.
    pub fn import_package(
        &mut self,
        package: &Package,
        dry_run: bool,
        merge_packages: bool,
    ) -> SyncResult<ImportStats> {
        debug!(merge_packages, "Merging has no effect on {PACKAGE_TYPE} packages");

        let parent = self.temp_root.join(IMPORT_WORKSPACE_DIR);
        std::fs::create_dir_all(&parent)?;
        let prefix = format!("import-{}-{}", package.package_type, package.id.unwrap_or(0));
        let workspace = StagingDir::create(&parent, &prefix)?;

        unpack_package(package.path(), workspace.path())?;

        let mut guard = CleanupGuard::new(&mut self.channel);
        Importer::new(
            &self.query,
            guard.channel(),
            package,
            workspace.path(),
            dry_run,
        )
        .import()
    }

    /// Import several packages after checking that all of them exist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PackageNotFound`] before importing anything if
    /// a package is missing, else stops at the first failing package.
    pub fn import_all(
        &mut self,
        packages: &[Package],
        dry_run: bool,
        merge_packages: bool,
    ) -> SyncResult<ImportStats> {
        if let Some(missing) = packages.iter().find(|p| !p.path().exists()) {
            return Err(SyncError::PackageNotFound(missing.path().to_path_buf()));
        }

        let mut total = ImportStats::default();
        for package in packages {
            total.merge(&self.import_package(package, dry_run, merge_packages)?);
        }
        Ok(total)
    }
}
