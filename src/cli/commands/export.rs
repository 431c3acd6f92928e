//! Export command implementation.
//!
//! Pulls the content selected by the project's `content.yaml` from the
//! server and writes it into the project directory.

use std::path::{Path, PathBuf};

use crate::cli::ExportArgs;
use crate::config::ConnectionSettings;
use crate::error::{Error, Result};
use crate::model::{AssetKind, Package, PackageDescriptor};
use crate::sync::ExportStats;

/// Descriptor file looked up in the project when `--descriptor` is absent.
pub const DESCRIPTOR_FILENAME: &str = "content.yaml";

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the descriptor or settings are unusable, or if the
/// export itself fails.
pub fn execute(args: &ExportArgs, config: Option<&Path>, dry_run: bool, json: bool) -> Result<()> {
    let descriptor_path = args
        .descriptor
        .clone()
        .unwrap_or_else(|| args.project.join(DESCRIPTOR_FILENAME));
    if !descriptor_path.is_file() {
        return Err(Error::DescriptorNotFound {
            path: descriptor_path,
        });
    }
    let descriptor = PackageDescriptor::load(&descriptor_path)?;

    let package = Package::new(&args.project, package_name(args), &args.version);
    let settings = ConnectionSettings::resolve(args.connection.to_layer(), config)?;
    let mut synchronizer = super::connect(&settings)?;

    let stats = synchronizer.export_package(&package, &descriptor, dry_run)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "package": package.fq_name(),
            "project": package.path().display().to_string(),
            "dry_run": dry_run,
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_summary(&package, &stats, dry_run);
    }

    Ok(())
}

/// `--name`, else the project directory's name.
fn package_name(args: &ExportArgs) -> String {
    if let Some(name) = &args.name {
        return name.clone();
    }
    args.project
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(&args.project))
        .file_name()
        .map_or_else(|| "package".to_string(), |n| n.to_string_lossy().to_string())
}

fn print_summary(package: &Package, stats: &ExportStats, dry_run: bool) {
    if stats.is_empty() {
        println!("Nothing exported for {}.", package.fq_name());
        return;
    }

    if dry_run {
        println!("Dry run for {} (project not updated)", package.fq_name());
    } else {
        println!("Export complete for {}", package.fq_name());
    }
    println!();
    for kind in AssetKind::ALL {
        let count = stats.count(kind);
        if count > 0 {
            println!("  {:<20} {count}", kind.label());
        }
    }
    println!();
    println!("  Total: {} assets", stats.total());
    println!("  Location: {}", package.path().display());
}
