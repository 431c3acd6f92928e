//! Import command implementation.

use std::path::Path;

use crate::cli::ImportArgs;
use crate::config::ConnectionSettings;
use crate::error::Result;
use crate::model::{AssetKind, Package};
use crate::sync::ImportStats;

/// Execute the import command.
///
/// Every package path is checked before anything is sent to the server.
///
/// # Errors
///
/// Returns an error if the settings are unusable, a package is missing, or
/// an import fails.
pub fn execute(args: &ImportArgs, config: Option<&Path>, dry_run: bool, json: bool) -> Result<()> {
    let packages: Vec<Package> = args.packages.iter().map(Package::from_path).collect();
    let settings = ConnectionSettings::resolve(args.connection.to_layer(), config)?;
    let mut synchronizer = super::connect(&settings)?;

    let stats = synchronizer.import_all(&packages, dry_run, args.merge)?;

    if json {
        let names: Vec<String> = packages.iter().map(Package::fq_name).collect();
        let output = serde_json::json!({
            "success": true,
            "packages": names,
            "dry_run": dry_run,
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_summary(&packages, &stats, dry_run);
    }

    Ok(())
}

fn print_summary(packages: &[Package], stats: &ImportStats, dry_run: bool) {
    let verb = if dry_run { "Dry run of" } else { "Imported" };
    println!("{verb} {} package(s)", packages.len());
    println!();

    for kind in AssetKind::ALL {
        let queued = stats.queued.get(kind.manifest_key()).copied().unwrap_or(0);
        let pushed = stats.pushed.get(kind.manifest_key()).copied().unwrap_or(0);
        if queued + pushed > 0 {
            println!("  {:<20} {}", kind.label(), queued + pushed);
        }
    }
    if stats.shared > 0 {
        println!("  {:<20} {}", "dashboards shared", stats.shared);
    }
    if stats.unshared > 0 {
        println!("  {:<20} {}", "dashboards unshared", stats.unshared);
    }
    if dry_run && stats.total_queued() > 0 {
        println!();
        println!("  {} file(s) prepared, nothing submitted", stats.total_queued());
    }
}
