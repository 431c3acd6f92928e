//! Status command implementation.
//!
//! Local only: reports what the project tree holds per category, what the
//! descriptor requests and which sidecar files are present.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::export::DESCRIPTOR_FILENAME;
use crate::error::{Error, Result};
use crate::model::{AssetKind, PackageDescriptor};
use crate::sync::file::{list_dirs, list_files};
use crate::sync::metadata::{
    PolicyMetadata, SharingMetadata, POLICY_METADATA_FILENAME, SHARING_METADATA_FILENAME,
};

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    project: String,
    descriptor: Option<String>,
    categories: Vec<CategoryStatus>,
    policy_metadata: bool,
    sharing_metadata: bool,
}

#[derive(Serialize)]
struct CategoryStatus {
    kind: AssetKind,
    directory: &'static str,
    local: usize,
    /// `None` when the descriptor does not request the category.
    patterns: Option<Vec<String>>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the project directory does not exist or the
/// descriptor cannot be parsed.
pub fn execute(project: &Path, json: bool) -> Result<()> {
    if !project.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "Project directory not found: {}",
            project.display()
        )));
    }

    let descriptor_path = project.join(DESCRIPTOR_FILENAME);
    let descriptor = if descriptor_path.is_file() {
        Some(PackageDescriptor::load(&descriptor_path)?)
    } else {
        None
    };

    let mut categories = Vec::with_capacity(AssetKind::ALL.len());
    for kind in AssetKind::ALL {
        categories.push(CategoryStatus {
            kind,
            directory: kind.dir_name(),
            local: count_local(project, kind)?,
            patterns: descriptor
                .as_ref()
                .and_then(|d| d.patterns(kind))
                .map(<[String]>::to_vec),
        });
    }

    let output = StatusOutput {
        project: project.display().to_string(),
        descriptor: descriptor.is_some().then(|| descriptor_path.display().to_string()),
        categories,
        policy_metadata: PolicyMetadata::path(project).is_file(),
        sharing_metadata: SharingMetadata::path(project).is_file(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_human(&output);
    }

    Ok(())
}

/// Number of assets of `kind` stored in the project tree.
fn count_local(project: &Path, kind: AssetKind) -> Result<usize> {
    let dir = project.join(kind.dir_name());
    let count = match kind {
        AssetKind::Report => list_dirs(&dir)?.len(),
        AssetKind::View => list_files(&dir, Some("xml"))?.len(),
        AssetKind::Policy => list_files(&dir, Some("zip"))?.len(),
        AssetKind::MetricConfig => list_files(&dir, None)?.len(),
        AssetKind::Dashboard => list_files(&dir, Some("json"))?
            .iter()
            .filter(|p| p.file_name().is_none_or(|n| n != SHARING_METADATA_FILENAME))
            .count(),
        AssetKind::AlertDefinition
        | AssetKind::SymptomDefinition
        | AssetKind::Recommendation
        | AssetKind::CustomGroup
        | AssetKind::SuperMetric => list_files(&dir, Some("json"))?.len(),
    };
    Ok(count)
}

fn print_human(output: &StatusOutput) {
    println!("{}", "vrsync Status".bold());
    println!("=============");
    println!();
    println!("Project:    {}", output.project);
    match &output.descriptor {
        Some(path) => println!("Descriptor: {path}"),
        None => println!("Descriptor: {}", format!("no {DESCRIPTOR_FILENAME}").yellow()),
    }
    println!();

    for category in &output.categories {
        let requested = match &category.patterns {
            None => "not requested".dimmed().to_string(),
            Some(p) if p.is_empty() => "requested, no patterns".yellow().to_string(),
            Some(p) => p.join(", ").cyan().to_string(),
        };
        println!(
            "  {:<20} {:>4}  {requested}",
            category.kind.label(),
            category.local
        );
    }

    println!();
    let mark = |present: bool| {
        if present {
            "present".green().to_string()
        } else {
            "missing".dimmed().to_string()
        }
    };
    println!("  {POLICY_METADATA_FILENAME}: {}", mark(output.policy_metadata));
    println!("  {SHARING_METADATA_FILENAME}: {}", mark(output.sharing_metadata));
}
