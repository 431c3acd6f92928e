//! Import archives for views, dashboards and reports.
//!
//! The command channel imports these assets as zip files with a fixed
//! layout:
//!
//! | Asset     | Content entry              | Resource entries                  | Key prefix   |
//! |-----------|----------------------------|-----------------------------------|--------------|
//! | view      | `content.xml`              | `resources/<file>`                | `view.<id>`  |
//! | dashboard | `dashboard/dashboard.json` | `dashboard/resources/<file>`      | base name    |
//! | report    | `content.xml`              | `resources/<file>`                | base name    |
//!
//! Each archive is written as `<base>.zip` next to its source.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::sync::file::{base_name, list_files};
use crate::sync::localization::filter_properties_bytes;
use crate::sync::types::{SyncError, SyncResult};
use crate::sync::view_id::view_id;

/// Package a view file (`views/<name>.xml`).
///
/// The view file itself is removed afterwards; a failed removal is only logged.
///
/// # Errors
///
/// Returns a configuration error if the view id cannot be read, or an I/O or
/// archive error if the zip cannot be written.
pub fn build_view_archive(view: &Path) -> SyncResult<PathBuf> {
    let name = base_name(view);
    info!("View: {name}");

    let id = view_id(view)?;
    let mut entries = vec![("content.xml".to_string(), fs::read(view)?)];
    entries.extend(read_resources(
        sibling_resources(view).as_deref(),
        "resources/",
        &format!("view.{id}"),
    )?);
    let zip_path = archive_path(view, &name);
    write_archive(&zip_path, &entries)?;

    remove_source(view, "view");
    debug!(archive = %zip_path.display(), "Created view archive");
    Ok(zip_path)
}

/// Package a dashboard file (`dashboards/<name>.json`).
///
/// The dashboard file itself is removed afterwards; a failed removal is only logged.
///
/// # Errors
///
/// Returns an I/O or archive error if the zip cannot be written.
pub fn build_dashboard_archive(dashboard: &Path) -> SyncResult<PathBuf> {
    let name = base_name(dashboard);
    info!("Dashboard: {name}");

    let mut entries = vec![("dashboard/dashboard.json".to_string(), fs::read(dashboard)?)];
    entries.extend(read_resources(
        sibling_resources(dashboard).as_deref(),
        "dashboard/resources/",
        &name,
    )?);
    let zip_path = archive_path(dashboard, &name);
    write_archive(&zip_path, &entries)?;

    remove_source(dashboard, "dashboard");
    debug!(archive = %zip_path.display(), "Created dashboard archive");
    Ok(zip_path)
}

/// Package a report directory (`reports/<name>/`).
///
/// # Errors
///
/// Returns an I/O error if `<dir>/content.xml` is missing, or an archive
/// error if the zip cannot be written.
pub fn build_report_archive(report_dir: &Path) -> SyncResult<PathBuf> {
    let name = report_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    info!("Report: {name}");

    let content_path = report_dir.join("content.xml");
    let content = fs::read(&content_path).map_err(|e| {
        SyncError::Io(std::io::Error::new(
            e.kind(),
            format!("Cannot read report content {}: {e}", content_path.display()),
        ))
    })?;
    let mut entries = vec![("content.xml".to_string(), content)];
    entries.extend(read_resources(
        Some(&report_dir.join("resources")),
        "resources/",
        &name,
    )?);
    let zip_path = archive_path(report_dir, &name);
    write_archive(&zip_path, &entries)?;

    debug!(archive = %zip_path.display(), "Created report archive");
    Ok(zip_path)
}

fn options() -> FileOptions {
    FileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn archive_path(source: &Path, name: &str) -> PathBuf {
    source.with_file_name(format!("{name}.zip"))
}

/// `resources/` directory next to a view or dashboard file.
fn sibling_resources(source: &Path) -> Option<PathBuf> {
    source.parent().map(|p| p.join("resources"))
}

/// Entry name and filtered content of every `.properties` file in `resources`.
fn read_resources(
    resources: Option<&Path>,
    entry_prefix: &str,
    key_prefix: &str,
) -> SyncResult<Vec<(String, Vec<u8>)>> {
    let Some(dir) = resources else {
        return Ok(Vec::new());
    };

    list_files(dir, Some("properties"))?
        .into_iter()
        .map(|prop_file| -> SyncResult<(String, Vec<u8>)> {
            let file_name = prop_file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let content = fs::read(&prop_file)?;
            Ok((
                format!("{entry_prefix}{file_name}"),
                filter_properties_bytes(&content, key_prefix),
            ))
        })
        .collect()
}

/// Write `entries` as a zip at `zip_path`. A partially written archive is removed.
fn write_archive(zip_path: &Path, entries: &[(String, Vec<u8>)]) -> SyncResult<()> {
    let result = write_zip(zip_path, entries);
    if result.is_err() && zip_path.exists() {
        if let Err(e) = fs::remove_file(zip_path) {
            warn!("Unable to remove incomplete archive '{}': {e}", zip_path.display());
        }
    }
    result
}

fn write_zip(zip_path: &Path, entries: &[(String, Vec<u8>)]) -> SyncResult<()> {
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    for (name, content) in entries {
        zip.start_file(name.as_str(), options())?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

fn remove_source(path: &Path, what: &str) {
    if let Err(e) = fs::remove_file(path) {
        warn!(
            "Error deleting {what} file '{}': {e}. Leaving file there.",
            path.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_entries(zip_path: &Path) -> Vec<(String, String)> {
        let mut archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            entries.push((entry.name().to_string(), content));
        }
        entries
    }

    const VIEW: &str = r#"<Content><Views><ViewDef id="abc-1"><Title>CPU</Title></ViewDef></Views></Content>"#;

    #[test]
    fn test_view_archive_layout() {
        let temp_dir = TempDir::new().unwrap();
        let views = temp_dir.path().join("views");
        fs::create_dir_all(views.join("resources")).unwrap();
        fs::write(views.join("Foo.xml"), VIEW).unwrap();
        fs::write(
            views.join("resources/content.properties"),
            "view.abc-1.title=CPU\nview.zzz.title=Other\n",
        )
        .unwrap();
        fs::write(views.join("resources/readme.txt"), "ignored").unwrap();

        let zip_path = build_view_archive(&views.join("Foo.xml")).unwrap();

        assert_eq!(zip_path, views.join("Foo.zip"));
        assert!(!views.join("Foo.xml").exists());
        let entries = read_entries(&zip_path);
        assert_eq!(
            entries,
            vec![
                ("content.xml".to_string(), VIEW.to_string()),
                (
                    "resources/content.properties".to_string(),
                    "view.abc-1.title=CPU\n".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_view_archive_without_resources() {
        let temp_dir = TempDir::new().unwrap();
        let view = temp_dir.path().join("Bar.xml");
        fs::write(&view, VIEW).unwrap();

        let zip_path = build_view_archive(&view).unwrap();
        let entries = read_entries(&zip_path);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_invalid_view_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let view = temp_dir.path().join("Broken.xml");
        fs::write(&view, "<Dashboard/>").unwrap();

        let result = build_view_archive(&view);
        assert!(matches!(result, Err(SyncError::Configuration(_))));
        assert!(view.exists());
        assert!(!temp_dir.path().join("Broken.zip").exists());
    }

    #[test]
    fn test_dashboard_archive_layout() {
        let temp_dir = TempDir::new().unwrap();
        let dashboards = temp_dir.path().join("dashboards");
        fs::create_dir_all(dashboards.join("resources")).unwrap();
        fs::write(dashboards.join("Ops.json"), "{\"entries\":[]}").unwrap();
        fs::write(
            dashboards.join("resources/resources_de.properties"),
            "Ops.title=Betrieb\nCapacity.title=Kapazitaet\n",
        )
        .unwrap();

        let zip_path = build_dashboard_archive(&dashboards.join("Ops.json")).unwrap();

        let entries = read_entries(&zip_path);
        assert_eq!(entries[0].0, "dashboard/dashboard.json");
        assert_eq!(entries[0].1, "{\"entries\":[]}");
        assert_eq!(entries[1].0, "dashboard/resources/resources_de.properties");
        assert_eq!(entries[1].1, "Ops.title=Betrieb\n");
        assert!(!dashboards.join("Ops.json").exists());
    }

    #[test]
    fn test_dashboard_archive_keeps_latin1_resources() {
        let temp_dir = TempDir::new().unwrap();
        let dashboards = temp_dir.path().join("dashboards");
        fs::create_dir_all(dashboards.join("resources")).unwrap();
        fs::write(dashboards.join("Ops.json"), "{}").unwrap();
        fs::write(
            dashboards.join("resources/resources_de.properties"),
            b"Ops.title=\xDCbersicht\nCapacity.title=Kapazit\xE4t\n",
        )
        .unwrap();

        let zip_path = build_dashboard_archive(&dashboards.join("Ops.json")).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut entry = archive
            .by_name("dashboard/resources/resources_de.properties")
            .unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"Ops.title=\xDCbersicht\n");
    }

    #[test]
    fn test_report_archive_layout() {
        let temp_dir = TempDir::new().unwrap();
        let report = temp_dir.path().join("reports").join("Weekly");
        fs::create_dir_all(report.join("resources")).unwrap();
        fs::write(report.join("content.xml"), "<Content/>").unwrap();
        fs::write(report.join("resources/content.properties"), "Weekly.name=W\nDaily.name=D\n")
            .unwrap();

        let zip_path = build_report_archive(&report).unwrap();

        assert_eq!(zip_path, temp_dir.path().join("reports").join("Weekly.zip"));
        let entries = read_entries(&zip_path);
        assert_eq!(
            entries,
            vec![
                ("content.xml".to_string(), "<Content/>".to_string()),
                ("resources/content.properties".to_string(), "Weekly.name=W\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_report_without_content_fails() {
        let temp_dir = TempDir::new().unwrap();
        let report = temp_dir.path().join("Empty");
        fs::create_dir_all(&report).unwrap();

        assert!(matches!(build_report_archive(&report), Err(SyncError::Io(_))));
    }
}
